pub mod quiet_hours;

use async_trait::async_trait;
use bson::{oid::ObjectId, DateTime, Document};
use chrono::Utc;
use kindred_db::models::{Notification, NotificationPrefs, NotificationType};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

use crate::dao::base::DaoResult;
use crate::dao::notification::NotificationDao;
use crate::dao::user::UserDao;

pub use quiet_hours::QuietHours;

/// Live delivery channel for notifications (the `/ws` hub in the API).
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn push(&self, notification: &Notification);
}

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub notification_type: NotificationType,
    pub title: String,
    pub body: String,
    pub data: Option<Document>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DispatchOutcome {
    Delivered,
    Deferred { until: chrono::DateTime<Utc> },
    Suppressed,
}

/// Whether the recipient opted into this kind of notification.
pub fn type_enabled(prefs: &NotificationPrefs, kind: NotificationType) -> bool {
    match kind {
        NotificationType::Match => prefs.new_matches,
        NotificationType::Message => prefs.messages,
        NotificationType::Like => prefs.likes,
        NotificationType::Event | NotificationType::GroupDate => prefs.events,
        NotificationType::ProfileView => prefs.profile_views,
        NotificationType::System => true,
    }
}

/// Decides what happens to a notification at `now` given the recipient's prefs.
pub fn plan_delivery(
    prefs: &NotificationPrefs,
    kind: NotificationType,
    now: chrono::DateTime<Utc>,
) -> DispatchOutcome {
    if !type_enabled(prefs, kind) {
        return DispatchOutcome::Suppressed;
    }
    match QuietHours::from_prefs(&prefs.quiet_hours).and_then(|q| q.window_end(now)) {
        Some(until) => DispatchOutcome::Deferred { until },
        None => DispatchOutcome::Delivered,
    }
}

pub struct NotificationService {
    notifications: Arc<NotificationDao>,
    users: Arc<UserDao>,
    sink: Arc<dyn NotificationSink>,
}

impl NotificationService {
    pub fn new(
        notifications: Arc<NotificationDao>,
        users: Arc<UserDao>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            notifications,
            users,
            sink,
        }
    }

    pub async fn dispatch(
        &self,
        user_id: ObjectId,
        new: NewNotification,
    ) -> DaoResult<DispatchOutcome> {
        let user = self.users.find_active(user_id).await?;
        let prefs = &user.notification_preferences;
        let outcome = plan_delivery(prefs, new.notification_type, Utc::now());

        let deferred_until = match &outcome {
            DispatchOutcome::Suppressed => {
                debug!(?user_id, kind = ?new.notification_type, "Notification suppressed by preferences");
                return Ok(outcome);
            }
            DispatchOutcome::Deferred { until } => Some(DateTime::from_chrono(*until)),
            DispatchOutcome::Delivered => None,
        };

        let notification = self
            .notifications
            .create(
                user_id,
                new.notification_type,
                new.title,
                new.body,
                new.data,
                deferred_until,
            )
            .await?;

        if deferred_until.is_none() && prefs.push {
            self.sink.push(&notification).await;
        }
        debug!(?user_id, ?outcome, "Notification dispatched");
        Ok(outcome)
    }

    /// Makes deferred notifications visible once their quiet window has ended,
    /// pushing them live to recipients who still want push delivery.
    pub async fn release_due(&self) -> DaoResult<usize> {
        let due = self.notifications.find_due(DateTime::now(), 500).await?;
        let mut released = 0;
        for notification in due {
            let Some(id) = notification.id else { continue };
            if !self.notifications.clear_deferral(id).await? {
                continue;
            }
            released += 1;
            let push = match self.users.find_active(notification.user_id).await {
                Ok(user) => user.notification_preferences.push,
                Err(e) => {
                    debug!(user_id = ?notification.user_id, "Skipping push for released notification: {e}");
                    false
                }
            };
            if push {
                self.sink.push(&notification).await;
            }
        }
        if released > 0 {
            info!(released, "Released deferred notifications");
        }
        Ok(released)
    }
}
