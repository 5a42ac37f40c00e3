use bson::oid::ObjectId;
use kindred_config::Settings;
use kindred_db::models::User;
use kindred_services::{
    AuthService, IcebreakerService, NotificationService, UserCache,
    dao::{
        base::DaoResult, beta::BetaDao, event::EventDao, group_date::GroupDateDao,
        matching::MatchDao, message::MessageDao, notification::NotificationDao,
        shared_profile::SharedProfileDao, user::UserDao,
    },
    notify::NewNotification,
};
use mongodb::Database;
use std::{sync::Arc, time::Duration};
use tracing::warn;

use crate::ws::{rooms::RoomRegistry, sink::WsNotificationSink, storage::WsStorage};

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub settings: Settings,
    pub auth: Arc<AuthService>,
    pub users: Arc<UserDao>,
    pub matches: Arc<MatchDao>,
    pub messages: Arc<MessageDao>,
    pub notifications: Arc<NotificationDao>,
    pub events: Arc<EventDao>,
    pub group_dates: Arc<GroupDateDao>,
    pub shares: Arc<SharedProfileDao>,
    pub beta: Arc<BetaDao>,
    pub notifier: Arc<NotificationService>,
    pub icebreakers: IcebreakerService,
    pub user_cache: Arc<UserCache>,
    pub ws_storage: Arc<WsStorage>,
    pub rooms: Arc<RoomRegistry>,
}

impl AppState {
    pub fn new(db: Database, settings: Settings) -> Self {
        let auth = Arc::new(AuthService::new(settings.jwt.clone()));
        let users = Arc::new(UserDao::new(&db));
        let matches = Arc::new(MatchDao::new(&db));
        let messages = Arc::new(MessageDao::new(&db));
        let notifications = Arc::new(NotificationDao::new(&db));
        let events = Arc::new(EventDao::new(&db));
        let group_dates = Arc::new(GroupDateDao::new(&db));
        let shares = Arc::new(SharedProfileDao::new(&db));
        let beta = Arc::new(BetaDao::new(&db));
        let ws_storage = Arc::new(WsStorage::new());
        let rooms = Arc::new(RoomRegistry::new());
        let notifier = Arc::new(NotificationService::new(
            notifications.clone(),
            users.clone(),
            Arc::new(WsNotificationSink::new(ws_storage.clone())),
        ));
        let icebreakers = IcebreakerService::new(&settings.ai);
        let user_cache = Arc::new(UserCache::new(Duration::from_secs(
            settings.cache.user_ttl_secs,
        )));

        Self {
            db,
            settings,
            auth,
            users,
            matches,
            messages,
            notifications,
            events,
            group_dates,
            shares,
            beta,
            notifier,
            icebreakers,
            user_cache,
            ws_storage,
            rooms,
        }
    }

    /// Active user by id, served from the process cache when fresh.
    pub async fn load_user(&self, user_id: ObjectId) -> DaoResult<User> {
        if let Some(user) = self.user_cache.get(&user_id) {
            return Ok(user);
        }
        let user = self.users.find_active(user_id).await?;
        self.user_cache.insert(user_id, user.clone());
        Ok(user)
    }

    pub fn online_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.settings.presence.online_window_secs as i64)
    }

    /// Runs a notification through the recipient's preferences. Failures are
    /// logged and never fail the request that triggered them.
    pub async fn notify(&self, user_id: ObjectId, notification: NewNotification) {
        if let Err(e) = self.notifier.dispatch(user_id, notification).await {
            warn!(?user_id, %e, "Failed to dispatch notification");
        }
    }
}
