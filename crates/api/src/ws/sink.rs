use async_trait::async_trait;
use kindred_db::models::Notification;
use kindred_realtime::protocol::events;
use kindred_services::notify::NotificationSink;
use std::sync::Arc;

use super::{dispatcher, storage::WsStorage};
use crate::routes::notification::to_response;

/// Pushes delivered notifications to the recipient's open sockets.
pub struct WsNotificationSink {
    ws_storage: Arc<WsStorage>,
}

impl WsNotificationSink {
    pub fn new(ws_storage: Arc<WsStorage>) -> Self {
        Self { ws_storage }
    }
}

#[async_trait]
impl NotificationSink for WsNotificationSink {
    async fn push(&self, notification: &Notification) {
        let frame = dispatcher::frame(events::NOTIFICATION, &to_response(notification.clone()));
        dispatcher::send_to_user(&self.ws_storage, &notification.user_id, &frame).await;
    }
}
