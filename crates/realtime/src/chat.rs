use chrono::Utc;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};
use std::time::Instant;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::client::{Handler, RealtimeClient};
use crate::protocol::{
    events, DeliveredPayload, MessagePayload, ReadPayload, TypingPayload,
};

#[derive(Debug, Error, PartialEq)]
pub enum ChatError {
    #[error("Not connected")]
    NotConnected,

    #[error("No active room")]
    NoActiveRoom,

    #[error("Message content is empty")]
    EmptyMessage,

    #[error("Timed out waiting for acknowledgement")]
    AckTimeout,

    #[error("Rejected: {0}")]
    Rejected(String),
}

#[derive(Default)]
struct ChatState {
    room: Option<String>,
    messages: Vec<MessagePayload>,
    seen: HashSet<String>,
    /// Remote user id -> when their last `typing` arrived.
    remote_typing: HashMap<String, Instant>,
    typing: bool,
    typing_epoch: u64,
    typing_timer: Option<JoinHandle<()>>,
}

impl ChatState {
    fn reset_room(&mut self, room: Option<String>) {
        self.room = room;
        self.messages.clear();
        self.seen.clear();
        self.remote_typing.clear();
    }

    /// Appends unless a message with the same id is already held.
    fn push_unique(&mut self, message: MessagePayload) -> bool {
        if !self.seen.insert(message.id.clone()) {
            return false;
        }
        self.messages.push(message);
        true
    }

    /// Ends local typing, returning the room a `stop_typing` should go to.
    fn end_typing(&mut self) -> Option<String> {
        if let Some(timer) = self.typing_timer.take() {
            timer.abort();
        }
        if !self.typing {
            return None;
        }
        self.typing = false;
        self.typing_epoch += 1;
        self.room.clone()
    }
}

struct ChatInner {
    client: RealtimeClient,
    user_id: String,
    state: Mutex<ChatState>,
    listeners: Mutex<Vec<(&'static str, Handler)>>,
}

/// Per-match chat on top of a [`RealtimeClient`]: one active room at a
/// time, acknowledged sends, typing debounce, delivery and read receipts.
#[derive(Clone)]
pub struct ChatSession {
    inner: Arc<ChatInner>,
}

impl ChatSession {
    pub fn new(client: RealtimeClient, user_id: impl Into<String>) -> Self {
        let inner = Arc::new(ChatInner {
            client,
            user_id: user_id.into(),
            state: Mutex::new(ChatState::default()),
            listeners: Mutex::new(Vec::new()),
        });
        ChatInner::subscribe(&inner);
        Self { inner }
    }

    pub fn active_room(&self) -> Option<String> {
        self.inner.state.lock().room.clone()
    }

    pub fn messages(&self) -> Vec<MessagePayload> {
        self.inner.state.lock().messages.clone()
    }

    pub fn is_typing(&self) -> bool {
        self.inner.state.lock().typing
    }

    /// Remote users currently typing in the active room. Entries lapse
    /// after the typing timeout even if no `stop_typing` arrives.
    pub fn typing_users(&self) -> Vec<String> {
        let timeout = self.inner.client.config().typing_timeout;
        let mut state = self.inner.state.lock();
        state.remote_typing.retain(|_, at| at.elapsed() < timeout);
        let mut users: Vec<String> = state.remote_typing.keys().cloned().collect();
        users.sort();
        users
    }

    /// Makes `match_id` the active room. Re-joining the active room sends
    /// nothing; switching rooms leaves the previous one first.
    pub fn join(&self, match_id: &str) -> Result<(), ChatError> {
        let previous = {
            let state = self.inner.state.lock();
            if state.room.as_deref() == Some(match_id) {
                return Ok(());
            }
            state.room.clone()
        };
        if !self.inner.client.is_connected() {
            return Err(ChatError::NotConnected);
        }
        if previous.is_some() {
            self.leave();
        }

        self.inner.state.lock().reset_room(Some(match_id.to_string()));
        if !self
            .inner
            .client
            .emit(events::JOIN_ROOM, json!({ "match_id": match_id }))
        {
            self.inner.state.lock().reset_room(None);
            return Err(ChatError::NotConnected);
        }
        debug!(match_id, "Joined chat room");
        Ok(())
    }

    /// Leaves the active room, if any.
    pub fn leave(&self) {
        let (room, typing_room) = {
            let mut state = self.inner.state.lock();
            let typing_room = state.end_typing();
            let room = state.room.clone();
            state.reset_room(None);
            (room, typing_room)
        };
        if let Some(room) = typing_room {
            self.inner
                .client
                .emit(events::STOP_TYPING, json!({ "match_id": room }));
        }
        if let Some(room) = room {
            self.inner
                .client
                .emit(events::LEAVE_ROOM, json!({ "match_id": room }));
            debug!(match_id = %room, "Left chat room");
        }
    }

    /// Sends to the active room and waits for the stored message.
    pub async fn send_message(&self, content: &str) -> Result<MessagePayload, ChatError> {
        if !self.inner.client.is_connected() {
            return Err(ChatError::NotConnected);
        }
        let room = self.active_room().ok_or(ChatError::NoActiveRoom)?;
        let content = content.trim();
        if content.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        self.stop_typing();

        let client_id = uuid::Uuid::new_v4().to_string();
        let ack = self
            .inner
            .client
            .emit_with_ack(
                events::SEND_MESSAGE,
                json!({ "match_id": room, "content": content, "client_id": client_id }),
                self.inner.client.config().ack_timeout,
            )
            .await;

        if !ack.success {
            return Err(if ack.is_timeout() {
                ChatError::AckTimeout
            } else if ack.is_disconnected() {
                ChatError::NotConnected
            } else {
                ChatError::Rejected(ack.error.unwrap_or_default())
            });
        }

        let message: MessagePayload = ack
            .data
            .get("message")
            .cloned()
            .and_then(|m| serde_json::from_value(m).ok())
            .ok_or_else(|| ChatError::Rejected("malformed acknowledgement".to_string()))?;

        let mut state = self.inner.state.lock();
        if state.room.as_deref() == Some(message.match_id.as_str()) {
            state.push_unique(message.clone());
        }
        Ok(message)
    }

    /// Announces typing. A `stop_typing` follows automatically once the
    /// typing timeout passes without another call.
    pub fn start_typing(&self) -> bool {
        if !self.inner.client.is_connected() {
            return false;
        }
        let (room, announce, epoch) = {
            let mut state = self.inner.state.lock();
            let Some(room) = state.room.clone() else {
                return false;
            };
            if let Some(timer) = state.typing_timer.take() {
                timer.abort();
            }
            let announce = !state.typing;
            state.typing = true;
            state.typing_epoch += 1;
            (room, announce, state.typing_epoch)
        };

        if announce
            && !self
                .inner
                .client
                .emit(events::TYPING, json!({ "match_id": room }))
        {
            self.inner.state.lock().typing = false;
            return false;
        }

        let weak = Arc::downgrade(&self.inner);
        let timeout = self.inner.client.config().typing_timeout;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(inner) = weak.upgrade() {
                inner.typing_expired(epoch);
            }
        });

        let mut state = self.inner.state.lock();
        if state.typing_epoch == epoch {
            state.typing_timer = Some(timer);
        } else {
            timer.abort();
        }
        true
    }

    pub fn stop_typing(&self) {
        let room = self.inner.state.lock().end_typing();
        if let Some(room) = room {
            self.inner
                .client
                .emit(events::STOP_TYPING, json!({ "match_id": room }));
        }
    }

    /// Tells the server everything in the active room has been read.
    pub fn mark_read(&self) -> Result<(), ChatError> {
        let room = self.active_room().ok_or(ChatError::NoActiveRoom)?;
        if !self
            .inner
            .client
            .emit(events::MARK_READ, json!({ "match_id": room }))
        {
            return Err(ChatError::NotConnected);
        }
        Ok(())
    }

    /// Leaves the room and detaches this session's listeners from the client.
    pub fn close(&self) {
        self.leave();
        let listeners = std::mem::take(&mut *self.inner.listeners.lock());
        for (event, handler) in listeners {
            self.inner.client.off(event, Some(&handler));
        }
    }
}

impl ChatInner {
    fn subscribe(this: &Arc<Self>) {
        let routes: [(&'static str, fn(&ChatInner, &Value)); 7] = [
            (events::CONNECTED, ChatInner::on_connected),
            (events::NEW_MESSAGE, ChatInner::on_new_message),
            (events::TYPING, ChatInner::on_typing),
            (events::STOP_TYPING, ChatInner::on_stop_typing),
            (events::READ_RECEIPT, ChatInner::on_read),
            (events::MESSAGE_READ, ChatInner::on_read),
            (events::MESSAGE_DELIVERED, ChatInner::on_delivered),
        ];

        let mut listeners = this.listeners.lock();
        for (event, route) in routes {
            let weak: Weak<ChatInner> = Arc::downgrade(this);
            let handler: Handler = Arc::new(move |data: &Value| {
                if let Some(inner) = weak.upgrade() {
                    route(&inner, data);
                }
            });
            this.client.on(event, handler.clone());
            listeners.push((event, handler));
        }
    }

    fn typing_expired(&self, epoch: u64) {
        let room = {
            let mut state = self.state.lock();
            if !state.typing || state.typing_epoch != epoch {
                return;
            }
            state.typing_timer = None;
            state.end_typing()
        };
        if let Some(room) = room {
            self.client
                .emit(events::STOP_TYPING, json!({ "match_id": room }));
        }
    }

    /// The hub forgets room membership when a socket closes, so every new
    /// connection has to join the active room again.
    fn on_connected(&self, _data: &Value) {
        let room = {
            let mut state = self.state.lock();
            state.remote_typing.clear();
            state.room.clone()
        };
        if let Some(room) = room {
            if self
                .client
                .emit(events::JOIN_ROOM, json!({ "match_id": room }))
            {
                debug!(match_id = %room, "Rejoined chat room");
            }
        }
    }

    fn on_new_message(&self, data: &Value) {
        let Ok(message) = serde_json::from_value::<MessagePayload>(data.clone()) else {
            debug!("Ignoring malformed new_message");
            return;
        };
        let added = {
            let mut state = self.state.lock();
            if state.room.as_deref() != Some(message.match_id.as_str()) {
                return;
            }
            state.remote_typing.remove(&message.sender_id);
            state.push_unique(message.clone())
        };
        if added && message.sender_id != self.user_id {
            self.client.emit(
                events::MESSAGE_DELIVERED,
                json!({ "match_id": message.match_id, "message_id": message.id }),
            );
        }
    }

    fn on_typing(&self, data: &Value) {
        let Ok(typing) = serde_json::from_value::<TypingPayload>(data.clone()) else {
            return;
        };
        if typing.user_id == self.user_id {
            return;
        }
        let mut state = self.state.lock();
        if state.room.as_deref() == Some(typing.match_id.as_str()) {
            state.remote_typing.insert(typing.user_id, Instant::now());
        }
    }

    fn on_stop_typing(&self, data: &Value) {
        let Ok(typing) = serde_json::from_value::<TypingPayload>(data.clone()) else {
            return;
        };
        let mut state = self.state.lock();
        if state.room.as_deref() == Some(typing.match_id.as_str()) {
            state.remote_typing.remove(&typing.user_id);
        }
    }

    /// Stamps `read_at` on unread messages the reader did not send.
    fn on_read(&self, data: &Value) {
        let Ok(read) = serde_json::from_value::<ReadPayload>(data.clone()) else {
            return;
        };
        let mut state = self.state.lock();
        if state.room.as_deref() != Some(read.match_id.as_str()) {
            return;
        }
        for message in state
            .messages
            .iter_mut()
            .filter(|m| m.sender_id != read.reader_id && m.read_at.is_none())
        {
            message.read_at = Some(read.read_at);
        }
    }

    fn on_delivered(&self, data: &Value) {
        let Ok(delivered) = serde_json::from_value::<DeliveredPayload>(data.clone()) else {
            return;
        };
        let mut state = self.state.lock();
        if let Some(message) = state
            .messages
            .iter_mut()
            .find(|m| m.id == delivered.message_id && m.delivered_at.is_none())
        {
            message.delivered_at = Some(delivered.delivered_at.unwrap_or_else(Utc::now));
        }
    }
}
