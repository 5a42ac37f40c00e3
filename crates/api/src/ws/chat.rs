use bson::{doc, oid::ObjectId};
use chrono::Utc;
use kindred_db::models::{Message, MessageType, NotificationType};
use kindred_realtime::protocol::{
    DeliveredPayload, MessagePayload, PresencePayload, ReadPayload, TypingPayload, events,
};
use kindred_services::{notify::NewNotification, validation::validate_message_content};
use tracing::{debug, warn};

use super::dispatcher::{broadcast, frame, send_to_user};
use crate::{error::ApiError, state::AppState};

const PREVIEW_CHARS: usize = 80;

pub fn message_payload(m: &Message) -> MessagePayload {
    MessagePayload {
        id: m.id.map(|id| id.to_hex()).unwrap_or_default(),
        match_id: m.match_id.to_hex(),
        sender_id: m.sender_id.to_hex(),
        content: m.content.clone(),
        message_type: match m.message_type {
            MessageType::Text => "text",
            MessageType::Icebreaker => "icebreaker",
            MessageType::System => "system",
        }
        .to_string(),
        client_id: m.client_id.clone(),
        created_at: m.created_at.to_chrono(),
        delivered_at: m.delivered_at.map(|d| d.to_chrono()),
        read_at: m.read_at.map(|d| d.to_chrono()),
    }
}

fn preview(content: &str) -> String {
    if content.chars().count() <= PREVIEW_CHARS {
        return content.to_string();
    }
    let cut: String = content.chars().take(PREVIEW_CHARS).collect();
    format!("{}…", cut.trim_end())
}

/// Persists a message, fans it out to both participants and notifies the
/// recipient.
pub async fn send_message(
    state: &AppState,
    sender_id: ObjectId,
    match_id: ObjectId,
    content: &str,
    client_id: Option<String>,
) -> Result<MessagePayload, ApiError> {
    let content = validate_message_content(content)
        .map_err(ApiError::Validation)?
        .to_string();
    let m = state.matches.find_for_member(match_id, sender_id).await?;

    let message = state
        .messages
        .create(match_id, sender_id, content, MessageType::Text, client_id)
        .await?;
    state
        .matches
        .touch_last_message(match_id, message.created_at)
        .await?;

    let payload = message_payload(&message);
    broadcast(
        &state.ws_storage,
        &m.user_ids,
        &frame(events::NEW_MESSAGE, &payload),
    )
    .await;

    if let Some(recipient) = m.other_user(sender_id) {
        let sender_name = state
            .load_user(sender_id)
            .await
            .map(|u| u.display_name)
            .unwrap_or_else(|_| "Your match".to_string());
        state
            .notify(
                recipient,
                NewNotification {
                    notification_type: NotificationType::Message,
                    title: format!("New message from {sender_name}"),
                    body: preview(&message.content),
                    data: Some(doc! {
                        "match_id": match_id.to_hex(),
                        "message_id": payload.id.clone(),
                    }),
                },
            )
            .await;
    }

    Ok(payload)
}

/// Marks the partner's messages read and tells both sides.
pub async fn mark_read(
    state: &AppState,
    reader_id: ObjectId,
    match_id: ObjectId,
) -> Result<ReadPayload, ApiError> {
    let m = state.matches.find_for_member(match_id, reader_id).await?;
    let count = state.messages.mark_read(match_id, reader_id).await?;

    let payload = ReadPayload {
        match_id: match_id.to_hex(),
        reader_id: reader_id.to_hex(),
        read_at: Utc::now(),
        count,
    };
    send_to_user(
        &state.ws_storage,
        &reader_id,
        &frame(events::READ_RECEIPT, &payload),
    )
    .await;
    if let Some(sender) = m.other_user(reader_id) {
        send_to_user(
            &state.ws_storage,
            &sender,
            &frame(events::MESSAGE_READ, &payload),
        )
        .await;
    }
    debug!(?reader_id, ?match_id, count, "Messages marked read");
    Ok(payload)
}

/// Stamps `delivered_at` on a received message and forwards the receipt to
/// its sender. Repeated receipts leave the first timestamp in place.
pub async fn mark_delivered(
    state: &AppState,
    recipient_id: ObjectId,
    match_id: ObjectId,
    message_id: ObjectId,
) -> Result<DeliveredPayload, ApiError> {
    state.matches.find_for_member(match_id, recipient_id).await?;
    let message = state
        .messages
        .mark_delivered(match_id, message_id, recipient_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Message not found".to_string()))?;

    let payload = DeliveredPayload {
        match_id: match_id.to_hex(),
        message_id: message_id.to_hex(),
        delivered_at: message.delivered_at.map(|d| d.to_chrono()),
    };
    if message.sender_id != recipient_id {
        send_to_user(
            &state.ws_storage,
            &message.sender_id,
            &frame(events::MESSAGE_DELIVERED, &payload),
        )
        .await;
    }
    Ok(payload)
}

/// Forwards `typing` / `stop_typing` to the other participant.
pub async fn relay_typing(
    state: &AppState,
    user_id: ObjectId,
    match_id: ObjectId,
    event: &str,
) -> Result<(), ApiError> {
    let m = state.matches.find_for_member(match_id, user_id).await?;
    if let Some(other) = m.other_user(user_id) {
        let payload = TypingPayload {
            match_id: match_id.to_hex(),
            user_id: user_id.to_hex(),
        };
        send_to_user(&state.ws_storage, &other, &frame(event, &payload)).await;
    }
    Ok(())
}

/// Flips the stored presence flag and tells the user's matches.
pub async fn announce_presence(state: &AppState, user_id: ObjectId, online: bool) {
    if let Err(e) = state.users.set_online(user_id, online).await {
        warn!(?user_id, %e, "Failed to update presence");
    }
    state.user_cache.invalidate(&user_id);

    let partners = match state.matches.partner_ids(user_id).await {
        Ok(partners) => partners,
        Err(e) => {
            warn!(?user_id, %e, "Failed to load match partners");
            return;
        }
    };
    let payload = PresencePayload {
        user_id: user_id.to_hex(),
        last_active: Some(Utc::now()),
    };
    let event = if online {
        events::USER_ONLINE
    } else {
        events::USER_OFFLINE
    };
    broadcast(&state.ws_storage, &partners, &frame(event, &payload)).await;
}
