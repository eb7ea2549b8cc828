//! Adapters from raw Bot API updates to escrow_core types.
//!
//! Updates are converted one at a time from `serde_json::Value`, so a single bad payload becomes
//! [`Inbound::Malformed`] instead of failing the whole `getUpdates` batch.

use chrono::DateTime;
use escrow_core::{ConversationId, Event, Inbound, Payload, User};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

#[derive(Debug, Deserialize)]
struct TelegramMessage {
    date: i64,
    chat: TelegramChat,
    #[serde(default)]
    from: Option<TelegramUser>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TelegramChat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct TelegramUser {
    id: i64,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
}

impl From<TelegramUser> for User {
    fn from(user: TelegramUser) -> Self {
        User {
            id: user.id,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
        }
    }
}

/// Converts one `getUpdates` result entry.
///
/// Returns `None` only when the entry has no `update_id`: without it the entry cannot be
/// acknowledged, so it is logged and dropped.
pub fn inbound_from_update(update: &Value) -> Option<Inbound> {
    let Some(update_id) = update.get("update_id").and_then(Value::as_i64) else {
        warn!(update = %update, "Dropping update without update_id");
        return None;
    };
    let malformed = |reason: String| Inbound::Malformed { update_id, reason };

    let Some(message) = update.get("message") else {
        return Some(unsupported(update_id, update));
    };
    let message = match TelegramMessage::deserialize(message) {
        Ok(message) => message,
        Err(e) => return Some(malformed(format!("invalid message: {}", e))),
    };
    let Some(from) = message.from else {
        return Some(malformed("message without sender".to_string()));
    };
    let Some(received_at) = DateTime::from_timestamp(message.date, 0) else {
        return Some(malformed(format!("invalid message date {}", message.date)));
    };

    let payload = match message.text {
        Some(text) => Payload::from_text(&text),
        None => Payload::Unsupported("non_text_message".to_string()),
    };
    Some(Inbound::Event(Event {
        update_id,
        conversation_id: ConversationId::for_chat_user(message.chat.id, from.id),
        chat_id: message.chat.id,
        user: from.into(),
        payload,
        received_at,
    }))
}

/// Any update kind other than `message`. Chat and sender are taken from the usual places when present.
fn unsupported(update_id: i64, update: &Value) -> Inbound {
    let kind = update
        .as_object()
        .and_then(|fields| fields.keys().find(|k| k.as_str() != "update_id").cloned())
        .unwrap_or_else(|| "empty".to_string());
    let body = update.get(&kind);
    let chat_id = body
        .and_then(|b| b.pointer("/chat/id").or_else(|| b.pointer("/message/chat/id")))
        .and_then(Value::as_i64)
        .unwrap_or(0);
    let user_id = body
        .and_then(|b| b.pointer("/from/id"))
        .and_then(Value::as_i64)
        .unwrap_or(0);

    Inbound::Event(Event {
        update_id,
        conversation_id: ConversationId::for_chat_user(chat_id, user_id),
        chat_id,
        user: User::with_id(user_id),
        payload: Payload::Unsupported(kind),
        received_at: chrono::Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// **Test: A text message becomes an Event keyed by chat and sender.**
    #[test]
    fn test_text_message_to_event() {
        let update = json!({
            "update_id": 10,
            "message": {
                "message_id": 1,
                "date": 1706529600,
                "chat": {"id": -500, "type": "group"},
                "from": {"id": 42, "is_bot": false, "first_name": "Ann", "username": "ann"},
                "text": "/buy@escrow_bot 3"
            }
        });

        let Some(Inbound::Event(event)) = inbound_from_update(&update) else {
            panic!("expected event");
        };
        assert_eq!(event.update_id, 10);
        assert_eq!(event.chat_id, -500);
        assert_eq!(event.conversation_id.as_str(), "-500:42");
        assert_eq!(event.user.username.as_deref(), Some("ann"));
        assert_eq!(
            event.payload,
            Payload::Command {
                name: "buy".to_string(),
                args: "3".to_string()
            }
        );
        assert_eq!(event.received_at.timestamp(), 1706529600);
    }

    /// **Test: A message missing chat or sender is Malformed with its update_id.**
    #[test]
    fn test_message_without_chat_or_sender_is_malformed() {
        let no_chat = json!({"update_id": 11, "message": {"date": 1, "text": "hi"}});
        let no_sender = json!({"update_id": 12, "message": {"date": 1, "chat": {"id": 1}, "text": "hi"}});

        assert!(matches!(
            inbound_from_update(&no_chat),
            Some(Inbound::Malformed { update_id: 11, .. })
        ));
        assert!(matches!(
            inbound_from_update(&no_sender),
            Some(Inbound::Malformed { update_id: 12, .. })
        ));
    }

    /// **Test: Other update kinds and non-text messages are Unsupported events.**
    #[test]
    fn test_unsupported_updates() {
        let edited = json!({
            "update_id": 13,
            "edited_message": {"date": 1, "chat": {"id": 7}, "from": {"id": 8}, "text": "x"}
        });
        let photo = json!({
            "update_id": 14,
            "message": {"date": 1, "chat": {"id": 7}, "from": {"id": 8}, "photo": []}
        });

        let Some(Inbound::Event(event)) = inbound_from_update(&edited) else {
            panic!("expected event");
        };
        assert_eq!(event.payload, Payload::Unsupported("edited_message".to_string()));
        assert_eq!(event.chat_id, 7);

        let Some(Inbound::Event(event)) = inbound_from_update(&photo) else {
            panic!("expected event");
        };
        assert_eq!(
            event.payload,
            Payload::Unsupported("non_text_message".to_string())
        );
    }

    #[test]
    fn test_update_without_id_is_dropped() {
        assert!(inbound_from_update(&json!({"message": {}})).is_none());
    }
}
