//! Inbound event types: cursor, conversation id, sender, payload, and polled batches.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Position in the inbound update stream: the next update id still to be processed.
///
/// Only ever moves forward. [`Cursor::START`] is the first-run sentinel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Cursor(i64);

impl Cursor {
    pub const START: Cursor = Cursor(0);

    pub fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn value(self) -> i64 {
        self.0
    }

    /// Cursor that acknowledges `update_id` and everything before it.
    pub fn after(update_id: i64) -> Self {
        Self(update_id.saturating_add(1))
    }

    /// Moves past `update_id`, never backward.
    pub fn advance_past(self, update_id: i64) -> Self {
        self.max(Self::after(update_id))
    }

    /// True when `update_id` has already been acknowledged by this cursor.
    pub fn covers(self, update_id: i64) -> bool {
        update_id < self.0
    }

    /// Text form stored in the `cursor` table.
    pub fn encode(self) -> String {
        self.0.to_string()
    }

    pub fn decode(s: &str) -> Option<Self> {
        s.trim().parse().ok().map(Self)
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable key of a conversation: one per (chat, user) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(String);

impl ConversationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn for_chat_user(chat_id: i64, user_id: i64) -> Self {
        Self(format!("{}:{}", chat_id, user_id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Sender identity (id, username, names).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl User {
    pub fn with_id(id: i64) -> Self {
        Self {
            id,
            username: None,
            first_name: None,
            last_name: None,
        }
    }
}

/// What an event carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Payload {
    /// `/name args`; `name` is lowercased and stripped of any `@botname` suffix.
    Command { name: String, args: String },
    /// Plain text.
    Text(String),
    /// An update kind the bot does not handle (edited message, photo, callback query...).
    Unsupported(String),
}

impl Payload {
    /// Classifies message text as a command or plain text.
    pub fn from_text(text: &str) -> Self {
        let trimmed = text.trim();
        let Some(rest) = trimmed.strip_prefix('/') else {
            return Payload::Text(trimmed.to_string());
        };
        let (head, args) = match rest.split_once(char::is_whitespace) {
            Some((head, args)) => (head, args.trim()),
            None => (rest, ""),
        };
        let name = head.split('@').next().unwrap_or(head).to_lowercase();
        if name.is_empty() {
            return Payload::Text(trimmed.to_string());
        }
        Payload::Command {
            name,
            args: args.to_string(),
        }
    }

    /// Short label for logs.
    pub fn kind(&self) -> &str {
        match self {
            Payload::Command { .. } => "command",
            Payload::Text(_) => "text",
            Payload::Unsupported(kind) => kind,
        }
    }
}

/// One inbound event, consumed logically once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub update_id: i64,
    pub conversation_id: ConversationId,
    pub chat_id: i64,
    pub user: User,
    pub payload: Payload,
    pub received_at: DateTime<Utc>,
}

/// One entry of a polled batch: a parsed event or a payload that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Event(Event),
    Malformed { update_id: i64, reason: String },
}

impl Inbound {
    pub fn update_id(&self) -> i64 {
        match self {
            Inbound::Event(event) => event.update_id,
            Inbound::Malformed { update_id, .. } => *update_id,
        }
    }
}

/// Result of one poll: entries in receipt order and the cursor past all of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub inbound: Vec<Inbound>,
    pub next_cursor: Cursor,
}

impl Batch {
    /// Builds a batch whose cursor moves past every entry (or stays at `from` when empty).
    pub fn new(from: Cursor, inbound: Vec<Inbound>) -> Self {
        let next_cursor = inbound
            .iter()
            .fold(from, |cursor, entry| cursor.advance_past(entry.update_id()));
        Self {
            inbound,
            next_cursor,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.inbound.is_empty()
    }

    pub fn len(&self) -> usize {
        self.inbound.len()
    }
}
