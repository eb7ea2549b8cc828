//! Shared test utilities for escrow-bot integration tests.
//!
//! Provides FakeSource (UpdateSource), RecordingBot (Bot) and MemoryStore (StateStore + Catalog),
//! all in memory so tests can run on paused tokio time.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use dispatcher::Dispatcher;
use escrow_bot::{BackoffPolicy, EscrowService, Lifecycle, Shutdown, ShutdownTrigger};
use escrow_core::{
    Batch, Bot, Catalog, CommitOutcome, CommitRequest, ConversationId, ConversationState, Cursor,
    Event, Inbound, Item, ItemStatus, OutboxEntry, Payload, StateStore, StoreError, Transaction,
    TransportError, UpdateSource, User, Write,
};
use tokio::sync::Notify;
use tokio::time::Instant;

/// Private chat: chat id equals the user id.
pub fn text_update(update_id: i64, user_id: i64, text: &str) -> Inbound {
    Inbound::Event(Event {
        update_id,
        conversation_id: ConversationId::for_chat_user(user_id, user_id),
        chat_id: user_id,
        user: User::with_id(user_id),
        payload: Payload::from_text(text),
        received_at: Utc::now(),
    })
}

pub fn malformed_update(update_id: i64) -> Inbound {
    Inbound::Malformed {
        update_id,
        reason: "message without sender".to_string(),
    }
}

pub fn conversation(user_id: i64) -> ConversationId {
    ConversationId::for_chat_user(user_id, user_id)
}

pub fn test_backoff() -> BackoffPolicy {
    BackoffPolicy::new(Duration::from_millis(100), Duration::from_secs(1))
}

pub fn build_service(
    source: Arc<FakeSource>,
    bot: Arc<RecordingBot>,
    store: Arc<MemoryStore>,
) -> EscrowService {
    EscrowService::new(
        source,
        bot,
        store.clone(),
        store,
        Dispatcher::with_default_commands(),
        Lifecycle::new(),
        test_backoff(),
    )
}

/// Serves a fixed list of updates after the requested cursor, `batch_size` at a time.
///
/// Scripted errors are returned first, one per poll. Once nothing is left after the cursor, the
/// poll returns an empty batch and fires the shutdown trigger, after `idle_polls` empty polls
/// that each hold for `idle_wait` like a server-side long poll.
pub struct FakeSource {
    updates: Vec<Inbound>,
    errors: Mutex<VecDeque<TransportError>>,
    polls: Mutex<Vec<(Instant, Cursor)>>,
    batch_size: usize,
    ignore_cursor_once: Mutex<bool>,
    idle_polls: Mutex<usize>,
    idle_wait: Duration,
    trigger: ShutdownTrigger,
}

impl FakeSource {
    pub fn new(updates: Vec<Inbound>, trigger: ShutdownTrigger) -> Self {
        Self {
            updates,
            errors: Mutex::new(VecDeque::new()),
            polls: Mutex::new(Vec::new()),
            batch_size: 100,
            ignore_cursor_once: Mutex::new(false),
            idle_polls: Mutex::new(0),
            idle_wait: Duration::ZERO,
            trigger,
        }
    }

    pub fn with_errors(self, errors: Vec<TransportError>) -> Self {
        *self.errors.lock().unwrap() = errors.into();
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Returns `polls` empty batches, each after `wait`, before firing the shutdown trigger.
    pub fn with_idle_polls(mut self, polls: usize, wait: Duration) -> Self {
        *self.idle_polls.lock().unwrap() = polls;
        self.idle_wait = wait;
        self
    }

    /// First poll returns every update regardless of the cursor, like a redelivered batch.
    pub fn replaying(self) -> Self {
        *self.ignore_cursor_once.lock().unwrap() = true;
        self
    }

    pub fn polls(&self) -> Vec<(Instant, Cursor)> {
        self.polls.lock().unwrap().clone()
    }

    pub fn poll_cursors(&self) -> Vec<Cursor> {
        self.polls().into_iter().map(|(_, cursor)| cursor).collect()
    }
}

#[async_trait]
impl UpdateSource for FakeSource {
    async fn poll(&self, cursor: Cursor) -> Result<Batch, TransportError> {
        self.polls.lock().unwrap().push((Instant::now(), cursor));
        if let Some(e) = self.errors.lock().unwrap().pop_front() {
            return Err(e);
        }

        let ignore_cursor = std::mem::replace(&mut *self.ignore_cursor_once.lock().unwrap(), false);
        let entries: Vec<Inbound> = self
            .updates
            .iter()
            .filter(|entry| ignore_cursor || !cursor.covers(entry.update_id()))
            .take(self.batch_size)
            .cloned()
            .collect();
        if entries.is_empty() {
            let idle = {
                let mut remaining = self.idle_polls.lock().unwrap();
                let idle = *remaining > 0;
                *remaining = remaining.saturating_sub(1);
                idle
            };
            if idle {
                tokio::time::sleep(self.idle_wait).await;
            } else {
                self.trigger.trigger();
            }
        }
        Ok(Batch::new(cursor, entries))
    }
}

/// Records every sent message; scripted errors are returned first, one per send.
#[derive(Default)]
pub struct RecordingBot {
    sent: Mutex<Vec<(i64, String)>>,
    sent_at: Mutex<Vec<Instant>>,
    errors: Mutex<VecDeque<TransportError>>,
}

impl RecordingBot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_errors(self, errors: Vec<TransportError>) -> Self {
        *self.errors.lock().unwrap() = errors.into();
        self
    }

    pub fn sent(&self) -> Vec<(i64, String)> {
        self.sent.lock().unwrap().clone()
    }

    /// When each successful send happened, in order.
    pub fn sent_at(&self) -> Vec<Instant> {
        self.sent_at.lock().unwrap().clone()
    }

    pub fn sent_to(&self, chat_id: i64) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter(|(id, _)| *id == chat_id)
            .map(|(_, text)| text)
            .collect()
    }
}

#[async_trait]
impl Bot for RecordingBot {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), TransportError> {
        if let Some(e) = self.errors.lock().unwrap().pop_front() {
            return Err(e);
        }
        self.sent.lock().unwrap().push((chat_id, text.to_string()));
        self.sent_at.lock().unwrap().push(Instant::now());
        Ok(())
    }
}

#[derive(Default)]
struct Inner {
    cursor: Cursor,
    cursor_history: Vec<Cursor>,
    states: HashMap<ConversationId, ConversationState>,
    outbox: Vec<OutboxEntry>,
    next_outbox_id: i64,
    writes: Vec<Write>,
    items: Vec<Item>,
    commits: usize,
    /// Commits and skips past this update id fail as unavailable.
    unavailable_from: Option<i64>,
    reject_writes: bool,
}

impl Inner {
    fn check_available(&self, cursor: Cursor) -> Result<(), StoreError> {
        match self.unavailable_from {
            Some(update_id) if cursor.covers(update_id) => {
                Err(StoreError::Unavailable("connection refused".to_string()))
            }
            _ => Ok(()),
        }
    }

    fn set_cursor(&mut self, cursor: Cursor) {
        if cursor > self.cursor {
            self.cursor = cursor;
            self.cursor_history.push(cursor);
        }
    }

    fn apply(&mut self, write: &Write) {
        if let Write::CreateItem {
            name,
            price,
            seller_id,
            kind,
        } = write
        {
            let id = self.items.len() as i64 + 1;
            self.items.push(Item {
                id,
                name: name.clone(),
                price: *price,
                seller_id: *seller_id,
                status: ItemStatus::Available,
                kind: *kind,
            });
        }
        self.writes.push(write.clone());
    }
}

/// In-memory StateStore and Catalog with the same commit semantics as the SQL store.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    /// The next commit waits until this fires before applying.
    commit_gate: Mutex<Option<Shutdown>>,
    commit_entered: Notify,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commits for `update_id` and later fail with `Unavailable` until [`MemoryStore::recover`].
    pub fn fail_from(&self, update_id: i64) {
        self.inner.lock().unwrap().unavailable_from = Some(update_id);
    }

    /// Holds the next commit open until `release` fires.
    pub fn hold_next_commit(&self, release: Shutdown) {
        *self.commit_gate.lock().unwrap() = Some(release);
    }

    /// Completes once a held commit has started.
    pub async fn commit_entered(&self) {
        self.commit_entered.notified().await;
    }

    pub fn recover(&self) {
        self.inner.lock().unwrap().unavailable_from = None;
    }

    /// Commits carrying marketplace writes fail with `ConstraintViolation`.
    pub fn reject_writes(&self) {
        self.inner.lock().unwrap().reject_writes = true;
    }

    pub fn cursor(&self) -> Cursor {
        self.inner.lock().unwrap().cursor
    }

    pub fn cursor_history(&self) -> Vec<Cursor> {
        self.inner.lock().unwrap().cursor_history.clone()
    }

    pub fn state(&self, conversation_id: &ConversationId) -> ConversationState {
        self.inner
            .lock()
            .unwrap()
            .states
            .get(conversation_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn writes(&self) -> Vec<Write> {
        self.inner.lock().unwrap().writes.clone()
    }

    pub fn items(&self) -> Vec<Item> {
        self.inner.lock().unwrap().items.clone()
    }

    pub fn commits(&self) -> usize {
        self.inner.lock().unwrap().commits
    }

    pub fn outbox_len(&self) -> usize {
        self.inner.lock().unwrap().outbox.len()
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn committed_cursor(&self) -> Result<Cursor, StoreError> {
        Ok(self.inner.lock().unwrap().cursor)
    }

    async fn load_state(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<ConversationState, StoreError> {
        Ok(self.state(conversation_id))
    }

    async fn commit(&self, request: CommitRequest) -> Result<CommitOutcome, StoreError> {
        let gate = self.commit_gate.lock().unwrap().take();
        if let Some(mut release) = gate {
            self.commit_entered.notify_one();
            release.wait().await;
        }
        let mut inner = self.inner.lock().unwrap();
        inner.check_available(request.cursor)?;
        if inner.cursor >= request.cursor {
            return Ok(CommitOutcome::AlreadyApplied);
        }
        if inner.reject_writes && !request.writes.is_empty() {
            return Err(StoreError::ConstraintViolation(
                "items.seller_id check failed".to_string(),
            ));
        }

        for write in &request.writes {
            inner.apply(write);
        }
        inner.states.insert(request.conversation_id, request.state);
        for reply in request.replies {
            inner.next_outbox_id += 1;
            let id = inner.next_outbox_id;
            inner.outbox.push(OutboxEntry { id, reply });
        }
        inner.set_cursor(request.cursor);
        inner.commits += 1;
        Ok(CommitOutcome::Applied)
    }

    async fn advance_cursor(&self, cursor: Cursor) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.check_available(cursor)?;
        inner.set_cursor(cursor);
        Ok(())
    }

    async fn pending_replies(&self, limit: i64) -> Result<Vec<OutboxEntry>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.outbox.iter().take(limit as usize).cloned().collect())
    }

    async fn mark_delivered(&self, entry_id: i64) -> Result<(), StoreError> {
        self.inner
            .lock()
            .unwrap()
            .outbox
            .retain(|entry| entry.id != entry_id);
        Ok(())
    }
}

#[async_trait]
impl Catalog for MemoryStore {
    async fn available_items(&self) -> Result<Vec<Item>, StoreError> {
        Ok(self
            .items()
            .into_iter()
            .filter(|item| item.status == ItemStatus::Available)
            .collect())
    }

    async fn item(&self, item_id: i64) -> Result<Option<Item>, StoreError> {
        Ok(self.items().into_iter().find(|item| item.id == item_id))
    }

    async fn pending_transaction_for_item(
        &self,
        _item_id: i64,
    ) -> Result<Option<Transaction>, StoreError> {
        Ok(None)
    }
}
