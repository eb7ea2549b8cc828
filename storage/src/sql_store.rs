//! SQL implementation of [`StateStore`] and [`Catalog`].
//!
//! Every event commit is one transaction: the cursor row is upserted first with a monotonic guard,
//! which both serializes concurrent committers and detects replays, then the marketplace writes,
//! the conversation state and the outbox rows follow. Any failure drops the transaction.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use escrow_core::{
    Amount, Catalog, CommitOutcome, CommitRequest, ConversationId, ConversationState, Cursor,
    Item, ItemKind, ItemStatus, OutboxEntry, Reply, StateStore, StoreError, Transaction,
    TransactionStatus, Write,
};
use sqlx::any::AnyRow;
use sqlx::{AnyConnection, AnyPool, Row};
use tracing::{debug, info, instrument, warn};

use crate::error::store_error;
use crate::pool::{Backend, DbPoolManager, StoreOptions};
use crate::schema;

/// Key of the single Telegram update cursor in the `cursor` table.
const CURSOR_KEY: &str = "updates";

const UPSERT_CURSOR: &str = r#"
    INSERT INTO "cursor" (key, value) VALUES ($1, $2)
    ON CONFLICT (key) DO UPDATE SET value = excluded.value
    WHERE CAST("cursor".value AS BIGINT) < CAST(excluded.value AS BIGINT)
"#;

const UPSERT_STATE: &str = r#"
    INSERT INTO conversation_state (conversation_id, state, updated_at)
    VALUES ($1, $2, CURRENT_TIMESTAMP)
    ON CONFLICT (conversation_id) DO UPDATE SET state = excluded.state, updated_at = excluded.updated_at
"#;

const ITEM_COLUMNS: &str = "id, name, price_micros, seller_id, status, kind";
const TRANSACTION_COLUMNS: &str = "id, item_id, buyer_id, seller_id, status, amount_micros";

/// Relational state store and marketplace catalog over one pool.
#[derive(Clone)]
pub struct SqlStore {
    pool_manager: DbPoolManager,
    op_timeout: Duration,
}

impl SqlStore {
    /// Connects and creates the tables if they do not exist.
    pub async fn connect(database_url: &str, options: StoreOptions) -> Result<Self, sqlx::Error> {
        let pool_manager = DbPoolManager::connect(database_url, &options).await?;
        schema::create_tables(pool_manager.pool(), pool_manager.backend()).await?;
        Ok(Self {
            pool_manager,
            op_timeout: options.op_timeout,
        })
    }

    pub fn pool(&self) -> &AnyPool {
        self.pool_manager.pool()
    }

    pub fn backend(&self) -> Backend {
        self.pool_manager.backend()
    }

    async fn timed<T, F>(&self, op: &'static str, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match tokio::time::timeout(self.op_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Unavailable(format!(
                "{} timed out after {:?}",
                op, self.op_timeout
            ))),
        }
    }

    async fn read_cursor(&self) -> Result<Cursor, StoreError> {
        let value: Option<String> =
            sqlx::query_scalar(r#"SELECT value FROM "cursor" WHERE key = $1"#)
                .bind(CURSOR_KEY)
                .fetch_optional(self.pool())
                .await
                .map_err(store_error)?;
        match value {
            None => Ok(Cursor::START),
            Some(value) => Cursor::decode(&value).ok_or_else(|| {
                StoreError::Unavailable(format!("stored cursor is not a number: {:?}", value))
            }),
        }
    }

    async fn read_state(&self, conversation_id: &ConversationId) -> Result<ConversationState, StoreError> {
        let row = sqlx::query("SELECT state FROM conversation_state WHERE conversation_id = $1")
            .bind(conversation_id.as_str().to_string())
            .fetch_optional(self.pool())
            .await
            .map_err(store_error)?;
        let Some(row) = row else {
            return Ok(ConversationState::default());
        };
        let bytes: Vec<u8> = row.try_get("state").map_err(store_error)?;
        match ConversationState::from_bytes(&bytes) {
            Ok(state) => Ok(state),
            Err(e) => {
                warn!(
                    conversation_id = %conversation_id,
                    error = %e,
                    "Stored conversation state is unreadable, starting from default"
                );
                Ok(ConversationState::default())
            }
        }
    }

    async fn write_commit(&self, request: CommitRequest) -> Result<CommitOutcome, StoreError> {
        let state_bytes = request.state.to_bytes().map_err(|e| {
            StoreError::ConstraintViolation(format!("conversation state not serializable: {}", e))
        })?;

        let mut tx = self.pool().begin().await.map_err(store_error)?;

        if !store_cursor(&mut *tx, request.cursor).await? {
            tx.rollback().await.map_err(store_error)?;
            debug!(
                conversation_id = %request.conversation_id,
                cursor = %request.cursor,
                "Commit already applied, skipped"
            );
            return Ok(CommitOutcome::AlreadyApplied);
        }

        for write in &request.writes {
            apply_write(&mut *tx, write).await?;
        }

        sqlx::query(UPSERT_STATE)
            .bind(request.conversation_id.as_str().to_string())
            .bind(state_bytes)
            .execute(&mut *tx)
            .await
            .map_err(store_error)?;

        for reply in &request.replies {
            sqlx::query("INSERT INTO outbox (chat_id, text) VALUES ($1, $2)")
                .bind(reply.chat_id)
                .bind(reply.text.clone())
                .execute(&mut *tx)
                .await
                .map_err(store_error)?;
        }

        tx.commit().await.map_err(store_error)?;

        info!(
            conversation_id = %request.conversation_id,
            cursor = %request.cursor,
            writes = request.writes.len(),
            replies = request.replies.len(),
            "Committed event"
        );
        Ok(CommitOutcome::Applied)
    }

    async fn write_cursor(&self, cursor: Cursor) -> Result<(), StoreError> {
        let mut conn = self.pool().acquire().await.map_err(store_error)?;
        let moved = store_cursor(&mut *conn, cursor).await?;
        debug!(cursor = %cursor, moved, "Cursor advance");
        Ok(())
    }

    async fn read_outbox(&self, limit: i64) -> Result<Vec<OutboxEntry>, StoreError> {
        let rows = sqlx::query("SELECT id, chat_id, text FROM outbox ORDER BY id LIMIT $1")
            .bind(limit)
            .fetch_all(self.pool())
            .await
            .map_err(store_error)?;
        rows.iter()
            .map(|row| -> Result<OutboxEntry, StoreError> {
                Ok(OutboxEntry {
                    id: row.try_get("id").map_err(store_error)?,
                    reply: Reply {
                        chat_id: row.try_get("chat_id").map_err(store_error)?,
                        text: row.try_get("text").map_err(store_error)?,
                    },
                })
            })
            .collect()
    }

    async fn delete_outbox(&self, entry_id: i64) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM outbox WHERE id = $1")
            .bind(entry_id)
            .execute(self.pool())
            .await
            .map_err(store_error)?;
        Ok(())
    }

    async fn query_available_items(&self) -> Result<Vec<Item>, StoreError> {
        let sql = format!(
            "SELECT {} FROM items WHERE status = $1 ORDER BY id",
            ITEM_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(ItemStatus::Available.as_str())
            .fetch_all(self.pool())
            .await
            .map_err(store_error)?;
        rows.iter().map(item_from_row).collect()
    }

    async fn query_item(&self, item_id: i64) -> Result<Option<Item>, StoreError> {
        let sql = format!("SELECT {} FROM items WHERE id = $1", ITEM_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(item_id)
            .fetch_optional(self.pool())
            .await
            .map_err(store_error)?;
        row.as_ref().map(item_from_row).transpose()
    }

    async fn query_pending_transaction(&self, item_id: i64) -> Result<Option<Transaction>, StoreError> {
        let sql = format!(
            "SELECT {} FROM transactions WHERE item_id = $1 AND status = $2",
            TRANSACTION_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(item_id)
            .bind(TransactionStatus::Pending.as_str())
            .fetch_optional(self.pool())
            .await
            .map_err(store_error)?;
        row.as_ref().map(transaction_from_row).transpose()
    }
}

#[async_trait]
impl StateStore for SqlStore {
    async fn committed_cursor(&self) -> Result<Cursor, StoreError> {
        self.timed("committed_cursor", self.read_cursor()).await
    }

    async fn load_state(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<ConversationState, StoreError> {
        self.timed("load_state", self.read_state(conversation_id)).await
    }

    #[instrument(skip(self, request), fields(conversation_id = %request.conversation_id, cursor = %request.cursor))]
    async fn commit(&self, request: CommitRequest) -> Result<CommitOutcome, StoreError> {
        self.timed("commit", self.write_commit(request)).await
    }

    async fn advance_cursor(&self, cursor: Cursor) -> Result<(), StoreError> {
        self.timed("advance_cursor", self.write_cursor(cursor)).await
    }

    async fn pending_replies(&self, limit: i64) -> Result<Vec<OutboxEntry>, StoreError> {
        self.timed("pending_replies", self.read_outbox(limit)).await
    }

    async fn mark_delivered(&self, entry_id: i64) -> Result<(), StoreError> {
        self.timed("mark_delivered", self.delete_outbox(entry_id)).await
    }
}

#[async_trait]
impl Catalog for SqlStore {
    async fn available_items(&self) -> Result<Vec<Item>, StoreError> {
        self.timed("available_items", self.query_available_items()).await
    }

    async fn item(&self, item_id: i64) -> Result<Option<Item>, StoreError> {
        self.timed("item", self.query_item(item_id)).await
    }

    async fn pending_transaction_for_item(
        &self,
        item_id: i64,
    ) -> Result<Option<Transaction>, StoreError> {
        self.timed(
            "pending_transaction_for_item",
            self.query_pending_transaction(item_id),
        )
        .await
    }
}

/// Upserts the cursor only if it moves forward. Returns whether the row changed.
async fn store_cursor(conn: &mut AnyConnection, cursor: Cursor) -> Result<bool, StoreError> {
    let result = sqlx::query(UPSERT_CURSOR)
        .bind(CURSOR_KEY)
        .bind(cursor.encode())
        .execute(&mut *conn)
        .await
        .map_err(store_error)?;
    Ok(result.rows_affected() > 0)
}

/// Zero affected rows means the record changed under us: fatal for this record only.
fn require_row(rows_affected: u64, what: impl FnOnce() -> String) -> Result<(), StoreError> {
    if rows_affected == 0 {
        Err(StoreError::ConstraintViolation(what()))
    } else {
        Ok(())
    }
}

async fn apply_write(conn: &mut AnyConnection, write: &Write) -> Result<(), StoreError> {
    match write {
        Write::CreateItem {
            name,
            price,
            seller_id,
            kind,
        } => {
            sqlx::query(
                "INSERT INTO items (name, price_micros, seller_id, status, kind) VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(name.clone())
            .bind(price.micros())
            .bind(*seller_id)
            .bind(ItemStatus::Available.as_str())
            .bind(kind.as_str())
            .execute(&mut *conn)
            .await
            .map_err(store_error)?;
        }
        Write::DeleteItem { item_id, seller_id } => {
            let result = sqlx::query(
                "DELETE FROM items WHERE id = $1 AND seller_id = $2 AND status = $3",
            )
            .bind(*item_id)
            .bind(*seller_id)
            .bind(ItemStatus::Available.as_str())
            .execute(&mut *conn)
            .await
            .map_err(store_error)?;
            require_row(result.rows_affected(), || {
                format!("item {} is not an available item of seller {}", item_id, seller_id)
            })?;
        }
        Write::OpenTransaction {
            item_id,
            buyer_id,
            seller_id,
            amount,
        } => {
            let result = sqlx::query("UPDATE items SET status = $1 WHERE id = $2 AND status = $3")
                .bind(ItemStatus::Reserved.as_str())
                .bind(*item_id)
                .bind(ItemStatus::Available.as_str())
                .execute(&mut *conn)
                .await
                .map_err(store_error)?;
            require_row(result.rows_affected(), || {
                format!("item {} is no longer available", item_id)
            })?;
            sqlx::query(
                "INSERT INTO transactions (item_id, buyer_id, seller_id, status, amount_micros) VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(*item_id)
            .bind(*buyer_id)
            .bind(*seller_id)
            .bind(TransactionStatus::Pending.as_str())
            .bind(amount.micros())
            .execute(&mut *conn)
            .await
            .map_err(store_error)?;
        }
        Write::CompleteTransaction { item_id, seller_id } => {
            let result = sqlx::query(
                "UPDATE transactions SET status = $1 WHERE item_id = $2 AND seller_id = $3 AND status = $4",
            )
            .bind(TransactionStatus::Completed.as_str())
            .bind(*item_id)
            .bind(*seller_id)
            .bind(TransactionStatus::Pending.as_str())
            .execute(&mut *conn)
            .await
            .map_err(store_error)?;
            require_row(result.rows_affected(), || {
                format!("no pending transaction on item {} for seller {}", item_id, seller_id)
            })?;
            sqlx::query("UPDATE items SET status = $1 WHERE id = $2")
                .bind(ItemStatus::Sold.as_str())
                .bind(*item_id)
                .execute(&mut *conn)
                .await
                .map_err(store_error)?;
        }
        Write::RecordRating {
            user_id,
            rater_id,
            score,
            review,
        } => {
            sqlx::query(
                "INSERT INTO ratings (user_id, rater_id, score, review) VALUES ($1, $2, $3, $4)",
            )
            .bind(*user_id)
            .bind(*rater_id)
            .bind(*score)
            .bind(review.clone())
            .execute(&mut *conn)
            .await
            .map_err(store_error)?;
        }
    }
    Ok(())
}

fn item_from_row(row: &AnyRow) -> Result<Item, StoreError> {
    let status: String = row.try_get("status").map_err(store_error)?;
    let kind: String = row.try_get("kind").map_err(store_error)?;
    Ok(Item {
        id: row.try_get("id").map_err(store_error)?,
        name: row.try_get("name").map_err(store_error)?,
        price: Amount::from_micros(row.try_get("price_micros").map_err(store_error)?),
        seller_id: row.try_get("seller_id").map_err(store_error)?,
        status: ItemStatus::parse(&status)
            .ok_or_else(|| StoreError::Unavailable(format!("unknown item status {:?}", status)))?,
        kind: ItemKind::parse(&kind)
            .ok_or_else(|| StoreError::Unavailable(format!("unknown item kind {:?}", kind)))?,
    })
}

fn transaction_from_row(row: &AnyRow) -> Result<Transaction, StoreError> {
    let status: String = row.try_get("status").map_err(store_error)?;
    Ok(Transaction {
        id: row.try_get("id").map_err(store_error)?,
        item_id: row.try_get("item_id").map_err(store_error)?,
        buyer_id: row.try_get("buyer_id").map_err(store_error)?,
        seller_id: row.try_get("seller_id").map_err(store_error)?,
        status: TransactionStatus::parse(&status).ok_or_else(|| {
            StoreError::Unavailable(format!("unknown transaction status {:?}", status))
        })?,
        amount: Amount::from_micros(row.try_get("amount_micros").map_err(store_error)?),
    })
}
