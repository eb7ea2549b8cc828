//! Table creation. Statements run one at a time; PostgreSQL rejects multi-statement prepares.

use sqlx::AnyPool;
use tracing::info;

use crate::pool::Backend;

const POSTGRES: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS "cursor" (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS conversation_state (
        conversation_id TEXT PRIMARY KEY,
        state BYTEA NOT NULL,
        updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    )"#,
    r#"CREATE TABLE IF NOT EXISTS outbox (
        id BIGSERIAL PRIMARY KEY,
        chat_id BIGINT NOT NULL,
        text TEXT NOT NULL,
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    )"#,
    r#"CREATE TABLE IF NOT EXISTS items (
        id BIGSERIAL PRIMARY KEY,
        name TEXT NOT NULL,
        price_micros BIGINT NOT NULL CHECK (price_micros > 0),
        seller_id BIGINT NOT NULL,
        status TEXT NOT NULL DEFAULT 'available',
        kind TEXT NOT NULL,
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    )"#,
    r#"CREATE TABLE IF NOT EXISTS transactions (
        id BIGSERIAL PRIMARY KEY,
        item_id BIGINT NOT NULL,
        buyer_id BIGINT NOT NULL,
        seller_id BIGINT NOT NULL,
        status TEXT NOT NULL DEFAULT 'pending',
        amount_micros BIGINT NOT NULL,
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    )"#,
    r#"CREATE TABLE IF NOT EXISTS ratings (
        id BIGSERIAL PRIMARY KEY,
        user_id BIGINT NOT NULL,
        rater_id BIGINT NOT NULL,
        score BIGINT NOT NULL CHECK (score BETWEEN 1 AND 5),
        review TEXT,
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    )"#,
];

const SQLITE: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS "cursor" (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS conversation_state (
        conversation_id TEXT PRIMARY KEY,
        state BLOB NOT NULL,
        updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    )"#,
    r#"CREATE TABLE IF NOT EXISTS outbox (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        chat_id INTEGER NOT NULL,
        text TEXT NOT NULL,
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    )"#,
    r#"CREATE TABLE IF NOT EXISTS items (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        price_micros INTEGER NOT NULL CHECK (price_micros > 0),
        seller_id INTEGER NOT NULL,
        status TEXT NOT NULL DEFAULT 'available',
        kind TEXT NOT NULL,
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    )"#,
    r#"CREATE TABLE IF NOT EXISTS transactions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        item_id INTEGER NOT NULL,
        buyer_id INTEGER NOT NULL,
        seller_id INTEGER NOT NULL,
        status TEXT NOT NULL DEFAULT 'pending',
        amount_micros INTEGER NOT NULL,
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    )"#,
    r#"CREATE TABLE IF NOT EXISTS ratings (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        rater_id INTEGER NOT NULL,
        score INTEGER NOT NULL CHECK (score BETWEEN 1 AND 5),
        review TEXT,
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    )"#,
];

// Same syntax on both backends.
const INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_items_status ON items(status)",
    "CREATE INDEX IF NOT EXISTS idx_items_seller_id ON items(seller_id)",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_transactions_pending_item ON transactions(item_id) WHERE status = 'pending'",
    "CREATE INDEX IF NOT EXISTS idx_ratings_user_id ON ratings(user_id)",
];

/// Creates every table and index if missing.
pub async fn create_tables(pool: &AnyPool, backend: Backend) -> Result<(), sqlx::Error> {
    info!(backend = ?backend, "Creating database tables if not exist");

    let tables = match backend {
        Backend::Postgres => POSTGRES,
        Backend::Sqlite => SQLITE,
    };
    for statement in tables.iter().chain(INDEXES) {
        sqlx::query(statement).execute(pool).await?;
    }

    info!("Database tables created successfully");
    Ok(())
}
