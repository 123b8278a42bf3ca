//! Persistence Layer
//!
//! SQLite-backed storage for signals, trades, and positions, with async
//! access via sqlx. The schema is created on startup; every table uses
//! TEXT ids and JSON columns for nested structures (the parse result on a
//! signal, the order list on a trade).

pub mod models;
pub mod repository;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::ConnectOptions;
use std::path::Path;
use std::str::FromStr;
use tracing::info;

/// Database connection pool
pub type DbPool = SqlitePool;

/// Database initialization error
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Database connection error: {0}")]
    ConnectionError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrationError(String),
}

/// Initialize the database connection pool and create the schema.
///
/// `database_url` is a SQLite URL such as `sqlite://data/tradewire.db`;
/// the data directory and file are created when missing.
pub async fn init_database(database_url: &str) -> Result<DbPool, DatabaseError> {
    info!("Initializing database: {}", database_url);

    if let Some(db_path) = database_url.strip_prefix("sqlite://") {
        if let Some(parent) = Path::new(db_path).parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::ConnectionError(sqlx::Error::Configuration(Box::new(e)))
            })?;
        }
    }

    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .log_statements(tracing::log::LevelFilter::Debug);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;

    info!("Database initialized");
    Ok(pool)
}

async fn run_migrations(pool: &DbPool) -> Result<(), DatabaseError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS signals (
            id TEXT PRIMARY KEY,
            source TEXT NOT NULL CHECK(source IN ('text', 'image', 'webhook')),
            raw_content TEXT NOT NULL,
            image_base64 TEXT,
            image_mime_type TEXT,
            channel_id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            message_id TEXT NOT NULL,
            hash TEXT NOT NULL UNIQUE,
            parsed TEXT,
            status TEXT NOT NULL
                CHECK(status IN ('pending', 'processing', 'parsed', 'executed', 'skipped', 'failed')),
            status_reason TEXT,
            received_at DATETIME NOT NULL,
            processed_at DATETIME
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| DatabaseError::MigrationError(format!("Failed to create signals table: {}", e)))?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_signals_hash ON signals(hash)")
        .execute(pool)
        .await
        .map_err(|e| DatabaseError::MigrationError(format!("Failed to index signals: {}", e)))?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS trades (
            id TEXT PRIMARY KEY,
            signal_id TEXT NOT NULL,
            exchange TEXT NOT NULL,
            market TEXT NOT NULL,
            symbol TEXT NOT NULL,
            side TEXT NOT NULL CHECK(side IN ('BUY', 'SELL')),
            quantity REAL NOT NULL,
            entry_price REAL NOT NULL,
            stop_loss REAL,
            take_profit REAL,
            leverage REAL NOT NULL DEFAULT 1.0,
            status TEXT NOT NULL
                CHECK(status IN ('pending', 'open', 'cancelled', 'failed', 'closed')),
            orders TEXT NOT NULL DEFAULT '[]',
            pnl REAL,
            pnl_percentage REAL,
            created_at DATETIME NOT NULL,
            closed_at DATETIME,
            close_reason TEXT,
            FOREIGN KEY (signal_id) REFERENCES signals(id)
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| DatabaseError::MigrationError(format!("Failed to create trades table: {}", e)))?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS positions (
            id TEXT PRIMARY KEY,
            trade_id TEXT NOT NULL,
            exchange TEXT NOT NULL,
            market TEXT NOT NULL,
            symbol TEXT NOT NULL,
            side TEXT NOT NULL CHECK(side IN ('LONG', 'SHORT')),
            quantity REAL NOT NULL,
            entry_price REAL NOT NULL,
            current_price REAL,
            stop_loss REAL,
            take_profit REAL,
            leverage REAL NOT NULL DEFAULT 1.0,
            unrealized_pnl REAL,
            status TEXT NOT NULL CHECK(status IN ('open', 'closed')),
            opened_at DATETIME NOT NULL,
            closed_at DATETIME,
            FOREIGN KEY (trade_id) REFERENCES trades(id)
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| {
        DatabaseError::MigrationError(format!("Failed to create positions table: {}", e))
    })?;

    // Database-level backstop for the one-open-position-per-(symbol, side)
    // invariant the position manager enforces in memory.
    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_positions_open_symbol_side
            ON positions(symbol, side) WHERE status = 'open'
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| DatabaseError::MigrationError(format!("Failed to index positions: {}", e)))?;

    Ok(())
}

#[cfg(test)]
pub async fn test_pool() -> DbPool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory database");
    run_migrations(&pool).await.expect("migrations");
    pool
}
