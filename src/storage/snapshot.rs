//! Snapshot store
//!
//! Durable small-object storage: a keyed mapping from fixed logical names to
//! serialized collections. The library writes through on every mutation and
//! hydrates once at startup.

use std::collections::HashMap;
use std::str::FromStr;

use anyhow::Context;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tokio::sync::RwLock;

// ============================================================================
// Port
// ============================================================================

/// Durable small-object store
///
/// Absent keys read back as `None`; corrupt values are the caller's problem
/// (deserialization happens above this layer and degrades to empty).
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Read the value stored under a key
    async fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>>;

    /// Write a value under a key, replacing any previous value
    async fn set(&self, key: &str, value: &[u8]) -> anyhow::Result<()>;
}

// ============================================================================
// SQLite implementation
// ============================================================================

/// SQLite-backed snapshot store
///
/// One key/value table; writes are upserts so every `set` is a full replace.
pub struct SqliteSnapshotStore {
    pool: SqlitePool,
}

impl SqliteSnapshotStore {
    /// Open (creating if missing) the database at `database_url` and ensure
    /// the schema exists
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("invalid database url: {database_url}"))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .context("failed to open snapshot database")?;

        let store = Self { pool };
        store.init().await?;
        Ok(store)
    }

    /// Wrap an existing pool (tests share an in-memory pool this way)
    pub async fn from_pool(pool: SqlitePool) -> anyhow::Result<Self> {
        let store = Self { pool };
        store.init().await?;
        Ok(store)
    }

    async fn init(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS snapshots (
                key TEXT PRIMARY KEY,
                value BLOB NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("failed to create snapshots table")?;

        Ok(())
    }
}

#[async_trait]
impl SnapshotStore for SqliteSnapshotStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        let row = sqlx::query_scalar::<_, Vec<u8>>(
            r#"
            SELECT value FROM snapshots WHERE key = ?
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("failed to read snapshot key {key}"))?;

        Ok(row)
    }

    async fn set(&self, key: &str, value: &[u8]) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO snapshots (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to write snapshot key {key}"))?;

        Ok(())
    }
}

// ============================================================================
// In-memory implementation
// ============================================================================

/// In-memory snapshot store, used as a fake port in tests
#[derive(Default)]
pub struct MemorySnapshotStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a key before hydration (corrupt-entry tests use this)
    pub async fn seed(&self, key: &str, value: Vec<u8>) {
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), value);
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        let entries = self.entries.read().await;
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &[u8]) -> anyhow::Result<()> {
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
