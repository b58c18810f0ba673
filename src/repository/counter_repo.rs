// ==========================================
// NEXO work-planning - counter / id generation
// ==========================================
// Monotonic, prefixed, zero-padded identifiers handed out in blocks
// ("I0042", "P0007"). The increment and the read happen inside one
// transaction so concurrent callers never see the same block.
// ==========================================

use crate::db::open_sqlite_connection;
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

#[async_trait]
pub trait CounterRepository: Send + Sync {
    /// Reserves `count` fresh ids under `key`, formatted with `prefix`.
    async fn next_ids(&self, key: &str, prefix: &str, count: usize)
        -> RepositoryResult<Vec<String>>;
}

pub struct CounterRepositoryImpl {
    conn: Arc<Mutex<Connection>>,
}

impl CounterRepositoryImpl {
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;
        Ok(CounterRepositoryImpl {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn format_id(prefix: &str, sequence: i64) -> String {
        format!("{}{:05}", prefix, sequence)
    }
}

#[async_trait]
impl CounterRepository for CounterRepositoryImpl {
    async fn next_ids(
        &self,
        key: &str,
        prefix: &str,
        count: usize,
    ) -> RepositoryResult<Vec<String>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        let current: Option<i64> = tx
            .query_row(
                "SELECT sequence FROM counters WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        let start = current.unwrap_or(0);
        let end = start + count as i64;
        tx.execute(
            "INSERT INTO counters (key, prefix, sequence) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET sequence = excluded.sequence",
            params![key, prefix, end],
        )?;
        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        Ok((start + 1..=end)
            .map(|sequence| Self::format_id(prefix, sequence))
            .collect())
    }
}
