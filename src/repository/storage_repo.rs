// ==========================================
// NEXO work-planning - blob storage service
// ==========================================
// Uploaded spreadsheets live as BLOBs keyed by storage id. Download
// failures are a Result failure, never a panic; the orchestrator
// converts them to per-file MISSING errors.
// ==========================================

use crate::db::open_sqlite_connection;
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

/// One downloaded object.
#[derive(Debug, Clone)]
pub struct StorageObject {
    pub id: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

#[async_trait]
pub trait StorageRepository: Send + Sync {
    /// Stores a blob, returns its generated storage id.
    async fn put(&self, content_type: &str, data: &[u8]) -> RepositoryResult<String>;

    /// Fetches a blob; absent id is a NotFound failure.
    async fn get(&self, storage_id: &str) -> RepositoryResult<StorageObject>;
}

pub struct StorageRepositoryImpl {
    conn: Arc<Mutex<Connection>>,
}

impl StorageRepositoryImpl {
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;
        Ok(StorageRepositoryImpl {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }
}

#[async_trait]
impl StorageRepository for StorageRepositoryImpl {
    async fn put(&self, content_type: &str, data: &[u8]) -> RepositoryResult<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO storage_object (id, content_type, data) VALUES (?1, ?2, ?3)",
            params![id, content_type, data],
        )?;
        Ok(id)
    }

    async fn get(&self, storage_id: &str) -> RepositoryResult<StorageObject> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT content_type, data FROM storage_object WHERE id = ?1",
                params![storage_id],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, Vec<u8>>(1)?)),
            )
            .optional()?;
        match row {
            Some((content_type, data)) => Ok(StorageObject {
                id: storage_id.to_string(),
                content_type,
                data,
            }),
            None => Err(RepositoryError::NotFound {
                entity: "StorageObject".to_string(),
                id: storage_id.to_string(),
            }),
        }
    }
}
