// ==========================================
// NEXO work-planning - import log repository
// ==========================================
// Data access only, no business rules. The ImportLog document is
// stored as JSON next to its indexed status column so the
// "one IN_PROGRESS run" precondition stays a single query.
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::import_log::{Audit, ImportFile, ImportLog};
use crate::domain::types::ImportStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

#[async_trait]
pub trait ImportLogRepository: Send + Sync {
    /// Inserts or replaces the full aggregate (checkpoint save).
    async fn save(&self, import_log: &ImportLog) -> RepositoryResult<()>;

    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<ImportLog>>;

    /// Freshness query behind the single-run invariant.
    async fn find_in_progress(&self) -> RepositoryResult<Option<ImportLog>>;

    async fn find_recent(&self, limit: usize) -> RepositoryResult<Vec<ImportLog>>;
}

// ==========================================
// SQLite implementation
// ==========================================

pub struct ImportLogRepositoryImpl {
    conn: Arc<Mutex<Connection>>,
}

impl ImportLogRepositoryImpl {
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;
        Ok(ImportLogRepositoryImpl {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn row_to_import_log(
        id: String,
        status: String,
        files_json: String,
        audit_json: String,
    ) -> RepositoryResult<ImportLog> {
        let files: Vec<ImportFile> = serde_json::from_str(&files_json)?;
        let audit: Audit = serde_json::from_str(&audit_json)?;
        Ok(ImportLog {
            id,
            status: ImportStatus::parse(&status),
            files,
            audit,
        })
    }
}

#[async_trait]
impl ImportLogRepository for ImportLogRepositoryImpl {
    async fn save(&self, import_log: &ImportLog) -> RepositoryResult<()> {
        let files_json = serde_json::to_string(&import_log.files)?;
        let audit_json = serde_json::to_string(&import_log.audit)?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO import_log (id, status, files_json, audit_json)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                import_log.id,
                import_log.status.as_str(),
                files_json,
                audit_json
            ],
        )?;
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<ImportLog>> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT id, status, files_json, audit_json FROM import_log WHERE id = ?1",
                params![id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()?;
        match row {
            Some((id, status, files, audit)) => {
                Ok(Some(Self::row_to_import_log(id, status, files, audit)?))
            }
            None => Ok(None),
        }
    }

    async fn find_in_progress(&self) -> RepositoryResult<Option<ImportLog>> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT id, status, files_json, audit_json FROM import_log
                 WHERE status = 'IN_PROGRESS' LIMIT 1",
                [],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()?;
        match row {
            Some((id, status, files, audit)) => {
                Ok(Some(Self::row_to_import_log(id, status, files, audit)?))
            }
            None => Ok(None),
        }
    }

    async fn find_recent(&self, limit: usize) -> RepositoryResult<Vec<ImportLog>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, status, files_json, audit_json FROM import_log
             ORDER BY json_extract(audit_json, '$.createdAt') DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;
        let mut logs = Vec::new();
        for row in rows {
            let (id, status, files, audit) = row?;
            logs.push(Self::row_to_import_log(id, status, files, audit)?);
        }
        Ok(logs)
    }
}
