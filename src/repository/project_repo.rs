// ==========================================
// NEXO work-planning - project repository
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::project::Project;
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

#[async_trait]
pub trait ProjectRepository: Send + Sync {
    async fn save_many(&self, projects: &[Project]) -> RepositoryResult<usize>;

    async fn delete_many(&self, ids: &[String]) -> RepositoryResult<usize>;

    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<Project>>;

    async fn find_by_nexo_dossier(&self, dossier: &str) -> RepositoryResult<Option<Project>>;
}

// ==========================================
// SQLite implementation
// ==========================================

pub struct ProjectRepositoryImpl {
    conn: Arc<Mutex<Connection>>,
}

impl ProjectRepositoryImpl {
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;
        Ok(ProjectRepositoryImpl {
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
impl ProjectRepository for ProjectRepositoryImpl {
    async fn save_many(&self, projects: &[Project]) -> RepositoryResult<usize> {
        let mut documents = Vec::with_capacity(projects.len());
        for project in projects {
            documents.push((
                project.id.clone(),
                project.nexo_dossier().map(str::to_string),
                serde_json::to_string(project)?,
            ));
        }

        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO project (id, nexo_dossier, document_json)
                 VALUES (?1, ?2, ?3)",
            )?;
            for (id, dossier, document) in &documents {
                stmt.execute(params![id, dossier, document])?;
            }
        }
        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(documents.len())
    }

    async fn delete_many(&self, ids: &[String]) -> RepositoryResult<usize> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        let mut deleted = 0;
        {
            let mut stmt = tx.prepare("DELETE FROM project WHERE id = ?1")?;
            for id in ids {
                deleted += stmt.execute(params![id])?;
            }
        }
        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(deleted)
    }

    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<Project>> {
        let conn = self.lock()?;
        let document = conn
            .query_row(
                "SELECT document_json FROM project WHERE id = ?1",
                params![id],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        match document {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn find_by_nexo_dossier(&self, dossier: &str) -> RepositoryResult<Option<Project>> {
        let conn = self.lock()?;
        let document = conn
            .query_row(
                "SELECT document_json FROM project WHERE nexo_dossier = ?1 LIMIT 1",
                params![dossier],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        match document {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }
}
