// ==========================================
// NEXO work-planning - intervention repository
// ==========================================
// Interventions persist as JSON documents with the NEXO dossier
// number denormalized into an indexed column for reconciliation
// lookups. Batch writes run inside one transaction.
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::intervention::Intervention;
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

#[async_trait]
pub trait InterventionRepository: Send + Sync {
    async fn save_many(&self, interventions: &[Intervention]) -> RepositoryResult<usize>;

    async fn delete_many(&self, ids: &[String]) -> RepositoryResult<usize>;

    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<Intervention>>;

    /// All interventions whose external dossier reference is one of
    /// `dossiers`. Reconciliation entry point.
    async fn find_by_nexo_dossiers(
        &self,
        dossiers: &[String],
    ) -> RepositoryResult<Vec<Intervention>>;

    async fn find_by_project_id(&self, project_id: &str) -> RepositoryResult<Vec<Intervention>>;
}

// ==========================================
// SQLite implementation
// ==========================================

pub struct InterventionRepositoryImpl {
    conn: Arc<Mutex<Connection>>,
}

impl InterventionRepositoryImpl {
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;
        Ok(InterventionRepositoryImpl {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn decode(document_json: &str) -> RepositoryResult<Intervention> {
        Ok(serde_json::from_str(document_json)?)
    }
}

#[async_trait]
impl InterventionRepository for InterventionRepositoryImpl {
    async fn save_many(&self, interventions: &[Intervention]) -> RepositoryResult<usize> {
        let mut documents = Vec::with_capacity(interventions.len());
        for intervention in interventions {
            documents.push((
                intervention.id.clone(),
                intervention.nexo_dossier().map(str::to_string),
                serde_json::to_string(intervention)?,
            ));
        }

        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO intervention (id, nexo_dossier, document_json)
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
            let mut stmt = tx.prepare("DELETE FROM intervention WHERE id = ?1")?;
            for id in ids {
                deleted += stmt.execute(params![id])?;
            }
        }
        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(deleted)
    }

    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<Intervention>> {
        let conn = self.lock()?;
        let document = conn
            .query_row(
                "SELECT document_json FROM intervention WHERE id = ?1",
                params![id],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        match document {
            Some(json) => Ok(Some(Self::decode(&json)?)),
            None => Ok(None),
        }
    }

    async fn find_by_nexo_dossiers(
        &self,
        dossiers: &[String],
    ) -> RepositoryResult<Vec<Intervention>> {
        if dossiers.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT document_json FROM intervention WHERE nexo_dossier = ?1")?;
        let mut interventions = Vec::new();
        for dossier in dossiers {
            let rows = stmt.query_map(params![dossier], |row| row.get::<_, String>(0))?;
            for row in rows {
                interventions.push(Self::decode(&row?)?);
            }
        }
        Ok(interventions)
    }

    async fn find_by_project_id(&self, project_id: &str) -> RepositoryResult<Vec<Intervention>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT document_json FROM intervention
             WHERE json_extract(document_json, '$.projectId') = ?1",
        )?;
        let rows = stmt.query_map(params![project_id], |row| row.get::<_, String>(0))?;
        let mut interventions = Vec::new();
        for row in rows {
            interventions.push(Self::decode(&row?)?);
        }
        Ok(interventions)
    }
}
