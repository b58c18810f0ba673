// ==========================================
// NEXO work-planning - taxonomy repository
// ==========================================
// Read side of the externally administered taxonomy service.
// Seeding helpers exist for tests and the CLI.
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::taxonomy::{Localized, TaxonomyEntry};
use crate::domain::types::TaxonomyGroup;
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

#[async_trait]
pub trait TaxonomyRepository: Send + Sync {
    async fn get_group(&self, group: TaxonomyGroup) -> RepositoryResult<Vec<TaxonomyEntry>>;

    async fn save_entry(
        &self,
        group: TaxonomyGroup,
        entry: &TaxonomyEntry,
    ) -> RepositoryResult<()>;
}

// ==========================================
// SQLite implementation
// ==========================================

pub struct TaxonomyRepositoryImpl {
    conn: Arc<Mutex<Connection>>,
}

impl TaxonomyRepositoryImpl {
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;
        Ok(TaxonomyRepositoryImpl {
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
impl TaxonomyRepository for TaxonomyRepositoryImpl {
    async fn get_group(&self, group: TaxonomyGroup) -> RepositoryResult<Vec<TaxonomyEntry>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT code, label_fr, label_en, properties_json FROM taxonomy
             WHERE \"group\" = ?1 ORDER BY code",
        )?;
        let rows = stmt.query_map(params![group.as_str()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
            ))
        })?;
        let mut entries = Vec::new();
        for row in rows {
            let (code, label_fr, label_en, properties_json) = row?;
            let properties = match properties_json {
                Some(json) => serde_json::from_str(&json)?,
                None => serde_json::Value::Null,
            };
            entries.push(TaxonomyEntry {
                code,
                label: Localized {
                    fr: label_fr,
                    en: label_en,
                },
                properties,
            });
        }
        Ok(entries)
    }

    async fn save_entry(
        &self,
        group: TaxonomyGroup,
        entry: &TaxonomyEntry,
    ) -> RepositoryResult<()> {
        let properties_json = if entry.properties.is_null() {
            None
        } else {
            Some(serde_json::to_string(&entry.properties)?)
        };
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO taxonomy (\"group\", code, label_fr, label_en, properties_json)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                group.as_str(),
                entry.code,
                entry.label.fr,
                entry.label.en,
                properties_json
            ],
        )?;
        Ok(())
    }
}
