// ==========================================
// NEXO work-planning - configuration layer
// ==========================================
// Key-value configuration persisted in the config_kv table
// (scope_id = 'global'), with compiled defaults. Read once at the
// start of an import run; the snapshot travels with the run.
// ==========================================

use crate::db::open_sqlite_connection;
use rusqlite::{params, Connection};
use std::error::Error;
use std::sync::{Arc, Mutex};

/// Default number of rows/dossiers handled per persistence round-trip.
pub const DEFAULT_CHUNK_SIZE: usize = 20;

/// Default program whitelist for rehabilitation conception rows.
pub const DEFAULT_REHAB_PROGRAMS: [&str; 2] = ["pcpr", "prcpr"];

/// Snapshot of the import-relevant configuration.
#[derive(Debug, Clone)]
pub struct ImportConfig {
    /// Rows per chunked save, bounds write amplification.
    pub chunk_size: usize,
    /// Programs an intervention must carry to accept rehab
    /// conception updates.
    pub rehab_program_whitelist: Vec<String>,
}

impl Default for ImportConfig {
    fn default() -> Self {
        ImportConfig {
            chunk_size: DEFAULT_CHUNK_SIZE,
            rehab_program_whitelist: DEFAULT_REHAB_PROGRAMS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

// ==========================================
// ConfigManager
// ==========================================

pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(ConfigManager {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Reads a global-scope value; None when the key is absent.
    pub fn get_global_config_value(
        &self,
        key: &str,
    ) -> Result<Option<String>, Box<dyn Error + Send + Sync>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| format!("config lock poisoned: {}", e))?;
        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );
        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    pub fn set_global_config_value(
        &self,
        key: &str,
        value: &str,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| format!("config lock poisoned: {}", e))?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    /// Builds the import configuration snapshot, falling back to the
    /// compiled defaults for absent or malformed values.
    pub fn load_import_config(&self) -> Result<ImportConfig, Box<dyn Error + Send + Sync>> {
        let mut config = ImportConfig::default();

        if let Some(raw) = self.get_global_config_value("nexo_import/chunk_size")? {
            if let Ok(size) = raw.trim().parse::<usize>() {
                if size > 0 {
                    config.chunk_size = size;
                }
            }
        }

        if let Some(raw) = self.get_global_config_value("nexo_import/rehab_programs")? {
            let programs: Vec<String> = raw
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            if !programs.is_empty() {
                config.rehab_program_whitelist = programs;
            }
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn manager_with_schema() -> (tempfile::NamedTempFile, ConfigManager) {
        let file = tempfile::NamedTempFile::new().unwrap();
        let path = file.path().to_str().unwrap().to_string();
        {
            let conn = open_sqlite_connection(&path).unwrap();
            db::init_schema(&conn).unwrap();
        }
        (file, ConfigManager::new(&path).unwrap())
    }

    #[test]
    fn test_defaults_when_table_empty() {
        let (_file, manager) = manager_with_schema();
        let config = manager.load_import_config().unwrap();
        assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(config.rehab_program_whitelist, vec!["pcpr", "prcpr"]);
    }

    #[test]
    fn test_overrides_from_config_kv() {
        let (_file, manager) = manager_with_schema();
        manager
            .set_global_config_value("nexo_import/chunk_size", "5")
            .unwrap();
        manager
            .set_global_config_value("nexo_import/rehab_programs", "pcpr, psr")
            .unwrap();
        let config = manager.load_import_config().unwrap();
        assert_eq!(config.chunk_size, 5);
        assert_eq!(config.rehab_program_whitelist, vec!["pcpr", "psr"]);
    }

    #[test]
    fn test_malformed_chunk_size_falls_back() {
        let (_file, manager) = manager_with_schema();
        manager
            .set_global_config_value("nexo_import/chunk_size", "zero")
            .unwrap();
        let config = manager.load_import_config().unwrap();
        assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
    }
}
