// ==========================================
// NEXO work-planning - SQLite connection setup
// ==========================================
// Single place for Connection::open + PRAGMA behavior, so every
// repository gets foreign keys and busy_timeout consistently.
// Schema bootstrap is idempotent (CREATE TABLE IF NOT EXISTS).
// ==========================================

use rusqlite::Connection;
use std::time::Duration;

/// Default busy_timeout (milliseconds).
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// PRAGMAs applied to every connection.
///
/// foreign_keys and busy_timeout are per-connection settings.
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// Opens a connection with unified configuration.
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// Creates the schema when absent. Documents that evolve with the
/// import pipeline (files, log entries, distributions, geometries)
/// are stored as JSON columns next to the indexed scalar keys.
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS import_log (
            id TEXT PRIMARY KEY,
            status TEXT NOT NULL,
            files_json TEXT NOT NULL,
            audit_json TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS intervention (
            id TEXT PRIMARY KEY,
            nexo_dossier TEXT,
            document_json TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_intervention_dossier
            ON intervention(nexo_dossier);

        CREATE TABLE IF NOT EXISTS project (
            id TEXT PRIMARY KEY,
            nexo_dossier TEXT,
            document_json TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_project_dossier
            ON project(nexo_dossier);

        CREATE TABLE IF NOT EXISTS taxonomy (
            "group" TEXT NOT NULL,
            code TEXT NOT NULL,
            label_fr TEXT NOT NULL,
            label_en TEXT NOT NULL,
            properties_json TEXT,
            PRIMARY KEY ("group", code)
        );

        CREATE TABLE IF NOT EXISTS counters (
            key TEXT PRIMARY KEY,
            prefix TEXT NOT NULL,
            sequence INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS storage_object (
            id TEXT PRIMARY KEY,
            content_type TEXT NOT NULL,
            data BLOB NOT NULL
        );

        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id TEXT NOT NULL DEFAULT 'global',
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            PRIMARY KEY (scope_id, key)
        );
        "#,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='import_log'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }
}
