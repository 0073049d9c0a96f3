use rusqlite::Connection;

use super::StoreError;
use super::util::map_sql_error;

pub(super) fn apply_pragmas(connection: &Connection) -> Result<(), StoreError> {
    connection
        .execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout=5000;
             PRAGMA temp_store=MEMORY;",
        )
        .map_err(map_sql_error)
}

pub(super) fn apply_schema(connection: &Connection) -> Result<(), StoreError> {
    connection
        .execute_batch(
            "CREATE TABLE IF NOT EXISTS scan_states (
                root_id TEXT PRIMARY KEY,
                status TEXT NOT NULL,
                state_json TEXT NOT NULL,
                updated_at INTEGER NOT NULL
             );
             CREATE INDEX IF NOT EXISTS idx_scan_states_status
                ON scan_states (status);
             CREATE TABLE IF NOT EXISTS scan_records (
                root_id TEXT NOT NULL,
                path TEXT NOT NULL,
                file_hash TEXT NOT NULL,
                file_size INTEGER NOT NULL,
                modified_ns INTEGER NOT NULL,
                last_scanned_at INTEGER NOT NULL,
                PRIMARY KEY (root_id, path)
             ) WITHOUT ROWID;
             CREATE INDEX IF NOT EXISTS idx_scan_records_hash
                ON scan_records (root_id, file_hash);
             CREATE TABLE IF NOT EXISTS scan_directories (
                root_id TEXT NOT NULL,
                path TEXT NOT NULL,
                PRIMARY KEY (root_id, path)
             ) WITHOUT ROWID;",
        )
        .map_err(map_sql_error)
}
