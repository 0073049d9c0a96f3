use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard},
};

use rusqlite::{Connection, OptionalExtension, params};
use tracing::warn;

use super::util::{
    create_parent_if_needed, map_sql_error, normalize_relative_path, parse_relative_path,
};
use super::{ScanStateRecord, ScanStore, StoreError, schema};
use crate::media_roots::{FastHash, RootId};
use crate::scanner::{ScanState, ScanStatus};

/// SQLite-backed [`ScanStore`]; one database can hold any number of roots.
pub struct SqliteScanStore {
    connection: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl SqliteScanStore {
    /// Open (or create) the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        create_parent_if_needed(path)?;
        let connection = Connection::open(path).map_err(map_sql_error)?;
        Self::from_connection(connection, Some(path.to_path_buf()))
    }

    /// Open a private in-memory database; nothing survives the process.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let connection = Connection::open_in_memory().map_err(map_sql_error)?;
        Self::from_connection(connection, None)
    }

    fn from_connection(connection: Connection, path: Option<PathBuf>) -> Result<Self, StoreError> {
        schema::apply_pragmas(&connection)?;
        schema::apply_schema(&connection)?;
        Ok(Self {
            connection: Mutex::new(connection),
            path,
        })
    }

    /// Location of the database file, if it lives on disk.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.connection
            .lock()
            .unwrap_or_else(|err| err.into_inner())
    }
}

impl ScanStore for SqliteScanStore {
    fn save_state(&self, state: &ScanState) -> Result<(), StoreError> {
        let json = serde_json::to_string(state)?;
        self.conn()
            .prepare_cached(
                "INSERT INTO scan_states (root_id, status, state_json, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(root_id) DO UPDATE SET status = excluded.status,
                                                    state_json = excluded.state_json,
                                                    updated_at = excluded.updated_at",
            )
            .map_err(map_sql_error)?
            .execute(params![
                state.root_id.as_str(),
                state.status.as_str(),
                json,
                state.updated_at
            ])
            .map_err(map_sql_error)?;
        Ok(())
    }

    fn load_state(&self, root_id: &RootId) -> Result<Option<ScanState>, StoreError> {
        let json: Option<String> = self
            .conn()
            .query_row(
                "SELECT state_json FROM scan_states WHERE root_id = ?1",
                params![root_id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(map_sql_error)?;
        json.map(|json| serde_json::from_str(&json).map_err(StoreError::from))
            .transpose()
    }

    fn list_incomplete(&self) -> Result<Vec<ScanState>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT state_json FROM scan_states
                 WHERE status NOT IN (?1, ?2)
                 ORDER BY updated_at ASC",
            )
            .map_err(map_sql_error)?;
        let rows = stmt
            .query_map(
                params![ScanStatus::Completed.as_str(), ScanStatus::Cancelled.as_str()],
                |row| row.get::<_, String>(0),
            )
            .map_err(map_sql_error)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(map_sql_error)?;
        rows.iter()
            .map(|json| serde_json::from_str(json).map_err(StoreError::from))
            .collect()
    }

    fn records(&self, root_id: &RootId) -> Result<Vec<ScanStateRecord>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT path, file_hash, file_size, modified_ns, last_scanned_at
                 FROM scan_records WHERE root_id = ?1 ORDER BY path ASC",
            )
            .map_err(map_sql_error)?;
        let rows = stmt
            .query_map(params![root_id.as_str()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, i64>(4)?,
                ))
            })
            .map_err(map_sql_error)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(map_sql_error)?;
        let mut records = Vec::with_capacity(rows.len());
        for (path, hash, size, modified_ns, scanned_at) in rows {
            let relative_path = match parse_relative_path(&path) {
                Ok(path) => path,
                Err(err) => {
                    warn!(root = %root_id, path = %path, error = %err, "Skipping invalid manifest path");
                    continue;
                }
            };
            records.push(ScanStateRecord {
                root_id: root_id.clone(),
                relative_path,
                file_hash: FastHash::from_hex(hash),
                file_size: size.max(0) as u64,
                last_modified_ns: modified_ns,
                last_scanned_at: scanned_at,
            });
        }
        Ok(records)
    }

    fn upsert_record(&self, record: &ScanStateRecord) -> Result<(), StoreError> {
        let path = normalize_relative_path(&record.relative_path)?;
        self.conn()
            .prepare_cached(
                "INSERT INTO scan_records
                    (root_id, path, file_hash, file_size, modified_ns, last_scanned_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(root_id, path) DO UPDATE SET file_hash = excluded.file_hash,
                                                          file_size = excluded.file_size,
                                                          modified_ns = excluded.modified_ns,
                                                          last_scanned_at = excluded.last_scanned_at",
            )
            .map_err(map_sql_error)?
            .execute(params![
                record.root_id.as_str(),
                path,
                record.file_hash.as_str(),
                record.file_size as i64,
                record.last_modified_ns,
                record.last_scanned_at
            ])
            .map_err(map_sql_error)?;
        Ok(())
    }

    fn delete_records(&self, root_id: &RootId, paths: &[PathBuf]) -> Result<usize, StoreError> {
        if paths.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn();
        let tx = conn.transaction().map_err(map_sql_error)?;
        let mut removed = 0;
        {
            let mut stmt = tx
                .prepare_cached("DELETE FROM scan_records WHERE root_id = ?1 AND path = ?2")
                .map_err(map_sql_error)?;
            for path in paths {
                let path = normalize_relative_path(path)?;
                removed += stmt
                    .execute(params![root_id.as_str(), path])
                    .map_err(map_sql_error)?;
            }
        }
        tx.commit().map_err(map_sql_error)?;
        Ok(removed)
    }

    fn save_directories(
        &self,
        root_id: &RootId,
        directories: &BTreeSet<PathBuf>,
    ) -> Result<(), StoreError> {
        let mut conn = self.conn();
        let tx = conn.transaction().map_err(map_sql_error)?;
        tx.execute(
            "DELETE FROM scan_directories WHERE root_id = ?1",
            params![root_id.as_str()],
        )
        .map_err(map_sql_error)?;
        {
            let mut stmt = tx
                .prepare_cached("INSERT OR IGNORE INTO scan_directories (root_id, path) VALUES (?1, ?2)")
                .map_err(map_sql_error)?;
            for dir in directories {
                let path = normalize_relative_path(dir)?;
                stmt.execute(params![root_id.as_str(), path])
                    .map_err(map_sql_error)?;
            }
        }
        tx.commit().map_err(map_sql_error)
    }

    fn directories(&self, root_id: &RootId) -> Result<BTreeSet<PathBuf>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT path FROM scan_directories WHERE root_id = ?1")
            .map_err(map_sql_error)?;
        let rows = stmt
            .query_map(params![root_id.as_str()], |row| row.get::<_, String>(0))
            .map_err(map_sql_error)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(map_sql_error)?;
        rows.iter().map(|path| parse_relative_path(path)).collect()
    }
}
