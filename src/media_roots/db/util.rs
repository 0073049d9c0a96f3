use std::path::{Component, Path, PathBuf};

use super::StoreError;

/// Translate rusqlite errors into friendlier StoreError variants.
pub(super) fn map_sql_error(err: rusqlite::Error) -> StoreError {
    match err {
        rusqlite::Error::SqliteFailure(sql_err, _)
            if sql_err.extended_code == rusqlite::ffi::SQLITE_BUSY =>
        {
            StoreError::Busy
        }
        rusqlite::Error::InvalidQuery
        | rusqlite::Error::InvalidParameterName(_)
        | rusqlite::Error::MultipleStatement => StoreError::Unexpected,
        other => StoreError::Sql(other),
    }
}

/// Normalize a relative path for stable storage (forward slashes, no `.`).
///
/// Rejects absolute paths, parent traversal, root prefixes, and empty paths.
pub fn normalize_relative_path(path: &Path) -> Result<String, StoreError> {
    let cleaned = sanitize_relative_path(path)?;
    Ok(cleaned.to_string_lossy().replace('\\', "/"))
}

/// Parse and validate a stored relative path.
pub(super) fn parse_relative_path(path: &str) -> Result<PathBuf, StoreError> {
    sanitize_relative_path(Path::new(path))
}

fn sanitize_relative_path(path: &Path) -> Result<PathBuf, StoreError> {
    if path.is_absolute() {
        return Err(StoreError::PathMustBeRelative(path.to_path_buf()));
    }
    let mut cleaned = PathBuf::new();
    let mut saw_component = false;
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::Normal(part) => {
                cleaned.push(part);
                saw_component = true;
            }
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(StoreError::InvalidRelativePath(path.to_path_buf()));
            }
        }
    }
    if !saw_component {
        return Err(StoreError::InvalidRelativePath(path.to_path_buf()));
    }
    Ok(cleaned)
}

pub(super) fn create_parent_if_needed(path: &Path) -> Result<(), StoreError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        std::fs::create_dir_all(parent).map_err(|source| StoreError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    Ok(())
}
