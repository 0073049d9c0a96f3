//! Live handles to roots and produced items for the current session.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard},
};

use super::{MediaRoot, RootId};

/// Session registry so a resume does not need the host to re-supply the root.
#[derive(Debug, Default)]
pub struct RootRegistry {
    roots: Mutex<HashMap<RootId, MediaRoot>>,
    items: Mutex<HashMap<String, PathBuf>>,
}

impl RootRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember (or replace) the handle for a root.
    pub fn register_root(&self, root: MediaRoot) {
        lock(&self.roots).insert(root.id.clone(), root);
    }

    /// Forget a root, e.g. when the host loses access to it.
    pub fn revoke_root(&self, id: &RootId) -> Option<MediaRoot> {
        lock(&self.roots).remove(id)
    }

    /// Registered handle for `id`, whether or not it is still reachable.
    pub fn root(&self, id: &RootId) -> Option<MediaRoot> {
        lock(&self.roots).get(id).cloned()
    }

    /// Registered handle for `id`, only if its directory is still reachable.
    pub fn reachable_root(&self, id: &RootId) -> Option<MediaRoot> {
        self.root(id).filter(MediaRoot::is_reachable)
    }

    /// Remember where a produced item lives on disk.
    pub fn register_item(&self, item_id: impl Into<String>, path: &Path) {
        lock(&self.items).insert(item_id.into(), path.to_path_buf());
    }

    pub fn item_path(&self, item_id: &str) -> Option<PathBuf> {
        lock(&self.items).get(item_id).cloned()
    }

    pub fn item_count(&self) -> usize {
        lock(&self.items).len()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|err| err.into_inner())
}
