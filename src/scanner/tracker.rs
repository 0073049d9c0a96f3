use std::{
    collections::HashMap,
    sync::{Condvar, Mutex, MutexGuard},
    time::{Duration, Instant},
};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::cancel::CancelToken;
use crate::media_roots::RootId;

/// Identifier of one background run (a start or a resume).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(String);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone)]
struct ActiveRun {
    run_id: RunId,
    cancel: CancelToken,
}

/// Tracks which roots have a run in flight; at most one per root.
#[derive(Debug, Default)]
pub(crate) struct RunTracker {
    active: Mutex<HashMap<RootId, ActiveRun>>,
    idle: Condvar,
}

impl RunTracker {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Claim the run slot for a root. Returns `None` if a run is already active.
    pub(crate) fn try_claim(&self, root_id: &RootId) -> Option<(RunId, CancelToken)> {
        let mut active = self.lock();
        if active.contains_key(root_id) {
            return None;
        }
        let run = ActiveRun {
            run_id: RunId::new(),
            cancel: CancelToken::new(),
        };
        active.insert(root_id.clone(), run.clone());
        Some((run.run_id, run.cancel))
    }

    /// Release the slot if it still belongs to `run_id`, waking idle waiters.
    pub(crate) fn release(&self, root_id: &RootId, run_id: &RunId) {
        let mut active = self.lock();
        if active
            .get(root_id)
            .is_some_and(|run| &run.run_id == run_id)
        {
            active.remove(root_id);
        }
        drop(active);
        self.idle.notify_all();
    }

    pub(crate) fn token(&self, root_id: &RootId) -> Option<CancelToken> {
        self.lock().get(root_id).map(|run| run.cancel.clone())
    }

    pub(crate) fn is_active(&self, root_id: &RootId) -> bool {
        self.lock().contains_key(root_id)
    }

    /// Block until no run is active for `root_id`; false on timeout.
    pub(crate) fn wait_idle(&self, root_id: &RootId, timeout: Duration) -> bool {
        let deadline = Instant::now().checked_add(timeout);
        let mut active = self.lock();
        while active.contains_key(root_id) {
            active = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return false;
                    }
                    match self.idle.wait_timeout(active, deadline - now) {
                        Ok((guard, _)) => guard,
                        Err(poisoned) => poisoned.into_inner().0,
                    }
                }
                None => self
                    .idle
                    .wait(active)
                    .unwrap_or_else(|poisoned| poisoned.into_inner()),
            };
        }
        true
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<RootId, ActiveRun>> {
        self.active.lock().unwrap_or_else(|err| err.into_inner())
    }
}
