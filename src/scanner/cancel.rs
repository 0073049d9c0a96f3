use std::sync::{
    Arc,
    atomic::{AtomicU8, Ordering},
};

const RUNNING: u8 = 0;
const PAUSE: u8 = 1;
const CANCEL: u8 = 2;

/// Why a run was asked to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Keep the remaining files so the run can be resumed.
    Pause,
    /// Discard the remaining files.
    Cancel,
}

/// Shared cooperative stop signal.
///
/// Workers check it between items; nothing is interrupted mid-item. A cancel
/// request overrides an earlier pause request, never the other way round.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    state: Arc<AtomicU8>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the run to stop after in-flight work drains, keeping remaining files.
    pub fn request_pause(&self) {
        let _ = self
            .state
            .compare_exchange(RUNNING, PAUSE, Ordering::AcqRel, Ordering::Acquire);
    }

    /// Ask the run to stop after in-flight work drains, discarding remaining files.
    pub fn request_cancel(&self) {
        self.state.store(CANCEL, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.load(Ordering::Acquire) != RUNNING
    }

    pub fn reason(&self) -> Option<StopReason> {
        match self.state.load(Ordering::Acquire) {
            PAUSE => Some(StopReason::Pause),
            CANCEL => Some(StopReason::Cancel),
            _ => None,
        }
    }
}
