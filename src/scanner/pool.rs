//! Fixed-size worker pool over a slice of work items.
//!
//! Each worker claims the next unclaimed item as soon as it finishes one, so
//! `concurrency` items stay in flight until the tail of the list. Items are
//! claimed in index order, which means the attempted items always form a
//! prefix of the input. Outcomes are handed to a sink on the calling thread in
//! completion order.

use std::{
    any::Any,
    panic::{AssertUnwindSafe, catch_unwind},
    sync::{
        atomic::{AtomicUsize, Ordering},
        mpsc,
    },
    thread,
};

use tracing::debug;

use super::cancel::CancelToken;

/// Environment override for the default worker count.
pub const WORKERS_ENV: &str = "VAULTSCAN_SCAN_WORKERS";
const MIN_DEFAULT_WORKERS: usize = 2;
const MAX_DEFAULT_WORKERS: usize = 6;

/// Why an item produced no result.
#[derive(Debug)]
pub enum WorkError<E> {
    /// The processing function returned an error.
    Failed(E),
    /// The processing function panicked; carries the panic message.
    Panicked(String),
}

impl<E: std::fmt::Display> std::fmt::Display for WorkError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkError::Failed(err) => err.fmt(f),
            WorkError::Panicked(message) => write!(f, "worker panicked: {message}"),
        }
    }
}

/// One finished item.
#[derive(Debug)]
pub struct PoolOutcome<'a, T, R, E> {
    pub index: usize,
    pub item: &'a T,
    pub result: Result<R, WorkError<E>>,
}

/// Totals for one [`WorkerPool::run`] call.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PoolReport {
    /// Items claimed by a worker (always the first `dispatched` items).
    pub dispatched: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Items never claimed because the token was raised.
    pub not_started: usize,
    /// True when the token was observed before every item was claimed.
    pub cancelled: bool,
}

/// Bounded pool of scoped worker threads.
#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    concurrency: usize,
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(default_concurrency())
    }
}

impl WorkerPool {
    /// Create a pool running at most `concurrency` items at once (minimum 1).
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Process `items`, feeding each outcome to `sink` as it completes.
    ///
    /// Returns once every claimed item has finished. Errors and panics in
    /// `process` are reported through the sink and never stop dispatch; only
    /// `cancel` does.
    pub fn run<T, R, E, F, S>(
        &self,
        items: &[T],
        cancel: &CancelToken,
        process: F,
        mut sink: S,
    ) -> PoolReport
    where
        T: Sync,
        R: Send,
        E: Send,
        F: Fn(&T) -> Result<R, E> + Sync,
        S: FnMut(PoolOutcome<'_, T, R, E>),
    {
        let mut report = PoolReport::default();
        if items.is_empty() {
            return report;
        }
        let next = AtomicUsize::new(0);
        let workers = self.concurrency.min(items.len());
        let (tx, rx) = mpsc::channel::<(usize, Result<R, WorkError<E>>)>();

        thread::scope(|scope| {
            for _ in 0..workers {
                let tx = tx.clone();
                let next = &next;
                let process = &process;
                scope.spawn(move || {
                    loop {
                        if cancel.is_cancelled() {
                            break;
                        }
                        let index = next.fetch_add(1, Ordering::AcqRel);
                        let Some(item) = items.get(index) else {
                            break;
                        };
                        let result = match catch_unwind(AssertUnwindSafe(|| process(item))) {
                            Ok(Ok(value)) => Ok(value),
                            Ok(Err(err)) => Err(WorkError::Failed(err)),
                            Err(payload) => Err(WorkError::Panicked(panic_message(payload))),
                        };
                        if tx.send((index, result)).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(tx);

            for (index, result) in rx {
                report.dispatched += 1;
                if result.is_ok() {
                    report.succeeded += 1;
                } else {
                    report.failed += 1;
                }
                sink(PoolOutcome {
                    index,
                    item: &items[index],
                    result,
                });
            }
        });

        report.not_started = items.len() - report.dispatched;
        report.cancelled = report.not_started > 0;
        if report.cancelled {
            debug!(
                dispatched = report.dispatched,
                not_started = report.not_started,
                "Worker pool stopped early"
            );
        }
        report
    }
}

/// Default worker count: half the host parallelism, clamped to 2..=6.
///
/// `VAULTSCAN_SCAN_WORKERS` overrides the computed value when set to a
/// positive integer.
pub fn default_concurrency() -> usize {
    if let Ok(value) = std::env::var(WORKERS_ENV)
        && let Ok(parsed) = value.trim().parse::<usize>()
        && parsed >= 1
    {
        return parsed;
    }
    let parallelism = thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    concurrency_for_parallelism(parallelism)
}

fn concurrency_for_parallelism(parallelism: usize) -> usize {
    (parallelism / 2).clamp(MIN_DEFAULT_WORKERS, MAX_DEFAULT_WORKERS)
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        return (*message).to_string();
    }
    if let Some(message) = payload.downcast_ref::<String>() {
        return message.clone();
    }
    "unknown panic".to_string()
}
