use crate::WorkerId;
use core::fmt;
use portable_atomic::{AtomicU64, AtomicUsize, Ordering};

/// Lifecycle state of a [`WorkerPool`](crate::WorkerPool).
///
/// ```text
/// Created --start--> Running --shutdown--> Closing --workers exited--> Drained
///    \___________________________shutdown________________________________/
/// ```
///
/// Resizing happens while `Running`, inside the pool's control lock, and is
/// never observable as a state of its own. A pool whose shutdown future was
/// dropped stays `Closing`, with workers still draining, until shutdown is
/// called again.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PoolState {
    Created,
    Running,
    Closing,
    Drained,
}

impl PoolState {
    /// Returns `true` once shutdown has begun.
    pub const fn is_closed(self) -> bool {
        matches!(self, Self::Closing | Self::Drained)
    }
}

impl fmt::Display for PoolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Running => write!(f, "running"),
            Self::Closing => write!(f, "closing"),
            Self::Drained => write!(f, "drained"),
        }
    }
}

/// Point-in-time diagnostics for a pool.
///
/// Values are read without a common lock and may be mutually inconsistent
/// while tasks are in flight. They are not part of the pool's correctness
/// contract.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PoolStats {
    pub state: PoolState,
    /// Workers spawned so far. Never decreases.
    pub workers: usize,
    /// Workers currently executing their consume loop.
    pub active_workers: usize,
    /// Tasks waiting in the queue.
    pub queued: usize,
    /// Tasks accepted into the queue.
    pub submitted: u64,
    pub completed: u64,
    pub failed: u64,
    /// Accepted tasks that will never be processed. Only a forced shutdown
    /// drops tasks.
    pub dropped: u64,
}

/// Final accounting returned once shutdown finishes.
///
/// On the graceful path `dropped` is zero and `completed + failed` equals
/// the number of accepted tasks. A forced shutdown reports every task that
/// was still queued or in flight when workers were aborted as `dropped`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Workers spawned over the pool's lifetime.
    pub workers: usize,
    pub completed: u64,
    pub failed: u64,
    pub dropped: u64,
    /// `true` if the deadline passed and remaining workers were aborted.
    pub forced: bool,
    /// Workers that did not exit on their own: aborted at the deadline or
    /// crashed outside task processing.
    pub abandoned_workers: Vec<WorkerId>,
}

impl ShutdownReport {
    /// Total tasks this pool accounted for.
    pub const fn total(&self) -> u64 {
        self.completed + self.failed + self.dropped
    }
}

/// Counters shared by the pool handle and every worker.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub(crate) next_task_id: AtomicU64,
    pub(crate) submitted: AtomicU64,
    pub(crate) completed: AtomicU64,
    pub(crate) failed: AtomicU64,
    pub(crate) dropped: AtomicU64,
    pub(crate) active_workers: AtomicUsize,
}

impl Counters {
    pub(crate) fn next_task_id(&self) -> u64 {
        self.next_task_id.fetch_add(1, Ordering::Relaxed)
    }
}
