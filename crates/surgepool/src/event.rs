//! Structured lifecycle events emitted by the pool.
//!
//! Events are delivered synchronously to a [`PoolObserver`] from whichever
//! task produced them: worker events from the worker itself, spawn events
//! from the caller of `start`/`submit`. Observers should therefore be cheap
//! and must not block.

use crate::{TaskId, WorkerId};

/// Why a worker was spawned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpawnTrigger {
    /// Part of the initial worker set launched by `start`.
    Start,
    /// Added by a resize evaluation after a submission found `queued` tasks
    /// waiting.
    QueuePressure { queued: usize },
}

/// How a single task failed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TaskFault {
    /// The processor returned an error.
    Error(String),
    /// The processor panicked. Holds the panic message when it was a string.
    Panic(String),
}

/// A lifecycle event observed inside the pool.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PoolEvent {
    WorkerSpawned {
        worker: WorkerId,
        trigger: SpawnTrigger,
    },
    TaskStarted {
        worker: WorkerId,
        task: TaskId,
    },
    TaskCompleted {
        worker: WorkerId,
        task: TaskId,
    },
    TaskFailed {
        worker: WorkerId,
        task: TaskId,
        fault: TaskFault,
    },
    /// The worker saw the queue closed and empty and exited.
    WorkerStopped {
        worker: WorkerId,
        completed: u64,
        failed: u64,
    },
}

/// Receives [`PoolEvent`]s.
///
/// Any `Fn(&PoolEvent) + Send + Sync + 'static` closure is an observer.
pub trait PoolObserver: Send + Sync + 'static {
    fn on_event(&self, event: &PoolEvent);
}

impl<F> PoolObserver for F
where
    F: Fn(&PoolEvent) + Send + Sync + 'static,
{
    fn on_event(&self, event: &PoolEvent) {
        self(event);
    }
}

/// Observer that discards every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopObserver;

impl PoolObserver for NoopObserver {
    fn on_event(&self, _event: &PoolEvent) {}
}
