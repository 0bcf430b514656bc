//! Error types for the worker pool.
//!
//! This module defines the central `Error` enum, which captures every
//! recoverable error the pool reports to its callers. Errors raised while
//! processing an individual task are *not* part of this enum: they are
//! isolated inside the worker loop and surfaced through
//! [`PoolEvent::TaskFailed`](crate::PoolEvent::TaskFailed).
//!
//! ## Error Cases
//! - `InvalidConfiguration`: Construction parameters violate the pool's
//!   invariants.
//! - `AlreadyStarted`: [`start`](crate::WorkerPool::start) was called twice.
//! - `NotStarted`: A task was submitted before the pool was started.
//! - `PoolClosed`: A task was submitted after shutdown began.
//! - `QueueFull`: A non-blocking submission found the queue at capacity.
//! - `AlreadyClosed`: Shutdown was requested more than once.
//! - `RuntimeUnavailable`: The pool was started outside a Tokio runtime.

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for the worker pool.
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
pub enum Error {
    /// The pool configuration violates `0 < initial_workers <= max_workers`
    /// or requests a zero-capacity queue.
    #[error("Invalid configuration: {reason}")]
    InvalidConfiguration { reason: String },

    /// The pool has already been started.
    #[error("Worker pool has already been started")]
    AlreadyStarted,

    /// The pool has not been started yet, so nothing would consume the task.
    #[error("Worker pool has not been started")]
    NotStarted,

    /// The pool is closing or drained. The submitted task was not accepted.
    #[error("Worker pool is closed")]
    PoolClosed,

    /// The task queue is at capacity. The submitted task was not accepted.
    #[error("Task queue is full")]
    QueueFull,

    /// Shutdown has already been requested.
    #[error("Worker pool is already closed")]
    AlreadyClosed,

    /// Workers could not be spawned because no Tokio runtime is active.
    #[error("Tokio runtime unavailable: {context}")]
    RuntimeUnavailable { context: String },
}

impl Error {
    pub(crate) fn invalid_configuration(reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            reason: reason.into(),
        }
    }
}
