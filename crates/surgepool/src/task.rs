use core::fmt;

/// Error type a [`TaskProcessor`] may return for a single task.
///
/// A task error never stops the worker that produced it; see
/// [`PoolEvent::TaskFailed`](crate::PoolEvent::TaskFailed).
pub type TaskError = Box<dyn std::error::Error + Send + Sync>;

/// Identifier assigned by the pool to a submitted task.
///
/// Ids are unique for the lifetime of a pool. One is allocated per
/// submission attempt, before the task is enqueued: attempts rejected with
/// an error consume an id that is never reported, and tasks from concurrent
/// submitters may enter the queue out of id order. A single submitter
/// always receives increasing ids.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identifier of a worker execution, assigned from `0` in spawn order.
pub type WorkerId = usize;

/// The processing effect a worker applies to each dequeued task.
///
/// The pool invokes `process` exactly once per accepted task. Returning an
/// error or panicking marks that one task as failed; the worker carries on
/// with the next task.
///
/// Closures of the form `Fn(WorkerId, T) -> impl Future<Output =
/// Result<(), TaskError>>` implement this trait, which covers most uses:
///
/// ```
/// use surgepool::{TaskError, TaskProcessor, WorkerId};
///
/// fn assert_processor<T, P: TaskProcessor<T>>(_: &P) {}
///
/// let processor = |_worker: WorkerId, n: u64| async move {
///     if n == 0 {
///         return Err::<(), TaskError>("zero is not allowed".into());
///     }
///     Ok(())
/// };
/// assert_processor::<u64, _>(&processor);
/// ```
///
/// A processor must not submit back into the pool that runs it: with every
/// worker blocked on a full queue nothing would ever drain it.
pub trait TaskProcessor<T>: Send + Sync + 'static {
    /// Processes one task on the worker identified by `worker`.
    fn process(
        &self,
        worker: WorkerId,
        task: T,
    ) -> impl Future<Output = Result<(), TaskError>> + Send;
}

impl<T, F, Fut> TaskProcessor<T> for F
where
    F: Fn(WorkerId, T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), TaskError>> + Send,
{
    fn process(
        &self,
        worker: WorkerId,
        task: T,
    ) -> impl Future<Output = Result<(), TaskError>> + Send {
        self(worker, task)
    }
}

/// A task paired with the id the pool assigned to it.
pub(crate) struct Job<T> {
    pub(crate) id: TaskId,
    pub(crate) task: T,
}
