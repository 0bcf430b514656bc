use super::state::Counters;
use crate::{
    PoolEvent, PoolObserver, TaskFault, TaskProcessor, WorkerId,
    task::{Job, TaskError},
};
use core::{any::Any, panic::AssertUnwindSafe};
use futures::FutureExt;
use portable_atomic::Ordering;
use std::{panic, sync::Arc};

/// State shared between the pool handle and all of its workers.
pub(crate) struct Shared<P> {
    pub(crate) processor: P,
    pub(crate) observer: Arc<dyn PoolObserver>,
    pub(crate) counters: Counters,
}

impl<P> Shared<P> {
    /// Delivers `event` to the observer. A panicking observer loses the
    /// event but never takes down the worker or submitter that emitted it.
    pub(crate) fn emit(&self, event: &PoolEvent) {
        let delivered = panic::catch_unwind(AssertUnwindSafe(|| self.observer.on_event(event)));

        if let Err(_payload) = delivered {
            #[cfg(feature = "tracing")]
            tracing::error!(
                "Observer panicked on {event:?}: {}",
                panic_message(&*_payload)
            );
        }
    }
}

/// Keeps the active-worker count accurate for as long as a worker future
/// exists, including when the future is aborted before its first poll.
pub(crate) struct ActiveWorker<P> {
    shared: Arc<Shared<P>>,
}

impl<P> ActiveWorker<P> {
    pub(crate) fn register(shared: &Arc<Shared<P>>) -> Self {
        shared
            .counters
            .active_workers
            .fetch_add(1, Ordering::AcqRel);
        Self {
            shared: Arc::clone(shared),
        }
    }
}

impl<P> Drop for ActiveWorker<P> {
    fn drop(&mut self) {
        self.shared
            .counters
            .active_workers
            .fetch_sub(1, Ordering::AcqRel);
    }
}

/// Counts a dequeued task as dropped unless it is explicitly finished.
///
/// A worker aborted by a forced shutdown drops its in-flight task together
/// with this guard.
struct InFlight<'a> {
    counters: &'a Counters,
    finished: bool,
}

impl<'a> InFlight<'a> {
    const fn new(counters: &'a Counters) -> Self {
        Self {
            counters,
            finished: false,
        }
    }

    fn finish(mut self, outcome: &Result<(), TaskFault>) {
        let counter = match outcome {
            Ok(()) => &self.counters.completed,
            Err(_) => &self.counters.failed,
        };
        counter.fetch_add(1, Ordering::AcqRel);
        self.finished = true;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.counters.dropped.fetch_add(1, Ordering::AcqRel);
        }
    }
}

/// Worker task that consumes [`Job`]s from the shared queue.
///
/// The loop ends once the queue is closed and every remaining job has been
/// taken. A processor error or panic fails only the task that caused it.
///
/// # Arguments
///
/// - `worker_id`: Identifier of this worker (used for events and logs).
/// - `rx`: Receiving half of the shared queue. Every worker holds a clone.
/// - `active`: Registration in the active-worker count, released on exit.
pub(crate) async fn worker_loop<T, P>(
    worker_id: WorkerId,
    rx: async_channel::Receiver<Job<T>>,
    active: ActiveWorker<P>,
) -> WorkerId
where
    T: Send + 'static,
    P: TaskProcessor<T>,
{
    let shared = Arc::clone(&active.shared);

    #[cfg(feature = "tracing")]
    tracing::trace!("Worker {worker_id} started");

    let mut completed = 0_u64;
    let mut failed = 0_u64;

    while let Ok(Job { id, task }) = rx.recv().await {
        let in_flight = InFlight::new(&shared.counters);
        shared.emit(&PoolEvent::TaskStarted {
            worker: worker_id,
            task: id,
        });

        let outcome = run_task(&shared.processor, worker_id, task).await;
        in_flight.finish(&outcome);

        match outcome {
            Ok(()) => {
                completed += 1;
                shared.emit(&PoolEvent::TaskCompleted {
                    worker: worker_id,
                    task: id,
                });
            }
            Err(fault) => {
                failed += 1;

                #[cfg(feature = "tracing")]
                tracing::warn!("Worker {worker_id} failed task {id}: {fault:?}");

                shared.emit(&PoolEvent::TaskFailed {
                    worker: worker_id,
                    task: id,
                    fault,
                });
            }
        }
    }

    #[cfg(feature = "tracing")]
    tracing::trace!("Worker {worker_id} stopped ({completed} completed, {failed} failed)");

    shared.emit(&PoolEvent::WorkerStopped {
        worker: worker_id,
        completed,
        failed,
    });

    drop(active);
    worker_id
}

async fn run_task<T, P>(processor: &P, worker_id: WorkerId, task: T) -> Result<(), TaskFault>
where
    P: TaskProcessor<T>,
{
    match AssertUnwindSafe(processor.process(worker_id, task))
        .catch_unwind()
        .await
    {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(error_fault(&err)),
        Err(payload) => Err(TaskFault::Panic(panic_message(&*payload))),
    }
}

fn error_fault(err: &TaskError) -> TaskFault {
    TaskFault::Error(err.to_string())
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        String::from("non-string panic payload")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NoopObserver;
    use std::sync::Mutex;

    fn shared<P>(processor: P, observer: Arc<dyn PoolObserver>) -> Arc<Shared<P>> {
        Arc::new(Shared {
            processor,
            observer,
            counters: Counters::default(),
        })
    }

    #[test]
    fn panic_message_extracts_strings() {
        let payload: Box<dyn Any + Send> = Box::new("static message");
        assert_eq!(panic_message(&*payload), "static message");

        let payload: Box<dyn Any + Send> = Box::new(String::from("owned message"));
        assert_eq!(panic_message(&*payload), "owned message");

        let payload: Box<dyn Any + Send> = Box::new(42_u32);
        assert_eq!(panic_message(&*payload), "non-string panic payload");
    }

    #[test]
    fn active_worker_tracks_lifetime() {
        let shared = shared(
            |_: WorkerId, _: u32| async { Ok::<(), TaskError>(()) },
            Arc::new(NoopObserver),
        );

        let first = ActiveWorker::register(&shared);
        let second = ActiveWorker::register(&shared);
        assert_eq!(shared.counters.active_workers.load(Ordering::Acquire), 2);

        drop(first);
        assert_eq!(shared.counters.active_workers.load(Ordering::Acquire), 1);
        drop(second);
        assert_eq!(shared.counters.active_workers.load(Ordering::Acquire), 0);
    }

    #[test]
    fn unfinished_in_flight_counts_as_dropped() {
        let counters = Counters::default();
        drop(InFlight::new(&counters));
        InFlight::new(&counters).finish(&Ok(()));
        InFlight::new(&counters).finish(&Err(TaskFault::Error("boom".into())));

        assert_eq!(counters.dropped.load(Ordering::Acquire), 1);
        assert_eq!(counters.completed.load(Ordering::Acquire), 1);
        assert_eq!(counters.failed.load(Ordering::Acquire), 1);
    }

    #[test]
    fn emit_contains_observer_panics() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let observer: Arc<dyn PoolObserver> = {
            let seen = Arc::clone(&seen);
            Arc::new(move |event: &PoolEvent| {
                seen.lock().unwrap().push(event.clone());
                panic!("observer exploded");
            })
        };
        let shared = shared(
            |_: WorkerId, _: u32| async { Ok::<(), TaskError>(()) },
            observer,
        );

        let event = PoolEvent::TaskStarted {
            worker: 0,
            task: crate::TaskId(0),
        };
        shared.emit(&event);
        shared.emit(&event);

        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn worker_survives_errors_and_panics() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let observer: Arc<dyn PoolObserver> = {
            let events = Arc::clone(&events);
            Arc::new(move |event: &PoolEvent| events.lock().unwrap().push(event.clone()))
        };

        let shared = shared(
            |_: WorkerId, n: u32| async move {
                match n {
                    1 => Err::<(), TaskError>("task one failed".into()),
                    2 => panic!("task two panicked"),
                    _ => Ok(()),
                }
            },
            observer,
        );

        let (tx, rx) = async_channel::bounded(8);
        for n in 0..4_u32 {
            let job = Job {
                id: crate::TaskId(u64::from(n)),
                task: n,
            };
            assert!(tx.send(job).await.is_ok());
        }
        tx.close();

        let worker = worker_loop(7, rx, ActiveWorker::register(&shared)).await;

        assert_eq!(worker, 7);
        assert_eq!(shared.counters.completed.load(Ordering::Acquire), 2);
        assert_eq!(shared.counters.failed.load(Ordering::Acquire), 2);
        assert_eq!(shared.counters.active_workers.load(Ordering::Acquire), 0);
        assert_eq!(shared.counters.dropped.load(Ordering::Acquire), 0);

        let events = events.lock().unwrap();
        assert!(events.contains(&PoolEvent::TaskFailed {
            worker: 7,
            task: crate::TaskId(1),
            fault: TaskFault::Error("task one failed".into()),
        }));
        assert!(events.contains(&PoolEvent::TaskFailed {
            worker: 7,
            task: crate::TaskId(2),
            fault: TaskFault::Panic("task two panicked".into()),
        }));
        assert_eq!(
            events.last(),
            Some(&PoolEvent::WorkerStopped {
                worker: 7,
                completed: 2,
                failed: 2,
            })
        );
    }
}
