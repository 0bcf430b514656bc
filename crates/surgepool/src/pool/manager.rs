//! Bounded, dynamically resizable worker pool.
//!
//! This module defines [`WorkerPool`], which owns a bounded FIFO queue shared
//! by every submitter and every worker. Workers are Tokio tasks that pull
//! from the queue until it is closed and empty. After each accepted
//! submission the pool runs a *resize evaluation* that may add one worker,
//! up to the configured maximum.
//!
//! All lifecycle transitions and worker-count changes happen under a single
//! control lock, so resize decisions are serialized and can never race with
//! shutdown. The lock is never held across an `.await`.

use super::{
    state::{Counters, PoolState, PoolStats, ShutdownReport},
    worker::{ActiveWorker, Shared, worker_loop},
};
use crate::{
    Error, NoopObserver, PoolConfig, PoolEvent, PoolObserver, Result, SpawnTrigger, TaskId,
    TaskProcessor, WorkerId, task::Job,
};
use async_channel::TrySendError;
use core::{mem, time::Duration};
use parking_lot::Mutex;
use portable_atomic::Ordering;
use std::{collections::HashMap, sync::Arc};
use tokio::{
    runtime::Handle,
    task::{self, JoinSet},
    time::{Instant, timeout_at},
};

/// A pool of asynchronous workers processing tasks of type `T` with the
/// processor `P`.
///
/// The pool moves through the states described by [`PoolState`]:
///
/// 1. [`new`](Self::new) validates the config and builds an empty queue.
/// 2. [`start`](Self::start) spawns the initial workers.
/// 3. [`submit`](Self::submit) / [`try_submit`](Self::try_submit) enqueue
///    tasks and may grow the pool according to its [`ScalePolicy`].
/// 4. [`shutdown`](Self::shutdown) closes the queue and waits for the
///    workers to drain it.
///
/// Submitting from inside the processor of the same pool can deadlock once
/// the queue is full and must be avoided.
///
/// [`ScalePolicy`]: crate::ScalePolicy
pub struct WorkerPool<T, P> {
    config: PoolConfig,
    sender: async_channel::Sender<Job<T>>,
    receiver: async_channel::Receiver<Job<T>>,
    shared: Arc<Shared<P>>,
    control: Mutex<Control>,
}

/// Mutable pool state guarded by the control lock.
struct Control {
    state: PoolState,
    workers: usize,
    runtime: Option<Handle>,
    tasks: JoinSet<WorkerId>,
    task_workers: HashMap<task::Id, WorkerId>,
    /// Set while a `close` call owns the worker set.
    closing: bool,
    /// Progress of a cancelled `close`, picked up by the next one.
    partial: ShutdownReport,
}

/// The worker set and report of a running shutdown.
///
/// If the `close` future is dropped before it finishes, everything is handed
/// back to the control cell: workers keep draining and a later shutdown
/// resumes where this one stopped.
struct Closer<'a> {
    control: &'a Mutex<Control>,
    tasks: JoinSet<WorkerId>,
    task_workers: HashMap<task::Id, WorkerId>,
    report: ShutdownReport,
    finished: bool,
}

impl Drop for Closer<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }

        #[cfg(feature = "tracing")]
        tracing::warn!(
            "Shutdown cancelled with {} workers still draining",
            self.tasks.len()
        );

        let mut control = self.control.lock();
        control.tasks = mem::take(&mut self.tasks);
        control.task_workers = mem::take(&mut self.task_workers);
        control.partial = mem::take(&mut self.report);
        control.closing = false;
    }
}

impl<T, P> WorkerPool<T, P>
where
    T: Send + 'static,
    P: TaskProcessor<T>,
{
    /// Creates a pool that reports no events.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] if `config` is invalid.
    pub fn new(config: PoolConfig, processor: P) -> Result<Self> {
        Self::with_observer(config, processor, NoopObserver)
    }

    /// Creates a pool that reports lifecycle events to `observer`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] if `config` is invalid.
    pub fn with_observer<O>(config: PoolConfig, processor: P, observer: O) -> Result<Self>
    where
        O: PoolObserver,
    {
        config.validate()?;
        let (sender, receiver) = async_channel::bounded(config.queue_capacity());

        Ok(Self {
            config,
            sender,
            receiver,
            shared: Arc::new(Shared {
                processor,
                observer: Arc::new(observer),
                counters: Counters::default(),
            }),
            control: Mutex::new(Control {
                state: PoolState::Created,
                workers: 0,
                runtime: None,
                tasks: JoinSet::new(),
                task_workers: HashMap::new(),
                closing: false,
                partial: ShutdownReport::default(),
            }),
        })
    }

    /// Spawns the initial workers on the current Tokio runtime.
    ///
    /// Workers spawned later by resize evaluations run on the same runtime.
    ///
    /// # Errors
    ///
    /// - [`Error::AlreadyStarted`] if the pool was started before.
    /// - [`Error::PoolClosed`] if the pool was shut down without being
    ///   started.
    /// - [`Error::RuntimeUnavailable`] if called outside a Tokio runtime.
    pub fn start(&self) -> Result<()> {
        let spawned = {
            let mut control = self.control.lock();
            match control.state {
                PoolState::Created => {}
                PoolState::Running => return Err(Error::AlreadyStarted),
                PoolState::Closing | PoolState::Drained => return Err(Error::PoolClosed),
            }

            let runtime = Handle::try_current().map_err(|e| Error::RuntimeUnavailable {
                context: e.to_string(),
            })?;
            control.runtime = Some(runtime);
            control.state = PoolState::Running;

            (0..self.config.initial_workers())
                .filter_map(|_| self.spawn_worker(&mut control))
                .collect::<Vec<_>>()
        };

        #[cfg(feature = "tracing")]
        tracing::info!(
            "Worker pool started with {} workers (max {}, queue capacity {})",
            spawned.len(),
            self.config.max_workers(),
            self.config.queue_capacity()
        );

        for worker in spawned {
            self.shared.emit(&PoolEvent::WorkerSpawned {
                worker,
                trigger: SpawnTrigger::Start,
            });
        }

        Ok(())
    }

    /// Enqueues `task`, waiting for a free slot while the queue is full.
    ///
    /// Waiting on a full queue is the pool's backpressure: memory use is
    /// bounded by the queue capacity no matter how fast tasks are submitted.
    /// Use [`try_submit`](Self::try_submit) to fail fast instead.
    ///
    /// On success the task is guaranteed to be processed by exactly one
    /// worker unless the pool is later torn down by
    /// [`shutdown_timeout`](Self::shutdown_timeout), which reports it as
    /// dropped.
    ///
    /// # Errors
    ///
    /// - [`Error::NotStarted`] before [`start`](Self::start).
    /// - [`Error::PoolClosed`] once shutdown has begun, including when the
    ///   queue is closed while this call is waiting for a slot. The task is
    ///   not accepted in either case.
    pub async fn submit(&self, task: T) -> Result<TaskId> {
        self.ensure_accepting()?;

        let id = TaskId(self.shared.counters.next_task_id());
        self.sender
            .send(Job { id, task })
            .await
            .map_err(|_| Error::PoolClosed)?;

        Ok(self.accepted(id))
    }

    /// Enqueues `task` without waiting.
    ///
    /// # Errors
    ///
    /// - [`Error::NotStarted`] before [`start`](Self::start).
    /// - [`Error::PoolClosed`] once shutdown has begun.
    /// - [`Error::QueueFull`] if the queue is at capacity. The caller decides
    ///   whether and when to retry.
    pub fn try_submit(&self, task: T) -> Result<TaskId> {
        self.ensure_accepting()?;

        let id = TaskId(self.shared.counters.next_task_id());
        match self.sender.try_send(Job { id, task }) {
            Ok(()) => Ok(self.accepted(id)),
            Err(TrySendError::Full(_)) => Err(Error::QueueFull),
            Err(TrySendError::Closed(_)) => Err(Error::PoolClosed),
        }
    }

    /// Closes the pool and waits until every queued task has been processed
    /// and every worker has exited.
    ///
    /// After this returns the queue is empty, [`active_workers`] is zero and
    /// every further submission fails with [`Error::PoolClosed`].
    ///
    /// # Cancel safety
    ///
    /// Dropping the returned future before it completes leaves the pool
    /// `Closing` with its workers still draining the queue; nothing is
    /// aborted. Calling `shutdown` (or [`shutdown_timeout`]) again resumes
    /// the wait and returns the report.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyClosed`] if another shutdown is in progress
    /// or the pool is already drained.
    ///
    /// [`active_workers`]: Self::active_workers
    /// [`shutdown_timeout`]: Self::shutdown_timeout
    pub async fn shutdown(&self) -> Result<ShutdownReport> {
        self.close(None).await
    }

    /// Like [`shutdown`](Self::shutdown), but gives up waiting after
    /// `timeout`.
    ///
    /// Workers still running at the deadline are aborted. Their in-flight
    /// tasks and everything left in the queue are counted in
    /// [`ShutdownReport::dropped`], and the aborted workers are listed in
    /// [`ShutdownReport::abandoned_workers`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyClosed`] if another shutdown is in progress
    /// or the pool is already drained.
    pub async fn shutdown_timeout(&self, timeout: Duration) -> Result<ShutdownReport> {
        self.close(Some(Instant::now() + timeout)).await
    }

    /// Workers spawned so far. Never decreases and never exceeds
    /// `max_workers`.
    pub fn worker_count(&self) -> usize {
        self.control.lock().workers
    }

    /// Workers currently running their consume loop. Zero once shutdown has
    /// returned.
    pub fn active_workers(&self) -> usize {
        self.shared.counters.active_workers.load(Ordering::Acquire)
    }

    /// Tasks waiting in the queue.
    pub fn queued(&self) -> usize {
        self.sender.len()
    }

    pub const fn capacity(&self) -> usize {
        self.config.queue_capacity()
    }

    pub const fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn state(&self) -> PoolState {
        self.control.lock().state
    }

    /// Returns a diagnostic snapshot of the pool.
    pub fn stats(&self) -> PoolStats {
        let (state, workers) = {
            let control = self.control.lock();
            (control.state, control.workers)
        };
        let counters = &self.shared.counters;

        PoolStats {
            state,
            workers,
            active_workers: counters.active_workers.load(Ordering::Acquire),
            queued: self.sender.len(),
            submitted: counters.submitted.load(Ordering::Acquire),
            completed: counters.completed.load(Ordering::Acquire),
            failed: counters.failed.load(Ordering::Acquire),
            dropped: counters.dropped.load(Ordering::Acquire),
        }
    }

    fn ensure_accepting(&self) -> Result<()> {
        match self.control.lock().state {
            PoolState::Created => Err(Error::NotStarted),
            PoolState::Running => Ok(()),
            PoolState::Closing | PoolState::Drained => Err(Error::PoolClosed),
        }
    }

    fn accepted(&self, id: TaskId) -> TaskId {
        self.shared
            .counters
            .submitted
            .fetch_add(1, Ordering::AcqRel);
        self.evaluate_resize();
        id
    }

    /// Adds one worker if the scale policy asks for it.
    ///
    /// Runs after every accepted submission. Reading the queue depth and
    /// growing the worker count happen under the control lock, so concurrent
    /// submitters cannot both observe the same depth and overshoot
    /// `max_workers`. Once shutdown has begun no worker is ever added.
    fn evaluate_resize(&self) {
        let spawned = {
            let mut control = self.control.lock();
            if control.state != PoolState::Running {
                return;
            }

            let queued = self.sender.len();
            let grow = self.config.scale_policy().should_grow(
                queued,
                control.workers,
                self.config.max_workers(),
            );
            if !grow {
                return;
            }

            #[cfg(feature = "tracing")]
            tracing::debug!(
                "Queue depth {queued} exceeds what {} workers absorb, adding a worker",
                control.workers
            );

            self.spawn_worker(&mut control)
                .map(|worker| (worker, queued))
        };

        if let Some((worker, queued)) = spawned {
            self.shared.emit(&PoolEvent::WorkerSpawned {
                worker,
                trigger: SpawnTrigger::QueuePressure { queued },
            });
        }
    }

    /// Spawns one worker. Must be called with the control lock held; the
    /// matching event is emitted by the caller after releasing it, so an
    /// observer may safely query the pool.
    fn spawn_worker(&self, control: &mut Control) -> Option<WorkerId> {
        let Some(runtime) = &control.runtime else {
            #[cfg(feature = "tracing")]
            tracing::error!("Cannot spawn a worker before the pool is started");
            return None;
        };

        let worker = control.workers;
        let active = ActiveWorker::register(&self.shared);
        let handle = control.tasks.spawn_on(
            worker_loop(worker, self.receiver.clone(), active),
            runtime,
        );
        control.task_workers.insert(handle.id(), worker);
        control.workers += 1;

        Some(worker)
    }

    async fn close(&self, deadline: Option<Instant>) -> Result<ShutdownReport> {
        // === Phase 0: Stop accepting new tasks ===
        let mut closer = {
            let mut control = self.control.lock();
            match control.state {
                PoolState::Created | PoolState::Running => {
                    control.state = PoolState::Closing;
                    self.sender.close();
                }
                PoolState::Closing if !control.closing => {
                    #[cfg(feature = "tracing")]
                    tracing::info!("Resuming a cancelled shutdown");
                }
                PoolState::Closing | PoolState::Drained => return Err(Error::AlreadyClosed),
            }
            control.closing = true;

            let mut report = mem::take(&mut control.partial);
            report.workers = control.workers;
            Closer {
                control: &self.control,
                tasks: mem::take(&mut control.tasks),
                task_workers: mem::take(&mut control.task_workers),
                report,
                finished: false,
            }
        };

        #[cfg(feature = "tracing")]
        tracing::info!(
            "Refusing new tasks, draining {} queued tasks across {} workers",
            self.sender.len(),
            closer.report.workers
        );

        // === Phase 1: Wait for workers to drain the queue and exit ===
        loop {
            let joined = match deadline {
                Some(deadline) if !closer.report.forced => {
                    if let Ok(joined) = timeout_at(deadline, closer.tasks.join_next()).await {
                        joined
                    } else {
                        // === Phase 2: Deadline passed, abort the rest ===
                        #[cfg(feature = "tracing")]
                        tracing::warn!(
                            "Shutdown deadline passed with {} workers still running, aborting",
                            closer.tasks.len()
                        );
                        closer.report.forced = true;
                        closer.tasks.abort_all();
                        continue;
                    }
                }
                _ => closer.tasks.join_next().await,
            };

            let Some(joined) = joined else {
                break;
            };

            match joined {
                Ok(_worker) => {
                    #[cfg(feature = "tracing")]
                    tracing::trace!("Worker {_worker} exited");
                }
                Err(err) => {
                    let worker = closer.task_workers.get(&err.id()).copied();

                    #[cfg(feature = "tracing")]
                    {
                        if err.is_panic() {
                            tracing::error!("Worker {worker:?} crashed outside task processing");
                        } else {
                            tracing::debug!("Worker {worker:?} aborted before draining");
                        }
                    }

                    closer.report.abandoned_workers.extend(worker);
                }
            }
        }

        // === Phase 3: Account for anything no worker took ===
        let mut stranded = 0_u64;
        while self.receiver.try_recv().is_ok() {
            stranded += 1;
        }

        let counters = &self.shared.counters;
        counters.dropped.fetch_add(stranded, Ordering::AcqRel);

        let mut report = mem::take(&mut closer.report);
        report.completed = counters.completed.load(Ordering::Acquire);
        report.failed = counters.failed.load(Ordering::Acquire);
        report.dropped = counters.dropped.load(Ordering::Acquire);
        report.abandoned_workers.sort_unstable();

        closer.finished = true;
        drop(closer);
        {
            let mut control = self.control.lock();
            control.state = PoolState::Drained;
            control.closing = false;
        }

        #[cfg(feature = "tracing")]
        {
            if report.dropped > 0 {
                tracing::warn!(
                    "Worker pool shut down with {} dropped tasks ({} workers abandoned)",
                    report.dropped,
                    report.abandoned_workers.len()
                );
            } else {
                tracing::info!(
                    "Worker pool drained: {} completed, {} failed",
                    report.completed,
                    report.failed
                );
            }
        }

        Ok(report)
    }
}

impl<T, P> Drop for WorkerPool<T, P> {
    fn drop(&mut self) {
        let control = self.control.get_mut();
        if !matches!(control.state, PoolState::Running | PoolState::Closing) {
            return;
        }

        #[cfg(feature = "tracing")]
        tracing::warn!(
            "Worker pool dropped without shutdown, detaching {} workers to drain {} queued tasks",
            control.tasks.len(),
            self.sender.len()
        );

        // Workers keep draining on their own once detached; dropping the
        // JoinSet would abort them.
        self.sender.close();
        control.tasks.detach_all();
    }
}
