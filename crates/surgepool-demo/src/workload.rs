use core::time::Duration;
use surgepool::{PoolEvent, SpawnTrigger, TaskError, TaskFault, TaskProcessor, WorkerId};

/// Stand-in for real work: sleeps for a fixed duration per task.
///
/// With `fail_every = Some(n)` every n-th task fails instead of completing,
/// odd multiples by returning an error and even multiples by panicking, so
/// both fault paths of the pool can be watched in the logs.
#[derive(Debug, Clone, Copy)]
pub struct SimulatedWork {
    work: Duration,
    fail_every: Option<u64>,
}

impl SimulatedWork {
    pub const fn new(work: Duration, fail_every: Option<u64>) -> Self {
        Self { work, fail_every }
    }

    fn fault_for(&self, task: u64) -> Option<Fault> {
        let n = self.fail_every?;
        if task == 0 || task % n != 0 {
            return None;
        }
        if (task / n) % 2 == 1 {
            Some(Fault::Error)
        } else {
            Some(Fault::Panic)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fault {
    Error,
    Panic,
}

impl TaskProcessor<u64> for SimulatedWork {
    async fn process(&self, worker: WorkerId, task: u64) -> Result<(), TaskError> {
        tracing::info!("Worker {worker} processing task {task}");
        tokio::time::sleep(self.work).await;

        match self.fault_for(task) {
            None => Ok(()),
            Some(Fault::Error) => Err(format!("task {task} was rejected").into()),
            Some(Fault::Panic) => panic!("task {task} blew up"),
        }
    }
}

/// Forwards pool events to the log.
pub fn log_event(event: &PoolEvent) {
    match event {
        PoolEvent::WorkerSpawned {
            worker,
            trigger: SpawnTrigger::Start,
        } => tracing::info!("Worker {worker} started"),
        PoolEvent::WorkerSpawned {
            worker,
            trigger: SpawnTrigger::QueuePressure { queued },
        } => tracing::info!("Scaled up: worker {worker} started with {queued} tasks queued"),
        PoolEvent::TaskStarted { worker, task } => {
            tracing::debug!("Worker {worker} picked up task #{task}");
        }
        PoolEvent::TaskCompleted { worker, task } => {
            tracing::info!("Worker {worker} finished task #{task}");
        }
        PoolEvent::TaskFailed {
            worker,
            task,
            fault: TaskFault::Error(reason),
        } => tracing::warn!("Worker {worker} failed task #{task}: {reason}"),
        PoolEvent::TaskFailed {
            worker,
            task,
            fault: TaskFault::Panic(message),
        } => tracing::error!("Worker {worker} panicked on task #{task}: {message}"),
        PoolEvent::WorkerStopped {
            worker,
            completed,
            failed,
        } => tracing::info!("Worker {worker} stopped ({completed} completed, {failed} failed)"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_faults_without_fail_every() {
        let work = SimulatedWork::new(Duration::ZERO, None);
        assert!((0..100).all(|task| work.fault_for(task).is_none()));
    }

    #[test]
    fn every_nth_task_alternates_fault_kinds() {
        let work = SimulatedWork::new(Duration::ZERO, Some(3));
        let faults: Vec<_> = (1..=12)
            .filter_map(|task| work.fault_for(task).map(|fault| (task, fault)))
            .collect();

        assert_eq!(
            faults,
            vec![
                (3, Fault::Error),
                (6, Fault::Panic),
                (9, Fault::Error),
                (12, Fault::Panic),
            ]
        );
    }

    #[tokio::test]
    async fn processor_reports_rejected_tasks() {
        let work = SimulatedWork::new(Duration::ZERO, Some(2));

        assert!(work.process(0, 1).await.is_ok());
        let err = work.process(0, 2).await.unwrap_err();
        assert_eq!(err.to_string(), "task 2 was rejected");
    }
}
