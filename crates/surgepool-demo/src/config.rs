use anyhow::bail;
use clap::Parser;
use core::{num::NonZeroUsize, time::Duration};
use surgepool::{PoolConfig, ScalePolicy};

/// Runtime configuration for the `surgepool-demo` binary.
///
/// The defaults reproduce the classic walkthrough: two workers growing to at
/// most five, ten integer tasks submitted every 500 ms, each taking two
/// seconds. Every value can be overridden from the command line or the
/// environment (a `.env` file is loaded first).
#[derive(Parser, Debug, Clone)]
#[command(
    name = "surgepool-demo",
    version,
    about = "Drives a dynamically resizable worker pool with simulated work"
)]
pub struct CliArgs {
    /// Number of workers launched when the pool starts.
    ///
    /// Environment variable: `INITIAL_WORKERS`
    #[arg(long, env = "INITIAL_WORKERS", default_value_t = 2)]
    pub initial_workers: usize,

    /// Upper bound on the number of workers the pool may grow to.
    ///
    /// Environment variable: `MAX_WORKERS`
    #[arg(long, env = "MAX_WORKERS", default_value_t = 5)]
    pub max_workers: usize,

    /// Capacity of the bounded task queue. Submissions wait while it is full.
    ///
    /// Environment variable: `QUEUE_CAPACITY`
    #[arg(long, env = "QUEUE_CAPACITY", default_value_t = surgepool::DEFAULT_QUEUE_CAPACITY)]
    pub queue_capacity: usize,

    /// Number of tasks to submit.
    ///
    /// Environment variable: `TASKS`
    #[arg(long, env = "TASKS", default_value_t = 10)]
    pub tasks: u64,

    /// Pause between two submissions, in milliseconds.
    ///
    /// Environment variable: `SUBMIT_INTERVAL_MS`
    #[arg(long, env = "SUBMIT_INTERVAL_MS", default_value_t = 500)]
    pub submit_interval_ms: u64,

    /// Simulated processing time of a single task, in milliseconds.
    ///
    /// Environment variable: `WORK_MS`
    #[arg(long, env = "WORK_MS", default_value_t = 2000)]
    pub work_ms: u64,

    /// Time to let the pool work after the last submission before shutting
    /// it down, in milliseconds.
    ///
    /// Environment variable: `SETTLE_MS`
    #[arg(long, env = "SETTLE_MS", default_value_t = 5000)]
    pub settle_ms: u64,

    /// Abort workers that are still busy this many seconds after shutdown
    /// begins. Without it, shutdown waits for the queue to drain.
    ///
    /// Environment variable: `SHUTDOWN_TIMEOUT_SECS`
    #[arg(long, env = "SHUTDOWN_TIMEOUT_SECS")]
    pub shutdown_timeout_secs: Option<u64>,

    /// Make every n-th task fail, alternating between a returned error and a
    /// panic.
    ///
    /// Environment variable: `FAIL_EVERY`
    #[arg(long, env = "FAIL_EVERY")]
    pub fail_every: Option<u64>,

    /// Only add a worker once the backlog exceeds this many tasks per
    /// worker. Without it, a worker is added as soon as queued tasks
    /// outnumber workers.
    ///
    /// Environment variable: `BACKLOG_PER_WORKER`
    #[arg(long, env = "BACKLOG_PER_WORKER")]
    pub backlog_per_worker: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct DemoConfig {
    pub pool: PoolConfig,
    pub tasks: u64,
    pub submit_interval: Duration,
    pub work: Duration,
    pub settle: Duration,
    pub shutdown_timeout: Option<Duration>,
    pub fail_every: Option<u64>,
}

impl TryFrom<CliArgs> for DemoConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.initial_workers == 0 {
            bail!("INITIAL_WORKERS must be greater than 0");
        }

        if args.initial_workers > args.max_workers {
            bail!(
                "INITIAL_WORKERS ({}) exceeds MAX_WORKERS ({})",
                args.initial_workers,
                args.max_workers
            );
        }

        if args.queue_capacity == 0 {
            bail!("QUEUE_CAPACITY must be greater than 0");
        }

        if args.fail_every == Some(0) {
            bail!("FAIL_EVERY must be greater than 0");
        }

        let scale_policy = match args.backlog_per_worker {
            None => ScalePolicy::Backlog,
            Some(n) => match NonZeroUsize::new(n) {
                Some(n) => ScalePolicy::BacklogPerWorker(n),
                None => bail!("BACKLOG_PER_WORKER must be greater than 0"),
            },
        };

        let pool = PoolConfig::new(args.initial_workers, args.max_workers)?
            .with_queue_capacity(args.queue_capacity)
            .with_scale_policy(scale_policy);

        Ok(Self {
            pool,
            tasks: args.tasks,
            submit_interval: Duration::from_millis(args.submit_interval_ms),
            work: Duration::from_millis(args.work_ms),
            settle: Duration::from_millis(args.settle_ms),
            shutdown_timeout: args.shutdown_timeout_secs.map(Duration::from_secs),
            fail_every: args.fail_every,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> anyhow::Result<DemoConfig> {
        let argv = core::iter::once("surgepool-demo").chain(args.iter().copied());
        DemoConfig::try_from(CliArgs::try_parse_from(argv)?)
    }

    #[test]
    fn defaults_reproduce_the_walkthrough() {
        let config = parse(&[]).unwrap();

        assert_eq!(config.pool.initial_workers(), 2);
        assert_eq!(config.pool.max_workers(), 5);
        assert_eq!(config.pool.queue_capacity(), 10);
        assert_eq!(config.pool.scale_policy(), ScalePolicy::Backlog);
        assert_eq!(config.tasks, 10);
        assert_eq!(config.submit_interval, Duration::from_millis(500));
        assert_eq!(config.work, Duration::from_secs(2));
        assert_eq!(config.settle, Duration::from_secs(5));
        assert_eq!(config.shutdown_timeout, None);
        assert_eq!(config.fail_every, None);
    }

    #[test]
    fn flags_override_defaults() {
        let config = parse(&[
            "--initial-workers",
            "1",
            "--max-workers",
            "1",
            "--queue-capacity",
            "4",
            "--shutdown-timeout-secs",
            "3",
            "--fail-every",
            "5",
            "--backlog-per-worker",
            "2",
        ])
        .unwrap();

        assert_eq!(config.pool.initial_workers(), 1);
        assert_eq!(config.pool.max_workers(), 1);
        assert_eq!(config.pool.queue_capacity(), 4);
        assert_eq!(
            config.pool.scale_policy(),
            ScalePolicy::BacklogPerWorker(NonZeroUsize::new(2).unwrap())
        );
        assert_eq!(config.shutdown_timeout, Some(Duration::from_secs(3)));
        assert_eq!(config.fail_every, Some(5));
    }

    #[test]
    fn rejects_invalid_worker_bounds() {
        let err = parse(&["--initial-workers", "0"]).unwrap_err();
        assert!(err.to_string().contains("INITIAL_WORKERS"));

        let err = parse(&["--initial-workers", "6", "--max-workers", "5"]).unwrap_err();
        assert!(err.to_string().contains("exceeds MAX_WORKERS"));
    }

    #[test]
    fn rejects_zero_sized_settings() {
        assert!(parse(&["--queue-capacity", "0"]).is_err());
        assert!(parse(&["--fail-every", "0"]).is_err());
        assert!(parse(&["--backlog-per-worker", "0"]).is_err());
    }
}
