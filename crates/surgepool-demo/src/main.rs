#![doc = include_str!("../README.md")]

mod config;
mod telemetry;
mod workload;

use clap::Parser;
use config::{CliArgs, DemoConfig};
use surgepool::{ShutdownReport, WorkerPool};
use tokio::{
    signal,
    time::{self, MissedTickBehavior},
};
use workload::{SimulatedWork, log_event};

type DemoPool = WorkerPool<u64, SimulatedWork>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = DemoConfig::try_from(args)?;

    telemetry::init_telemetry()?;
    log_startup_info(&config);

    let pool: DemoPool = WorkerPool::with_observer(
        config.pool.clone(),
        SimulatedWork::new(config.work, config.fail_every),
        log_event,
    )?;
    pool.start()?;

    let signal = shutdown_signal();
    tokio::pin!(signal);

    let interrupted = tokio::select! {
        res = submit_all(&pool, &config) => {
            res?;
            false
        }
        () = &mut signal => true,
    };

    if !interrupted {
        tracing::info!(
            "All {} tasks submitted, letting the pool work for {:?}",
            config.tasks,
            config.settle
        );
        tokio::select! {
            () = time::sleep(config.settle) => {}
            () = &mut signal => {}
        }
    }

    tracing::info!("Shutting down: {:?}", pool.stats());
    let report = match config.shutdown_timeout {
        Some(timeout) => pool.shutdown_timeout(timeout).await?,
        None => pool.shutdown().await?,
    };
    log_report(&report);

    Ok(())
}

/// Submits `config.tasks` tasks, numbered from 1, one per interval.
///
/// A submission that finds the queue full waits for a slot; the next tick is
/// then delayed rather than fired in a burst.
async fn submit_all(pool: &DemoPool, config: &DemoConfig) -> anyhow::Result<()> {
    let mut ticker = time::interval(config.submit_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    for task in 1..=config.tasks {
        ticker.tick().await;
        let id = pool.submit(task).await?;
        tracing::info!(
            "Submitted task {task} as #{id} ({}/{} queued, {} workers)",
            pool.queued(),
            pool.capacity(),
            pool.worker_count()
        );
    }

    Ok(())
}

fn log_startup_info(config: &DemoConfig) {
    if cfg!(debug_assertions) {
        tracing::info!("Starting demo with full config: {:#?}", config);
    } else {
        tracing::info!(
            "Starting demo with {} workers (max {}), {} tasks",
            config.pool.initial_workers(),
            config.pool.max_workers(),
            config.tasks
        );
    }
}

fn log_report(report: &ShutdownReport) {
    if report.forced {
        tracing::warn!(
            "Shutdown deadline passed: {} completed, {} failed, {} dropped, abandoned workers {:?}",
            report.completed,
            report.failed,
            report.dropped,
            report.abandoned_workers
        );
    } else {
        tracing::info!(
            "Pool drained by {} workers: {} completed, {} failed",
            report.workers,
            report.completed,
            report.failed
        );
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                core::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = core::future::pending::<()>();

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
            core::future::pending::<()>().await;
        }
    };

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        },
        () = terminate => {
            tracing::info!("Received SIGTERM signal");
        },
    }

    tracing::info!("Shutdown signal received, stopping submissions...");
}
