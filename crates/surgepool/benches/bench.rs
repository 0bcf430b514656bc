use core::hint::black_box;
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use std::time::{Duration, Instant};
use surgepool::{PoolConfig, ScalePolicy, TaskError, WorkerId, WorkerPool};
use tokio::runtime::Builder;

const TASKS: u64 = 10_000;

#[derive(Clone, Copy, Debug)]
struct PoolBenchParams {
    initial_workers: usize,
    max_workers: usize,
    queue_capacity: usize,
    scale_policy: ScalePolicy,
}

async fn noop(worker: WorkerId, task: u64) -> Result<(), TaskError> {
    black_box((worker, task));
    Ok(())
}

async fn yielding(worker: WorkerId, task: u64) -> Result<(), TaskError> {
    tokio::task::yield_now().await;
    black_box((worker, task));
    Ok(())
}

/// Submits [`TASKS`] tasks into a fresh pool and waits for it to drain.
async fn submit_and_drain<F, Fut>(params: PoolBenchParams, processor: F) -> Duration
where
    F: Fn(WorkerId, u64) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), TaskError>> + Send,
{
    let config = PoolConfig::new(params.initial_workers, params.max_workers)
        .unwrap()
        .with_queue_capacity(params.queue_capacity)
        .with_scale_policy(params.scale_policy);
    let pool: WorkerPool<u64, F> = WorkerPool::new(config, processor).unwrap();

    let start = Instant::now();
    pool.start().unwrap();
    for task in 0..TASKS {
        pool.submit(task).await.unwrap();
    }
    let report = pool.shutdown().await.unwrap();
    let elapsed = start.elapsed();

    assert_eq!(report.completed, TASKS);
    elapsed
}

fn bench_pool(c: &mut Criterion) {
    let cases = [
        PoolBenchParams {
            initial_workers: 1,
            max_workers: 1,
            queue_capacity: 10,
            scale_policy: ScalePolicy::Fixed,
        },
        PoolBenchParams {
            initial_workers: 2,
            max_workers: 5,
            queue_capacity: 10,
            scale_policy: ScalePolicy::Backlog,
        },
        PoolBenchParams {
            initial_workers: 2,
            max_workers: 16,
            queue_capacity: 256,
            scale_policy: ScalePolicy::Backlog,
        },
        PoolBenchParams {
            initial_workers: 8,
            max_workers: 8,
            queue_capacity: 256,
            scale_policy: ScalePolicy::Fixed,
        },
    ];

    let rt = Builder::new_multi_thread().enable_all().build().unwrap();

    for (name, yields) in [("pool/noop", false), ("pool/yielding", true)] {
        let mut group = c.benchmark_group(name);
        group.throughput(Throughput::Elements(TASKS));

        for params in cases {
            group.bench_function(
                format!(
                    "workers/{}-{}/cap/{}/policy/{:?}",
                    params.initial_workers,
                    params.max_workers,
                    params.queue_capacity,
                    params.scale_policy
                ),
                |b| {
                    b.to_async(&rt).iter_custom(|iters| async move {
                        let mut total = Duration::ZERO;
                        for _ in 0..iters {
                            total += if yields {
                                submit_and_drain(params, yielding).await
                            } else {
                                submit_and_drain(params, noop).await
                            };
                        }
                        total
                    });
                },
            );
        }

        group.finish();
    }
}

criterion_group!(benches, bench_pool);
criterion_main!(benches);
