//! Criterion benchmark of pool overhead: concurrent checkouts, one-statement queries, and
//! nested transactions, all against the in-memory recording driver so only the pool and
//! transaction bookkeeping is measured.

use std::hint::black_box;
use std::sync::LazyLock;
use std::time::{Duration, Instant};

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use sql_scoped::prelude::*;
use sql_scoped::test_utils::{RecordingDriver, test_pool_options};
use tokio::runtime::Runtime;
use tokio::task::JoinSet;

static TOKIO_RUNTIME: LazyLock<Runtime> =
    LazyLock::new(|| Runtime::new().expect("failed to build tokio runtime for benchmarks"));

static BENCH_CONCURRENCY: LazyLock<usize> = LazyLock::new(|| {
    std::env::var("BENCH_CONCURRENCY")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(8)
});

fn build_pool(driver: &RecordingDriver) -> ConnectionPool<RecordingDriver> {
    let _guard = TOKIO_RUNTIME.enter();
    ConnectionPool::with_options(driver.clone(), "recording://", test_pool_options())
}

async fn parallel_checkout(
    pool: &ConnectionPool<RecordingDriver>,
    concurrency: usize,
) -> Result<(), SqlScopedError> {
    let mut join_set = JoinSet::new();
    for _ in 0..concurrency.max(1) {
        let pool = pool.clone();
        join_set.spawn(async move {
            let lease = pool.acquire().await?;
            drop(lease);
            Ok::<(), SqlScopedError>(())
        });
    }
    while let Some(outcome) = join_set.join_next().await {
        outcome.expect("checkout worker panicked")?;
    }
    Ok(())
}

async fn parallel_query(
    pool: &ConnectionPool<RecordingDriver>,
    concurrency: usize,
) -> Result<(), SqlScopedError> {
    let mut join_set = JoinSet::new();
    for id in 0..concurrency.max(1) {
        let pool = pool.clone();
        join_set.spawn(async move {
            let result = pool
                .run_query(
                    None,
                    "select id, name from cities where id = $1",
                    &[SqlValue::from(id as i64)],
                )
                .await?;
            black_box(result);
            Ok::<(), SqlScopedError>(())
        });
    }
    while let Some(outcome) = join_set.join_next().await {
        outcome.expect("query worker panicked")?;
    }
    Ok(())
}

async fn nested_transaction(pool: &ConnectionPool<RecordingDriver>) -> Result<(), SqlScopedError> {
    pool.transaction(None, TransactionOptions::default(), |tx| {
        Box::pin(async move {
            tx.run_query("insert into cities (name) values ('Oslo')", &[])
                .await?;
            tx.transaction(TransactionOptions::default(), |inner| {
                Box::pin(async move {
                    inner
                        .run_query("insert into cities (name) values ('Lima')", &[])
                        .await?;
                    Ok::<(), SqlScopedError>(())
                })
            })
            .await
        })
    })
    .await
}

fn pool_checkout(c: &mut Criterion) {
    let concurrency = *BENCH_CONCURRENCY;
    let runtime = &*TOKIO_RUNTIME;
    let driver = RecordingDriver::new();
    let pool = build_pool(&driver);

    let mut group = c.benchmark_group("pool_checkout");
    group.throughput(Throughput::Elements(concurrency as u64));

    group.bench_function(BenchmarkId::new("parallel_checkout", concurrency), |b| {
        let pool = pool.clone();
        b.to_async(runtime).iter_custom(move |iters| {
            let pool = pool.clone();
            async move {
                let mut total = Duration::default();
                for _ in 0..iters {
                    let start = Instant::now();
                    parallel_checkout(&pool, concurrency)
                        .await
                        .expect("parallel checkout");
                    total += start.elapsed();
                }
                total
            }
        });
    });

    group.bench_function(BenchmarkId::new("parallel_query", concurrency), |b| {
        let pool = pool.clone();
        let driver = driver.clone();
        b.to_async(runtime).iter_custom(move |iters| {
            let pool = pool.clone();
            let driver = driver.clone();
            async move {
                let mut total = Duration::default();
                for _ in 0..iters {
                    let start = Instant::now();
                    parallel_query(&pool, concurrency)
                        .await
                        .expect("parallel query");
                    total += start.elapsed();
                    driver.clear();
                }
                total
            }
        });
    });

    group.bench_function("nested_transaction", |b| {
        let pool = pool.clone();
        let driver = driver.clone();
        b.to_async(runtime).iter_custom(move |iters| {
            let pool = pool.clone();
            let driver = driver.clone();
            async move {
                let mut total = Duration::default();
                for _ in 0..iters {
                    let start = Instant::now();
                    nested_transaction(&pool)
                        .await
                        .expect("nested transaction");
                    total += start.elapsed();
                    driver.clear();
                }
                total
            }
        });
    });

    group.finish();
}

criterion_group!(benches, pool_checkout);
criterion_main!(benches);
