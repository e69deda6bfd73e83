//! Benchmarks for the resilience hot paths
//!
//! This benchmark measures:
//! - Token bucket acquire when tokens are available
//! - Circuit breaker admission checks
//! - Full Resilient::call overhead around a no-op operation
//! - Broadcast fan-out to in-process subscribers

use async_trait::async_trait;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use domain_pipeline::broadcast::{Broadcaster, Subscriber};
use domain_pipeline::resilience::{
    CircuitBreaker, CircuitBreakerConfig, RateLimiter, RateLimiterConfig, ResilienceConfig,
    Resilient, RetryPolicy,
};
use domain_pipeline::Error;
use std::sync::Arc;
use tokio::runtime::Runtime;

/// Subscriber that accepts and discards every message.
struct Sink(String);

#[async_trait]
impl Subscriber for Sink {
    fn id(&self) -> &str {
        &self.0
    }

    async fn send(&self, message: &str) -> domain_pipeline::Result<()> {
        black_box(message);
        Ok(())
    }
}

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap()
}

fn bench_rate_limiter(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("rate_limiter");

    // effectively unbounded so every acquire succeeds immediately
    let limiter = RateLimiter::new(RateLimiterConfig::new().with_capacity(1_000_000).with_rate(1e12));
    group.bench_function("acquire_available", |b| {
        b.to_async(&rt).iter(|| async { limiter.acquire_n(black_box(1)).await.unwrap() })
    });

    group.bench_function("try_acquire", |b| {
        b.to_async(&rt).iter(|| async { black_box(limiter.try_acquire(1).await) })
    });

    group.finish();
}

fn bench_circuit_breaker(c: &mut Criterion) {
    let mut group = c.benchmark_group("circuit_breaker");
    let breaker = CircuitBreaker::new("bench", CircuitBreakerConfig::new());

    group.bench_function("allow_closed", |b| {
        b.iter(|| {
            black_box(breaker.allow()).unwrap();
            breaker.on_success();
        })
    });

    let open = CircuitBreaker::new("bench-open", CircuitBreakerConfig::new().with_max_failures(1));
    open.on_failure();
    group.bench_function("reject_open", |b| b.iter(|| black_box(open.allow()).unwrap_err()));

    group.finish();
}

fn bench_resilient_call(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("resilient_call");
    let resilient = Resilient::new(
        "bench",
        ResilienceConfig::new()
            .with_rate_limit(RateLimiterConfig::new().with_capacity(1_000_000).with_rate(1e12))
            .with_retry(RetryPolicy::none()),
    );

    group.bench_function("noop_success", |b| {
        b.to_async(&rt).iter(|| async {
            resilient
                .call(|| async { Ok::<_, Error>(black_box(7u32)) })
                .await
                .unwrap()
        })
    });

    group.finish();
}

fn bench_broadcast(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("broadcast");

    for subscribers in [1usize, 16, 128] {
        let broadcaster = Broadcaster::new();
        rt.block_on(async {
            for i in 0..subscribers {
                broadcaster.connect(Arc::new(Sink(format!("sink-{i}")))).await;
            }
        });
        group.throughput(Throughput::Elements(subscribers as u64));
        group.bench_function(format!("fan_out_{subscribers}"), |b| {
            b.to_async(&rt)
                .iter(|| async { black_box(broadcaster.broadcast(r#"{"type":"tick"}"#).await) })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_rate_limiter,
    bench_circuit_breaker,
    bench_resilient_call,
    bench_broadcast
);
criterion_main!(benches);
