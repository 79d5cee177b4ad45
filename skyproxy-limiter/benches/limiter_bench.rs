//! Criterion benchmarks for limiter `consume`: single hot client and many clients.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use skyproxy_core::SystemClock;
use skyproxy_limiter::{build_limiter, RateLimitConfig, RateLimitPolicy};

fn bench_consume(c: &mut Criterion) {
    let mut g = c.benchmark_group("consume");
    g.throughput(Throughput::Elements(1));

    for policy in [RateLimitPolicy::FixedWindow, RateLimitPolicy::TokenBucket] {
        let config = RateLimitConfig::per_window(u32::MAX, 60).with_policy(policy);
        let limiter = build_limiter(&config, SystemClock::shared()).unwrap();
        g.bench_function(format!("{}_hot_client", policy), |b| {
            b.iter(|| black_box(limiter.consume("203.0.113.7")));
        });
    }
    g.finish();
}

fn bench_many_clients(c: &mut Criterion) {
    let config = RateLimitConfig::per_window(60, 60);
    let limiter = build_limiter(&config, SystemClock::shared()).unwrap();
    let clients: Vec<String> = (0..10_000).map(|i| format!("10.0.{}.{}", i / 256, i % 256)).collect();

    let mut g = c.benchmark_group("consume_spread");
    g.throughput(Throughput::Elements(clients.len() as u64));
    g.bench_function("fixed_window_10k_clients", |b| {
        b.iter(|| {
            for client in &clients {
                black_box(limiter.consume(client));
            }
        });
    });
    g.finish();
}

criterion_group!(benches, bench_consume, bench_many_clients);
criterion_main!(benches);
