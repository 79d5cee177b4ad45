//! Criterion benchmarks for the single-flight cache: hit path and miss+store.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use skyproxy_cache::{CacheConfig, SingleFlightCache};
use skyproxy_core::FetchError;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn bench_hit(c: &mut Criterion) {
    let rt = runtime();
    let cache: SingleFlightCache<u64, FetchError> = SingleFlightCache::with_config(CacheConfig::default());
    rt.block_on(cache.get_or_fetch("w", || async { Ok(1) })).unwrap();

    let mut g = c.benchmark_group("cache_hit");
    g.throughput(Throughput::Elements(1));
    g.bench_function("get_or_fetch_fresh", |b| {
        b.iter(|| black_box(rt.block_on(cache.get_or_fetch("w", || async { Ok(2) }))).unwrap());
    });
    g.bench_function("peek", |b| {
        b.iter(|| black_box(cache.peek("w")));
    });
    g.finish();
}

fn bench_miss(c: &mut Criterion) {
    let rt = runtime();
    let cache: SingleFlightCache<u64, FetchError> = SingleFlightCache::with_config(CacheConfig::default());

    let mut g = c.benchmark_group("cache_miss");
    g.throughput(Throughput::Elements(1));
    g.bench_function("fetch_and_store", |b| {
        b.iter(|| {
            cache.clear();
            black_box(rt.block_on(cache.get_or_fetch("w", || async { Ok(3) }))).unwrap()
        });
    });
    g.finish();
}

criterion_group!(benches, bench_hit, bench_miss);
criterion_main!(benches);
