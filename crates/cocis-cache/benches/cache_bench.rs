//! Instance cache benchmarks
//!
//! Run with: cargo bench --package cocis-cache

use cocis_cache::InstanceCache;
use cocis_types::{CacheKey, Params};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::sync::Arc;

fn bench_hit_path(c: &mut Criterion) {
    let cache: InstanceCache<CacheKey, Arc<u64>> = InstanceCache::new();
    let key = CacheKey::derive("bench", &Params::new().with("n", 1));
    cache.get_or_create(key, || Ok(Arc::new(1))).unwrap();

    c.bench_function("cache_hit", |b| {
        b.iter(|| {
            cache
                .get_or_create(black_box(key), || unreachable!("entry is committed"))
                .unwrap()
        });
    });
}

fn bench_fill(c: &mut Criterion) {
    c.bench_function("cache_fill_1k", |b| {
        b.iter(|| {
            let cache: InstanceCache<u64, Arc<u64>> = InstanceCache::with_capacity(1024);
            for i in 0..1024u64 {
                cache.get_or_create(i, || Ok(Arc::new(i))).unwrap();
            }
            black_box(cache.len())
        });
    });
}

fn bench_key_derivation(c: &mut Criterion) {
    let params = Params::new().with("host", "db").with("port", 5432).with("tls", true);
    c.bench_function("cache_key_derive", |b| {
        b.iter(|| CacheKey::derive(black_box("pool-connection"), black_box(&params)));
    });
}

criterion_group!(benches, bench_hit_path, bench_fill, bench_key_derivation);
criterion_main!(benches);
