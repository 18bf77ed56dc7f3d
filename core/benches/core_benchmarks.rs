use criterion::{Criterion, black_box, criterion_group, criterion_main};

use verglas_core::pool::{GenHandle, GenerationalPool};

// ---------------------------------------------------------------------------
// Generational pool
// ---------------------------------------------------------------------------

fn bench_pool_allocate_free(c: &mut Criterion) {
    c.bench_function("pool_allocate_free_1024", |b| {
        let mut pool: GenerationalPool<u64> = GenerationalPool::new();
        let mut handles = Vec::with_capacity(1024);
        b.iter(|| {
            for i in 0..1024u64 {
                handles.push(pool.allocate(black_box(i)));
            }
            for handle in handles.drain(..) {
                pool.free(handle);
            }
        });
    });
}

fn bench_pool_lookup(c: &mut Criterion) {
    let mut pool: GenerationalPool<u64, String> = GenerationalPool::new();
    let handles: Vec<GenHandle> = (0..4096u64)
        .map(|i| pool.allocate_with_cold(i, format!("object {i}")))
        .collect();

    c.bench_function("pool_get_4096", |b| {
        b.iter(|| {
            let mut sum = 0u64;
            for handle in &handles {
                sum += pool.get(black_box(*handle)).copied().unwrap_or(0);
            }
            black_box(sum)
        });
    });

    c.bench_function("pool_get_stale", |b| {
        let stale = GenHandle::new(handles[7].index, handles[7].generation + 1);
        b.iter(|| black_box(pool.get(black_box(stale))));
    });
}

fn bench_pool_churn(c: &mut Criterion) {
    c.bench_function("pool_retire_recycle_256", |b| {
        let mut pool: GenerationalPool<u32> = GenerationalPool::new();
        b.iter(|| {
            let handles: Vec<GenHandle> = (0..256u32).map(|i| pool.allocate(i)).collect();
            for handle in &handles {
                pool.retire(*handle);
            }
            for handle in &handles {
                pool.recycle(handle.index);
            }
        });
    });
}

criterion_group!(
    benches,
    bench_pool_allocate_free,
    bench_pool_lookup,
    bench_pool_churn
);
criterion_main!(benches);
