use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use resource_pool::storage::{derive_key, MemoryBackend};
use resource_pool::{PoolConfiguration, PoolController, ResourceDescriptor, ResourcePool};
use std::sync::Arc;
use tokio::runtime::Runtime;

fn create_descriptors(count: usize) -> Vec<ResourceDescriptor> {
    (0..count)
        .map(|_| {
            let content: [u8; 32] = rand::random();
            ResourceDescriptor::of(&content)
        })
        .collect()
}

/// Store every other descriptor so batches are half matched
fn populated_pool(descriptors: &[ResourceDescriptor]) -> ResourcePool {
    let backend = Arc::new(MemoryBackend::new());
    for descriptor in descriptors.iter().step_by(2) {
        backend.insert_raw(derive_key(&descriptor.checksum), vec![0u8; descriptor.size as usize]);
    }
    ResourcePool::with_backend(&PoolConfiguration::for_tests(1024), backend)
}

fn bench_derive_key(c: &mut Criterion) {
    let descriptor = create_descriptors(1).remove(0);
    c.bench_function("derive_key", |b| {
        b.iter(|| derive_key(black_box(&descriptor.checksum)))
    });
}

fn bench_blocking_match(c: &mut Criterion) {
    let mut group = c.benchmark_group("match_resources_blocking");

    for size in [10, 100, 1000] {
        let descriptors = create_descriptors(size);
        let pool = populated_pool(&descriptors);

        group.bench_with_input(BenchmarkId::from_parameter(size), &descriptors, |b, descriptors| {
            b.iter(|| black_box(pool.match_resources(descriptors).unwrap()))
        });
    }

    group.finish();
}

fn bench_bridged_match(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let mut group = c.benchmark_group("match_resources_bridged");

    for workers in [1, 4] {
        let descriptors = create_descriptors(1000);
        let pool = populated_pool(&descriptors);
        let controller = rt.block_on(async { PoolController::with_pool(pool, workers).unwrap() });

        group.bench_with_input(BenchmarkId::new("workers", workers), &descriptors, |b, descriptors| {
            b.to_async(&rt).iter(|| async {
                black_box(controller.match_resources(descriptors.clone()).await.unwrap())
            })
        });
    }

    group.finish();
}

fn bench_add_resource(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let controller = rt.block_on(async {
        PoolController::start(&PoolConfiguration::for_tests(64 * 1024).with_worker_threads(4)).unwrap()
    });
    let content: Vec<u8> = (0..16 * 1024).map(|i| (i % 251) as u8).collect();
    let descriptor = ResourceDescriptor::of(&content);

    c.bench_function("add_resource_16k", |b| {
        b.to_async(&rt).iter(|| async {
            let stored = controller
                .add_resource(std::io::Cursor::new(content.clone()), descriptor)
                .await
                .unwrap();
            black_box(stored)
        })
    });
}

criterion_group!(
    benches,
    bench_derive_key,
    bench_blocking_match,
    bench_bridged_match,
    bench_add_resource
);
criterion_main!(benches);
