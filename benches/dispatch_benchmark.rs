//! Performance benchmarks for a3s-lift
//!
//! Run with: cargo bench

use a3s_lift::{Controller, FleetConfig, FleetMetrics, FloorRequest, QueuedRequest, RequestQueue};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;

/// Zero travel time so only dispatch and queue overhead is measured
fn instant_fleet(cars: usize) -> FleetConfig {
    FleetConfig::new(cars, 50).with_travel(a3s_lift::TravelConfig::fixed(Duration::ZERO))
}

fn request(i: usize) -> (i32, i32) {
    ((i * 7 % 51) as i32, (i * 13 % 51) as i32)
}

fn bench_request_throughput(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    let mut group = c.benchmark_group("request_throughput");

    for size in [10, 100, 1000].iter() {
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.to_async(&rt).iter(|| async move {
                let controller = Controller::builder(instant_fleet(4)).build().unwrap();
                controller.start().await.unwrap();

                for i in 0..size {
                    let (source, destination) = request(i);
                    controller
                        .request_elevator(source, destination)
                        .await
                        .unwrap();
                }

                controller.drain(Duration::from_secs(5)).await.unwrap();
                controller.shutdown().await;
            });
        });
    }

    group.finish();
}

fn bench_fleet_size(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    let mut group = c.benchmark_group("fleet_size");

    for cars in [1, 4, 16, 64].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(cars), cars, |b, &cars| {
            b.to_async(&rt).iter(|| async move {
                let controller = Arc::new(Controller::builder(instant_fleet(cars)).build().unwrap());
                controller.start().await.unwrap();

                let callers: Vec<_> = (0..100)
                    .map(|i| {
                        let controller = Arc::clone(&controller);
                        tokio::spawn(async move {
                            let (source, destination) = request(i);
                            controller.request_elevator(source, destination).await
                        })
                    })
                    .collect();
                for caller in callers {
                    caller.await.unwrap().unwrap();
                }

                controller.drain(Duration::from_secs(5)).await.unwrap();
                controller.shutdown().await;
            });
        });
    }

    group.finish();
}

fn bench_nearest_pop(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    let mut group = c.benchmark_group("nearest_pop");

    for depth in [10, 100, 1000].iter() {
        group.throughput(Throughput::Elements(*depth as u64));
        group.bench_with_input(BenchmarkId::from_parameter(depth), depth, |b, &depth| {
            b.to_async(&rt).iter(|| async move {
                let queue = RequestQueue::new();
                for i in 0..depth {
                    let (source, destination) = request(i);
                    queue
                        .enqueue(QueuedRequest::new(FloorRequest::new(source, destination)))
                        .await;
                }

                let mut floor = 0;
                while let Some(next) = queue.pop_nearest(floor).await {
                    floor = next.request.destination_floor;
                }
            });
        });
    }

    group.finish();
}

fn bench_metrics_overhead(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    let mut group = c.benchmark_group("metrics_overhead");

    // Without metrics
    group.bench_function("without_metrics", |b| {
        b.to_async(&rt).iter(|| async {
            let controller = Controller::builder(instant_fleet(4)).build().unwrap();
            controller.start().await.unwrap();

            for i in 0..100 {
                let (source, destination) = request(i);
                controller
                    .request_elevator(source, destination)
                    .await
                    .unwrap();
            }

            controller.drain(Duration::from_secs(5)).await.unwrap();
            controller.shutdown().await;
        });
    });

    // With metrics
    group.bench_function("with_metrics", |b| {
        b.to_async(&rt).iter(|| async {
            let controller = Controller::builder(instant_fleet(4))
                .with_metrics(FleetMetrics::local())
                .build()
                .unwrap();
            controller.start().await.unwrap();

            for i in 0..100 {
                let (source, destination) = request(i);
                controller
                    .request_elevator(source, destination)
                    .await
                    .unwrap();
            }

            controller.drain(Duration::from_secs(5)).await.unwrap();
            controller.shutdown().await;
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_request_throughput,
    bench_fleet_size,
    bench_nearest_pop,
    bench_metrics_overhead
);
criterion_main!(benches);
