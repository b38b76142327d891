//! Observability features example
//!
//! This example demonstrates:
//! - Metrics collection
//! - Wait and trip time histograms with percentiles
//! - Fleet backlog monitoring
//! - A custom notification sink

use a3s_lift::{
    metric_names, CarEvent, CarId, Controller, FleetConfig, FleetMetrics, FleetMonitor,
    MonitorConfig, NotificationSink, Result, TravelConfig,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Counts direction changes across the fleet
#[derive(Default)]
struct DirectionCounter {
    changes: AtomicUsize,
}

impl NotificationSink for DirectionCounter {
    fn notify(&self, car_id: CarId, event: &CarEvent) -> Result<()> {
        if let CarEvent::DirectionChanged { from, to } = event {
            self.changes.fetch_add(1, Ordering::SeqCst);
            println!("  ↕ car {}: {:?} → {:?}", car_id, from, to);
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    println!("=== A3S Lift: Observability Features Example ===\n");

    // Create metrics collector
    let metrics = FleetMetrics::local();
    let directions = Arc::new(DirectionCounter::default());

    let config = FleetConfig::new(2, 30)
        .with_travel(TravelConfig::per_floor(Duration::from_millis(20)));
    let controller = Arc::new(
        Controller::builder(config)
            .with_metrics(metrics.clone())
            .with_sink(directions.clone())
            .build()?,
    );

    // Warn as soon as a car has more than 3 rides waiting
    let monitor = Arc::new(FleetMonitor::with_config(
        Arc::clone(&controller),
        MonitorConfig {
            interval: Duration::from_millis(100),
            pending_warning_threshold: 3,
            total_pending_threshold: 6,
        },
    ));
    let monitor_task = Arc::clone(&monitor).start();

    controller.start().await?;
    println!("✓ Fleet started with metrics and monitoring\n");

    // Example 1: A burst of rides
    println!("=== Example 1: Burst of Requests ===");
    let rides = [
        (0, 30),
        (12, 4),
        (25, 1),
        (7, 19),
        (3, 3),
        (29, 15),
        (18, 0),
        (10, 22),
    ];
    for (source, destination) in rides {
        controller.request_elevator(source, destination).await?;
    }
    let _ = controller.request_elevator(31, 0).await;
    println!("Submitted {} rides (plus one invalid)", rides.len());

    let report = monitor.check_health().await;
    println!(
        "Health: {} pending, overloaded cars {:?}\n",
        report.total_pending, report.overloaded_cars
    );

    controller.drain(Duration::from_secs(60)).await?;

    // Display metrics
    println!("\n=== Metrics Summary ===");
    let snapshot = metrics.snapshot().await;

    for name in [
        metric_names::REQUESTS_SUBMITTED,
        metric_names::REQUESTS_REJECTED,
        metric_names::REQUESTS_SERVED,
        metric_names::LEGS_COMPLETED,
    ] {
        println!("{}: {}", name, snapshot.counters.get(name).unwrap_or(&0));
    }

    for name in [metric_names::WAIT_TIME, metric_names::TRIP_TIME] {
        if let Some(stats) = snapshot.histograms.get(name) {
            println!("\n{}:", name);
            println!("  Count: {}", stats.count);
            println!("  Min: {:.2}ms", stats.min);
            println!("  Max: {:.2}ms", stats.max);
            println!("  Mean: {:.2}ms", stats.mean);
            println!("  p50: {:.2}ms", stats.p50);
            println!("  p90: {:.2}ms", stats.p90);
            println!("  p99: {:.2}ms", stats.p99);
        }
    }

    // Example 2: Per-car metrics
    println!("\n=== Example 2: Per-Car Metrics ===");
    for car in controller.cars() {
        let key = format!("{}.{}", metric_names::REQUESTS_SERVED, car.id());
        println!(
            "Car {} served {}",
            car.id(),
            snapshot.counters.get(&key).unwrap_or(&0)
        );
    }
    println!(
        "Direction changes seen by sink: {}",
        directions.changes.load(Ordering::SeqCst)
    );

    // Graceful shutdown
    println!("\n=== Shutting Down ===");
    controller.shutdown().await;
    monitor_task.await?;
    println!("✓ Shutdown complete");

    Ok(())
}
