//! Fleet dispatch example
//!
//! This example demonstrates the basic usage of a3s-lift:
//! - Building a three-car fleet for a 20-floor building
//! - Requesting rides and seeing which car takes each one
//! - Following car movement through the event stream
//! - Shutting down and reading the report

use a3s_lift::{events, CarEvent, Controller, DispatchError, FleetConfig, TravelConfig};
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    println!("=== A3S Lift: Fleet Dispatch Example ===\n");

    let config = FleetConfig::new(3, 20)
        .with_travel(TravelConfig::fixed(Duration::from_millis(200)));
    let controller = Controller::builder(config).build()?;
    println!("✓ Fleet created with {} cars", controller.cars().len());

    // Print every completed ride as it happens
    let mut served = controller.subscribe_filtered(|e| e.key == events::CAR_REQUEST_SERVED);
    let printer = tokio::spawn(async move {
        while let Some(event) = served.recv().await {
            if let (Some(car_id), Some(CarEvent::RequestServed { request, .. })) =
                (event.car_id, event.event)
            {
                println!(
                    "  ✓ Car {} delivered {} → {}",
                    car_id, request.source_floor, request.destination_floor
                );
            }
        }
    });

    controller.start().await?;
    println!("✓ Cars started\n");

    println!("Requesting rides...");
    for (source, destination) in [(5, 10), (3, 7), (8, 2), (1, 9)] {
        let car_id = controller.request_elevator(source, destination).await?;
        println!("  → {} to {} assigned to car {}", source, destination, car_id);
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    // Floors outside the building are rejected before any car sees them
    match controller.request_elevator(4, 25).await {
        Err(DispatchError::InvalidFloor { floor, top_floor }) => {
            println!("  ✗ Floor {} rejected (building has 0..={})", floor, top_floor)
        }
        other => println!("  ? Unexpected result: {:?}", other),
    }

    println!("\nWaiting for the fleet to finish...");
    controller.drain(Duration::from_secs(30)).await?;

    println!("\n=== Fleet Status ===");
    let stats = controller.stats().await;
    for car in &stats.cars {
        println!(
            "Car {}: floor {}, {:?}, served {}",
            car.id, car.current_floor, car.direction, car.served
        );
    }
    println!("Total served: {}", stats.total_served);

    println!("\n=== Shutting Down ===");
    let report = controller.shutdown().await;
    println!("✓ Shutdown complete, {} requests dropped", report.total_dropped());

    printer.abort();
    Ok(())
}
