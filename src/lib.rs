//! # A3S Lift
//!
//! Dispatch core for a bank of elevator cars serving one building.
//!
//! ## Core (always compiled)
//!
//! - One async service loop per car, each with a private nearest-first queue
//! - Greedy dispatcher: nearest car wins, busy cars pay a one-floor penalty
//! - Floor validation before any car sees a request
//! - Event system for car movement and fleet lifecycle notifications
//! - Graceful shutdown reporting the requests left unserved
//!
//! ## Feature Flags
//!
//! | Feature | Default | Dependencies | Description |
//! |---------|---------|-------------|-------------|
//! | `metrics` | ✅ | — | `MetricsBackend` trait, `LocalMetrics`, wait and trip histograms |
//! | `monitoring` | ✅ | `metrics` | `FleetMonitor` with per-car and fleet backlog thresholds |
//! | `telemetry` | ✅ | `opentelemetry`, `dashmap` | OpenTelemetry instruments and `OtelMetricsBackend` |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use a3s_lift::{Controller, FleetConfig, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let controller = Controller::builder(FleetConfig::new(3, 20)).build()?;
//!     controller.start().await?;
//!
//!     let car_id = controller.request_elevator(5, 10).await?;
//!     println!("Car {} is on its way", car_id);
//!
//!     let report = controller.shutdown().await;
//!     println!("Dropped {} requests", report.total_dropped());
//!     Ok(())
//! }
//! ```

// Core modules (always compiled)
pub mod car;
pub mod config;
pub mod controller;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod queue;

// Feature-gated modules
#[cfg(feature = "metrics")]
pub mod metrics;
#[cfg(feature = "monitoring")]
pub mod monitor;
#[cfg(feature = "telemetry")]
pub mod telemetry;

// Core re-exports
pub use car::{Car, CarId, CarPhase, CarState, CarStatus, Direction, Floor};
pub use config::{FleetConfig, TravelConfig};
pub use controller::{Controller, ControllerBuilder, ShutdownReport};
pub use dispatcher::{score, Assignment, Dispatcher};
pub use error::{DispatchError, Result};
pub use event::{events, CarEvent, EventEmitter, EventStream, FleetEvent, NoopSink, NotificationSink};
pub use queue::{FloorRequest, QueuedRequest, RequestId, RequestQueue};

// Feature-gated re-exports
#[cfg(feature = "metrics")]
pub use metrics::{
    metric_names, FleetMetrics, HistogramStats, LocalMetrics, MetricsBackend, MetricsSnapshot,
};
#[cfg(feature = "monitoring")]
pub use monitor::{FleetMonitor, HealthReport, MonitorConfig};
#[cfg(feature = "telemetry")]
pub use telemetry::OtelMetricsBackend;

use serde::{Deserialize, Serialize};

/// Fleet statistics snapshot
///
/// Provides a point-in-time view across all cars. Each car's figures are
/// read separately, so the totals are not an atomic cut of the fleet.
///
/// # Fields
///
/// * `total_pending` - Requests waiting in car queues, excluding those in flight
/// * `total_served` - Requests carried to their destination since start
/// * `moving_cars` - Cars currently travelling a leg
/// * `cars` - Per-car status in id order
///
/// # Example
///
/// ```rust,ignore
/// let stats = controller.stats().await;
/// println!("{} pending, {} cars moving", stats.total_pending, stats.moving_cars);
///
/// for car in &stats.cars {
///     println!("car {} at floor {} ({:?})", car.id, car.current_floor, car.direction);
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FleetStats {
    pub total_pending: usize,
    pub total_served: u64,
    pub moving_cars: usize,
    pub cars: Vec<CarStatus>,
}
