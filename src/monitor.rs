//! Fleet monitor for tracking backlog and health

use crate::car::CarId;
use crate::controller::Controller;
use crate::FleetStats;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Fleet monitor configuration
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Monitoring interval
    pub interval: Duration,
    /// Warning threshold for pending requests on a single car
    pub pending_warning_threshold: usize,
    /// Warning threshold for pending requests across the fleet
    pub total_pending_threshold: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            pending_warning_threshold: 10,
            total_pending_threshold: 50,
        }
    }
}

/// Result of one health check
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    /// Cars whose backlog exceeds the per-car threshold
    pub overloaded_cars: Vec<CarId>,
    /// Pending requests across the fleet
    pub total_pending: usize,
    /// Whether the fleet-wide threshold was exceeded
    pub fleet_overloaded: bool,
}

impl HealthReport {
    /// No threshold exceeded
    pub fn is_healthy(&self) -> bool {
        self.overloaded_cars.is_empty() && !self.fleet_overloaded
    }
}

/// Fleet monitor
pub struct FleetMonitor {
    controller: Arc<Controller>,
    config: MonitorConfig,
}

impl FleetMonitor {
    /// Create a new fleet monitor
    pub fn new(controller: Arc<Controller>) -> Self {
        Self::with_config(controller, MonitorConfig::default())
    }

    /// Create a new fleet monitor with custom configuration
    pub fn with_config(controller: Arc<Controller>, config: MonitorConfig) -> Self {
        Self { controller, config }
    }

    /// Start monitoring. The task runs until the controller shuts down.
    pub fn start(self: Arc<Self>) -> JoinHandle<()> {
        let mut ticker = tokio::time::interval(self.config.interval);

        tokio::spawn(async move {
            loop {
                ticker.tick().await;
                if self.controller.is_shutting_down() {
                    break;
                }
                self.check_health().await;
            }
        })
    }

    /// Check fleet health, logging a warning for each exceeded threshold
    pub async fn check_health(&self) -> HealthReport {
        let stats = self.controller.stats().await;
        let mut report = HealthReport {
            total_pending: stats.total_pending,
            ..Default::default()
        };

        for car in &stats.cars {
            debug!(
                "Car {}: floor={}, phase={:?}, pending={}, served={}",
                car.id, car.current_floor, car.phase, car.pending, car.served
            );

            if car.pending > self.config.pending_warning_threshold {
                warn!(
                    "Car {} backlog is high: {} pending (threshold: {})",
                    car.id, car.pending, self.config.pending_warning_threshold
                );
                report.overloaded_cars.push(car.id);
            }
        }

        if stats.total_pending > self.config.total_pending_threshold {
            warn!(
                "High number of pending requests: {} (threshold: {})",
                stats.total_pending, self.config.total_pending_threshold
            );
            report.fleet_overloaded = true;
        }

        report
    }

    /// Get current statistics
    pub async fn stats(&self) -> FleetStats {
        self.controller.stats().await
    }
}
