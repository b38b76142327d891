//! Metrics collection for fleet observability.
//!
//! Metrics go through the pluggable [`MetricsBackend`] trait. [`LocalMetrics`]
//! keeps everything in memory; the `telemetry` feature adds an OpenTelemetry
//! backend.

use crate::car::CarId;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A pluggable metrics backend trait.
#[async_trait]
pub trait MetricsBackend: Send + Sync {
    /// Increment a counter metric by the given value
    async fn increment_counter(&self, name: &str, value: u64);

    /// Set a gauge metric to the given value
    async fn set_gauge(&self, name: &str, value: f64);

    /// Record a histogram observation (milliseconds for durations)
    async fn record_histogram(&self, name: &str, value: f64);

    /// Reset all metrics
    async fn reset(&self);

    /// Export all metrics as a snapshot. Push-only backends return an empty one.
    async fn snapshot(&self) -> MetricsSnapshot;

    /// Current counter value
    async fn get_counter(&self, name: &str) -> Option<u64> {
        self.snapshot().await.counters.get(name).copied()
    }

    /// Current gauge value
    async fn get_gauge(&self, name: &str) -> Option<f64> {
        self.snapshot().await.gauges.get(name).copied()
    }

    /// Histogram statistics
    async fn get_histogram_stats(&self, name: &str) -> Option<HistogramStats> {
        self.snapshot().await.histograms.remove(name)
    }
}

/// Statistics for a histogram metric
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HistogramStats {
    pub count: u64,
    pub sum: f64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub p50: f64,
    pub p90: f64,
    pub p99: f64,
}

impl HistogramStats {
    /// Compute statistics over recorded observations
    pub fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let count = sorted.len();
        let sum: f64 = sorted.iter().sum();
        let at = |p: f64| sorted[((count as f64 * p) as usize).min(count - 1)];
        Self {
            count: count as u64,
            sum,
            min: sorted[0],
            max: sorted[count - 1],
            mean: sum / count as f64,
            p50: at(0.50),
            p90: at(0.90),
            p99: at(0.99),
        }
    }
}

/// Snapshot of all metrics at a point in time
#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    pub counters: HashMap<String, u64>,
    pub gauges: HashMap<String, f64>,
    pub histograms: HashMap<String, HistogramStats>,
}

#[derive(Default)]
struct Recorded {
    counters: HashMap<String, u64>,
    gauges: HashMap<String, f64>,
    histograms: HashMap<String, Vec<f64>>,
}

/// In-memory metrics backend
#[derive(Default)]
pub struct LocalMetrics {
    recorded: RwLock<Recorded>,
}

impl LocalMetrics {
    /// Create a new local metrics instance
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetricsBackend for LocalMetrics {
    async fn increment_counter(&self, name: &str, value: u64) {
        let mut recorded = self.recorded.write().await;
        *recorded.counters.entry(name.to_string()).or_insert(0) += value;
    }

    async fn set_gauge(&self, name: &str, value: f64) {
        let mut recorded = self.recorded.write().await;
        recorded.gauges.insert(name.to_string(), value);
    }

    async fn record_histogram(&self, name: &str, value: f64) {
        let mut recorded = self.recorded.write().await;
        recorded
            .histograms
            .entry(name.to_string())
            .or_default()
            .push(value);
    }

    async fn reset(&self) {
        *self.recorded.write().await = Recorded::default();
    }

    async fn snapshot(&self) -> MetricsSnapshot {
        let recorded = self.recorded.read().await;
        MetricsSnapshot {
            counters: recorded.counters.clone(),
            gauges: recorded.gauges.clone(),
            histograms: recorded
                .histograms
                .iter()
                .map(|(name, values)| (name.clone(), HistogramStats::from_values(values)))
                .collect(),
        }
    }
}

/// Predefined metric names
///
/// Per-car variants append `.<car_id>`, e.g. `lift.requests.served.2`.
pub mod metric_names {
    /// Counter: requests accepted by the dispatcher
    pub const REQUESTS_SUBMITTED: &str = "lift.requests.submitted";
    /// Counter: requests rejected at validation
    pub const REQUESTS_REJECTED: &str = "lift.requests.rejected";
    /// Counter: requests completed
    pub const REQUESTS_SERVED: &str = "lift.requests.served";
    /// Counter: pending requests dropped at shutdown
    pub const REQUESTS_DROPPED: &str = "lift.requests.dropped";
    /// Counter: legs travelled
    pub const LEGS_COMPLETED: &str = "lift.legs.completed";

    /// Gauge: pending requests per car
    pub const QUEUE_DEPTH: &str = "lift.queue.depth";

    /// Histogram: submission to pickup (ms)
    pub const WAIT_TIME: &str = "lift.request.wait_time_ms";
    /// Histogram: pickup to drop-off (ms)
    pub const TRIP_TIME: &str = "lift.request.trip_time_ms";
}

/// Fleet metrics collector wrapping a backend
#[derive(Clone)]
pub struct FleetMetrics {
    backend: Arc<dyn MetricsBackend>,
}

impl FleetMetrics {
    /// Create a collector over the given backend
    pub fn new(backend: Arc<dyn MetricsBackend>) -> Self {
        Self { backend }
    }

    /// Create a collector with the in-memory backend
    pub fn local() -> Self {
        Self::new(Arc::new(LocalMetrics::new()))
    }

    /// Get the underlying metrics backend
    pub fn backend(&self) -> &Arc<dyn MetricsBackend> {
        &self.backend
    }

    async fn count(&self, name: &str, car_id: Option<CarId>, value: u64) {
        self.backend.increment_counter(name, value).await;
        if let Some(car_id) = car_id {
            self.backend
                .increment_counter(&format!("{}.{}", name, car_id), value)
                .await;
        }
    }

    /// Record an accepted request
    pub async fn record_submit(&self, car_id: CarId) {
        self.count(metric_names::REQUESTS_SUBMITTED, Some(car_id), 1)
            .await;
    }

    /// Record a request rejected at validation
    pub async fn record_rejected(&self) {
        self.count(metric_names::REQUESTS_REJECTED, None, 1).await;
    }

    /// Record a finished leg
    pub async fn record_leg(&self, car_id: CarId) {
        self.count(metric_names::LEGS_COMPLETED, Some(car_id), 1)
            .await;
    }

    /// Record a completed request with its wait and trip times
    pub async fn record_served(&self, car_id: CarId, wait_ms: f64, trip_ms: f64) {
        self.count(metric_names::REQUESTS_SERVED, Some(car_id), 1)
            .await;
        self.backend
            .record_histogram(metric_names::WAIT_TIME, wait_ms)
            .await;
        self.backend
            .record_histogram(metric_names::TRIP_TIME, trip_ms)
            .await;
    }

    /// Record requests dropped at shutdown
    pub async fn record_dropped(&self, car_id: CarId, dropped: usize) {
        if dropped > 0 {
            self.count(metric_names::REQUESTS_DROPPED, Some(car_id), dropped as u64)
                .await;
        }
    }

    /// Update a car's queue depth gauge
    pub async fn set_queue_depth(&self, car_id: CarId, depth: usize) {
        self.backend
            .set_gauge(
                &format!("{}.{}", metric_names::QUEUE_DEPTH, car_id),
                depth as f64,
            )
            .await;
    }

    /// Get a snapshot of all metrics
    pub async fn snapshot(&self) -> MetricsSnapshot {
        self.backend.snapshot().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_metrics_counter() {
        let metrics = LocalMetrics::new();
        assert_eq!(metrics.get_counter("c").await, None);

        metrics.increment_counter("c", 1).await;
        metrics.increment_counter("c", 5).await;
        assert_eq!(metrics.get_counter("c").await, Some(6));
    }

    #[tokio::test]
    async fn test_local_metrics_gauge() {
        let metrics = LocalMetrics::new();
        metrics.set_gauge("g", 42.5).await;
        metrics.set_gauge("g", 3.0).await;
        assert_eq!(metrics.get_gauge("g").await, Some(3.0));
    }

    #[tokio::test]
    async fn test_local_metrics_histogram() {
        let metrics = LocalMetrics::new();
        assert!(metrics.get_histogram_stats("h").await.is_none());

        for value in [10.0, 20.0, 30.0] {
            metrics.record_histogram("h", value).await;
        }

        let stats = metrics.get_histogram_stats("h").await.unwrap();
        assert_eq!(stats.count, 3);
        assert_eq!(stats.sum, 60.0);
        assert_eq!(stats.min, 10.0);
        assert_eq!(stats.max, 30.0);
        assert_eq!(stats.mean, 20.0);
    }

    #[test]
    fn test_histogram_percentiles() {
        let values: Vec<f64> = (1..=100).map(f64::from).collect();
        let stats = HistogramStats::from_values(&values);
        assert!((49.0..=51.0).contains(&stats.p50));
        assert!((89.0..=91.0).contains(&stats.p90));
        assert!((98.0..=100.0).contains(&stats.p99));
    }

    #[test]
    fn test_histogram_empty() {
        assert_eq!(HistogramStats::from_values(&[]), HistogramStats::default());
    }

    #[tokio::test]
    async fn test_local_metrics_reset() {
        let metrics = LocalMetrics::new();
        metrics.increment_counter("c", 10).await;
        metrics.set_gauge("g", 50.0).await;
        metrics.record_histogram("h", 100.0).await;

        metrics.reset().await;

        let snapshot = metrics.snapshot().await;
        assert!(snapshot.counters.is_empty());
        assert!(snapshot.gauges.is_empty());
        assert!(snapshot.histograms.is_empty());
    }

    #[tokio::test]
    async fn test_fleet_metrics_per_car_counters() {
        let metrics = FleetMetrics::local();
        metrics.record_submit(1).await;
        metrics.record_submit(1).await;
        metrics.record_submit(2).await;
        metrics.record_rejected().await;

        let snapshot = metrics.snapshot().await;
        assert_eq!(
            snapshot.counters.get(metric_names::REQUESTS_SUBMITTED),
            Some(&3)
        );
        assert_eq!(snapshot.counters.get("lift.requests.submitted.1"), Some(&2));
        assert_eq!(snapshot.counters.get("lift.requests.submitted.2"), Some(&1));
        assert_eq!(
            snapshot.counters.get(metric_names::REQUESTS_REJECTED),
            Some(&1)
        );
    }

    #[tokio::test]
    async fn test_fleet_metrics_served() {
        let metrics = FleetMetrics::local();
        metrics.record_served(3, 250.0, 500.0).await;
        metrics.record_served(3, 750.0, 500.0).await;

        let backend = metrics.backend();
        assert_eq!(backend.get_counter("lift.requests.served.3").await, Some(2));
        let wait = backend
            .get_histogram_stats(metric_names::WAIT_TIME)
            .await
            .unwrap();
        assert_eq!(wait.count, 2);
        assert_eq!(wait.mean, 500.0);
    }

    #[tokio::test]
    async fn test_fleet_metrics_dropped_and_depth() {
        let metrics = FleetMetrics::local();
        metrics.record_dropped(1, 0).await;
        metrics.record_dropped(2, 4).await;
        metrics.set_queue_depth(2, 7).await;

        let snapshot = metrics.snapshot().await;
        assert_eq!(snapshot.counters.get("lift.requests.dropped.1"), None);
        assert_eq!(snapshot.counters.get("lift.requests.dropped.2"), Some(&4));
        assert_eq!(snapshot.gauges.get("lift.queue.depth.2"), Some(&7.0));
    }

    #[test]
    fn test_metric_names_share_prefix() {
        for name in [
            metric_names::REQUESTS_SUBMITTED,
            metric_names::REQUESTS_REJECTED,
            metric_names::REQUESTS_SERVED,
            metric_names::REQUESTS_DROPPED,
            metric_names::LEGS_COMPLETED,
            metric_names::QUEUE_DEPTH,
            metric_names::WAIT_TIME,
            metric_names::TRIP_TIME,
        ] {
            assert!(name.starts_with("lift."), "{} should start with lift.", name);
        }
    }
}
