//! OpenTelemetry telemetry for the elevator fleet.
//!
//! Global instruments are recorded by the controller and car loops once
//! [`init_fleet_metrics`] has run; before that every `record_*` call is a
//! no-op. [`OtelMetricsBackend`] plugs OpenTelemetry into [`FleetMetrics`].
//!
//! [`FleetMetrics`]: crate::metrics::FleetMetrics

use crate::car::CarId;
use crate::metrics::{MetricsBackend, MetricsSnapshot};
use async_trait::async_trait;
use dashmap::DashMap;
use opentelemetry::global;
use opentelemetry::metrics::{Counter, Histogram, UpDownCounter};
use opentelemetry::KeyValue;
use std::sync::OnceLock;

/// Meter name
pub const METER_NAME: &str = "a3s-lift";

/// Car identifier attribute
pub const ATTR_CAR_ID: &str = "a3s.lift.car_id";

static METRICS: OnceLock<FleetInstruments> = OnceLock::new();

/// OpenTelemetry instruments for fleet-level observability.
pub struct FleetInstruments {
    /// Requests accepted by the dispatcher
    pub requests_submitted_total: Counter<u64>,
    /// Requests rejected at validation
    pub requests_rejected_total: Counter<u64>,
    /// Requests completed
    pub requests_served_total: Counter<u64>,
    /// Pickup to drop-off duration in seconds
    pub trip_duration_seconds: Histogram<f64>,
}

/// Get the global instruments (None if not initialized).
pub fn instruments() -> Option<&'static FleetInstruments> {
    METRICS.get()
}

/// Initialize fleet instruments using the global OpenTelemetry meter provider.
///
/// Only the first call takes effect.
pub fn init_fleet_metrics() {
    let meter = global::meter(METER_NAME);

    let instruments = FleetInstruments {
        requests_submitted_total: meter
            .u64_counter("a3s_lift_requests_submitted_total")
            .with_description("Requests assigned to a car")
            .init(),
        requests_rejected_total: meter
            .u64_counter("a3s_lift_requests_rejected_total")
            .with_description("Requests rejected for invalid floors")
            .init(),
        requests_served_total: meter
            .u64_counter("a3s_lift_requests_served_total")
            .with_description("Requests carried to their destination")
            .init(),
        trip_duration_seconds: meter
            .f64_histogram("a3s_lift_trip_duration_seconds")
            .with_description("Time from pickup to drop-off in seconds")
            .init(),
    };

    let _ = METRICS.set(instruments);
}

fn car_attr(car_id: CarId) -> KeyValue {
    KeyValue::new(ATTR_CAR_ID, i64::from(car_id))
}

/// Record an assigned request.
pub fn record_submit(car_id: CarId) {
    if let Some(m) = instruments() {
        m.requests_submitted_total.add(1, &[car_attr(car_id)]);
    }
}

/// Record a rejected request.
pub fn record_rejected() {
    if let Some(m) = instruments() {
        m.requests_rejected_total.add(1, &[]);
    }
}

/// Record a served request with its trip duration.
pub fn record_served(car_id: CarId, trip_secs: f64) {
    if let Some(m) = instruments() {
        let attr = car_attr(car_id);
        m.requests_served_total.add(1, std::slice::from_ref(&attr));
        m.trip_duration_seconds
            .record(trip_secs, std::slice::from_ref(&attr));
    }
}

/// OpenTelemetry implementation of the `MetricsBackend` trait.
///
/// Instruments are created lazily per metric name. OTLP is push-only, so
/// `snapshot` is always empty and the `get_*` reads return `None`.
pub struct OtelMetricsBackend {
    meter: opentelemetry::metrics::Meter,
    counters: DashMap<String, Counter<u64>>,
    histograms: DashMap<String, Histogram<f64>>,
    gauges: DashMap<String, (UpDownCounter<f64>, f64)>,
}

impl OtelMetricsBackend {
    /// Create a new backend using the global meter provider.
    pub fn new() -> Self {
        Self {
            meter: global::meter(METER_NAME),
            counters: DashMap::new(),
            histograms: DashMap::new(),
            gauges: DashMap::new(),
        }
    }

    fn counter(&self, name: &str) -> Counter<u64> {
        self.counters
            .entry(name.to_string())
            .or_insert_with(|| self.meter.u64_counter(name.to_string()).init())
            .clone()
    }

    fn histogram(&self, name: &str) -> Histogram<f64> {
        self.histograms
            .entry(name.to_string())
            .or_insert_with(|| self.meter.f64_histogram(name.to_string()).init())
            .clone()
    }
}

impl Default for OtelMetricsBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetricsBackend for OtelMetricsBackend {
    async fn increment_counter(&self, name: &str, value: u64) {
        self.counter(name).add(value, &[]);
    }

    async fn set_gauge(&self, name: &str, value: f64) {
        // Up-down counter fed with the delta from the last value set.
        let mut entry = self.gauges.entry(name.to_string()).or_insert_with(|| {
            (
                self.meter.f64_up_down_counter(name.to_string()).init(),
                0.0,
            )
        });
        let (gauge, last) = entry.value_mut();
        gauge.add(value - *last, &[]);
        *last = value;
    }

    async fn record_histogram(&self, name: &str, value: f64) {
        self.histogram(name).record(value, &[]);
    }

    async fn reset(&self) {}

    async fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_no_panic_without_init() {
        record_submit(1);
        record_rejected();
        record_served(2, 1.5);
    }

    #[test]
    fn test_attribute_convention() {
        assert!(ATTR_CAR_ID.starts_with("a3s.lift."));
        assert_eq!(METER_NAME, "a3s-lift");
    }

    #[test]
    fn test_init_is_idempotent() {
        init_fleet_metrics();
        init_fleet_metrics();
        assert!(instruments().is_some());
        record_submit(1);
        record_served(1, 0.5);
    }

    #[tokio::test]
    async fn test_otel_backend_reads_are_empty() {
        let backend = OtelMetricsBackend::new();
        backend.increment_counter("test.counter", 10).await;
        backend.record_histogram("test.latency", 42.5).await;
        backend.set_gauge("test.depth", 4.0).await;
        backend.set_gauge("test.depth", 1.0).await;

        assert_eq!(backend.get_counter("test.counter").await, None);
        assert_eq!(backend.get_gauge("test.depth").await, None);
        assert!(backend.get_histogram_stats("test.latency").await.is_none());
        assert!(backend.snapshot().await.counters.is_empty());
    }

    #[tokio::test]
    async fn test_otel_backend_tracks_last_gauge_value() {
        let backend = OtelMetricsBackend::default();
        backend.set_gauge("depth", 3.0).await;
        backend.set_gauge("depth", 5.0).await;
        assert_eq!(backend.gauges.get("depth").unwrap().1, 5.0);
    }

    #[tokio::test]
    async fn test_fleet_metrics_over_otel_backend() {
        let metrics = crate::metrics::FleetMetrics::new(std::sync::Arc::new(
            OtelMetricsBackend::new(),
        ));
        metrics.record_submit(1).await;
        metrics.record_served(1, 10.0, 20.0).await;
        assert!(metrics.snapshot().await.histograms.is_empty());
    }
}
