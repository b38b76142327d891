//! Fleet controller: owns the cars, runs their loops, accepts requests

use crate::car::{Car, CarId, CarStatus, Floor};
use crate::config::FleetConfig;
use crate::dispatcher::{Assignment, Dispatcher};
use crate::error::{DispatchError, Result};
use crate::event::{events, EventEmitter, EventStream, FleetEvent, NotificationSink};
#[cfg(feature = "metrics")]
use crate::metrics::FleetMetrics;
use crate::queue::FloorRequest;
#[cfg(feature = "telemetry")]
use crate::telemetry;
use crate::FleetStats;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;

/// Outcome of stopping the fleet
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShutdownReport {
    /// Pending requests discarded, per car
    pub dropped: BTreeMap<CarId, usize>,
    /// Cars whose loop was still running at the deadline and was aborted
    pub aborted: Vec<CarId>,
    /// Cars whose loop had died from a broken invariant
    pub panicked: Vec<CarId>,
    /// Requests in flight on aborted or panicked cars, never completed
    pub interrupted: usize,
}

impl ShutdownReport {
    /// Total pending requests discarded
    pub fn total_dropped(&self) -> usize {
        self.dropped.values().sum()
    }
}

/// Elevator fleet controller
///
/// Constructed through [`ControllerBuilder`]; the fleet is fixed once built.
pub struct Controller {
    config: FleetConfig,
    dispatcher: Dispatcher,
    emitter: EventEmitter,
    #[cfg(feature = "metrics")]
    metrics: Option<FleetMetrics>,
    shutdown_tx: watch::Sender<bool>,
    is_shutting_down: AtomicBool,
    /// Held for reading while a request is being enqueued; `stop` takes it
    /// for writing so no enqueue can land after the queues are drained.
    accepting: RwLock<()>,
    started: AtomicBool,
    handles: Mutex<Vec<(CarId, JoinHandle<()>)>>,
}

impl Controller {
    /// Start a builder for the given configuration
    pub fn builder(config: FleetConfig) -> ControllerBuilder {
        ControllerBuilder::new(config)
    }

    /// Launch every car's service loop. Must be called exactly once.
    pub async fn start(&self) -> Result<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(DispatchError::AlreadyStarted);
        }
        if self.is_shutting_down() {
            return Err(DispatchError::ShutdownInProgress);
        }

        tracing::info!(cars = self.dispatcher.cars().len(), "Starting elevator fleet");
        let mut handles = self.handles.lock().await;
        for car in self.dispatcher.cars() {
            let handle = car.run(self.shutdown_tx.subscribe())?;
            handles.push((car.id(), handle));
        }
        self.emitter.emit(FleetEvent::fleet(events::FLEET_STARTED));
        Ok(())
    }

    /// Request a ride, returning the id of the car that will serve it
    pub async fn request_elevator(
        &self,
        source_floor: Floor,
        destination_floor: Floor,
    ) -> Result<CarId> {
        let assignment = self
            .dispatch(FloorRequest::new(source_floor, destination_floor))
            .await?;
        Ok(assignment.car_id)
    }

    /// Validate a request and hand it to the dispatcher
    pub async fn dispatch(&self, request: FloorRequest) -> Result<Assignment> {
        if self.is_shutting_down() {
            return Err(DispatchError::ShutdownInProgress);
        }
        if let Err(err) = self.validate(&request) {
            #[cfg(feature = "metrics")]
            if let Some(metrics) = &self.metrics {
                metrics.record_rejected().await;
            }
            #[cfg(feature = "telemetry")]
            telemetry::record_rejected();
            return Err(err);
        }

        let assignment = {
            let _accepting = self.accepting.read().await;
            if self.is_shutting_down() {
                return Err(DispatchError::ShutdownInProgress);
            }
            self.dispatcher.assign(request).await?
        };

        #[cfg(feature = "metrics")]
        if let Some(metrics) = &self.metrics {
            metrics.record_submit(assignment.car_id).await;
        }
        #[cfg(feature = "telemetry")]
        telemetry::record_submit(assignment.car_id);

        Ok(assignment)
    }

    fn validate(&self, request: &FloorRequest) -> Result<()> {
        for floor in [request.source_floor, request.destination_floor] {
            if !self.config.contains_floor(floor) {
                return Err(DispatchError::InvalidFloor {
                    floor,
                    top_floor: self.config.top_floor,
                });
            }
        }
        Ok(())
    }

    /// Status of one car
    pub async fn status(&self, car_id: CarId) -> Result<CarStatus> {
        let car = self.car(car_id)?;
        Ok(car.status().await)
    }

    /// Look up a car by id
    pub fn car(&self, car_id: CarId) -> Result<&Arc<Car>> {
        self.dispatcher
            .cars()
            .iter()
            .find(|car| car.id() == car_id)
            .ok_or(DispatchError::CarNotFound(car_id))
    }

    /// Cars in id order
    pub fn cars(&self) -> &[Arc<Car>] {
        self.dispatcher.cars()
    }

    /// Get fleet statistics
    pub async fn stats(&self) -> FleetStats {
        let mut stats = FleetStats::default();
        for car in self.dispatcher.cars() {
            let status = car.status().await;
            stats.total_pending += status.pending;
            stats.total_served += status.served;
            if status.phase != crate::car::CarPhase::Idle {
                stats.moving_cars += 1;
            }
            stats.cars.push(status);
        }
        stats
    }

    /// Get the fleet configuration
    pub fn config(&self) -> &FleetConfig {
        &self.config
    }

    /// Get the metrics collector (if configured)
    #[cfg(feature = "metrics")]
    pub fn metrics(&self) -> Option<&FleetMetrics> {
        self.metrics.as_ref()
    }

    /// Subscribe to all fleet events
    pub fn subscribe_stream(&self) -> EventStream {
        self.emitter.subscribe_stream()
    }

    /// Subscribe to filtered fleet events
    pub fn subscribe_filtered(
        &self,
        filter: impl Fn(&FleetEvent) -> bool + Send + Sync + 'static,
    ) -> EventStream {
        self.emitter.subscribe_filtered(filter)
    }

    /// Check if shutdown is in progress
    pub fn is_shutting_down(&self) -> bool {
        self.is_shutting_down.load(Ordering::SeqCst)
    }

    /// Wait until every accepted request has been served (with timeout).
    ///
    /// Requests dropped by a shutdown count as settled.
    pub async fn drain(&self, timeout: Duration) -> Result<()> {
        let start = tokio::time::Instant::now();

        loop {
            if self.dispatcher.cars().iter().all(|car| car.is_drained()) {
                return Ok(());
            }

            if start.elapsed() >= timeout {
                return Err(DispatchError::Timeout(timeout));
            }

            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Stop every car after its current request and wait for the loops.
    ///
    /// Requests that were queued but not started are dropped and counted in
    /// the report.
    pub async fn shutdown(&self) -> ShutdownReport {
        self.stop(None).await
    }

    /// Like [`Controller::shutdown`], but abort loops still busy after `timeout`.
    pub async fn shutdown_with_timeout(&self, timeout: Duration) -> ShutdownReport {
        self.stop(Some(timeout)).await
    }

    async fn stop(&self, timeout: Option<Duration>) -> ShutdownReport {
        self.is_shutting_down.store(true, Ordering::SeqCst);
        // Wait out enqueues that passed the flag check before it was set.
        drop(self.accepting.write().await);
        self.emitter
            .emit(FleetEvent::fleet(events::FLEET_SHUTDOWN_STARTED));
        tracing::info!("Shutting down elevator fleet");
        self.shutdown_tx.send_replace(true);

        let mut report = ShutdownReport::default();
        let deadline = timeout.map(|t| tokio::time::Instant::now() + t);
        let handles = std::mem::take(&mut *self.handles.lock().await);

        for (car_id, mut handle) in handles {
            let joined = match deadline {
                Some(deadline) => {
                    match tokio::time::timeout_at(deadline, &mut handle).await {
                        Ok(joined) => joined,
                        Err(_) => {
                            handle.abort();
                            let _ = handle.await;
                            tracing::warn!(car_id, "car loop aborted at shutdown deadline");
                            report.aborted.push(car_id);
                            continue;
                        }
                    }
                }
                None => handle.await,
            };
            if let Err(err) = joined {
                if err.is_panic() {
                    tracing::error!(car_id, "car loop panicked");
                    report.panicked.push(car_id);
                }
            }
        }

        for car in self.dispatcher.cars() {
            let dropped = car.drain_pending().await.len();
            if dropped > 0 {
                tracing::info!(car_id = car.id(), dropped, "dropped pending requests");
            }
            #[cfg(feature = "metrics")]
            if let Some(metrics) = &self.metrics {
                metrics.record_dropped(car.id(), dropped).await;
            }
            report.dropped.insert(car.id(), dropped);

            let interrupted = car.settle_interrupted();
            if interrupted > 0 {
                tracing::warn!(car_id = car.id(), interrupted, "request in flight not completed");
            }
            report.interrupted += interrupted as usize;
        }

        self.emitter
            .emit(FleetEvent::fleet(events::FLEET_SHUTDOWN_COMPLETE));
        report
    }
}

/// Builder for [`Controller`]; the composition root of a fleet
pub struct ControllerBuilder {
    config: FleetConfig,
    extra_cars: Vec<Floor>,
    sinks: Vec<Arc<dyn NotificationSink>>,
    #[cfg(feature = "metrics")]
    metrics: Option<FleetMetrics>,
}

impl ControllerBuilder {
    /// Create a new builder
    pub fn new(config: FleetConfig) -> Self {
        Self {
            config,
            extra_cars: Vec::new(),
            sinks: Vec::new(),
            #[cfg(feature = "metrics")]
            metrics: None,
        }
    }

    /// Add a car starting at `floor`, numbered after the configured cars
    pub fn with_car_at(mut self, floor: Floor) -> Self {
        self.extra_cars.push(floor);
        self
    }

    /// Add an external notification sink
    pub fn with_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Add metrics collection
    #[cfg(feature = "metrics")]
    pub fn with_metrics(mut self, metrics: FleetMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Build the controller. Cars are created idle; call
    /// [`Controller::start`] to run them.
    pub fn build(self) -> Result<Controller> {
        self.config.validate()?;

        let start_floors = std::iter::repeat(0)
            .take(self.config.car_count)
            .chain(self.extra_cars.iter().copied());
        for floor in self.extra_cars.iter().copied() {
            if !self.config.contains_floor(floor) {
                return Err(DispatchError::ConfigError(format!(
                    "car start floor {} outside 0..={}",
                    floor, self.config.top_floor
                )));
            }
        }

        let emitter = EventEmitter::new(self.config.event_capacity);
        let mut cars = Vec::new();
        for (index, floor) in start_floors.enumerate() {
            let mut car = Car::new(index as CarId + 1, floor, &self.config)
                .with_sink(Arc::new(emitter.clone()));
            for sink in &self.sinks {
                car = car.with_sink(Arc::clone(sink));
            }
            #[cfg(feature = "metrics")]
            if let Some(metrics) = &self.metrics {
                car = car.with_metrics(metrics.clone());
            }
            cars.push(Arc::new(car));
        }
        if cars.is_empty() {
            tracing::warn!("Elevator fleet built without cars; requests will fail");
        }

        let (shutdown_tx, _) = watch::channel(false);
        Ok(Controller {
            config: self.config,
            dispatcher: Dispatcher::new(cars),
            emitter,
            #[cfg(feature = "metrics")]
            metrics: self.metrics,
            shutdown_tx,
            is_shutting_down: AtomicBool::new(false),
            accepting: RwLock::new(()),
            started: AtomicBool::new(false),
            handles: Mutex::new(Vec::new()),
        })
    }
}
