//! Elevator car: position, direction, private queue and service loop

use crate::config::{FleetConfig, TravelConfig};
use crate::error::{DispatchError, Result};
use crate::event::{notify_all, CarEvent, NotificationSink};
#[cfg(feature = "metrics")]
use crate::metrics::FleetMetrics;
use crate::queue::{QueuedRequest, RequestQueue};
#[cfg(feature = "telemetry")]
use crate::telemetry;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Car identifier
pub type CarId = u32;

/// Floor number
pub type Floor = i32;

/// Direction label of a car
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
    Idle,
}

impl Direction {
    /// Label for a leg from `from` to `to`.
    ///
    /// Anything that is not strictly upwards is `Down`, so a zero-length leg
    /// still carries a moving label.
    pub fn toward(from: Floor, to: Floor) -> Self {
        if to > from {
            Direction::Up
        } else {
            Direction::Down
        }
    }
}

/// Service phase of a car
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CarPhase {
    Idle,
    MovingToSource,
    MovingToDestination,
}

/// Published position of a car.
///
/// `direction == Idle` exactly when `phase == Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarState {
    pub current_floor: Floor,
    pub direction: Direction,
    pub phase: CarPhase,
}

impl CarState {
    /// Idle car standing at `floor`
    pub fn idle_at(floor: Floor) -> Self {
        Self {
            current_floor: floor,
            direction: Direction::Idle,
            phase: CarPhase::Idle,
        }
    }

    /// Whether a leg is in progress
    pub fn is_moving(&self) -> bool {
        self.phase != CarPhase::Idle
    }
}

/// Car status snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarStatus {
    pub id: CarId,
    pub capacity_limit: usize,
    pub current_floor: Floor,
    pub direction: Direction,
    pub phase: CarPhase,
    /// Requests waiting in the queue, excluding the one in flight
    pub pending: usize,
    /// Requests completed since start
    pub served: u64,
}

/// One elevator car
///
/// Position and direction are written only by the car's own loop and
/// published through a `watch` channel; every other reader works from the
/// latest published [`CarState`].
pub struct Car {
    id: CarId,
    capacity_limit: usize,
    top_floor: Floor,
    travel: TravelConfig,
    queue: RequestQueue,
    state: watch::Sender<CarState>,
    started: AtomicBool,
    accepted: AtomicU64,
    served: AtomicU64,
    /// Accepted requests discarded at shutdown, never to be served
    dropped: AtomicU64,
    sinks: Vec<Arc<dyn NotificationSink>>,
    #[cfg(feature = "metrics")]
    metrics: Option<FleetMetrics>,
}

impl Car {
    /// Create an idle car at `start_floor`
    pub fn new(id: CarId, start_floor: Floor, config: &FleetConfig) -> Self {
        let (state, _) = watch::channel(CarState::idle_at(start_floor));
        Self {
            id,
            capacity_limit: config.capacity_limit,
            top_floor: config.top_floor,
            travel: config.travel.clone(),
            queue: RequestQueue::new(),
            state,
            started: AtomicBool::new(false),
            accepted: AtomicU64::new(0),
            served: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            sinks: Vec::new(),
            #[cfg(feature = "metrics")]
            metrics: None,
        }
    }

    /// Add a notification sink (builder pattern)
    pub fn with_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Record fleet metrics (builder pattern)
    #[cfg(feature = "metrics")]
    pub fn with_metrics(mut self, metrics: FleetMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Get car ID
    pub fn id(&self) -> CarId {
        self.id
    }

    /// Latest published state. Never waits on the service loop.
    pub fn snapshot(&self) -> CarState {
        *self.state.borrow()
    }

    /// Subscribe to state changes
    pub fn watch(&self) -> watch::Receiver<CarState> {
        self.state.subscribe()
    }

    /// Get car status
    pub async fn status(&self) -> CarStatus {
        let state = self.snapshot();
        CarStatus {
            id: self.id,
            capacity_limit: self.capacity_limit,
            current_floor: state.current_floor,
            direction: state.direction,
            phase: state.phase,
            pending: self.queue.len().await,
            served: self.served(),
        }
    }

    /// Requests completed since start
    pub fn served(&self) -> u64 {
        self.served.load(Ordering::SeqCst)
    }

    /// Whether every request ever enqueued has been served or dropped
    pub fn is_drained(&self) -> bool {
        self.accepted.load(Ordering::SeqCst) == self.settled()
    }

    fn settled(&self) -> u64 {
        self.served.load(Ordering::SeqCst) + self.dropped.load(Ordering::SeqCst)
    }

    /// Append a request to this car's queue
    pub async fn enqueue(&self, queued: QueuedRequest) {
        let event = CarEvent::RequestAssigned {
            request_id: queued.id.clone(),
            request: queued.request,
        };
        self.accepted.fetch_add(1, Ordering::SeqCst);
        self.queue.enqueue(queued).await;
        self.notify(&event);

        #[cfg(feature = "metrics")]
        if let Some(metrics) = &self.metrics {
            metrics.set_queue_depth(self.id, self.queue.len().await).await;
        }
    }

    /// Remove requests that were never started, counting them as dropped
    pub(crate) async fn drain_pending(&self) -> Vec<QueuedRequest> {
        let drained = self.queue.drain_all().await;
        self.dropped
            .fetch_add(drained.len() as u64, Ordering::SeqCst);
        drained
    }

    /// Count the request cut off by aborting the loop mid-leg as dropped.
    ///
    /// Only valid once the loop has stopped and the queue has been drained.
    /// Returns how many requests were settled this way (0 or 1).
    pub(crate) fn settle_interrupted(&self) -> u64 {
        let unsettled = self
            .accepted
            .load(Ordering::SeqCst)
            .saturating_sub(self.settled());
        self.dropped.fetch_add(unsettled, Ordering::SeqCst);
        unsettled
    }

    /// Start the service loop.
    ///
    /// The loop stops once `shutdown` turns `true` (or its sender is dropped),
    /// after finishing the request in flight. Returns `AlreadyStarted` if a
    /// loop was started before.
    pub fn run(self: &Arc<Self>, shutdown: watch::Receiver<bool>) -> Result<JoinHandle<()>> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(DispatchError::AlreadyStarted);
        }
        let car = Arc::clone(self);
        Ok(tokio::spawn(async move { car.service_loop(shutdown).await }))
    }

    async fn service_loop(&self, mut shutdown: watch::Receiver<bool>) {
        tracing::debug!(car_id = self.id, "car loop started");
        loop {
            if *shutdown.borrow_and_update() {
                break;
            }

            let floor = self.snapshot().current_floor;
            if let Some(queued) = self.queue.pop_nearest(floor).await {
                #[cfg(feature = "metrics")]
                if let Some(metrics) = &self.metrics {
                    metrics.set_queue_depth(self.id, self.queue.len().await).await;
                }
                self.serve(queued).await;
                continue;
            }

            tokio::select! {
                _ = self.queue.wait_for_work() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        tracing::debug!(car_id = self.id, "car loop stopped");
    }

    async fn serve(&self, queued: QueuedRequest) {
        let request = queued.request;
        let in_building = |floor: Floor| (0..=self.top_floor).contains(&floor);
        assert!(
            in_building(request.source_floor) && in_building(request.destination_floor),
            "car {} received request {:?} outside floors 0..={}",
            self.id,
            request,
            self.top_floor
        );

        if request.source_floor != self.snapshot().current_floor {
            self.travel(CarPhase::MovingToSource, request.source_floor)
                .await;
        }
        let picked_up = Instant::now();
        self.travel(CarPhase::MovingToDestination, request.destination_floor)
            .await;

        let previous = self.publish(CarState::idle_at(request.destination_floor));
        self.notify(&CarEvent::DirectionChanged {
            from: previous.direction,
            to: Direction::Idle,
        });
        self.served.fetch_add(1, Ordering::SeqCst);
        self.notify(&CarEvent::RequestServed {
            request_id: queued.id.clone(),
            request,
        });

        let wait = picked_up.duration_since(queued.submitted_at);
        let trip = picked_up.elapsed();
        tracing::debug!(
            car_id = self.id,
            request_id = %queued.id,
            wait_ms = wait.as_millis() as u64,
            trip_ms = trip.as_millis() as u64,
            "request served"
        );

        #[cfg(feature = "metrics")]
        if let Some(metrics) = &self.metrics {
            metrics
                .record_served(
                    self.id,
                    wait.as_secs_f64() * 1000.0,
                    trip.as_secs_f64() * 1000.0,
                )
                .await;
        }

        #[cfg(feature = "telemetry")]
        telemetry::record_served(self.id, trip.as_secs_f64());
    }

    /// Move to `target` as one leg. Not preempted by new requests.
    async fn travel(&self, phase: CarPhase, target: Floor) {
        let from = self.snapshot().current_floor;
        let direction = Direction::toward(from, target);
        let previous = self.publish(CarState {
            current_floor: from,
            direction,
            phase,
        });
        if previous.direction != direction {
            self.notify(&CarEvent::DirectionChanged {
                from: previous.direction,
                to: direction,
            });
        }
        self.notify(&CarEvent::LegStarted {
            phase,
            from,
            to: target,
            direction,
        });
        tracing::debug!(car_id = self.id, from, to = target, ?phase, "leg started");

        tokio::time::sleep(self.travel.leg_duration(from.abs_diff(target))).await;

        self.publish(CarState {
            current_floor: target,
            direction,
            phase,
        });
        self.notify(&CarEvent::Arrived {
            floor: target,
            phase,
        });
        tracing::debug!(car_id = self.id, floor = target, "arrived");

        #[cfg(feature = "metrics")]
        if let Some(metrics) = &self.metrics {
            metrics.record_leg(self.id).await;
        }
    }

    fn publish(&self, state: CarState) -> CarState {
        self.state.send_replace(state)
    }

    fn notify(&self, event: &CarEvent) {
        notify_all(&self.sinks, self.id, event);
    }
}
