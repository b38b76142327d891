//! Event system for fleet notifications
//!
//! Cars report state transitions through the [`NotificationSink`] trait.
//! Delivery is fire-and-forget: a sink that fails or panics is logged and
//! skipped, and the car keeps serving requests.

use crate::car::{CarId, CarPhase, Direction, Floor};
use crate::error::Result;
use crate::queue::{FloorRequest, RequestId};
use futures_core::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::broadcast;

/// Event key type
pub type EventKey = String;

/// Something that happened to one car
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CarEvent {
    /// The dispatcher placed a request on this car's queue
    RequestAssigned {
        request_id: RequestId,
        request: FloorRequest,
    },
    /// The car began moving towards `to`
    LegStarted {
        phase: CarPhase,
        from: Floor,
        to: Floor,
        direction: Direction,
    },
    /// The car reached the end of a leg
    Arrived { floor: Floor, phase: CarPhase },
    /// The car's direction label changed
    DirectionChanged { from: Direction, to: Direction },
    /// The car dropped off a request's passengers
    RequestServed {
        request_id: RequestId,
        request: FloorRequest,
    },
}

impl CarEvent {
    /// Catalog key for this event
    pub fn key(&self) -> &'static str {
        match self {
            CarEvent::RequestAssigned { .. } => events::CAR_REQUEST_ASSIGNED,
            CarEvent::LegStarted { .. } => events::CAR_LEG_STARTED,
            CarEvent::Arrived { .. } => events::CAR_ARRIVED,
            CarEvent::DirectionChanged { .. } => events::CAR_DIRECTION_CHANGED,
            CarEvent::RequestServed { .. } => events::CAR_REQUEST_SERVED,
        }
    }
}

/// Receiver of car state transitions
pub trait NotificationSink: Send + Sync {
    /// Deliver an event. Errors are logged by the caller and otherwise ignored.
    fn notify(&self, car_id: CarId, event: &CarEvent) -> Result<()>;
}

/// Sink that discards every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl NotificationSink for NoopSink {
    fn notify(&self, _car_id: CarId, _event: &CarEvent) -> Result<()> {
        Ok(())
    }
}

/// Fleet event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetEvent {
    /// Event key (e.g., "car.arrived", "fleet.shutdown.started")
    pub key: EventKey,

    /// Car the event concerns, `None` for fleet-wide events
    pub car_id: Option<CarId>,

    /// Car event details, `None` for fleet-wide events
    pub event: Option<CarEvent>,

    /// Timestamp
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl FleetEvent {
    /// Create an event for one car
    pub fn car(car_id: CarId, event: CarEvent) -> Self {
        Self {
            key: event.key().to_string(),
            car_id: Some(car_id),
            event: Some(event),
            timestamp: chrono::Utc::now(),
        }
    }

    /// Create a fleet-wide event with no payload
    pub fn fleet(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            car_id: None,
            event: None,
            timestamp: chrono::Utc::now(),
        }
    }
}

/// Event emitter
#[derive(Clone)]
pub struct EventEmitter {
    sender: Arc<broadcast::Sender<FleetEvent>>,
}

impl EventEmitter {
    /// Create a new event emitter
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Emit an event
    pub fn emit(&self, event: FleetEvent) {
        let _ = self.sender.send(event);
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<FleetEvent> {
        self.sender.subscribe()
    }

    /// Subscribe to filtered events as an `EventStream` (implements `Stream`)
    pub fn subscribe_filtered(
        &self,
        filter: impl Fn(&FleetEvent) -> bool + Send + Sync + 'static,
    ) -> EventStream {
        use tokio_stream::wrappers::BroadcastStream;
        use tokio_stream::StreamExt as TokioStreamExt;
        let stream = BroadcastStream::new(self.sender.subscribe())
            .filter_map(|r: std::result::Result<FleetEvent, _>| r.ok())
            .filter(move |e| filter(e));
        EventStream {
            inner: Box::pin(stream),
        }
    }

    /// Subscribe to all events as an `EventStream` (implements `Stream`)
    pub fn subscribe_stream(&self) -> EventStream {
        self.subscribe_filtered(|_| true)
    }
}

impl NotificationSink for EventEmitter {
    fn notify(&self, car_id: CarId, event: &CarEvent) -> Result<()> {
        self.emit(FleetEvent::car(car_id, event.clone()));
        Ok(())
    }
}

/// Event stream: implements `futures_core::Stream<Item = FleetEvent>`.
///
/// Returned by [`EventEmitter::subscribe_filtered`] and [`EventEmitter::subscribe_stream`].
pub struct EventStream {
    inner: Pin<Box<dyn Stream<Item = FleetEvent> + Send>>,
}

impl Stream for EventStream {
    type Item = FleetEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl EventStream {
    /// Receive the next matching event
    pub async fn recv(&mut self) -> Option<FleetEvent> {
        use tokio_stream::StreamExt;
        self.next().await
    }
}

/// Deliver `event` to every sink, isolating the caller from sink failures.
pub(crate) fn notify_all(sinks: &[Arc<dyn NotificationSink>], car_id: CarId, event: &CarEvent) {
    for sink in sinks {
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            sink.notify(car_id, event)
        }));
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                tracing::warn!(car_id, event = event.key(), error = %err, "notification sink failed");
            }
            Err(_) => {
                tracing::warn!(car_id, event = event.key(), "notification sink panicked");
            }
        }
    }
}

/// Event catalog - predefined event keys
pub mod events {
    // Car events
    pub const CAR_REQUEST_ASSIGNED: &str = "car.request.assigned";
    pub const CAR_LEG_STARTED: &str = "car.leg.started";
    pub const CAR_ARRIVED: &str = "car.arrived";
    pub const CAR_DIRECTION_CHANGED: &str = "car.direction.changed";
    pub const CAR_REQUEST_SERVED: &str = "car.request.served";
    // Fleet events
    pub const FLEET_STARTED: &str = "fleet.started";
    pub const FLEET_SHUTDOWN_STARTED: &str = "fleet.shutdown.started";
    pub const FLEET_SHUTDOWN_COMPLETE: &str = "fleet.shutdown.complete";
}
