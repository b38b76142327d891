//! Car selection for incoming requests
//!
//! Greedy nearest-idle-preferring heuristic:
//!
//! ```text
//! score(car) = |car.current_floor - source_floor| + (0 if car is idle else 1)
//! ```
//!
//! The lowest score wins and ties go to the lowest car id. Queue depth and
//! direction of travel are not considered, so a busy car close to the
//! source can collect a long backlog while a distant idle car stays put.

use crate::car::{Car, CarId, CarState, Direction, Floor};
use crate::error::{DispatchError, Result};
use crate::queue::{FloorRequest, QueuedRequest, RequestId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Result of dispatching one request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub car_id: CarId,
    pub request_id: RequestId,
}

/// Suitability of a car for a pickup at `source_floor`; lower is better.
pub fn score(state: &CarState, source_floor: Floor) -> u32 {
    let busy_penalty = if state.direction == Direction::Idle { 0 } else { 1 };
    state.current_floor.abs_diff(source_floor) + busy_penalty
}

/// Assigns each request to exactly one car
///
/// Scoring reads each car's published state without touching any queue
/// lock. Two concurrent requests may therefore be scored against the same
/// stale snapshot and land on the same car; each enqueue is still atomic.
pub struct Dispatcher {
    cars: Vec<Arc<Car>>,
}

impl Dispatcher {
    /// Create a dispatcher over a fixed fleet, ordered by car id
    pub fn new(mut cars: Vec<Arc<Car>>) -> Self {
        cars.sort_by_key(|car| car.id());
        Self { cars }
    }

    /// Cars in id order
    pub fn cars(&self) -> &[Arc<Car>] {
        &self.cars
    }

    /// Pick the best car for a pickup at `source_floor`
    pub fn select(&self, source_floor: Floor) -> Result<&Arc<Car>> {
        self.cars
            .iter()
            .min_by_key(|car| (score(&car.snapshot(), source_floor), car.id()))
            .ok_or(DispatchError::NoCarsAvailable)
    }

    /// Select a car and enqueue the request on it
    pub async fn assign(&self, request: FloorRequest) -> Result<Assignment> {
        let car = self.select(request.source_floor)?;
        let queued = QueuedRequest::new(request);
        let assignment = Assignment {
            car_id: car.id(),
            request_id: queued.id.clone(),
        };
        car.enqueue(queued).await;

        tracing::info!(
            car_id = assignment.car_id,
            request_id = %assignment.request_id,
            source_floor = request.source_floor,
            destination_floor = request.destination_floor,
            "request assigned"
        );
        Ok(assignment)
    }
}
