//! Fleet configuration types

use crate::car::Floor;
use crate::error::{DispatchError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Simulated travel time
///
/// A leg covering `d` floors takes `leg_time + per_floor_time * d`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TravelConfig {
    /// Fixed time spent on every leg, including zero-length ones
    #[serde(with = "duration_ms")]
    pub leg_time: Duration,
    /// Additional time per floor travelled
    #[serde(default, with = "duration_ms")]
    pub per_floor_time: Duration,
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

impl Default for TravelConfig {
    fn default() -> Self {
        Self {
            leg_time: Duration::from_millis(500),
            per_floor_time: Duration::ZERO,
        }
    }
}

impl TravelConfig {
    /// Fixed time per leg regardless of distance
    pub fn fixed(leg_time: Duration) -> Self {
        Self {
            leg_time,
            per_floor_time: Duration::ZERO,
        }
    }

    /// Time proportional to the number of floors travelled
    pub fn per_floor(per_floor_time: Duration) -> Self {
        Self {
            leg_time: Duration::ZERO,
            per_floor_time,
        }
    }

    /// Duration of a leg covering `floors` floors, saturating at `Duration::MAX`
    pub fn leg_duration(&self, floors: u32) -> Duration {
        self.leg_time
            .saturating_add(self.per_floor_time.saturating_mul(floors))
    }

    /// Duration of a leg covering `floors` floors, `None` on overflow
    pub fn checked_leg_duration(&self, floors: u32) -> Option<Duration> {
        self.per_floor_time
            .checked_mul(floors)
            .and_then(|d| self.leg_time.checked_add(d))
    }
}

/// Fleet configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FleetConfig {
    /// Number of cars created at build time (ids `1..=car_count`)
    pub car_count: usize,
    /// Maximum occupants per car (carried, not enforced by scheduling)
    pub capacity_limit: usize,
    /// Highest valid floor; valid floors are `0..=top_floor`
    pub top_floor: Floor,
    /// Simulated travel time
    #[serde(default)]
    pub travel: TravelConfig,
    /// Buffer size of the fleet event broadcast channel
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_event_capacity() -> usize {
    256
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            car_count: 3,
            capacity_limit: 5,
            top_floor: 20,
            travel: TravelConfig::default(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl FleetConfig {
    /// Create a new fleet configuration
    pub fn new(car_count: usize, top_floor: Floor) -> Self {
        Self {
            car_count,
            top_floor,
            ..Self::default()
        }
    }

    /// Parse and validate a JSON configuration
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| DispatchError::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Set capacity limit (builder pattern)
    pub fn with_capacity_limit(mut self, capacity_limit: usize) -> Self {
        self.capacity_limit = capacity_limit;
        self
    }

    /// Set travel timing (builder pattern)
    pub fn with_travel(mut self, travel: TravelConfig) -> Self {
        self.travel = travel;
        self
    }

    /// Set event buffer size (builder pattern)
    pub fn with_event_capacity(mut self, event_capacity: usize) -> Self {
        self.event_capacity = event_capacity;
        self
    }

    /// Check the configuration for values the fleet cannot run with.
    ///
    /// An empty fleet is not rejected here; it surfaces as
    /// [`DispatchError::NoCarsAvailable`] on the first request.
    pub fn validate(&self) -> Result<()> {
        if self.top_floor <= 0 {
            return Err(DispatchError::ConfigError(format!(
                "top_floor must be positive, got {}",
                self.top_floor
            )));
        }
        if self
            .travel
            .checked_leg_duration(self.top_floor.unsigned_abs())
            .is_none()
        {
            return Err(DispatchError::ConfigError(format!(
                "travel time for a {}-floor leg overflows",
                self.top_floor
            )));
        }
        if self.event_capacity == 0 {
            return Err(DispatchError::ConfigError(
                "event_capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether `floor` lies within `0..=top_floor`
    pub fn contains_floor(&self, floor: Floor) -> bool {
        (0..=self.top_floor).contains(&floor)
    }
}
