//! Error types for the dispatch core
//!
//! All errors implement the `std::error::Error` trait via `thiserror::Error`.
//!
//! # Error Handling
//!
//! The [`DispatchError`] enum covers the recoverable conditions:
//! - Configuration errors (non-positive building height, zero event buffer)
//! - Input validation errors (floor outside `[0, top_floor]`)
//! - Lifecycle errors (double start, shutdown in progress, drain timeout)
//!
//! A car receiving a request that should have been rejected upstream is not
//! represented here: the car loop panics, and the controller reports the car
//! as panicked at shutdown.
//!
//! # Example
//!
//! ```rust,ignore
//! use a3s_lift::DispatchError;
//!
//! match controller.request_elevator(3, 99).await {
//!     Ok(car_id) => println!("car {} is on its way", car_id),
//!     Err(DispatchError::InvalidFloor { floor, top_floor }) => {
//!         eprintln!("floor {} is outside 0..={}", floor, top_floor);
//!     }
//!     Err(e) => eprintln!("dispatch failed: {}", e),
//! }
//! ```

use thiserror::Error;

/// Dispatch error type
///
/// # Variants
///
/// * `InvalidFloor` - A requested floor lies outside the building
/// * `NoCarsAvailable` - The fleet is empty
/// * `CarNotFound` - No car with the given id exists
/// * `ConfigError` - Invalid fleet configuration
/// * `AlreadyStarted` - A controller or car loop was started twice
/// * `ShutdownInProgress` - The controller no longer accepts requests
/// * `Timeout` - Waiting for the fleet to drain took too long
/// * `Notification` - A notification sink failed to deliver an event
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DispatchError {
    /// Floor outside the building
    #[error("Invalid floor {floor}: must be within 0..={top_floor}")]
    InvalidFloor { floor: i32, top_floor: i32 },

    /// Empty fleet
    #[error("No cars available to serve the request")]
    NoCarsAvailable,

    /// Unknown car id
    #[error("Car not found: {0}")]
    CarNotFound(u32),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Loop already running
    #[error("Already started")]
    AlreadyStarted,

    /// Shutdown in progress
    #[error("Controller is shutting down, not accepting new requests")]
    ShutdownInProgress,

    /// Drain timeout
    #[error("Timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Notification sink failure
    #[error("Notification error: {0}")]
    Notification(String),
}

/// Result type alias using DispatchError
pub type Result<T> = std::result::Result<T, DispatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_floor_error() {
        let error = DispatchError::InvalidFloor {
            floor: 25,
            top_floor: 20,
        };
        assert_eq!(
            error.to_string(),
            "Invalid floor 25: must be within 0..=20"
        );
    }

    #[test]
    fn test_no_cars_available_error() {
        let error = DispatchError::NoCarsAvailable;
        assert_eq!(error.to_string(), "No cars available to serve the request");
    }

    #[test]
    fn test_car_not_found_error() {
        let error = DispatchError::CarNotFound(7);
        assert_eq!(error.to_string(), "Car not found: 7");
    }

    #[test]
    fn test_config_error() {
        let error = DispatchError::ConfigError("top_floor must be positive".to_string());
        assert_eq!(
            error.to_string(),
            "Configuration error: top_floor must be positive"
        );
    }

    #[test]
    fn test_shutdown_in_progress_error() {
        let error = DispatchError::ShutdownInProgress;
        assert_eq!(
            error.to_string(),
            "Controller is shutting down, not accepting new requests"
        );
    }

    #[test]
    fn test_timeout_error() {
        let error = DispatchError::Timeout(std::time::Duration::from_secs(5));
        assert_eq!(error.to_string(), "Timed out after 5s");
    }

    #[test]
    fn test_error_equality() {
        assert_eq!(DispatchError::AlreadyStarted, DispatchError::AlreadyStarted);
        assert_ne!(
            DispatchError::CarNotFound(1),
            DispatchError::CarNotFound(2)
        );
    }
}
