/// Sensor error types
///
/// A sensor failure never stops monitoring: the affected risk tier degrades
/// to `UNAVAILABLE`, which the fuser treats as non-risk.

use thiserror::Error;

/// Sensor-related errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SensorError {
    /// Sensor hardware or API not available
    #[error("Sensor unavailable: {0}")]
    Unavailable(String),

    /// Access to the sensor was denied
    #[error("Sensor permission denied")]
    PermissionDenied,

    /// Sensor produced an unreadable sample
    #[error("Invalid sensor reading: {0}")]
    InvalidReading(String),
}

/// Position source errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PositionError {
    /// Location permission denied
    #[error("Location permission denied")]
    PermissionDenied,

    /// No fix could be obtained
    #[error("Position unavailable: {0}")]
    Unavailable(String),

    /// Fix request timed out
    #[error("Position request timed out")]
    Timeout,
}

/// Result type for sensor operations
pub type SensorResult<T> = Result<T, SensorError>;
