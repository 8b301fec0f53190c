/// Monitor errors
use thiserror::Error;

use crate::trip::ValidationError;

/// Errors returned by the monitor handle
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MonitorError {
    /// The event loop has exited (trip ended or handle dropped)
    #[error("Trip monitor is not running")]
    NotRunning,

    /// Input rejected before any state change
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Result type for monitor operations
pub type MonitorResult<T> = Result<T, MonitorError>;
