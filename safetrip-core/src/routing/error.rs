/// Routing error types
///
/// ETA refresh failures are logged and never fatal; the trip keeps
/// running under the previous deadline.

use thiserror::Error;

/// Routing-related errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RoutingError {
    /// Provider rejected or failed the request
    #[error("Routing request failed: {0}")]
    RequestFailed(String),

    /// Provider returned no usable route
    #[error("No route found between {origin} and {destination}")]
    NoRoute { origin: String, destination: String },

    /// Request did not complete in time
    #[error("Routing request timed out after {0}ms")]
    Timeout(u64),

    /// No position fix available for a refresh
    #[error("No position fix available")]
    NoPositionFix,

    /// Estimated duration cannot be turned into a deadline
    #[error("Route duration of {0}s is out of range")]
    DurationOutOfRange(u64),
}

/// Result type for routing operations
pub type RoutingResult<T> = Result<T, RoutingError>;
