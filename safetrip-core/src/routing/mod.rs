/// Routing provider contract and ETA tracking
///
/// The provider is consumed through a narrow, object-safe trait so that
/// any directions service (or a test double) can back it.

/// ETA deadline tracking and periodic refresh
pub mod eta;

/// Routing error types
pub mod error;

use std::fmt;
use std::time::Duration;

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::trip::Coordinates;

// Re-export commonly used types
pub use error::{RoutingError, RoutingResult};
pub use eta::{EtaTracker, EtaUpdate};

/// Route start point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Waypoint {
    /// Free-form address typed by the user
    Address(String),
    /// Current position fix
    Position(Coordinates),
}

impl fmt::Display for Waypoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Address(address) => f.write_str(address),
            Self::Position(coords) => write!(f, "{}", coords),
        }
    }
}

/// Route estimate returned by the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteEstimate {
    /// Encoded overview polyline (display only)
    pub polyline: Option<String>,
    /// Estimated travel time in seconds
    pub duration_secs: u64,
}

impl RouteEstimate {
    pub fn new(duration_secs: u64) -> Self {
        Self {
            polyline: None,
            duration_secs,
        }
    }

    pub fn with_polyline(mut self, polyline: impl Into<String>) -> Self {
        self.polyline = Some(polyline.into());
        self
    }

    /// Travel time as a [`Duration`]
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }

    /// Travel time rounded up to whole minutes
    pub fn duration_minutes_ceil(&self) -> u64 {
        self.duration_secs.div_ceil(60)
    }
}

/// Directions / ETA provider
///
/// Implementations must be cheap to call repeatedly; the monitor calls
/// `route` once per refresh interval for destination trips.
pub trait RoutingProvider: Send + Sync {
    /// Request a route from `origin` to `destination`
    fn route<'a>(
        &'a self,
        origin: &'a Waypoint,
        destination: &'a str,
    ) -> BoxFuture<'a, RoutingResult<RouteEstimate>>;
}
