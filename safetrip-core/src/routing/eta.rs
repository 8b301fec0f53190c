/// ETA deadline tracking
///
/// The trip state machine owns the current `eta`; this module decides how
/// it moves. Destination trips are refreshed from the routing provider on
/// a fixed interval using the last known position. A failed refresh keeps
/// the previous deadline.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::error::{RoutingError, RoutingResult};
use super::{RouteEstimate, RoutingProvider, Waypoint};
use crate::config::EtaConfig;
use crate::trip::{Coordinates, Trip, TripMode};

/// Result of a background refresh request, delivered to the monitor loop
#[derive(Debug, Clone, PartialEq)]
pub struct EtaUpdate {
    /// Provider result
    pub result: RoutingResult<RouteEstimate>,
    /// Instant the request was issued
    pub requested_at: Instant,
}

/// Destination-mode ETA refresher
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use safetrip_lib::config::EtaConfig;
/// use safetrip_lib::routing::{EtaTracker, RoutingProvider};
/// use safetrip_lib::trip::{Coordinates, Trip};
/// use tokio::sync::mpsc;
///
/// # async fn example(trip: Trip, provider: Arc<dyn RoutingProvider>) {
/// let mut tracker = EtaTracker::new(&trip, Some(provider), &EtaConfig::default());
/// let (tx, mut rx) = mpsc::channel(4);
///
/// tracker.request_refresh(Some(Coordinates::new(40.71, -74.0)), tx);
/// if let Some(update) = rx.recv().await {
///     println!("refresh result: {:?}", update.result);
/// }
/// # }
/// ```
pub struct EtaTracker {
    /// Trip mode (refresh only runs for destination trips)
    mode: TripMode,
    /// Destination label passed to the provider
    destination: String,
    /// Routing provider
    provider: Option<Arc<dyn RoutingProvider>>,
    /// Refresh interval
    refresh_interval: Duration,
    /// Per-request timeout
    request_timeout: Duration,
    /// In-flight request task
    in_flight: Option<JoinHandle<()>>,
}

impl EtaTracker {
    /// Create a tracker for the given trip
    pub fn new(
        trip: &Trip,
        provider: Option<Arc<dyn RoutingProvider>>,
        config: &EtaConfig,
    ) -> Self {
        Self {
            mode: trip.mode(),
            destination: trip.destination_label().to_string(),
            provider,
            refresh_interval: config.refresh_interval(),
            request_timeout: config.request_timeout(),
            in_flight: None,
        }
    }

    /// Refresh interval, or `None` when this trip is never refreshed
    pub fn refresh_interval(&self) -> Option<Duration> {
        if self.refresh_enabled() {
            Some(self.refresh_interval)
        } else {
            None
        }
    }

    /// Whether periodic refresh applies to this trip
    pub fn refresh_enabled(&self) -> bool {
        self.mode == TripMode::Destination && self.provider.is_some()
    }

    /// Deadline after extending `eta` by `increment`
    ///
    /// `None` when the result does not fit in an `Instant`.
    pub fn extend(eta: Instant, increment: Duration) -> Option<Instant> {
        eta.checked_add(increment)
    }

    /// Deadline implied by `remaining` travel time measured at `now`
    ///
    /// # Errors
    ///
    /// `RoutingError::DurationOutOfRange` when the provider reports a
    /// duration too large to schedule.
    pub fn refreshed(now: Instant, remaining: Duration) -> RoutingResult<Instant> {
        now.checked_add(remaining)
            .ok_or(RoutingError::DurationOutOfRange(remaining.as_secs()))
    }

    /// Issue a background refresh from the last known position
    ///
    /// Any previous request still in flight is cancelled first, so a stale
    /// response can never land after a newer one. Returns `false` when no
    /// request was issued (timer trip, no provider, or no position fix).
    pub fn request_refresh(
        &mut self,
        position: Option<Coordinates>,
        updates: mpsc::Sender<EtaUpdate>,
    ) -> bool {
        if self.mode != TripMode::Destination {
            return false;
        }
        let Some(provider) = self.provider.clone() else {
            return false;
        };

        let Some(position) = position else {
            debug!("Skipping ETA refresh: no position fix");
            return false;
        };

        self.cancel();

        let destination = self.destination.clone();
        let timeout = self.request_timeout;
        let requested_at = Instant::now();

        debug!(destination = %destination, origin = %position, "Requesting ETA refresh");

        self.in_flight = Some(tokio::spawn(async move {
            let origin = Waypoint::Position(position);
            let result = fetch_estimate(provider.as_ref(), &origin, &destination, timeout).await;

            if updates.send(EtaUpdate { result, requested_at }).await.is_err() {
                debug!("ETA update dropped: monitor stopped");
            }
        }));

        true
    }

    /// Cancel the in-flight request, if any
    pub fn cancel(&mut self) {
        if let Some(handle) = self.in_flight.take() {
            if !handle.is_finished() {
                debug!("Cancelling in-flight ETA refresh");
            }
            handle.abort();
        }
    }
}

impl Drop for EtaTracker {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Request a route estimate, bounded by `timeout`
pub async fn fetch_estimate(
    provider: &dyn RoutingProvider,
    origin: &Waypoint,
    destination: &str,
    timeout: Duration,
) -> RoutingResult<RouteEstimate> {
    match tokio::time::timeout(timeout, provider.route(origin, destination)).await {
        Ok(Ok(estimate)) => {
            info!(
                destination = %destination,
                duration_secs = estimate.duration_secs,
                "Route estimate received"
            );
            Ok(estimate)
        }
        Ok(Err(e)) => {
            warn!(error = %e, destination = %destination, "Route request failed");
            Err(e)
        }
        Err(_) => {
            warn!(timeout_ms = timeout.as_millis() as u64, "Route request timed out");
            Err(RoutingError::Timeout(timeout.as_millis() as u64))
        }
    }
}
