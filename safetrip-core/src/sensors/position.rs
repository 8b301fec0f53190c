/// Position tracking
///
/// Keeps only the latest fix. The ETA refresher reads it on demand and the
/// presentation layer shows the derived GPS status.

use std::sync::Arc;

use futures_util::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::error::PositionError;
use crate::trip::Coordinates;

/// Position source contract
///
/// Dropping the returned stream unsubscribes.
pub trait PositionSource: Send + Sync {
    /// Start receiving position updates
    fn subscribe(&self) -> BoxStream<'static, Result<Coordinates, PositionError>>;
}

/// GPS status shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GpsStatus {
    /// No fix yet
    Searching,
    /// At least one fix received
    Locked,
    /// Source failed before any fix
    Error,
}

impl GpsStatus {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Searching => "SEARCHING",
            Self::Locked => "LOCKED",
            Self::Error => "ERROR",
        }
    }
}

/// Latest position state
#[derive(Debug, Clone, PartialEq)]
pub struct PositionState {
    /// Last known fix
    pub last_fix: Option<Coordinates>,
    /// Instant of the last fix
    pub fixed_at: Option<Instant>,
    /// Last source error, cleared by the next fix
    pub last_error: Option<PositionError>,
}

impl PositionState {
    fn searching() -> Self {
        Self {
            last_fix: None,
            fixed_at: None,
            last_error: None,
        }
    }

    /// Derived GPS status
    pub fn status(&self) -> GpsStatus {
        match (&self.last_fix, &self.last_error) {
            (Some(_), _) => GpsStatus::Locked,
            (None, Some(_)) => GpsStatus::Error,
            (None, None) => GpsStatus::Searching,
        }
    }
}

/// Background position tracker
pub struct PositionTracker {
    tx: Arc<watch::Sender<PositionState>>,
    task: Option<JoinHandle<()>>,
}

impl PositionTracker {
    /// Start tracking; without a source the status stays `SEARCHING`
    pub fn start(source: Option<Arc<dyn PositionSource>>) -> Self {
        let (tx, _) = watch::channel(PositionState::searching());
        let tx = Arc::new(tx);

        let task = source.map(|source| {
            let tx = Arc::clone(&tx);
            info!("Position tracking started");
            tokio::spawn(async move {
                tracking_task(source, tx).await;
            })
        });

        Self { tx, task }
    }

    /// Subscribe to position state changes
    pub fn subscribe(&self) -> watch::Receiver<PositionState> {
        self.tx.subscribe()
    }

    /// Last known fix
    pub fn last_fix(&self) -> Option<Coordinates> {
        self.tx.borrow().last_fix
    }

    pub fn status(&self) -> GpsStatus {
        self.tx.borrow().status()
    }

    /// Stop tracking and wait for the task to exit
    pub async fn stop(&mut self) {
        if let Some(handle) = self.task.take() {
            handle.abort();
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    warn!(error = %e, "Position task panicked");
                }
            }
            debug!("Position tracking stopped");
        }
    }
}

impl Drop for PositionTracker {
    fn drop(&mut self) {
        if let Some(handle) = self.task.take() {
            handle.abort();
        }
    }
}

async fn tracking_task(source: Arc<dyn PositionSource>, tx: Arc<watch::Sender<PositionState>>) {
    let mut updates = source.subscribe();

    while let Some(update) = updates.next().await {
        match update {
            Ok(coords) => {
                debug!(position = %coords, "Position fix");
                tx.send_modify(|state| {
                    state.last_fix = Some(coords);
                    state.fixed_at = Some(Instant::now());
                    state.last_error = None;
                });
            }
            Err(e) => {
                warn!(error = %e, "Position source error");
                tx.send_modify(|state| state.last_error = Some(e));
            }
        }
    }

    info!("Position source ended, keeping last fix");
}

/// Channel-backed position source
pub struct ChannelPositionSource {
    tx: broadcast::Sender<Result<Coordinates, PositionError>>,
}

/// Producer side of a [`ChannelPositionSource`]
#[derive(Clone)]
pub struct PositionFeed {
    tx: broadcast::Sender<Result<Coordinates, PositionError>>,
}

impl ChannelPositionSource {
    pub fn new() -> (Self, PositionFeed) {
        let (tx, _) = broadcast::channel(16);
        let feed = PositionFeed { tx: tx.clone() };
        (Self { tx }, feed)
    }
}

impl PositionSource for ChannelPositionSource {
    fn subscribe(&self) -> BoxStream<'static, Result<Coordinates, PositionError>> {
        let rx = self.tx.subscribe();
        stream::unfold(rx, |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(item) => return Some((item, rx)),
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        })
        .boxed()
    }
}

impl PositionFeed {
    /// Push a new fix
    pub fn push(&self, coords: Coordinates) -> bool {
        self.tx.send(Ok(coords)).is_ok()
    }

    /// Report a source error
    pub fn fail(&self, error: PositionError) -> bool {
        self.tx.send(Err(error)).is_ok()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
