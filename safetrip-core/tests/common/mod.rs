//! Shared test doubles and fixtures
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::BoxFuture;
use safetrip_lib::alert::{AlertDispatcher, AlertKind, AlertPayload, Notifier, NotifyError};
use safetrip_lib::config::MonitorConfig;
use safetrip_lib::routing::{RouteEstimate, RoutingProvider, RoutingResult, Waypoint};
use safetrip_lib::trip::{Contact, Permissions, SafetyCredentials, Trip, TripPlanner, UserProfile};
use tokio::time::Instant;

pub const SAFE_PIN: &str = "1234";
pub const DURESS_PIN: &str = "9999";
pub const WRONG_PIN: &str = "5678";

/// Notifier that records every payload with its delivery instant
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(Instant, AlertPayload)>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A notifier that records the attempt and then reports failure
    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        })
    }

    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn kinds(&self) -> Vec<AlertKind> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(_, payload)| payload.alert_kind)
            .collect()
    }

    pub fn sent(&self) -> Vec<(Instant, AlertPayload)> {
        self.sent.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn send(&self, payload: AlertPayload) -> BoxFuture<'_, Result<(), NotifyError>> {
        self.sent.lock().unwrap().push((Instant::now(), payload));
        let fail = self.fail;
        Box::pin(async move {
            if fail {
                Err(NotifyError::DeliveryFailed("sms gateway unreachable".to_string()))
            } else {
                Ok(())
            }
        })
    }
}

/// Routing provider replaying scripted results, then repeating the fallback
pub struct ScriptedRoutingProvider {
    script: Mutex<VecDeque<RoutingResult<RouteEstimate>>>,
    fallback: RoutingResult<RouteEstimate>,
    requests: Mutex<Vec<Waypoint>>,
}

impl ScriptedRoutingProvider {
    pub fn new(
        script: Vec<RoutingResult<RouteEstimate>>,
        fallback: RoutingResult<RouteEstimate>,
    ) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            fallback,
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Always answers with the same duration
    pub fn fixed(duration_secs: u64) -> Arc<Self> {
        Self::new(Vec::new(), Ok(RouteEstimate::new(duration_secs)))
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<Waypoint> {
        self.requests.lock().unwrap().clone()
    }
}

impl RoutingProvider for ScriptedRoutingProvider {
    fn route<'a>(
        &'a self,
        origin: &'a Waypoint,
        _destination: &'a str,
    ) -> BoxFuture<'a, RoutingResult<RouteEstimate>> {
        self.requests.lock().unwrap().push(origin.clone());
        let result = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        Box::pin(async move { result })
    }
}

pub fn contact() -> Contact {
    Contact::new("c1", "Alice", "+15550100", "Sister")
}

pub fn credentials() -> SafetyCredentials {
    SafetyCredentials::new(SAFE_PIN, DURESS_PIN, "Pineapple").unwrap()
}

/// Profile with sensors off so timelines are driven by the clock only
pub fn profile() -> UserProfile {
    UserProfile {
        name: "Sam".to_string(),
        credentials: credentials(),
        contacts: vec![contact()],
        permissions: Permissions {
            location: false,
            motion: false,
            microphone: false,
            notifications: true,
        },
    }
}

/// Profile with every permission granted
pub fn full_profile() -> UserProfile {
    UserProfile {
        permissions: Permissions {
            location: true,
            motion: true,
            microphone: true,
            notifications: true,
        },
        ..profile()
    }
}

pub fn timer_trip(profile: &UserProfile, secs: u64) -> Trip {
    let config = MonitorConfig::default();
    TripPlanner::new(profile, &config.trip)
        .timer_trip(Duration::from_secs(secs), Instant::now())
        .unwrap()
}

pub fn dispatcher(notifier: Arc<RecordingNotifier>) -> Arc<AlertDispatcher> {
    Arc::new(AlertDispatcher::new(notifier, Duration::from_secs(15)))
}

pub fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}
