mod common;

use std::sync::Arc;

use common::{
    dispatcher, profile, secs, timer_trip, RecordingNotifier, ScriptedRoutingProvider, DURESS_PIN,
    SAFE_PIN, WRONG_PIN,
};
use safetrip_lib::alert::{AlertKind, DispatchOutcome, NotifyError};
use safetrip_lib::config::MonitorConfig;
use safetrip_lib::monitor::{MonitorError, MonitorEvent, MonitorServices, TripMonitor};
use safetrip_lib::routing::{RouteEstimate, RoutingError};
use safetrip_lib::sensors::{
    ChannelPositionSource, ChannelSensor, GpsStatus, RiskSource, RiskTier, SafetyLevel,
    SensorError,
};
use safetrip_lib::state::{ActionOutcome, Transition, TransitionCause, TripStatus};
use safetrip_lib::trip::{Coordinates, TripMode, TripPlanner, UserProfile};
use tokio::sync::mpsc;
use tokio::time::{sleep, sleep_until, Instant};

async fn next_transition(events: &mut mpsc::Receiver<MonitorEvent>) -> Transition {
    loop {
        if let MonitorEvent::StatusChanged(transition) = events.recv().await.unwrap() {
            return transition;
        }
    }
}

async fn next_level(events: &mut mpsc::Receiver<MonitorEvent>) -> SafetyLevel {
    loop {
        if let MonitorEvent::SafetyLevelChanged { level } = events.recv().await.unwrap() {
            return level;
        }
    }
}

fn motion_profile() -> UserProfile {
    let mut profile = profile();
    profile.permissions.motion = true;
    profile
}

#[tokio::test(start_paused = true)]
async fn test_unattended_trip_escalates_to_alert() {
    let notifier = RecordingNotifier::new();
    let profile = profile();
    let trip = timer_trip(&profile, 10);
    let start = trip.start_time();

    let monitor = TripMonitor::start(
        trip,
        &profile,
        MonitorServices::new(dispatcher(notifier.clone())),
        &MonitorConfig::default(),
    );
    let mut events = monitor.subscribe().await;
    assert_eq!(monitor.status_event().countdown, "00:10");

    let expected = [
        (TripStatus::EtaReached, 10),
        (TripStatus::CheckingIn, 40),
        (TripStatus::Alarming, 70),
        (TripStatus::AlertTriggered, 75),
    ];
    for (status, offset) in expected {
        let transition = next_transition(&mut events).await;
        assert_eq!(transition.to, status);
        assert_eq!(transition.at, start + secs(offset));
        // Nothing is sent before the final escalation
        if status != TripStatus::AlertTriggered {
            assert_eq!(notifier.count(), 0);
        }
    }

    match events.recv().await.unwrap() {
        MonitorEvent::AlertDispatched { kind, result } => {
            assert_eq!(kind, AlertKind::Alert);
            assert_eq!(result, Ok(DispatchOutcome::Delivered(AlertKind::Alert)));
        }
        other => panic!("expected AlertDispatched, got {:?}", other),
    }

    let sent = notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, start + secs(75));
    assert_eq!(sent[0].1.trip_summary.status, TripStatus::AlertTriggered);

    // Terminal: nothing else fires
    sleep(secs(3600)).await;
    assert_eq!(notifier.count(), 1);
    assert_eq!(monitor.status(), TripStatus::AlertTriggered);
    assert!(monitor.countdown().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_motion_high_risk_jumps_to_alarming() {
    let notifier = RecordingNotifier::new();
    let profile = motion_profile();
    let trip = timer_trip(&profile, 600);
    let start = trip.start_time();
    let (sensor, feed) = ChannelSensor::new(RiskSource::Motion);

    let monitor = TripMonitor::start(
        trip,
        &profile,
        MonitorServices::new(dispatcher(notifier.clone())).with_motion_sensor(Arc::new(sensor)),
        &MonitorConfig::default(),
    );
    let mut events = monitor.subscribe().await;

    while feed.subscriber_count() == 0 {
        tokio::task::yield_now().await;
    }

    sleep_until(start + secs(2)).await;
    feed.push(RiskTier::HighRisk);

    assert_eq!(next_level(&mut events).await, SafetyLevel::Red);
    let transition = next_transition(&mut events).await;
    assert_eq!(transition.from, TripStatus::Active);
    assert_eq!(transition.to, TripStatus::Alarming);
    assert_eq!(transition.at, start + secs(2));
    assert_eq!(
        transition.cause,
        TransitionCause::HighRiskSignal(RiskSource::Motion)
    );

    let transition = next_transition(&mut events).await;
    assert_eq!(transition.to, TripStatus::AlertTriggered);
    assert_eq!(transition.at, start + secs(7));
    assert_eq!(notifier.kinds(), vec![AlertKind::Alert]);
}

#[tokio::test(start_paused = true)]
async fn test_wrong_pin_during_check_in_keeps_timer() {
    let notifier = RecordingNotifier::new();
    let profile = profile();
    let trip = timer_trip(&profile, 10);
    let start = trip.start_time();

    let monitor = TripMonitor::start(
        trip,
        &profile,
        MonitorServices::new(dispatcher(notifier.clone())),
        &MonitorConfig::default(),
    );
    let mut events = monitor.subscribe().await;

    sleep_until(start + secs(45)).await;
    assert_eq!(monitor.status(), TripStatus::CheckingIn);

    let report = monitor.submit_pin(WRONG_PIN).await.unwrap();
    assert_eq!(report.outcome, ActionOutcome::Rejected);
    assert!(report.delivery.is_none());
    assert_eq!(monitor.status(), TripStatus::CheckingIn);

    let transition = loop {
        let transition = next_transition(&mut events).await;
        if transition.to == TripStatus::Alarming {
            break transition;
        }
    };
    assert_eq!(transition.at, start + secs(70));
}

#[tokio::test(start_paused = true)]
async fn test_malformed_pin_is_rejected_before_state_change() {
    let profile = profile();
    let monitor = TripMonitor::start(
        timer_trip(&profile, 60),
        &profile,
        MonitorServices::new(dispatcher(RecordingNotifier::new())),
        &MonitorConfig::default(),
    );

    let result = monitor.submit_pin("12").await;
    assert!(matches!(result, Err(MonitorError::Validation(_))));
    assert_eq!(monitor.status(), TripStatus::Active);
}

#[tokio::test(start_paused = true)]
async fn test_safe_pin_cancels_escalation() {
    let notifier = RecordingNotifier::new();
    let profile = profile();
    let trip = timer_trip(&profile, 10);
    let start = trip.start_time();

    let monitor = TripMonitor::start(
        trip,
        &profile,
        MonitorServices::new(dispatcher(notifier.clone())),
        &MonitorConfig::default(),
    );

    sleep_until(start + secs(72)).await;
    assert_eq!(monitor.status(), TripStatus::Alarming);

    let report = monitor.submit_pin(SAFE_PIN).await.unwrap();
    assert_eq!(report.new_status(), Some(TripStatus::Safe));
    assert!(report.delivery.is_none());

    sleep(secs(600)).await;
    assert_eq!(monitor.status(), TripStatus::Safe);
    assert_eq!(notifier.count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_duress_pin_sends_one_silent_alert() {
    let notifier = RecordingNotifier::new();
    let profile = profile();

    let monitor = TripMonitor::start(
        timer_trip(&profile, 600),
        &profile,
        MonitorServices::new(dispatcher(notifier.clone())),
        &MonitorConfig::default(),
    );

    let report = monitor.submit_pin(DURESS_PIN).await.unwrap();
    assert_eq!(report.new_status(), Some(TripStatus::Duress));
    assert_eq!(
        report.delivery,
        Some(Ok(DispatchOutcome::Delivered(AlertKind::SilentDuress)))
    );

    // Re-evaluating terminal actions never notifies again
    let panic = monitor.trigger_panic().await.unwrap();
    assert_eq!(panic.outcome, ActionOutcome::NoOp);
    let again = monitor.submit_pin(DURESS_PIN).await.unwrap();
    assert_eq!(again.outcome, ActionOutcome::NoOp);

    sleep(secs(3600)).await;
    assert_eq!(notifier.kinds(), vec![AlertKind::SilentDuress]);
    assert_eq!(monitor.status(), TripStatus::Duress);
}

#[tokio::test(start_paused = true)]
async fn test_delivery_failure_does_not_roll_back() {
    let notifier = RecordingNotifier::failing();
    let profile = profile();

    let monitor = TripMonitor::start(
        timer_trip(&profile, 600),
        &profile,
        MonitorServices::new(dispatcher(notifier.clone())),
        &MonitorConfig::default(),
    );

    let report = monitor.trigger_panic().await.unwrap();
    assert_eq!(report.new_status(), Some(TripStatus::Panic));
    assert!(matches!(
        report.delivery,
        Some(Err(NotifyError::DeliveryFailed(_)))
    ));
    assert_eq!(monitor.status(), TripStatus::Panic);
    assert_eq!(notifier.count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_panic_trip_alerts_at_start() {
    let notifier = RecordingNotifier::new();
    let profile = profile();
    let config = MonitorConfig::default();
    let trip = TripPlanner::new(&profile, &config.trip)
        .panic_trip(Instant::now())
        .unwrap();

    let monitor = TripMonitor::start(
        trip,
        &profile,
        MonitorServices::new(dispatcher(notifier.clone())),
        &config,
    );

    sleep(secs(1)).await;
    assert_eq!(monitor.status(), TripStatus::Panic);
    assert_eq!(notifier.kinds(), vec![AlertKind::Panic]);

    let summary = &notifier.sent()[0].1.trip_summary;
    assert_eq!(summary.destination, "SOS Emergency");
    assert_eq!(summary.origin, "Current Location");
}

#[tokio::test(start_paused = true)]
async fn test_extend_restarts_from_active() {
    let notifier = RecordingNotifier::new();
    let profile = profile();
    let trip = timer_trip(&profile, 10);
    let start = trip.start_time();

    let monitor = TripMonitor::start(
        trip,
        &profile,
        MonitorServices::new(dispatcher(notifier.clone())),
        &MonitorConfig::default(),
    );
    let mut events = monitor.subscribe().await;

    sleep_until(start + secs(50)).await;
    assert_eq!(monitor.status(), TripStatus::CheckingIn);
    let eta_before = monitor.snapshot().eta;

    let report = monitor.extend_trip().await.unwrap();
    assert_eq!(report.new_status(), Some(TripStatus::Active));
    assert_eq!(monitor.snapshot().eta, eta_before + secs(15 * 60));

    let mut saw_eta_update = false;
    while let Ok(event) = events.try_recv() {
        if let MonitorEvent::EtaUpdated { eta, .. } = event {
            assert_eq!(eta, start + secs(10 + 15 * 60));
            saw_eta_update = true;
        }
    }
    assert!(saw_eta_update);

    // Old alarm boundary at +70 no longer fires
    sleep_until(start + secs(100)).await;
    assert_eq!(monitor.status(), TripStatus::Active);
    assert_eq!(notifier.count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_destination_refresh_moves_eta_earlier() {
    let notifier = RecordingNotifier::new();
    let mut profile = profile();
    profile.permissions.location = true;
    let config = MonitorConfig::default();

    let provider = ScriptedRoutingProvider::new(
        vec![Ok(RouteEstimate::new(1800)), Ok(RouteEstimate::new(600))],
        Err(RoutingError::RequestFailed("quota exceeded".to_string())),
    );
    let planner = TripPlanner::new(&profile, &config.trip);
    let preview = planner
        .preview_route(provider.as_ref(), "Home", "Office", config.eta.request_timeout())
        .await
        .unwrap();
    let trip = planner.destination_trip(&preview, Instant::now()).unwrap();
    let start = trip.start_time();
    assert_eq!(trip.mode(), TripMode::Destination);
    assert_eq!(trip.eta(), start + secs(1800));

    let (source, position) = ChannelPositionSource::new();
    let monitor = TripMonitor::start(
        trip,
        &profile,
        MonitorServices::new(dispatcher(notifier.clone()))
            .with_routing(provider.clone())
            .with_position(Arc::new(source)),
        &config,
    );
    let mut events = monitor.subscribe().await;

    while position.subscriber_count() == 0 {
        tokio::task::yield_now().await;
    }
    position.push(Coordinates::new(40.71, -74.0));

    let mut eta_update = None;
    let mut failures = 0;
    let reached = loop {
        match events.recv().await.unwrap() {
            MonitorEvent::GpsStatusChanged(status) => assert_eq!(status, GpsStatus::Locked),
            MonitorEvent::EtaUpdated { eta, .. } => eta_update = Some(eta),
            MonitorEvent::EtaRefreshFailed(_) => failures += 1,
            MonitorEvent::StatusChanged(transition) => break transition,
            _ => {}
        }
    };

    // First refresh at +120 returned 600s; later failures kept that deadline
    assert_eq!(eta_update, Some(start + secs(720)));
    assert!(failures >= 1);
    assert_eq!(reached.to, TripStatus::EtaReached);
    assert_eq!(reached.at, start + secs(720));
    assert_eq!(monitor.snapshot().countdown_target, Some(start + secs(750)));

    // Preview plus refreshes, all but the first from the position fix
    assert!(provider.request_count() >= 3);
}

#[tokio::test(start_paused = true)]
async fn test_refresh_skipped_without_position() {
    let notifier = RecordingNotifier::new();
    let profile = profile();
    let config = MonitorConfig::default();

    let provider = ScriptedRoutingProvider::fixed(1800);
    let planner = TripPlanner::new(&profile, &config.trip);
    let preview = planner
        .preview_route(provider.as_ref(), "Home", "Office", config.eta.request_timeout())
        .await
        .unwrap();
    let trip = planner.destination_trip(&preview, Instant::now()).unwrap();
    let start = trip.start_time();

    let monitor = TripMonitor::start(
        trip,
        &profile,
        MonitorServices::new(dispatcher(notifier)).with_routing(provider.clone()),
        &config,
    );

    sleep_until(start + secs(600)).await;
    assert_eq!(provider.request_count(), 1);
    assert_eq!(monitor.snapshot().eta, start + secs(1800));
    assert_eq!(monitor.snapshot().gps_status, GpsStatus::Searching);
}

#[tokio::test(start_paused = true)]
async fn test_sensor_failure_degrades_to_green() {
    let profile = motion_profile();
    let (sensor, feed) = ChannelSensor::new(RiskSource::Motion);

    let monitor = TripMonitor::start(
        timer_trip(&profile, 600),
        &profile,
        MonitorServices::new(dispatcher(RecordingNotifier::new()))
            .with_motion_sensor(Arc::new(sensor)),
        &MonitorConfig::default(),
    );
    let mut events = monitor.subscribe().await;

    while feed.subscriber_count() == 0 {
        tokio::task::yield_now().await;
    }

    feed.push(RiskTier::Concern);
    assert_eq!(next_level(&mut events).await, SafetyLevel::Yellow);

    feed.fail(SensorError::Unavailable("accelerometer offline".to_string()));
    assert_eq!(next_level(&mut events).await, SafetyLevel::Green);

    assert_eq!(monitor.snapshot().motion_tier, RiskTier::Unavailable);
    assert_eq!(monitor.status(), TripStatus::Active);
}

#[tokio::test(start_paused = true)]
async fn test_toggle_sensors_at_runtime() {
    let profile = motion_profile();
    let (sensor, feed) = ChannelSensor::new(RiskSource::Motion);

    let monitor = TripMonitor::start(
        timer_trip(&profile, 600),
        &profile,
        MonitorServices::new(dispatcher(RecordingNotifier::new()))
            .with_motion_sensor(Arc::new(sensor)),
        &MonitorConfig::default(),
    );

    // No audio sensor was provided
    assert_eq!(monitor.set_sensor_enabled(RiskSource::Audio, true).await, Ok(false));

    assert_eq!(monitor.set_sensor_enabled(RiskSource::Motion, false).await, Ok(false));
    while feed.subscriber_count() != 0 {
        tokio::task::yield_now().await;
    }

    assert_eq!(monitor.set_sensor_enabled(RiskSource::Motion, true).await, Ok(true));
    while feed.subscriber_count() == 0 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn test_end_trip_tears_everything_down() {
    let notifier = RecordingNotifier::new();
    let profile = motion_profile();
    let trip = timer_trip(&profile, 10);
    let start = trip.start_time();
    let (sensor, feed) = ChannelSensor::new(RiskSource::Motion);

    let mut monitor = TripMonitor::start(
        trip,
        &profile,
        MonitorServices::new(dispatcher(notifier.clone())).with_motion_sensor(Arc::new(sensor)),
        &MonitorConfig::default(),
    );
    let mut events = monitor.subscribe().await;

    sleep_until(start + secs(45)).await;
    assert_eq!(monitor.end_trip().await, Ok(TripStatus::CheckingIn));
    assert!(!monitor.is_running());
    assert_eq!(feed.subscriber_count(), 0);
    assert!(monitor.snapshot().ended);

    let mut ended = false;
    while let Ok(event) = events.try_recv() {
        if let MonitorEvent::Ended { status } = event {
            assert_eq!(status, TripStatus::CheckingIn);
            ended = true;
        }
    }
    assert!(ended);

    // Safe to call again; other actions report the loop is gone
    assert_eq!(monitor.end_trip().await, Ok(TripStatus::CheckingIn));
    assert_eq!(monitor.submit_pin(SAFE_PIN).await, Err(MonitorError::NotRunning));

    sleep(secs(3600)).await;
    assert_eq!(notifier.count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_end_trip_from_terminal_state() {
    let profile = profile();
    let mut monitor = TripMonitor::start(
        timer_trip(&profile, 600),
        &profile,
        MonitorServices::new(dispatcher(RecordingNotifier::new())),
        &MonitorConfig::default(),
    );

    monitor.submit_pin(SAFE_PIN).await.unwrap();
    assert_eq!(monitor.end_trip().await, Ok(TripStatus::Safe));
}

#[tokio::test(start_paused = true)]
async fn test_unschedulable_route_duration_keeps_monitor_alive() {
    let notifier = RecordingNotifier::new();
    let mut profile = profile();
    profile.permissions.location = true;
    let config = MonitorConfig::default();

    let provider = ScriptedRoutingProvider::new(
        vec![Ok(RouteEstimate::new(1800))],
        Ok(RouteEstimate::new(u64::MAX)),
    );
    let planner = TripPlanner::new(&profile, &config.trip);
    let preview = planner
        .preview_route(provider.as_ref(), "Home", "Office", config.eta.request_timeout())
        .await
        .unwrap();
    let trip = planner.destination_trip(&preview, Instant::now()).unwrap();
    let start = trip.start_time();

    let (source, position) = ChannelPositionSource::new();
    let monitor = TripMonitor::start(
        trip,
        &profile,
        MonitorServices::new(dispatcher(notifier.clone()))
            .with_routing(provider.clone())
            .with_position(Arc::new(source)),
        &config,
    );
    let mut events = monitor.subscribe().await;

    while position.subscriber_count() == 0 {
        tokio::task::yield_now().await;
    }
    position.push(Coordinates::new(40.71, -74.0));

    let error = loop {
        if let MonitorEvent::EtaRefreshFailed(error) = events.recv().await.unwrap() {
            break error;
        }
    };
    assert_eq!(error, RoutingError::DurationOutOfRange(u64::MAX));

    sleep_until(start + secs(130)).await;
    assert!(monitor.is_running());
    assert_eq!(monitor.status(), TripStatus::Active);
    assert_eq!(monitor.snapshot().eta, start + secs(1800));
    assert_eq!(monitor.snapshot().countdown_target, Some(start + secs(1800)));

    // The loop still serves user actions
    let report = monitor.submit_pin(SAFE_PIN).await.unwrap();
    assert_eq!(report.new_status(), Some(TripStatus::Safe));
}

#[tokio::test(start_paused = true)]
async fn test_end_trip_releases_alert_latch() {
    let notifier = RecordingNotifier::new();
    let shared = dispatcher(notifier.clone());
    let profile = profile();

    let mut monitor = TripMonitor::start(
        timer_trip(&profile, 600),
        &profile,
        MonitorServices::new(Arc::clone(&shared)),
        &MonitorConfig::default(),
    );
    let trip_id = monitor.snapshot().trip_id;

    monitor.submit_pin(DURESS_PIN).await.unwrap();
    assert!(shared.has_notified(trip_id).await);

    assert_eq!(monitor.end_trip().await, Ok(TripStatus::Duress));
    assert!(!shared.has_notified(trip_id).await);
    assert_eq!(notifier.count(), 1);
}
