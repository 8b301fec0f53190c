//! Simulated trip
//!
//! Runs a short timer trip with a scripted motion sensor and prints the
//! status event stream as JSON.
//!
//! ```text
//! cargo run --example simulated_trip -- [unattended|safe|duress|risk] [config.json]
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use safetrip_lib::alert::{AlertDispatcher, LogNotifier};
use safetrip_lib::config::ConfigManager;
use safetrip_lib::monitor::{MonitorEvent, MonitorServices, TripMonitor};
use safetrip_lib::sensors::{ChannelSensor, RiskSource, RiskTier};
use safetrip_lib::trip::{Contact, Permissions, SafetyCredentials, TripPlanner, UserProfile};
use safetrip_lib::utils::logging::init_logging;
use tokio::time::{self, Instant};

#[derive(Debug, Clone, Copy, PartialEq)]
enum Scenario {
    Unattended,
    Safe,
    Duress,
    Risk,
}

impl Scenario {
    fn parse(arg: Option<&str>) -> Result<Self> {
        Ok(match arg.unwrap_or("unattended") {
            "unattended" => Self::Unattended,
            "safe" => Self::Safe,
            "duress" => Self::Duress,
            "risk" => Self::Risk,
            other => bail!("unknown scenario '{}'", other),
        })
    }
}

fn demo_profile() -> Result<UserProfile> {
    Ok(UserProfile {
        name: "Demo".to_string(),
        credentials: SafetyCredentials::new("1234", "9999", "Pineapple")?,
        contacts: vec![Contact::new("c1", "Alice", "+15550100", "Sister")],
        permissions: Permissions {
            motion: true,
            ..Permissions::default()
        },
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let scenario = Scenario::parse(args.first().map(String::as_str))?;

    let mut config = match args.get(1) {
        Some(path) => ConfigManager::load(path).context("failed to load config")?,
        None => Default::default(),
    };
    // Compress the escalation timeline so the demo finishes quickly
    config.escalation.grace_period_secs = 3;
    config.escalation.check_in_window_secs = 3;
    config.escalation.alarm_duration_secs = 2;

    let profile = demo_profile()?;
    let trip = TripPlanner::new(&profile, &config.trip).timer_trip(Duration::from_secs(5), Instant::now())?;

    let (sensor, feed) = ChannelSensor::new(RiskSource::Motion);
    let dispatcher = Arc::new(AlertDispatcher::new(
        Arc::new(LogNotifier),
        config.alert.delivery_timeout(),
    ));
    let services = MonitorServices::new(dispatcher).with_motion_sensor(Arc::new(sensor));

    let mut monitor = TripMonitor::start(trip, &profile, services, &config);
    let mut events = monitor.subscribe().await;

    let mut ticker = time::interval(Duration::from_secs(1));
    let script = time::sleep(Duration::from_secs(2));
    tokio::pin!(script);
    let mut scripted = false;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                println!("{}", serde_json::to_string(&monitor.status_event())?);
            }

            _ = &mut script, if !scripted => {
                scripted = true;
                match scenario {
                    Scenario::Unattended => {}
                    Scenario::Safe => {
                        let report = monitor.submit_pin("1234").await?;
                        println!("safe pin -> {:?}", report.new_status());
                    }
                    Scenario::Duress => {
                        let report = monitor.submit_pin("9999").await?;
                        println!("duress pin -> {:?}, delivery {:?}", report.new_status(), report.delivery);
                    }
                    Scenario::Risk => {
                        feed.push(RiskTier::Concern);
                        time::sleep(Duration::from_millis(500)).await;
                        feed.push(RiskTier::HighRisk);
                    }
                }
            }

            event = events.recv() => match event {
                Some(MonitorEvent::StatusChanged(transition)) => {
                    println!("{} -> {} ({:?})", transition.from, transition.to, transition.cause);
                    if transition.to.is_terminal() {
                        break;
                    }
                }
                Some(MonitorEvent::AlertDispatched { kind, result }) => {
                    println!("alert {} -> {:?}", kind.name(), result);
                }
                Some(other) => println!("{:?}", other),
                None => break,
            },
        }
    }

    let status = monitor.end_trip().await?;
    println!("{}", serde_json::to_string_pretty(&monitor.status_event())?);
    println!("trip ended in {}", status);
    Ok(())
}
