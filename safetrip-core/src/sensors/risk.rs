/// Risk samples and the sensor contract
///
/// Signal processing (impact detection, loudness, speech matching) lives in
/// the platform layer. The core only sees the resulting risk tier.

use futures_util::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::time::Instant;

use super::error::SensorError;

/// Classified risk tier of a single sensor sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskTier {
    /// Nothing unusual
    Normal,
    /// Elevated but not actionable
    Concern,
    /// Impact, scream, or spoken distress word
    HighRisk,
    /// Sensor disabled, missing, or failing
    Unavailable,
}

impl RiskTier {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Normal => "NORMAL",
            Self::Concern => "CONCERN",
            Self::HighRisk => "HIGH_RISK",
            Self::Unavailable => "UNAVAILABLE",
        }
    }
}

/// Sensor that produced a sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskSource {
    Motion,
    Audio,
}

impl RiskSource {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Motion => "MOTION",
            Self::Audio => "AUDIO",
        }
    }
}

/// A single classified sample
///
/// Only the latest sample per source is retained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RiskSample {
    pub tier: RiskTier,
    pub source: RiskSource,
    pub timestamp: Instant,
}

impl RiskSample {
    pub fn new(source: RiskSource, tier: RiskTier, timestamp: Instant) -> Self {
        Self {
            tier,
            source,
            timestamp,
        }
    }

    /// Neutral placeholder sample for a disabled or failing sensor
    pub fn unavailable(source: RiskSource, timestamp: Instant) -> Self {
        Self::new(source, RiskTier::Unavailable, timestamp)
    }
}

/// Risk sensor contract
///
/// `subscribe` returns a fresh, lazy, potentially infinite stream each time
/// it is called, so a sampler can restart the sensor after the stream ends.
/// Dropping the stream unsubscribes.
pub trait RiskSensor: Send + Sync {
    /// Which source this sensor feeds
    fn source(&self) -> RiskSource;

    /// Start a new sample stream
    fn subscribe(&self) -> BoxStream<'static, Result<RiskTier, SensorError>>;
}

/// Channel-backed sensor
///
/// Lets platform code (or tests) push already-classified tiers into the
/// core without implementing [`RiskSensor`] itself.
///
/// # Example
/// ```
/// use safetrip_lib::sensors::{ChannelSensor, RiskSensor, RiskSource, RiskTier};
///
/// let (sensor, feed) = ChannelSensor::new(RiskSource::Motion);
/// assert_eq!(sensor.source(), RiskSource::Motion);
///
/// // No subscriber yet: the sample is dropped, which is fine
/// feed.push(RiskTier::Normal);
/// ```
pub struct ChannelSensor {
    source: RiskSource,
    tx: broadcast::Sender<Result<RiskTier, SensorError>>,
}

/// Producer side of a [`ChannelSensor`]
#[derive(Clone)]
pub struct SensorFeed {
    tx: broadcast::Sender<Result<RiskTier, SensorError>>,
}

impl ChannelSensor {
    /// Create a sensor and its feed
    pub fn new(source: RiskSource) -> (Self, SensorFeed) {
        let (tx, _) = broadcast::channel(16);
        let feed = SensorFeed { tx: tx.clone() };
        (Self { source, tx }, feed)
    }
}

impl RiskSensor for ChannelSensor {
    fn source(&self) -> RiskSource {
        self.source
    }

    fn subscribe(&self) -> BoxStream<'static, Result<RiskTier, SensorError>> {
        let rx = self.tx.subscribe();
        stream::unfold(rx, |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(item) => return Some((item, rx)),
                    // Older samples are superseded anyway
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        })
        .boxed()
    }
}

impl SensorFeed {
    /// Push a classified tier; returns `false` when nobody is subscribed
    pub fn push(&self, tier: RiskTier) -> bool {
        self.tx.send(Ok(tier)).is_ok()
    }

    /// Report a sensor failure
    pub fn fail(&self, error: SensorError) -> bool {
        self.tx.send(Err(error)).is_ok()
    }

    /// Number of active subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_names() {
        assert_eq!(RiskTier::HighRisk.name(), "HIGH_RISK");
        assert_eq!(RiskTier::Unavailable.name(), "UNAVAILABLE");
        assert_eq!(RiskSource::Audio.name(), "AUDIO");
    }

    #[test]
    fn test_tier_serialization() {
        let json = serde_json::to_string(&RiskTier::HighRisk).unwrap();
        assert_eq!(json, "\"HIGH_RISK\"");
    }

    #[tokio::test]
    async fn test_channel_sensor_stream() {
        let (sensor, feed) = ChannelSensor::new(RiskSource::Audio);
        let mut samples = sensor.subscribe();
        assert_eq!(feed.subscriber_count(), 1);

        assert!(feed.push(RiskTier::Concern));
        assert!(feed.fail(SensorError::PermissionDenied));

        assert_eq!(samples.next().await, Some(Ok(RiskTier::Concern)));
        assert_eq!(samples.next().await, Some(Err(SensorError::PermissionDenied)));

        drop(samples);
        assert_eq!(feed.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_channel_sensor_restartable() {
        let (sensor, feed) = ChannelSensor::new(RiskSource::Motion);

        let first = sensor.subscribe();
        drop(first);

        let mut second = sensor.subscribe();
        feed.push(RiskTier::HighRisk);
        assert_eq!(second.next().await, Some(Ok(RiskTier::HighRisk)));
    }
}
