/// Risk samplers
///
/// One sampler per source. A sampler drives its sensor stream in a
/// background task and republishes each classified sample into a `watch`
/// channel, so the consumer always sees the latest value and the producer
/// never blocks on a slow consumer.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::risk::{RiskSample, RiskSensor, RiskSource, RiskTier};

/// Background sampler for a single risk source
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use std::time::Duration;
/// use safetrip_lib::sensors::{ChannelSensor, RiskSampler, RiskSource, RiskTier};
///
/// #[tokio::main]
/// async fn main() {
///     let (sensor, feed) = ChannelSensor::new(RiskSource::Motion);
///     let mut sampler = RiskSampler::new(
///         RiskSource::Motion,
///         Some(Arc::new(sensor)),
///         Duration::from_secs(1),
///     );
///     let mut rx = sampler.subscribe();
///
///     sampler.set_enabled(true);
///     feed.push(RiskTier::HighRisk);
///
///     rx.changed().await.unwrap();
///     println!("latest: {:?}", *rx.borrow());
///
///     sampler.stop().await;
/// }
/// ```
pub struct RiskSampler {
    /// Source this sampler publishes for
    source: RiskSource,
    /// Underlying sensor (None when the platform has none)
    sensor: Option<Arc<dyn RiskSensor>>,
    /// Latest-sample channel
    tx: Arc<watch::Sender<RiskSample>>,
    /// Delay before re-subscribing after the stream ends
    restart_delay: Duration,
    /// Sampling task
    task: Option<JoinHandle<()>>,
}

impl RiskSampler {
    /// Create a stopped sampler publishing `UNAVAILABLE`
    pub fn new(
        source: RiskSource,
        sensor: Option<Arc<dyn RiskSensor>>,
        restart_delay: Duration,
    ) -> Self {
        let (tx, _) = watch::channel(RiskSample::unavailable(source, Instant::now()));

        Self {
            source,
            sensor,
            tx: Arc::new(tx),
            restart_delay,
            task: None,
        }
    }

    /// Subscribe to the latest sample
    pub fn subscribe(&self) -> watch::Receiver<RiskSample> {
        self.tx.subscribe()
    }

    /// Latest published sample
    pub fn latest(&self) -> RiskSample {
        *self.tx.borrow()
    }

    pub fn source(&self) -> RiskSource {
        self.source
    }

    /// Whether the sampling task is running
    pub fn is_enabled(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Enable or disable sampling
    ///
    /// Enabling without a sensor leaves the source `UNAVAILABLE`.
    /// Returns whether the sampler is enabled afterwards.
    pub fn set_enabled(&mut self, enabled: bool) -> bool {
        if enabled == self.is_enabled() {
            return enabled;
        }

        if !enabled {
            self.abort();
            self.tx
                .send_replace(RiskSample::unavailable(self.source, Instant::now()));
            info!(source = %self.source.name(), "Risk sampler disabled");
            return false;
        }

        let Some(sensor) = self.sensor.clone() else {
            warn!(source = %self.source.name(), "No sensor available, source stays UNAVAILABLE");
            return false;
        };

        self.tx
            .send_replace(RiskSample::new(self.source, RiskTier::Normal, Instant::now()));

        let tx = Arc::clone(&self.tx);
        let source = self.source;
        let restart_delay = self.restart_delay;
        self.task = Some(tokio::spawn(async move {
            sampling_task(sensor, source, tx, restart_delay).await;
        }));

        info!(source = %self.source.name(), "Risk sampler enabled");
        true
    }

    /// Stop sampling and wait for the task to exit
    pub async fn stop(&mut self) {
        if let Some(handle) = self.task.take() {
            handle.abort();
            match handle.await {
                Ok(()) => debug!(source = %self.source.name(), "Sampler task completed"),
                Err(e) if e.is_cancelled() => {
                    debug!(source = %self.source.name(), "Sampler task cancelled")
                }
                Err(e) => warn!(source = %self.source.name(), error = %e, "Sampler task panicked"),
            }
        }
    }

    fn abort(&mut self) {
        if let Some(handle) = self.task.take() {
            handle.abort();
        }
    }
}

impl Drop for RiskSampler {
    fn drop(&mut self) {
        self.abort();
    }
}

/// Drive the sensor stream forever, restarting it when it ends
async fn sampling_task(
    sensor: Arc<dyn RiskSensor>,
    source: RiskSource,
    tx: Arc<watch::Sender<RiskSample>>,
    restart_delay: Duration,
) {
    loop {
        let mut samples = sensor.subscribe();
        let mut count = 0u64;

        while let Some(item) = samples.next().await {
            count += 1;
            let sample = match item {
                Ok(tier) => {
                    debug!(source = %source.name(), tier = %tier.name(), "Risk sample");
                    RiskSample::new(source, tier, Instant::now())
                }
                Err(e) => {
                    warn!(source = %source.name(), error = %e, "Sensor error, degrading to UNAVAILABLE");
                    RiskSample::unavailable(source, Instant::now())
                }
            };
            tx.send_replace(sample);
        }

        warn!(
            source = %source.name(),
            samples = count,
            delay_ms = restart_delay.as_millis() as u64,
            "Sensor stream ended, restarting"
        );
        tx.send_replace(RiskSample::unavailable(source, Instant::now()));
        tokio::time::sleep(restart_delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::error::SensorError;
    use crate::sensors::risk::ChannelSensor;

    fn sampler() -> (RiskSampler, crate::sensors::risk::SensorFeed) {
        let (sensor, feed) = ChannelSensor::new(RiskSource::Motion);
        let sampler = RiskSampler::new(
            RiskSource::Motion,
            Some(Arc::new(sensor)),
            Duration::from_millis(100),
        );
        (sampler, feed)
    }

    #[tokio::test]
    async fn test_starts_unavailable() {
        let (sampler, _feed) = sampler();
        assert_eq!(sampler.latest().tier, RiskTier::Unavailable);
        assert!(!sampler.is_enabled());
    }

    #[tokio::test]
    async fn test_enable_publishes_samples() {
        let (mut sampler, feed) = sampler();
        let mut rx = sampler.subscribe();

        assert!(sampler.set_enabled(true));
        assert_eq!(rx.borrow_and_update().tier, RiskTier::Normal);

        // Wait for the task to subscribe before pushing
        while feed.subscriber_count() == 0 {
            tokio::task::yield_now().await;
        }
        feed.push(RiskTier::HighRisk);

        rx.changed().await.unwrap();
        let sample = *rx.borrow_and_update();
        assert_eq!(sample.tier, RiskTier::HighRisk);
        assert_eq!(sample.source, RiskSource::Motion);

        sampler.stop().await;
    }

    #[tokio::test]
    async fn test_sensor_error_degrades_to_unavailable() {
        let (mut sampler, feed) = sampler();
        let mut rx = sampler.subscribe();
        sampler.set_enabled(true);
        rx.borrow_and_update();

        while feed.subscriber_count() == 0 {
            tokio::task::yield_now().await;
        }
        feed.fail(SensorError::Unavailable("accelerometer offline".to_string()));

        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().tier, RiskTier::Unavailable);

        sampler.stop().await;
    }

    #[tokio::test]
    async fn test_disable_stops_task() {
        let (mut sampler, feed) = sampler();
        sampler.set_enabled(true);
        while feed.subscriber_count() == 0 {
            tokio::task::yield_now().await;
        }

        assert!(!sampler.set_enabled(false));
        assert_eq!(sampler.latest().tier, RiskTier::Unavailable);

        // Aborted task drops its stream
        while feed.subscriber_count() != 0 {
            tokio::task::yield_now().await;
        }
        assert!(!sampler.is_enabled());
    }

    #[tokio::test]
    async fn test_enable_without_sensor() {
        let mut sampler = RiskSampler::new(RiskSource::Audio, None, Duration::from_secs(1));
        assert!(!sampler.set_enabled(true));
        assert_eq!(sampler.latest().tier, RiskTier::Unavailable);
    }
}
