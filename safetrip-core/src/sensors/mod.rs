/// Risk sensing and position tracking
///
/// Sensors are black boxes emitting a risk tier. Samplers run them in the
/// background; the fuser collapses the latest tiers into a safety level.

/// Sensor error types
pub mod error;

/// Signal fusion
pub mod fuser;

/// Position tracking
pub mod position;

/// Risk samples and the sensor contract
pub mod risk;

/// Background risk samplers
pub mod sampler;

// Re-export commonly used types
pub use error::{PositionError, SensorError, SensorResult};
pub use fuser::{fuse, SafetyLevel, SignalFuser};
pub use position::{
    ChannelPositionSource, GpsStatus, PositionFeed, PositionSource, PositionState,
    PositionTracker,
};
pub use risk::{ChannelSensor, RiskSample, RiskSensor, RiskSource, RiskTier, SensorFeed};
pub use sampler::RiskSampler;
