/// Signal fusion
///
/// Collapses the latest motion and audio tiers into one safety level.
/// There is no hysteresis: every new sample recomputes the level.

use serde::{Deserialize, Serialize};

use super::risk::{RiskSample, RiskSource, RiskTier};

/// Fused safety level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SafetyLevel {
    Green,
    Yellow,
    Red,
}

impl SafetyLevel {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Green => "GREEN",
            Self::Yellow => "YELLOW",
            Self::Red => "RED",
        }
    }
}

/// Fuse two tiers
///
/// RED if either is `HighRisk`, YELLOW if either is `Concern`, GREEN
/// otherwise. `Unavailable` is not a risk signal.
///
/// # Example
/// ```
/// use safetrip_lib::sensors::{fuse, RiskTier, SafetyLevel};
///
/// assert_eq!(fuse(RiskTier::Normal, RiskTier::HighRisk), SafetyLevel::Red);
/// assert_eq!(fuse(RiskTier::Unavailable, RiskTier::Unavailable), SafetyLevel::Green);
/// ```
pub fn fuse(motion: RiskTier, audio: RiskTier) -> SafetyLevel {
    use RiskTier::*;

    match (motion, audio) {
        (HighRisk, _) | (_, HighRisk) => SafetyLevel::Red,
        (Concern, _) | (_, Concern) => SafetyLevel::Yellow,
        _ => SafetyLevel::Green,
    }
}

/// Latest tier per source plus the fused level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalFuser {
    motion: RiskTier,
    audio: RiskTier,
}

impl SignalFuser {
    /// Start from the given tiers
    pub fn new(motion: RiskTier, audio: RiskTier) -> Self {
        Self { motion, audio }
    }

    /// Replace the tier for the sample's source and return the new level
    pub fn update(&mut self, sample: RiskSample) -> SafetyLevel {
        match sample.source {
            RiskSource::Motion => self.motion = sample.tier,
            RiskSource::Audio => self.audio = sample.tier,
        }
        self.level()
    }

    pub fn level(&self) -> SafetyLevel {
        fuse(self.motion, self.audio)
    }

    pub fn tier(&self, source: RiskSource) -> RiskTier {
        match source {
            RiskSource::Motion => self.motion,
            RiskSource::Audio => self.audio,
        }
    }
}

impl Default for SignalFuser {
    fn default() -> Self {
        Self::new(RiskTier::Normal, RiskTier::Normal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[test]
    fn test_update_replaces_only_its_source() {
        let now = Instant::now();
        let mut fuser = SignalFuser::default();

        assert_eq!(
            fuser.update(RiskSample::new(RiskSource::Motion, RiskTier::Concern, now)),
            SafetyLevel::Yellow
        );
        assert_eq!(
            fuser.update(RiskSample::new(RiskSource::Audio, RiskTier::HighRisk, now)),
            SafetyLevel::Red
        );
        assert_eq!(fuser.tier(RiskSource::Motion), RiskTier::Concern);

        // Newer sample supersedes the old one
        assert_eq!(
            fuser.update(RiskSample::new(RiskSource::Audio, RiskTier::Normal, now)),
            SafetyLevel::Yellow
        );
    }

    #[test]
    fn test_unavailable_is_neutral() {
        let fuser = SignalFuser::new(RiskTier::Unavailable, RiskTier::Normal);
        assert_eq!(fuser.level(), SafetyLevel::Green);
    }
}
