//! 状态快照
//!
//! 展示层只读的行程状态。倒计时由快照和当前时间推导，从不存储

use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use super::machine::{TimerKind, TripStateMachine};
use super::trip_status::TripStatus;
use crate::sensors::{GpsStatus, RiskSource, RiskTier, SafetyLevel};
use crate::trip::{Coordinates, TripId, TripMode};

/// 行程状态快照
#[derive(Debug, Clone, PartialEq)]
pub struct TripSnapshot {
    pub trip_id: TripId,
    pub mode: TripMode,
    pub destination: String,
    pub status: TripStatus,
    pub safety_level: SafetyLevel,
    pub motion_tier: RiskTier,
    pub audio_tier: RiskTier,
    pub gps_status: GpsStatus,
    pub last_position: Option<Coordinates>,
    /// 当前预计到达时间
    pub eta: Instant,
    /// 预计到达时间（Unix 毫秒）
    pub eta_ms: u64,
    /// 当前激活的定时器
    pub armed_timer: Option<TimerKind>,
    /// 倒计时目标
    pub countdown_target: Option<Instant>,
    /// 是否已结束监控
    pub ended: bool,
}

impl TripSnapshot {
    /// 从状态机生成快照
    pub fn capture(
        machine: &TripStateMachine,
        gps_status: GpsStatus,
        last_position: Option<Coordinates>,
    ) -> Self {
        let trip = machine.trip();
        Self {
            trip_id: trip.id(),
            mode: trip.mode(),
            destination: trip.destination_label().to_string(),
            status: machine.status(),
            safety_level: machine.safety_level(),
            motion_tier: machine.tier(RiskSource::Motion),
            audio_tier: machine.tier(RiskSource::Audio),
            gps_status,
            last_position,
            eta: trip.eta(),
            eta_ms: trip.eta_unix_ms(),
            armed_timer: machine.armed_timer(),
            countdown_target: machine.countdown_target(),
            ended: machine.is_ended(),
        }
    }

    /// 剩余时间
    pub fn countdown(&self, now: Instant) -> Option<Duration> {
        self.countdown_target
            .map(|target| target.saturating_duration_since(now))
    }
}

/// 状态事件载荷
///
/// 用于发送到展示层的可序列化状态
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusEvent {
    /// 行程 ID
    pub trip_id: TripId,
    /// 状态名称
    pub status: TripStatus,
    /// 是否为终止状态
    pub is_terminal: bool,
    /// 是否在升级流程中
    pub is_escalating: bool,
    /// 安全等级
    pub safety_level: SafetyLevel,
    /// 运动传感器风险等级
    pub motion: RiskTier,
    /// 音频传感器风险等级
    pub audio: RiskTier,
    /// GPS 状态
    pub gps: GpsStatus,
    /// 预计到达时间（Unix 毫秒）
    pub eta_ms: u64,
    /// 剩余秒数
    pub countdown_secs: u64,
    /// 剩余时间 `mm:ss`
    pub countdown: String,
}

impl StatusEvent {
    /// 从快照生成事件
    pub fn from_snapshot(snapshot: &TripSnapshot, now: Instant) -> Self {
        let remaining = snapshot.countdown(now).unwrap_or(Duration::ZERO);
        Self {
            trip_id: snapshot.trip_id,
            status: snapshot.status,
            is_terminal: snapshot.status.is_terminal(),
            is_escalating: snapshot.status.is_escalating(),
            safety_level: snapshot.safety_level,
            motion: snapshot.motion_tier,
            audio: snapshot.audio_tier,
            gps: snapshot.gps_status,
            eta_ms: snapshot.eta_ms,
            countdown_secs: remaining.as_secs(),
            countdown: format_countdown(remaining),
        }
    }
}

/// 格式化倒计时为 `mm:ss`
///
/// # Example
/// ```
/// use std::time::Duration;
/// use safetrip_lib::state::format_countdown;
///
/// assert_eq!(format_countdown(Duration::from_secs(75)), "01:15");
/// assert_eq!(format_countdown(Duration::ZERO), "00:00");
/// ```
pub fn format_countdown(remaining: Duration) -> String {
    let secs = remaining.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}
