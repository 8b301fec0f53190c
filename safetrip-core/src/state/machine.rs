//! 行程安全状态机
//!
//! 状态机是同步的，时间由调用方注入。事件循环负责把定时器到期、
//! 传感器样本和用户操作逐个送进来，状态机本身不做任何 I/O。
//!
//! 升级定时器以前一个边界为锚点：宽限期在 `eta + 30s` 结束，
//! 确认窗口在 `eta + 60s` 结束，告警倒计时在 `eta + 65s` 结束。
//! 任意时刻只有一个定时器处于激活状态。

use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use super::trip_status::TripStatus;
use crate::alert::AlertKind;
use crate::config::EscalationConfig;
use crate::routing::{EtaTracker, RoutingResult};
use crate::sensors::{RiskSample, RiskSource, RiskTier, SafetyLevel, SignalFuser};
use crate::trip::{validate_pin_format, PinMatch, SafetyCredentials, Trip, ValidationResult};

/// 升级时间参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EscalationTimings {
    /// ETA_REACHED 持续时间
    pub grace_period: Duration,
    /// CHECKING_IN 持续时间
    pub check_in_window: Duration,
    /// ALARMING 持续时间
    pub alarm_duration: Duration,
    /// 延长行程的固定增量
    pub extend_increment: Duration,
}

impl Default for EscalationTimings {
    fn default() -> Self {
        Self::from(&EscalationConfig::default())
    }
}

impl From<&EscalationConfig> for EscalationTimings {
    fn from(config: &EscalationConfig) -> Self {
        Self {
            grace_period: Duration::from_secs(config.grace_period_secs),
            check_in_window: Duration::from_secs(config.check_in_window_secs),
            alarm_duration: Duration::from_secs(config.alarm_duration_secs),
            extend_increment: Duration::from_secs(config.extend_increment_mins * 60),
        }
    }
}

/// 定时器类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimerKind {
    /// ACTIVE -> ETA_REACHED
    EtaDeadline,
    /// ETA_REACHED -> CHECKING_IN
    GracePeriod,
    /// CHECKING_IN -> ALARMING
    CheckInWindow,
    /// ALARMING -> ALERT_TRIGGERED
    AlarmCountdown,
}

/// 单槽定时器
///
/// 重新设置会覆盖旧的截止时间，旧定时器不可能再触发
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EscalationTimer {
    armed: Option<(TimerKind, Instant)>,
}

impl EscalationTimer {
    /// 设置定时器，替换之前的定时器
    pub fn arm(&mut self, kind: TimerKind, at: Instant) {
        self.armed = Some((kind, at));
    }

    /// 取消定时器
    pub fn cancel(&mut self) {
        self.armed = None;
    }

    /// 截止时间
    pub fn deadline(&self) -> Option<Instant> {
        self.armed.map(|(_, at)| at)
    }

    /// 定时器类型
    pub fn kind(&self) -> Option<TimerKind> {
        self.armed.map(|(kind, _)| kind)
    }

    /// 如果已到期，取出定时器
    pub fn take_due(&mut self, now: Instant) -> Option<(TimerKind, Instant)> {
        match self.armed {
            Some((kind, at)) if at <= now => {
                self.armed = None;
                Some((kind, at))
            }
            _ => None,
        }
    }
}

/// 状态转换原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransitionCause {
    EtaReached,
    GraceExpired,
    CheckInExpired,
    AlarmExpired,
    /// 传感器检测到高风险
    HighRiskSignal(RiskSource),
    SafePin,
    DuressPin,
    Panic,
    Extended,
}

/// 一次状态转换
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub from: TripStatus,
    pub to: TripStatus,
    pub cause: TransitionCause,
    #[serde(skip)]
    pub at: Instant,
}

impl Transition {
    /// 该转换需要发出的告警
    pub fn alert_kind(&self) -> Option<AlertKind> {
        match self.to {
            TripStatus::AlertTriggered => Some(AlertKind::Alert),
            TripStatus::Duress => Some(AlertKind::SilentDuress),
            TripStatus::Panic => Some(AlertKind::Panic),
            _ => None,
        }
    }
}

/// 用户操作结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    /// 状态已改变
    Applied(Transition),
    /// 行程已终止或已结束，操作被忽略
    NoOp,
    /// PIN 不匹配，需要重新输入
    Rejected,
}

impl ActionOutcome {
    pub fn transition(&self) -> Option<&Transition> {
        match self {
            Self::Applied(transition) => Some(transition),
            _ => None,
        }
    }
}

/// 行程状态机
///
/// 独占行程状态和 `eta`
///
/// # Example
/// ```
/// use std::time::Duration;
/// use safetrip_lib::state::{EscalationTimings, TripStateMachine, TripStatus};
/// use safetrip_lib::trip::{Contact, SafetyCredentials, Trip, TripMode};
/// use tokio::time::Instant;
///
/// let now = Instant::now();
/// let trip = Trip::new(
///     TripMode::Timer,
///     "N/A",
///     "Timed Trip",
///     vec![Contact::new("1", "Alice", "+15550100", "Sister")],
///     now,
///     Duration::from_secs(10),
/// )
/// .unwrap();
/// let credentials = SafetyCredentials::new("1234", "9999", "pineapple").unwrap();
///
/// let mut machine = TripStateMachine::new(trip, credentials, EscalationTimings::default());
/// assert_eq!(machine.status(), TripStatus::Active);
///
/// let transitions = machine.on_tick(now + Duration::from_secs(10));
/// assert_eq!(transitions[0].to, TripStatus::EtaReached);
/// ```
#[derive(Debug)]
pub struct TripStateMachine {
    trip: Trip,
    credentials: SafetyCredentials,
    timings: EscalationTimings,
    status: TripStatus,
    timer: EscalationTimer,
    fuser: SignalFuser,
    ended: bool,
}

impl TripStateMachine {
    /// 创建状态机
    ///
    /// 紧急求助行程直接处于 PANIC，其它行程从 ACTIVE 开始并以 `eta` 设置定时器
    pub fn new(trip: Trip, credentials: SafetyCredentials, timings: EscalationTimings) -> Self {
        let mut timer = EscalationTimer::default();
        let status = if trip.is_panic() {
            TripStatus::Panic
        } else {
            timer.arm(TimerKind::EtaDeadline, trip.eta());
            TripStatus::Active
        };

        tracing::info!(
            trip_id = %trip.id(),
            mode = %trip.mode().name(),
            status = %status,
            "Trip state machine created"
        );

        Self {
            trip,
            credentials,
            timings,
            status,
            timer,
            fuser: SignalFuser::default(),
            ended: false,
        }
    }

    pub fn status(&self) -> TripStatus {
        self.status
    }

    pub fn trip(&self) -> &Trip {
        &self.trip
    }

    pub fn timings(&self) -> &EscalationTimings {
        &self.timings
    }

    /// 融合后的安全等级
    pub fn safety_level(&self) -> SafetyLevel {
        self.fuser.level()
    }

    /// 某个传感器的最新风险等级
    pub fn tier(&self, source: RiskSource) -> RiskTier {
        self.fuser.tier(source)
    }

    /// 是否已结束监控
    pub fn is_ended(&self) -> bool {
        self.ended
    }

    /// 当前激活的定时器
    pub fn armed_timer(&self) -> Option<TimerKind> {
        self.timer.kind()
    }

    /// 下一个定时器截止时间
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timer.deadline()
    }

    /// 倒计时目标：ACTIVE 时为 `eta`，升级流程中为下一个边界
    pub fn countdown_target(&self) -> Option<Instant> {
        self.timer.deadline()
    }

    /// 剩余时间，终止后为 `None`
    pub fn countdown(&self, now: Instant) -> Option<Duration> {
        self.countdown_target()
            .map(|target| target.saturating_duration_since(now))
    }

    /// 行程开始时需要发出的告警
    pub fn initial_alert(&self) -> Option<AlertKind> {
        self.trip.is_panic().then_some(AlertKind::Panic)
    }

    /// 处理传感器样本
    ///
    /// ACTIVE 时融合等级为 RED 则立即进入 ALARMING
    pub fn on_sample(&mut self, sample: RiskSample, now: Instant) -> Option<Transition> {
        if self.ended {
            return None;
        }

        let previous = self.fuser.level();
        let level = self.fuser.update(sample);
        if level != previous {
            tracing::debug!(
                from = %previous.name(),
                to = %level.name(),
                source = %sample.source.name(),
                "Safety level changed"
            );
        }

        if self.status != TripStatus::Active || level != SafetyLevel::Red {
            return None;
        }

        let source = if sample.tier == RiskTier::HighRisk {
            sample.source
        } else {
            match sample.source {
                RiskSource::Motion => RiskSource::Audio,
                RiskSource::Audio => RiskSource::Motion,
            }
        };

        self.timer
            .arm(TimerKind::AlarmCountdown, now + self.timings.alarm_duration);
        Some(self.transition(TripStatus::Alarming, TransitionCause::HighRiskSignal(source), now))
    }

    /// 处理定时器到期
    ///
    /// 如果调用方来晚了，会依次补上所有已到期的转换
    pub fn on_tick(&mut self, now: Instant) -> Vec<Transition> {
        let mut transitions = Vec::new();
        if self.ended {
            return transitions;
        }

        while let Some((kind, at)) = self.timer.take_due(now) {
            let (expected, to, cause, next) = match kind {
                TimerKind::EtaDeadline => (
                    TripStatus::Active,
                    TripStatus::EtaReached,
                    TransitionCause::EtaReached,
                    Some((TimerKind::GracePeriod, at + self.timings.grace_period)),
                ),
                TimerKind::GracePeriod => (
                    TripStatus::EtaReached,
                    TripStatus::CheckingIn,
                    TransitionCause::GraceExpired,
                    Some((TimerKind::CheckInWindow, at + self.timings.check_in_window)),
                ),
                TimerKind::CheckInWindow => (
                    TripStatus::CheckingIn,
                    TripStatus::Alarming,
                    TransitionCause::CheckInExpired,
                    Some((TimerKind::AlarmCountdown, at + self.timings.alarm_duration)),
                ),
                TimerKind::AlarmCountdown => (
                    TripStatus::Alarming,
                    TripStatus::AlertTriggered,
                    TransitionCause::AlarmExpired,
                    None,
                ),
            };

            if self.status != expected {
                tracing::warn!(
                    timer = ?kind,
                    status = %self.status,
                    "Timer fired in unexpected state, ignoring"
                );
                continue;
            }

            if let Some((next_kind, next_at)) = next {
                self.timer.arm(next_kind, next_at);
            }
            transitions.push(self.transition(to, cause, at));
        }

        transitions
    }

    /// 提交 PIN
    ///
    /// 终止或已结束的行程直接返回 `NoOp`
    ///
    /// # Errors
    ///
    /// PIN 长度或字符不合法时返回 [`crate::trip::ValidationError`]，状态不变
    pub fn submit_pin(&mut self, pin: &str, now: Instant) -> ValidationResult<ActionOutcome> {
        if self.ended || self.status.is_terminal() {
            return Ok(ActionOutcome::NoOp);
        }

        validate_pin_format(pin)?;

        let outcome = match self.credentials.verify(pin) {
            PinMatch::Safe => {
                ActionOutcome::Applied(self.terminate(TripStatus::Safe, TransitionCause::SafePin, now))
            }
            PinMatch::Duress => ActionOutcome::Applied(self.terminate(
                TripStatus::Duress,
                TransitionCause::DuressPin,
                now,
            )),
            PinMatch::NoMatch => {
                tracing::warn!(
                    trip_id = %self.trip.id(),
                    status = %self.status,
                    "Incorrect PIN submitted"
                );
                ActionOutcome::Rejected
            }
        };

        Ok(outcome)
    }

    /// 用户求助
    pub fn trigger_panic(&mut self, now: Instant) -> ActionOutcome {
        if self.ended || self.status.is_terminal() {
            return ActionOutcome::NoOp;
        }
        ActionOutcome::Applied(self.terminate(TripStatus::Panic, TransitionCause::Panic, now))
    }

    /// 延长行程
    ///
    /// `eta` 增加固定增量，取消升级定时器并回到 ACTIVE
    pub fn extend_trip(&mut self, now: Instant) -> ActionOutcome {
        if self.ended || self.status.is_terminal() {
            return ActionOutcome::NoOp;
        }

        match EtaTracker::extend(self.trip.eta(), self.timings.extend_increment) {
            Some(eta) => self.trip.set_eta(eta),
            None => tracing::warn!(trip_id = %self.trip.id(), "ETA cannot be extended further"),
        }
        self.timer.arm(TimerKind::EtaDeadline, self.trip.eta());

        tracing::info!(
            trip_id = %self.trip.id(),
            increment_secs = self.timings.extend_increment.as_secs(),
            "Trip extended"
        );
        ActionOutcome::Applied(self.transition(TripStatus::Active, TransitionCause::Extended, now))
    }

    /// 应用新的路线时长
    ///
    /// 只在 ACTIVE 时生效，返回新的 `eta`；非 ACTIVE 时返回 `Ok(None)`
    ///
    /// # Errors
    ///
    /// 时长无法换算成截止时间时返回 `RoutingError::DurationOutOfRange`，
    /// `eta` 和定时器保持不变
    pub fn refresh_eta(
        &mut self,
        remaining: Duration,
        now: Instant,
    ) -> RoutingResult<Option<Instant>> {
        if self.ended || self.status != TripStatus::Active {
            tracing::debug!(status = %self.status, "Ignoring ETA refresh outside ACTIVE");
            return Ok(None);
        }

        let eta = EtaTracker::refreshed(now, remaining)?;
        let previous = self.trip.eta();
        self.trip.set_eta(eta);
        self.timer.arm(TimerKind::EtaDeadline, self.trip.eta());

        tracing::info!(
            trip_id = %self.trip.id(),
            remaining_secs = remaining.as_secs(),
            moved_earlier = self.trip.eta() < previous,
            "ETA refreshed"
        );
        Ok(Some(self.trip.eta()))
    }

    /// 结束监控，可在任意状态调用
    pub fn end(&mut self) -> TripStatus {
        if !self.ended {
            self.ended = true;
            self.timer.cancel();
            tracing::info!(trip_id = %self.trip.id(), status = %self.status, "Trip ended");
        }
        self.status
    }

    fn terminate(&mut self, to: TripStatus, cause: TransitionCause, at: Instant) -> Transition {
        self.timer.cancel();
        self.transition(to, cause, at)
    }

    fn transition(&mut self, to: TripStatus, cause: TransitionCause, at: Instant) -> Transition {
        let from = self.status;
        self.status = to;

        tracing::info!(
            trip_id = %self.trip.id(),
            from = %from,
            to = %to,
            cause = ?cause,
            "Trip status changed"
        );

        Transition { from, to, cause, at }
    }
}
