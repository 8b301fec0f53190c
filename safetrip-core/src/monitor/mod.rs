//! 行程监控模块
//!
//! 把状态机、风险采样、位置跟踪、ETA 刷新和告警分发组合成一个
//! 按行程运行的协作式事件循环，并向展示层提供只读状态和用户操作
//!
//! # 使用示例
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use safetrip_lib::alert::{AlertDispatcher, LogNotifier};
//! use safetrip_lib::config::MonitorConfig;
//! use safetrip_lib::monitor::{MonitorServices, TripMonitor};
//! use safetrip_lib::trip::{TripPlanner, UserProfile};
//! use tokio::time::Instant;
//!
//! # async fn example(profile: UserProfile) -> Result<(), Box<dyn std::error::Error>> {
//! let config = MonitorConfig::default();
//! let trip = TripPlanner::new(&profile, &config.trip)
//!     .timer_trip(Duration::from_secs(600), Instant::now())?;
//!
//! let dispatcher = Arc::new(AlertDispatcher::new(
//!     Arc::new(LogNotifier),
//!     config.alert.delivery_timeout(),
//! ));
//! let mut monitor = TripMonitor::start(trip, &profile, MonitorServices::new(dispatcher), &config);
//!
//! let report = monitor.submit_pin("1234").await?;
//! println!("{:?} -> {}", report.outcome, monitor.status());
//!
//! monitor.end_trip().await?;
//! # Ok(())
//! # }
//! ```

mod command;
mod error;
mod event_loop;

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::alert::{AlertDispatcher, AlertKind, DispatchOutcome, NotifyError};
use crate::config::MonitorConfig;
use crate::routing::{EtaTracker, RoutingError, RoutingProvider};
use crate::sensors::{
    GpsStatus, PositionSource, PositionTracker, RiskSampler, RiskSensor, RiskSource, SafetyLevel,
};
use crate::state::{
    ActionOutcome, EscalationTimings, StatusEvent, Transition, TripSnapshot, TripStateMachine,
    TripStatus,
};
use crate::trip::{Trip, UserProfile};

use command::MonitorCommand;
use event_loop::{Listeners, MonitorLoop};

pub use error::{MonitorError, MonitorResult};

/// 命令队列容量
const COMMAND_CAPACITY: usize = 16;

/// 监控事件
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorEvent {
    /// 行程状态改变
    StatusChanged(Transition),
    /// 融合安全等级改变
    SafetyLevelChanged { level: SafetyLevel },
    /// 预计到达时间改变（刷新或延长）
    EtaUpdated { eta: Instant, eta_ms: u64 },
    /// ETA 刷新失败，沿用旧的截止时间
    EtaRefreshFailed(RoutingError),
    /// GPS 状态改变
    GpsStatusChanged(GpsStatus),
    /// 已尝试通知联系人
    AlertDispatched {
        kind: AlertKind,
        result: Result<DispatchOutcome, NotifyError>,
    },
    /// 监控结束
    Ended { status: TripStatus },
}

/// 用户操作报告
#[derive(Debug, Clone, PartialEq)]
pub struct ActionReport {
    /// 状态机的处理结果
    pub outcome: ActionOutcome,
    /// 告警发送结果（该操作触发了告警时）
    ///
    /// 发送失败不会回滚状态
    pub delivery: Option<Result<DispatchOutcome, NotifyError>>,
}

impl ActionReport {
    /// 操作后的状态（如有变化）
    pub fn new_status(&self) -> Option<TripStatus> {
        self.outcome.transition().map(|t| t.to)
    }
}

/// 外部协作方
///
/// 未提供的传感器或服务视为不可用
pub struct MonitorServices {
    pub dispatcher: Arc<AlertDispatcher>,
    pub routing: Option<Arc<dyn RoutingProvider>>,
    pub position: Option<Arc<dyn PositionSource>>,
    pub motion: Option<Arc<dyn RiskSensor>>,
    pub audio: Option<Arc<dyn RiskSensor>>,
}

impl MonitorServices {
    /// 只有告警分发器的服务集合
    pub fn new(dispatcher: Arc<AlertDispatcher>) -> Self {
        Self {
            dispatcher,
            routing: None,
            position: None,
            motion: None,
            audio: None,
        }
    }

    pub fn with_routing(mut self, provider: Arc<dyn RoutingProvider>) -> Self {
        self.routing = Some(provider);
        self
    }

    pub fn with_position(mut self, source: Arc<dyn PositionSource>) -> Self {
        self.position = Some(source);
        self
    }

    pub fn with_motion_sensor(mut self, sensor: Arc<dyn RiskSensor>) -> Self {
        self.motion = Some(sensor);
        self
    }

    pub fn with_audio_sensor(mut self, sensor: Arc<dyn RiskSensor>) -> Self {
        self.audio = Some(sensor);
        self
    }
}

/// 行程监控入口
pub struct TripMonitor;

impl TripMonitor {
    /// 启动行程监控
    ///
    /// 必须在 tokio 运行时中调用。传感器是否启用取决于用户授予的权限；
    /// 紧急求助行程会在循环开始时立即通知联系人
    pub fn start(
        trip: Trip,
        profile: &UserProfile,
        services: MonitorServices,
        config: &MonitorConfig,
    ) -> TripMonitorHandle {
        let MonitorServices {
            dispatcher,
            routing,
            position,
            motion,
            audio,
        } = services;

        let machine = TripStateMachine::new(
            trip,
            profile.credentials.clone(),
            EscalationTimings::from(&config.escalation),
        );
        let eta = EtaTracker::new(machine.trip(), routing, &config.eta);

        let restart_delay = config.sensors.restart_delay();
        let mut motion = RiskSampler::new(RiskSource::Motion, motion, restart_delay);
        let mut audio = RiskSampler::new(RiskSource::Audio, audio, restart_delay);
        motion.set_enabled(profile.motion_enabled());
        audio.set_enabled(profile.audio_enabled());

        let position = PositionTracker::start(if profile.permissions.location {
            position
        } else {
            None
        });

        let snapshot = Arc::new(ArcSwap::from_pointee(TripSnapshot::capture(
            &machine,
            position.status(),
            position.last_fix(),
        )));
        let listeners: Listeners = Arc::new(Mutex::new(Vec::new()));
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CAPACITY);

        let event_loop = MonitorLoop {
            machine,
            dispatcher,
            eta,
            motion,
            audio,
            position,
            snapshot: Arc::clone(&snapshot),
            listeners: Arc::clone(&listeners),
        };
        let task = tokio::spawn(event_loop.run(command_rx));

        TripMonitorHandle {
            command_tx,
            snapshot,
            listeners,
            listener_capacity: config.sensors.listener_capacity,
            task: Some(task),
        }
    }
}

/// 行程监控句柄
///
/// 读取是无锁的快照；操作通过命令队列交给事件循环处理。
/// 丢弃句柄会结束监控并停止所有后台任务
pub struct TripMonitorHandle {
    command_tx: mpsc::Sender<MonitorCommand>,
    snapshot: Arc<ArcSwap<TripSnapshot>>,
    listeners: Listeners,
    listener_capacity: usize,
    task: Option<JoinHandle<()>>,
}

impl TripMonitorHandle {
    /// 最新快照
    pub fn snapshot(&self) -> Arc<TripSnapshot> {
        self.snapshot.load_full()
    }

    /// 当前状态
    pub fn status(&self) -> TripStatus {
        self.snapshot.load().status
    }

    /// 当前安全等级
    pub fn safety_level(&self) -> SafetyLevel {
        self.snapshot.load().safety_level
    }

    /// 剩余时间，终止后为 `None`
    pub fn countdown(&self) -> Option<Duration> {
        self.snapshot.load().countdown(Instant::now())
    }

    /// 展示层状态事件
    pub fn status_event(&self) -> StatusEvent {
        StatusEvent::from_snapshot(&self.snapshot.load(), Instant::now())
    }

    /// 事件循环是否仍在运行
    pub fn is_running(&self) -> bool {
        !self.command_tx.is_closed()
    }

    /// 订阅监控事件
    ///
    /// 队列满时新事件会被丢弃，不会阻塞事件循环
    pub async fn subscribe(&self) -> mpsc::Receiver<MonitorEvent> {
        let (tx, rx) = mpsc::channel(self.listener_capacity);
        self.listeners.lock().await.push(tx);
        rx
    }

    /// 提交 PIN
    ///
    /// # Errors
    ///
    /// - `MonitorError::Validation` - PIN 格式错误，状态不变
    /// - `MonitorError::NotRunning` - 监控已结束
    pub async fn submit_pin(&self, pin: &str) -> MonitorResult<ActionReport> {
        let (response, rx) = oneshot::channel();
        self.send(MonitorCommand::SubmitPin {
            pin: pin.to_string(),
            response,
        })
        .await?;
        rx.await.map_err(|_| MonitorError::NotRunning)?
    }

    /// 用户求助
    pub async fn trigger_panic(&self) -> MonitorResult<ActionReport> {
        let (response, rx) = oneshot::channel();
        self.send(MonitorCommand::TriggerPanic { response }).await?;
        rx.await.map_err(|_| MonitorError::NotRunning)
    }

    /// 延长行程
    pub async fn extend_trip(&self) -> MonitorResult<ActionReport> {
        let (response, rx) = oneshot::channel();
        self.send(MonitorCommand::ExtendTrip { response }).await?;
        rx.await.map_err(|_| MonitorError::NotRunning)
    }

    /// 启用或禁用某个传感器，返回之后是否启用
    pub async fn set_sensor_enabled(&self, source: RiskSource, enabled: bool) -> MonitorResult<bool> {
        let (response, rx) = oneshot::channel();
        self.send(MonitorCommand::SetSensorEnabled {
            source,
            enabled,
            response,
        })
        .await?;
        rx.await.map_err(|_| MonitorError::NotRunning)
    }

    /// 结束行程
    ///
    /// 可在任意状态调用；重复调用返回最后的状态
    pub async fn end_trip(&mut self) -> MonitorResult<TripStatus> {
        let (response, rx) = oneshot::channel();
        let status = match self.send(MonitorCommand::EndTrip { response }).await {
            Ok(()) => rx.await.unwrap_or_else(|_| self.status()),
            Err(_) => self.status(),
        };

        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Monitor task did not exit cleanly");
            }
        }
        Ok(status)
    }

    async fn send(&self, command: MonitorCommand) -> MonitorResult<()> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| MonitorError::NotRunning)
    }
}
