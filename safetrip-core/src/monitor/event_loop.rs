//! 监控事件循环
//!
//! 每个行程一个任务。命令、传感器样本、升级定时器、ETA 结果和位置更新
//! 都在同一个 `select!` 中逐个处理，状态机不会被并发修改。
//! 同时就绪时按以下优先级处理：命令、样本、定时器、ETA 结果、刷新、位置

use std::future;
use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::time::{self, Instant, Interval, MissedTickBehavior};

use super::command::MonitorCommand;
use super::error::MonitorError;
use super::{ActionReport, MonitorEvent};
use crate::alert::{AlertDispatcher, AlertKind, DispatchOutcome, NotifyError, TripSummary};
use crate::routing::{EtaTracker, EtaUpdate};
use crate::sensors::{
    GpsStatus, PositionState, PositionTracker, RiskSample, RiskSampler, RiskSource,
};
use crate::state::{ActionOutcome, Transition, TripSnapshot, TripStateMachine, TripStatus};

/// ETA 结果队列容量
const ETA_UPDATE_CAPACITY: usize = 4;

pub(crate) type Listeners = Arc<Mutex<Vec<mpsc::Sender<MonitorEvent>>>>;

/// 事件循环拥有的全部资源
pub(crate) struct MonitorLoop {
    pub(crate) machine: TripStateMachine,
    pub(crate) dispatcher: Arc<AlertDispatcher>,
    pub(crate) eta: EtaTracker,
    pub(crate) motion: RiskSampler,
    pub(crate) audio: RiskSampler,
    pub(crate) position: PositionTracker,
    pub(crate) snapshot: Arc<ArcSwap<TripSnapshot>>,
    pub(crate) listeners: Listeners,
}

/// 循环内部状态
struct LoopState {
    eta_tx: mpsc::Sender<EtaUpdate>,
    last_gps: GpsStatus,
}

impl MonitorLoop {
    /// 运行事件循环，直到行程结束或句柄被丢弃
    pub(crate) async fn run(mut self, mut commands: mpsc::Receiver<MonitorCommand>) {
        let mut motion_rx = self.motion.subscribe();
        let mut audio_rx = self.audio.subscribe();
        let mut position_rx = self.position.subscribe();
        let (eta_tx, mut eta_rx) = mpsc::channel::<EtaUpdate>(ETA_UPDATE_CAPACITY);
        let mut refresh = self.eta.refresh_interval().map(|period| {
            let mut interval = time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });

        let mut state = LoopState {
            eta_tx,
            last_gps: self.position.status(),
        };

        tracing::info!(
            trip_id = %self.machine.trip().id(),
            status = %self.machine.status(),
            eta_refresh = refresh.is_some(),
            "Trip monitor started"
        );

        if let Some(kind) = self.machine.initial_alert() {
            let _ = self.dispatch(kind).await;
        }
        self.publish();

        loop {
            let deadline = self.machine.next_deadline();
            let refresh_active =
                refresh.is_some() && self.machine.status() == TripStatus::Active;

            tokio::select! {
                biased;

                command = commands.recv() => match command {
                    Some(MonitorCommand::EndTrip { response }) => {
                        let status = self.shutdown().await;
                        let _ = response.send(status);
                        return;
                    }
                    Some(command) => self.handle_command(command).await,
                    None => {
                        tracing::debug!("Monitor handle dropped");
                        self.shutdown().await;
                        return;
                    }
                },

                Ok(()) = motion_rx.changed() => {
                    let sample = *motion_rx.borrow_and_update();
                    self.handle_sample(sample).await;
                }

                Ok(()) = audio_rx.changed() => {
                    let sample = *audio_rx.borrow_and_update();
                    self.handle_sample(sample).await;
                }

                _ = sleep_until(deadline), if deadline.is_some() => {
                    self.handle_tick().await;
                }

                Some(update) = eta_rx.recv() => {
                    self.handle_eta_update(update).await;
                }

                _ = next_tick(&mut refresh), if refresh_active => {
                    self.request_refresh(&state);
                }

                Ok(()) = position_rx.changed() => {
                    self.handle_position(&position_rx, &mut state).await;
                }
            }
        }
    }

    async fn handle_command(&mut self, command: MonitorCommand) {
        let now = Instant::now();

        match command {
            MonitorCommand::SubmitPin { pin, response } => {
                let result = match self.machine.submit_pin(&pin, now) {
                    Ok(outcome) => Ok(self.apply(outcome).await),
                    Err(e) => {
                        tracing::warn!(error = %e, "PIN rejected before state change");
                        Err(MonitorError::Validation(e))
                    }
                };
                let _ = response.send(result);
            }
            MonitorCommand::TriggerPanic { response } => {
                let outcome = self.machine.trigger_panic(now);
                let report = self.apply(outcome).await;
                let _ = response.send(report);
            }
            MonitorCommand::ExtendTrip { response } => {
                let outcome = self.machine.extend_trip(now);
                let report = self.apply(outcome).await;
                if report.outcome.transition().is_some() {
                    let trip = self.machine.trip();
                    self.emit(MonitorEvent::EtaUpdated {
                        eta: trip.eta(),
                        eta_ms: trip.eta_unix_ms(),
                    })
                    .await;
                }
                let _ = response.send(report);
            }
            MonitorCommand::SetSensorEnabled {
                source,
                enabled,
                response,
            } => {
                let sampler = match source {
                    RiskSource::Motion => &mut self.motion,
                    RiskSource::Audio => &mut self.audio,
                };
                let _ = response.send(sampler.set_enabled(enabled));
            }
            MonitorCommand::EndTrip { .. } => {
                // Handled by the loop itself
            }
        }
    }

    /// 提交用户操作结果：发出事件、必要时告警、更新快照
    async fn apply(&mut self, outcome: ActionOutcome) -> ActionReport {
        let delivery = match outcome {
            ActionOutcome::Applied(transition) => self.on_transition(transition).await,
            ActionOutcome::NoOp | ActionOutcome::Rejected => None,
        };
        self.publish();
        ActionReport { outcome, delivery }
    }

    async fn handle_sample(&mut self, sample: RiskSample) {
        let previous = self.machine.safety_level();
        let transition = self.machine.on_sample(sample, Instant::now());

        let level = self.machine.safety_level();
        if level != previous {
            self.emit(MonitorEvent::SafetyLevelChanged { level }).await;
        }
        if let Some(transition) = transition {
            self.on_transition(transition).await;
        }
        self.publish();
    }

    async fn handle_tick(&mut self) {
        for transition in self.machine.on_tick(Instant::now()) {
            self.on_transition(transition).await;
        }
        self.publish();
    }

    async fn handle_eta_update(&mut self, update: EtaUpdate) {
        let now = Instant::now();
        let applied = update
            .result
            .and_then(|estimate| self.machine.refresh_eta(estimate.duration(), now));

        match applied {
            Ok(Some(eta)) => {
                tracing::debug!(
                    latency_ms = now.duration_since(update.requested_at).as_millis() as u64,
                    "ETA refresh applied"
                );
                let eta_ms = self.machine.trip().eta_unix_ms();
                self.emit(MonitorEvent::EtaUpdated { eta, eta_ms }).await;
                self.publish();
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(error = %e, "ETA refresh failed, keeping previous deadline");
                self.emit(MonitorEvent::EtaRefreshFailed(e)).await;
            }
        }
    }

    fn request_refresh(&mut self, state: &LoopState) {
        let position = self.position.last_fix();
        if !self.eta.request_refresh(position, state.eta_tx.clone()) {
            tracing::debug!("ETA refresh skipped");
        }
    }

    async fn handle_position(
        &mut self,
        position_rx: &watch::Receiver<PositionState>,
        state: &mut LoopState,
    ) {
        let status = position_rx.borrow().status();
        if status != state.last_gps {
            tracing::info!(from = %state.last_gps.name(), to = %status.name(), "GPS status changed");
            state.last_gps = status;
            self.emit(MonitorEvent::GpsStatusChanged(status)).await;
        }
        self.publish();
    }

    /// 发出状态变更事件，终止状态停止 ETA 刷新，需要时通知联系人
    async fn on_transition(
        &mut self,
        transition: Transition,
    ) -> Option<Result<DispatchOutcome, NotifyError>> {
        self.emit(MonitorEvent::StatusChanged(transition)).await;

        if transition.to.is_terminal() {
            self.eta.cancel();
        }

        match transition.alert_kind() {
            Some(kind) => Some(self.dispatch(kind).await),
            None => None,
        }
    }

    async fn dispatch(&self, kind: AlertKind) -> Result<DispatchOutcome, NotifyError> {
        let trip = self.machine.trip();
        let summary =
            TripSummary::from_trip(trip, self.machine.status(), self.position.last_fix());
        let contacts = trip.contacts().to_vec();

        let result = self.dispatcher.notify(summary, contacts, kind).await;
        self.emit(MonitorEvent::AlertDispatched {
            kind,
            result: result.clone(),
        })
        .await;
        result
    }

    /// 停止所有后台任务并结束状态机
    async fn shutdown(&mut self) -> TripStatus {
        self.eta.cancel();
        self.motion.stop().await;
        self.audio.stop().await;
        self.position.stop().await;

        let status = self.machine.end();
        self.dispatcher.release(self.machine.trip().id()).await;
        self.publish();
        self.emit(MonitorEvent::Ended { status }).await;

        tracing::info!(trip_id = %self.machine.trip().id(), status = %status, "Trip monitor stopped");
        status
    }

    fn publish(&self) {
        let snapshot = TripSnapshot::capture(
            &self.machine,
            self.position.status(),
            self.position.last_fix(),
        );
        self.snapshot.store(Arc::new(snapshot));
    }

    /// 向所有监听器发送事件，慢监听器丢事件，已关闭的被移除
    async fn emit(&self, event: MonitorEvent) {
        let mut listeners = self.listeners.lock().await;
        listeners.retain(|tx| match tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!("Monitor listener is full, dropping event");
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => time::sleep_until(at).await,
        None => future::pending().await,
    }
}

async fn next_tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => future::pending().await,
    }
}
