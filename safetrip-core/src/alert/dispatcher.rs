//! 告警分发
//!
//! 每个行程最多通知一次。闩锁在调用通知服务之前设置，
//! 发送失败不会重置闩锁，也不会回滚已提交的行程状态

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use super::error::NotifyError;
use super::payload::{AlertKind, AlertPayload, Notifier, TripSummary};
use crate::trip::{Contact, TripId};

/// 分发结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// 通知服务已接受告警
    Delivered(AlertKind),
    /// 该行程已经通知过，本次调用被忽略
    AlreadyNotified,
}

/// 告警分发器
///
/// 可在多个行程之间共享，闩锁按行程 ID 区分
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use std::time::Duration;
/// use safetrip_lib::alert::{AlertDispatcher, AlertKind, LogNotifier, TripSummary};
/// use safetrip_lib::state::TripStatus;
/// use safetrip_lib::trip::Trip;
///
/// # async fn example(trip: Trip) {
/// let dispatcher = AlertDispatcher::new(Arc::new(LogNotifier), Duration::from_secs(15));
/// let summary = TripSummary::from_trip(&trip, TripStatus::Panic, None);
///
/// let outcome = dispatcher
///     .notify(summary, trip.contacts().to_vec(), AlertKind::Panic)
///     .await;
/// println!("{:?}", outcome);
/// # }
/// ```
pub struct AlertDispatcher {
    /// 通知服务
    notifier: Arc<dyn Notifier>,
    /// 单次发送超时
    delivery_timeout: Duration,
    /// 已通知的行程
    notified: Mutex<HashSet<TripId>>,
}

impl AlertDispatcher {
    /// 创建分发器
    pub fn new(notifier: Arc<dyn Notifier>, delivery_timeout: Duration) -> Self {
        Self {
            notifier,
            delivery_timeout,
            notified: Mutex::new(HashSet::new()),
        }
    }

    /// 通知联系人
    ///
    /// 同一行程的第二次调用直接返回 [`DispatchOutcome::AlreadyNotified`]
    ///
    /// # Errors
    ///
    /// - `NotifyError::NoRecipients` - 联系人列表为空（不设置闩锁）
    /// - `NotifyError::DeliveryFailed` - 通知服务返回错误
    /// - `NotifyError::Timeout` - 通知服务超时
    pub async fn notify(
        &self,
        summary: TripSummary,
        contacts: Vec<Contact>,
        kind: AlertKind,
    ) -> Result<DispatchOutcome, NotifyError> {
        let trip_id = summary.trip_id;

        if contacts.is_empty() {
            tracing::error!(trip_id = %trip_id, "Cannot dispatch alert without contacts");
            return Err(NotifyError::NoRecipients);
        }

        {
            let mut notified = self.notified.lock().await;
            if !notified.insert(trip_id) {
                tracing::debug!(trip_id = %trip_id, kind = %kind.name(), "Alert already dispatched, skipping");
                return Ok(DispatchOutcome::AlreadyNotified);
            }
        }

        let payload = AlertPayload {
            trip_summary: summary,
            contacts,
            alert_kind: kind,
        };

        tracing::info!(trip_id = %trip_id, kind = %kind.name(), "Dispatching alert");

        match tokio::time::timeout(self.delivery_timeout, self.notifier.send(payload)).await {
            Ok(Ok(())) => {
                tracing::info!(trip_id = %trip_id, kind = %kind.name(), "Alert delivered");
                Ok(DispatchOutcome::Delivered(kind))
            }
            Ok(Err(e)) => {
                tracing::error!(trip_id = %trip_id, error = %e, "Alert delivery failed");
                Err(e)
            }
            Err(_) => {
                let ms = self.delivery_timeout.as_millis() as u64;
                tracing::error!(trip_id = %trip_id, timeout_ms = ms, "Alert delivery timed out");
                Err(NotifyError::Timeout(ms))
            }
        }
    }

    /// 该行程是否已经触发过告警
    pub async fn has_notified(&self, trip_id: TripId) -> bool {
        self.notified.lock().await.contains(&trip_id)
    }

    /// 行程结束后释放闩锁
    ///
    /// 返回该行程是否曾经告警
    pub async fn release(&self, trip_id: TripId) -> bool {
        let released = self.notified.lock().await.remove(&trip_id);
        if released {
            tracing::debug!(trip_id = %trip_id, "Alert latch released");
        }
        released
    }
}
