//! 告警载荷
//!
//! 告警内容在行程开始时就已确定：联系人列表和行程信息不会在告警时重新读取

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};

use super::error::NotifyError;
use crate::state::TripStatus;
use crate::trip::{Contact, Coordinates, Trip, TripId, TripMode};

/// 告警类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertKind {
    /// 升级流程或传感器触发的告警
    Alert,
    /// 胁迫 PIN 触发的静默告警
    SilentDuress,
    /// 用户主动求助
    Panic,
}

impl AlertKind {
    /// 获取告警类型名称
    pub fn name(&self) -> &'static str {
        match self {
            Self::Alert => "ALERT",
            Self::SilentDuress => "SILENT_DURESS",
            Self::Panic => "PANIC",
        }
    }

    /// 是否为静默告警（界面上不显示）
    pub fn is_silent(&self) -> bool {
        matches!(self, Self::SilentDuress)
    }
}

/// 行程摘要
///
/// 时间使用 Unix 毫秒，便于外部通知服务直接使用
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripSummary {
    pub trip_id: TripId,
    pub mode: TripMode,
    pub origin: String,
    pub destination: String,
    pub start_time_ms: u64,
    pub eta_ms: u64,
    /// 告警时的行程状态
    pub status: TripStatus,
    /// 最后已知位置
    pub last_position: Option<Coordinates>,
}

impl TripSummary {
    /// 从行程生成摘要
    pub fn from_trip(trip: &Trip, status: TripStatus, last_position: Option<Coordinates>) -> Self {
        Self {
            trip_id: trip.id(),
            mode: trip.mode(),
            origin: trip.origin().to_string(),
            destination: trip.destination_label().to_string(),
            start_time_ms: trip.started_at_unix_ms(),
            eta_ms: trip.eta_unix_ms(),
            status,
            last_position,
        }
    }
}

/// 告警载荷
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertPayload {
    pub trip_summary: TripSummary,
    pub contacts: Vec<Contact>,
    pub alert_kind: AlertKind,
}

/// 通知服务
///
/// 返回 `Ok` 表示外部服务已接受该告警
pub trait Notifier: Send + Sync {
    /// 发送告警
    fn send(&self, payload: AlertPayload) -> BoxFuture<'_, Result<(), NotifyError>>;
}

/// 仅写日志的通知服务
///
/// 用于没有接入真实通知通道的环境
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send(&self, payload: AlertPayload) -> BoxFuture<'_, Result<(), NotifyError>> {
        Box::pin(async move {
            let summary = &payload.trip_summary;
            tracing::warn!(
                trip_id = %summary.trip_id,
                kind = %payload.alert_kind.name(),
                status = %summary.status.name(),
                destination = %summary.destination,
                contacts = payload.contacts.len(),
                position = ?summary.last_position,
                "Emergency alert"
            );
            for contact in &payload.contacts {
                tracing::info!(
                    name = %contact.name,
                    phone = %contact.phone,
                    relationship = %contact.relationship,
                    "Notifying contact"
                );
            }
            Ok(())
        })
    }
}
