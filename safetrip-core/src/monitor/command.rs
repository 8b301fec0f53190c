//! 监控命令
//!
//! 用户操作通过单消费者队列送入事件循环，逐个处理

use tokio::sync::oneshot;

use super::error::MonitorResult;
use super::ActionReport;
use crate::sensors::RiskSource;
use crate::state::TripStatus;

/// 监控命令
#[derive(Debug)]
pub(crate) enum MonitorCommand {
    /// 提交 PIN
    SubmitPin {
        pin: String,
        response: oneshot::Sender<MonitorResult<ActionReport>>,
    },
    /// 用户求助
    TriggerPanic {
        response: oneshot::Sender<ActionReport>,
    },
    /// 延长行程
    ExtendTrip {
        response: oneshot::Sender<ActionReport>,
    },
    /// 启用或禁用传感器
    SetSensorEnabled {
        source: RiskSource,
        enabled: bool,
        response: oneshot::Sender<bool>,
    },
    /// 结束行程，回复最终状态
    EndTrip {
        response: oneshot::Sender<TripStatus>,
    },
}
