use serde::{Deserialize, Serialize};

/// 行程状态
///
/// 终止状态：`Safe`、`Duress`、`AlertTriggered`、`Panic`，
/// 进入后不再发生任何自动转换
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TripStatus {
    /// 行程进行中
    Active,
    /// 已到达预计时间，进入宽限期
    EtaReached,
    /// 等待用户确认安全
    CheckingIn,
    /// 告警倒计时
    Alarming,
    /// 已通知联系人
    AlertTriggered,
    /// 用户确认安全
    Safe,
    /// 用户输入了胁迫 PIN
    Duress,
    /// 用户主动求助
    Panic,
}

impl TripStatus {
    /// 获取状态名称
    pub fn name(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::EtaReached => "ETA_REACHED",
            Self::CheckingIn => "CHECKING_IN",
            Self::Alarming => "ALARMING",
            Self::AlertTriggered => "ALERT_TRIGGERED",
            Self::Safe => "SAFE",
            Self::Duress => "DURESS",
            Self::Panic => "PANIC",
        }
    }

    /// 是否为终止状态
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Safe | Self::Duress | Self::AlertTriggered | Self::Panic
        )
    }

    /// 是否处于超时升级流程中
    pub fn is_escalating(&self) -> bool {
        matches!(self, Self::EtaReached | Self::CheckingIn | Self::Alarming)
    }
}

impl std::fmt::Display for TripStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
