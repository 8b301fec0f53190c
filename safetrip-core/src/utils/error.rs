//! 全局错误处理模块
//!
//! 提供统一的应用错误类型和用户友好的错误消息
//!
//! # 功能
//!
//! - 统一的 `AppError` 类型，聚合所有模块错误
//! - 用户友好的错误消息
//! - 错误代码用于展示层处理
//! - 错误恢复建议
//!
//! # 使用示例
//!
//! ```
//! use safetrip_lib::trip::ValidationError;
//! use safetrip_lib::utils::error::{AppError, ErrorCode};
//!
//! let err: AppError = ValidationError::NoContacts.into();
//! assert_eq!(err.code(), ErrorCode::ValidationNoContacts);
//! assert!(err.is_recoverable());
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::alert::NotifyError;
use crate::config::ConfigError;
use crate::monitor::MonitorError;
use crate::routing::RoutingError;
use crate::sensors::{PositionError, SensorError};
use crate::trip::{PlanError, ValidationError};

/// 应用错误类型
///
/// 聚合所有模块的错误类型，提供统一的错误处理接口
#[derive(Error, Debug)]
pub enum AppError {
    /// 输入校验错误
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// 传感器错误
    #[error("Sensor error: {0}")]
    Sensor(#[from] SensorError),

    /// 定位错误
    #[error("Position error: {0}")]
    Position(#[from] PositionError),

    /// 路线服务错误
    #[error("Routing error: {0}")]
    Routing(#[from] RoutingError),

    /// 告警发送错误
    #[error("Notification error: {0}")]
    Notify(#[from] NotifyError),

    /// 配置错误
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// 监控错误
    #[error("Monitor error: {0}")]
    Monitor(#[from] MonitorError),

    /// 内部错误
    #[error("Internal error: {0}")]
    Internal(String),
}

/// 错误代码
///
/// 用于展示层识别和处理特定错误
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // 校验错误 (1xxx)
    /// 没有紧急联系人
    ValidationNoContacts,
    /// 联系人过多
    ValidationTooManyContacts,
    /// PIN 格式错误
    ValidationInvalidPin,
    /// 其它输入错误
    ValidationInvalidInput,

    // 传感器错误 (2xxx)
    /// 传感器不可用
    SensorUnavailable,
    /// 传感器或定位权限被拒绝
    SensorPermissionDenied,
    /// 无法定位
    PositionUnavailable,

    // 路线错误 (3xxx)
    /// 路线请求失败
    RoutingFailed,
    /// 找不到路线
    RoutingNoRoute,
    /// 路线请求超时
    RoutingTimeout,

    // 告警错误 (4xxx)
    /// 告警发送失败
    AlertDeliveryFailed,
    /// 告警发送超时
    AlertTimeout,
    /// 没有接收人
    AlertNoRecipients,

    // 配置错误 (5xxx)
    /// 配置加载失败
    ConfigLoadFailed,
    /// 配置无效
    ConfigInvalid,

    // 监控错误 (6xxx)
    /// 监控已结束
    MonitorNotRunning,

    // 通用错误 (9xxx)
    /// 内部错误
    InternalError,
}

/// 错误上下文信息
///
/// 提供用户友好的错误信息和恢复建议
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorContext {
    /// 错误代码
    pub code: ErrorCode,
    /// 用户友好的错误消息
    pub message: String,
    /// 详细错误信息（用于日志）
    pub detail: Option<String>,
    /// 恢复建议
    pub recovery_hint: Option<String>,
    /// 是否可恢复
    pub recoverable: bool,
}

impl ErrorContext {
    /// 创建新的错误上下文
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            detail: None,
            recovery_hint: None,
            recoverable: true,
        }
    }

    /// 设置详细信息
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// 设置恢复建议
    pub fn with_recovery_hint(mut self, hint: impl Into<String>) -> Self {
        self.recovery_hint = Some(hint.into());
        self
    }

    /// 标记为不可恢复
    pub fn not_recoverable(mut self) -> Self {
        self.recoverable = false;
        self
    }
}

impl AppError {
    /// 获取错误代码
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation(e) | AppError::Monitor(MonitorError::Validation(e)) => {
                validation_code(e)
            }

            AppError::Sensor(SensorError::PermissionDenied) => ErrorCode::SensorPermissionDenied,
            AppError::Sensor(_) => ErrorCode::SensorUnavailable,
            AppError::Position(PositionError::PermissionDenied) => {
                ErrorCode::SensorPermissionDenied
            }
            AppError::Position(_) => ErrorCode::PositionUnavailable,

            AppError::Routing(RoutingError::NoRoute { .. }) => ErrorCode::RoutingNoRoute,
            AppError::Routing(RoutingError::Timeout(_)) => ErrorCode::RoutingTimeout,
            AppError::Routing(_) => ErrorCode::RoutingFailed,

            AppError::Notify(NotifyError::Timeout(_)) => ErrorCode::AlertTimeout,
            AppError::Notify(NotifyError::NoRecipients) => ErrorCode::AlertNoRecipients,
            AppError::Notify(_) => ErrorCode::AlertDeliveryFailed,

            AppError::Config(ConfigError::Io(_)) => ErrorCode::ConfigLoadFailed,
            AppError::Config(_) => ErrorCode::ConfigInvalid,

            AppError::Monitor(MonitorError::NotRunning) => ErrorCode::MonitorNotRunning,

            AppError::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// 获取用户友好的错误消息
    ///
    /// 返回适合直接显示给用户的错误消息
    pub fn user_message(&self) -> String {
        match self.code() {
            ErrorCode::ValidationNoContacts => "请至少添加一位紧急联系人".to_string(),
            ErrorCode::ValidationTooManyContacts => "紧急联系人数量超出上限".to_string(),
            ErrorCode::ValidationInvalidPin => "PIN 必须为 4-6 位数字".to_string(),
            ErrorCode::ValidationInvalidInput => "输入无效，请检查后重试".to_string(),
            ErrorCode::SensorUnavailable => "传感器不可用，风险检测已降级".to_string(),
            ErrorCode::SensorPermissionDenied => "缺少传感器或定位权限".to_string(),
            ErrorCode::PositionUnavailable => "暂时无法获取位置".to_string(),
            ErrorCode::RoutingFailed => "无法获取路线，请稍后重试".to_string(),
            ErrorCode::RoutingNoRoute => "找不到可用路线，请检查地址".to_string(),
            ErrorCode::RoutingTimeout => "路线服务响应超时".to_string(),
            ErrorCode::AlertDeliveryFailed => "告警发送失败".to_string(),
            ErrorCode::AlertTimeout => "告警发送超时".to_string(),
            ErrorCode::AlertNoRecipients => "没有可通知的联系人".to_string(),
            ErrorCode::ConfigLoadFailed => "无法读取配置文件".to_string(),
            ErrorCode::ConfigInvalid => "配置文件格式错误".to_string(),
            ErrorCode::MonitorNotRunning => "行程监控已结束".to_string(),
            ErrorCode::InternalError => match self {
                AppError::Internal(msg) => format!("内部错误: {}", msg),
                _ => "内部错误".to_string(),
            },
        }
    }

    /// 获取完整的错误上下文
    pub fn context(&self) -> ErrorContext {
        let mut ctx = ErrorContext::new(self.code(), self.user_message()).with_detail(self.to_string());

        if let Some(hint) = self.recovery_hint() {
            ctx = ctx.with_recovery_hint(hint);
        }
        if !self.is_recoverable() {
            ctx = ctx.not_recoverable();
        }

        ctx
    }

    /// 获取恢复建议
    pub fn recovery_hint(&self) -> Option<String> {
        match self.code() {
            ErrorCode::ValidationNoContacts => {
                Some("请在资料页面添加至少一位紧急联系人".to_string())
            }
            ErrorCode::SensorPermissionDenied => {
                Some("请在系统设置中授予运动、麦克风或定位权限".to_string())
            }
            ErrorCode::AlertDeliveryFailed | ErrorCode::AlertTimeout => {
                Some("请直接联系您的紧急联系人或拨打紧急电话".to_string())
            }
            ErrorCode::RoutingFailed | ErrorCode::RoutingTimeout => {
                Some("可以改用定时行程".to_string())
            }
            _ => None,
        }
    }

    /// 检查错误是否可恢复
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, AppError::Config(_) | AppError::Internal(_))
    }

    /// 检查是否是输入校验错误
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            AppError::Validation(_) | AppError::Monitor(MonitorError::Validation(_))
        )
    }

    /// 检查是否是超时错误
    pub fn is_timeout(&self) -> bool {
        matches!(
            self.code(),
            ErrorCode::RoutingTimeout | ErrorCode::AlertTimeout
        )
    }

    /// 检查是否是权限错误
    pub fn is_permission_error(&self) -> bool {
        self.code() == ErrorCode::SensorPermissionDenied
    }
}

fn validation_code(error: &ValidationError) -> ErrorCode {
    match error {
        ValidationError::NoContacts => ErrorCode::ValidationNoContacts,
        ValidationError::TooManyContacts { .. } => ErrorCode::ValidationTooManyContacts,
        ValidationError::MalformedPinLength(_)
        | ValidationError::NonNumericPin
        | ValidationError::PinsNotDistinct => ErrorCode::ValidationInvalidPin,
        _ => ErrorCode::ValidationInvalidInput,
    }
}

impl From<PlanError> for AppError {
    fn from(error: PlanError) -> Self {
        match error {
            PlanError::Validation(e) => AppError::Validation(e),
            PlanError::Routing(e) => AppError::Routing(e),
        }
    }
}

/// 应用结果类型
pub type AppResult<T> = Result<T, AppError>;

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Internal(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Internal(msg.to_string())
    }
}
