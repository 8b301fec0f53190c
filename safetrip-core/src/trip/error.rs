use thiserror::Error;

/// 输入校验错误
///
/// 在任何状态变更之前被拒绝，并直接返回给调用方
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// 没有可通知的紧急联系人
    #[error("At least one trusted contact is required")]
    NoContacts,

    /// 联系人数量超出上限
    #[error("Too many contacts: {actual} (max {max})")]
    TooManyContacts { max: usize, actual: usize },

    /// 联系人字段为空
    #[error("Contact field '{0}' must not be empty")]
    EmptyContactField(&'static str),

    /// PIN 长度不合法（4-6 位）
    #[error("PIN must be 4-6 digits, got {0} characters")]
    MalformedPinLength(usize),

    /// PIN 包含非数字字符
    #[error("PIN must contain digits only")]
    NonNumericPin,

    /// 安全 PIN 与胁迫 PIN 相同
    #[error("Safe PIN and duress PIN must differ")]
    PinsNotDistinct,

    /// 安全词为空
    #[error("Safe word must not be empty")]
    EmptySafeWord,

    /// 行程时长无效
    #[error("Trip duration must be greater than zero")]
    InvalidDuration,

    /// 行程时长过大，无法计算截止时间
    #[error("Trip duration of {0}s is out of range")]
    DurationOutOfRange(u64),

    /// 起点或终点为空
    #[error("Route endpoint '{0}' must not be empty")]
    EmptyEndpoint(&'static str),
}

/// 校验结果类型
pub type ValidationResult<T> = Result<T, ValidationError>;

/// 行程规划错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlanError {
    /// 输入校验失败
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// 路线服务失败
    #[error(transparent)]
    Routing(#[from] crate::routing::RoutingError),
}
