//! 行程状态模块
//!
//! 提供行程安全状态机和只读状态快照
//!
//! # 模块结构
//!
//! - `trip_status` - 行程状态定义
//! - `machine` - 状态机、升级定时器和状态转换
//! - `snapshot` - 展示层快照和状态事件

mod machine;
mod snapshot;
mod trip_status;

pub use machine::{
    ActionOutcome, EscalationTimer, EscalationTimings, TimerKind, Transition, TransitionCause,
    TripStateMachine,
};
pub use snapshot::{format_countdown, StatusEvent, TripSnapshot};
pub use trip_status::TripStatus;
