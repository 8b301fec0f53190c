//! 行程模块
//!
//! 提供行程数据模型、用户资料校验和行程规划
//!
//! # 模块结构
//!
//! - `model` - 行程、联系人、坐标
//! - `profile` - 安全凭据与用户资料
//! - `planner` - 定时、目的地、紧急求助行程的创建
//! - `error` - 校验错误类型

mod error;
mod model;
mod planner;
mod profile;

pub use error::{PlanError, ValidationError, ValidationResult};
pub use model::{Contact, Coordinates, Trip, TripId, TripMode};
pub use planner::{RoutePreview, TripPlanner, PANIC_DESTINATION, PANIC_ORIGIN, TIMER_DESTINATION, TIMER_ORIGIN};
pub use profile::{
    validate_pin_format, Permissions, PinMatch, SafetyCredentials, UserProfile,
    DEFAULT_MAX_CONTACTS, MAX_PIN_LENGTH, MIN_PIN_LENGTH,
};
