//! 行程规划
//!
//! 根据用户资料创建三种行程：定时、目的地、紧急求助（SOS）

use std::time::Duration;

use tokio::time::Instant;

use super::error::{PlanError, ValidationError, ValidationResult};
use super::model::{Contact, Trip, TripMode};
use super::profile::UserProfile;
use crate::config::TripConfig;
use crate::routing::eta::fetch_estimate;
use crate::routing::{RouteEstimate, RoutingError, RoutingProvider, Waypoint};

/// 定时行程的起点占位
pub const TIMER_ORIGIN: &str = "N/A";

/// 定时行程的终点标签
pub const TIMER_DESTINATION: &str = "Timed Trip";

/// 紧急求助行程的起点占位
pub const PANIC_ORIGIN: &str = "Current Location";

/// 紧急求助行程的终点标签
pub const PANIC_DESTINATION: &str = "SOS Emergency";

/// 路线预览结果
#[derive(Debug, Clone, PartialEq)]
pub struct RoutePreview {
    /// 起点
    pub origin: String,
    /// 终点
    pub destination: String,
    /// 行程时长（向上取整到分钟）
    pub duration_minutes: u64,
    /// 路线几何
    pub polyline: Option<String>,
}

impl RoutePreview {
    fn from_estimate(origin: &str, destination: &str, estimate: RouteEstimate) -> Self {
        Self {
            origin: origin.to_string(),
            destination: destination.to_string(),
            duration_minutes: estimate.duration_minutes_ceil(),
            polyline: estimate.polyline,
        }
    }

    /// 行程时长，分钟数过大时为 `None`
    pub fn duration(&self) -> Option<Duration> {
        self.duration_minutes.checked_mul(60).map(Duration::from_secs)
    }
}

/// 行程规划器
///
/// 所有行程都在开始时复制联系人列表，之后对资料的修改不影响进行中的行程
pub struct TripPlanner<'a> {
    profile: &'a UserProfile,
    config: &'a TripConfig,
}

impl<'a> TripPlanner<'a> {
    /// 创建行程规划器
    pub fn new(profile: &'a UserProfile, config: &'a TripConfig) -> Self {
        Self { profile, config }
    }

    /// 创建定时行程
    ///
    /// # Errors
    ///
    /// 时长为零或联系人无效时返回 [`ValidationError`]
    pub fn timer_trip(&self, duration: Duration, now: Instant) -> ValidationResult<Trip> {
        if duration.is_zero() {
            return Err(ValidationError::InvalidDuration);
        }

        let trip = Trip::new(
            TripMode::Timer,
            TIMER_ORIGIN,
            TIMER_DESTINATION,
            self.contacts()?,
            now,
            duration,
        )?;

        tracing::info!(trip_id = %trip.id(), duration_secs = duration.as_secs(), "Timer trip planned");
        Ok(trip)
    }

    /// 使用默认时长创建定时行程
    pub fn default_timer_trip(&self, now: Instant) -> ValidationResult<Trip> {
        self.timer_trip(Duration::from_secs(self.config.default_timer_minutes.saturating_mul(60)), now)
    }

    /// 创建紧急求助行程
    ///
    /// 行程以 PANIC 状态开始，并立即通知联系人
    pub fn panic_trip(&self, now: Instant) -> ValidationResult<Trip> {
        let trip = Trip::new(
            TripMode::Timer,
            PANIC_ORIGIN,
            PANIC_DESTINATION,
            self.contacts()?,
            now,
            Duration::from_secs(self.config.panic_trip_minutes.saturating_mul(60)),
        )?
        .as_panic();

        tracing::warn!(trip_id = %trip.id(), "Panic trip planned");
        Ok(trip)
    }

    /// 预览路线
    ///
    /// 向路线服务请求起点到终点的时长
    ///
    /// # Errors
    ///
    /// - `PlanError::Validation` - 起点或终点为空
    /// - `PlanError::Routing` - 路线服务失败、超时或时长超出范围
    pub async fn preview_route(
        &self,
        provider: &dyn RoutingProvider,
        origin: &str,
        destination: &str,
        timeout: Duration,
    ) -> Result<RoutePreview, PlanError> {
        if origin.trim().is_empty() {
            return Err(ValidationError::EmptyEndpoint("origin").into());
        }
        if destination.trim().is_empty() {
            return Err(ValidationError::EmptyEndpoint("destination").into());
        }

        let start = Waypoint::Address(origin.to_string());
        let estimate = fetch_estimate(provider, &start, destination, timeout).await?;
        let preview = RoutePreview::from_estimate(origin, destination, estimate);
        if preview.duration().is_none() {
            let secs = preview.duration_minutes.saturating_mul(60);
            return Err(RoutingError::DurationOutOfRange(secs).into());
        }

        tracing::info!(
            origin = %origin,
            destination = %destination,
            duration_minutes = preview.duration_minutes,
            "Route preview ready"
        );
        Ok(preview)
    }

    /// 根据路线预览创建目的地行程
    ///
    /// # Errors
    ///
    /// 联系人无效或时长无法换算成截止时间时返回 [`ValidationError`]
    pub fn destination_trip(&self, preview: &RoutePreview, now: Instant) -> ValidationResult<Trip> {
        let duration = preview.duration().ok_or(ValidationError::DurationOutOfRange(
            preview.duration_minutes.saturating_mul(60),
        ))?;
        let mut trip = Trip::new(
            TripMode::Destination,
            preview.origin.clone(),
            preview.destination.clone(),
            self.contacts()?,
            now,
            duration,
        )?;

        if let Some(polyline) = &preview.polyline {
            trip = trip.with_route_polyline(polyline.clone());
        }

        tracing::info!(
            trip_id = %trip.id(),
            destination = %trip.destination_label(),
            duration_minutes = preview.duration_minutes,
            "Destination trip planned"
        );
        Ok(trip)
    }

    fn contacts(&self) -> ValidationResult<Vec<Contact>> {
        let contacts = &self.profile.contacts;
        if contacts.is_empty() {
            return Err(ValidationError::NoContacts);
        }
        if contacts.len() > self.config.max_contacts {
            return Err(ValidationError::TooManyContacts {
                max: self.config.max_contacts,
                actual: contacts.len(),
            });
        }
        Ok(contacts.clone())
    }
}
