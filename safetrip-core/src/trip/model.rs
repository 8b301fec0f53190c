use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use super::error::{ValidationError, ValidationResult};

static NEXT_TRIP_ID: AtomicU64 = AtomicU64::new(1);

/// 行程标识
///
/// 在进程内唯一，用于告警去重
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TripId(u64);

impl TripId {
    /// 分配新的行程标识
    pub fn next() -> Self {
        Self(NEXT_TRIP_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// 获取原始数值
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TripId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "trip-{}", self.0)
    }
}

/// 行程模式
///
/// 在行程生命周期内固定不变
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TripMode {
    /// 定时模式：到时间未确认安全即升级
    Timer,
    /// 目的地模式：根据路线预计到达时间监控
    Destination,
}

impl TripMode {
    /// 获取模式名称
    pub fn name(&self) -> &'static str {
        match self {
            Self::Timer => "Timer",
            Self::Destination => "Destination",
        }
    }
}

/// 紧急联系人
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    /// 联系人 ID
    pub id: String,
    /// 姓名
    pub name: String,
    /// 电话号码
    pub phone: String,
    /// 关系（例如 "Mother"）
    pub relationship: String,
}

impl Contact {
    /// 创建联系人
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        phone: impl Into<String>,
        relationship: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            phone: phone.into(),
            relationship: relationship.into(),
        }
    }

    /// 校验必填字段
    pub fn validate(&self) -> ValidationResult<()> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyContactField("name"));
        }
        if self.phone.trim().is_empty() {
            return Err(ValidationError::EmptyContactField("phone"));
        }
        if self.relationship.trim().is_empty() {
            return Err(ValidationError::EmptyContactField("relationship"));
        }
        Ok(())
    }
}

/// 地理坐标
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.latitude, self.longitude)
    }
}

/// 被监控的行程
///
/// `eta` 只能由状态机修改，且始终不早于 `start_time`
#[derive(Debug, Clone)]
pub struct Trip {
    id: TripId,
    mode: TripMode,
    origin: String,
    destination_label: String,
    contacts: Vec<Contact>,
    start_time: Instant,
    started_at: SystemTime,
    eta: Instant,
    route_polyline: Option<String>,
    panic: bool,
}

impl Trip {
    /// 创建行程
    ///
    /// # Errors
    ///
    /// - [`ValidationError::NoContacts`] - 联系人列表为空
    /// - [`ValidationError::DurationOutOfRange`] - 时长无法换算成截止时间
    pub fn new(
        mode: TripMode,
        origin: impl Into<String>,
        destination_label: impl Into<String>,
        contacts: Vec<Contact>,
        start_time: Instant,
        duration: Duration,
    ) -> ValidationResult<Self> {
        if contacts.is_empty() {
            return Err(ValidationError::NoContacts);
        }
        let eta = start_time
            .checked_add(duration)
            .ok_or(ValidationError::DurationOutOfRange(duration.as_secs()))?;

        Ok(Self {
            id: TripId::next(),
            mode,
            origin: origin.into(),
            destination_label: destination_label.into(),
            contacts,
            start_time,
            started_at: SystemTime::now(),
            eta,
            route_polyline: None,
            panic: false,
        })
    }

    /// 附加路线几何（仅用于显示）
    pub fn with_route_polyline(mut self, polyline: impl Into<String>) -> Self {
        self.route_polyline = Some(polyline.into());
        self
    }

    /// 标记为紧急求助行程
    pub fn as_panic(mut self) -> Self {
        self.panic = true;
        self
    }

    pub fn id(&self) -> TripId {
        self.id
    }

    pub fn mode(&self) -> TripMode {
        self.mode
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn destination_label(&self) -> &str {
        &self.destination_label
    }

    /// 行程开始时固定的联系人列表
    pub fn contacts(&self) -> &[Contact] {
        &self.contacts
    }

    pub fn start_time(&self) -> Instant {
        self.start_time
    }

    pub fn eta(&self) -> Instant {
        self.eta
    }

    pub fn route_polyline(&self) -> Option<&str> {
        self.route_polyline.as_deref()
    }

    /// 是否为紧急求助（SOS）行程
    pub fn is_panic(&self) -> bool {
        self.panic
    }

    /// 开始时间（Unix 毫秒）
    pub fn started_at_unix_ms(&self) -> u64 {
        unix_millis(self.started_at)
    }

    /// 预计到达时间（Unix 毫秒）
    ///
    /// 超出系统时间范围时为 `u64::MAX`
    pub fn eta_unix_ms(&self) -> u64 {
        self.started_at
            .checked_add(self.eta - self.start_time)
            .map_or(u64::MAX, unix_millis)
    }

    /// 更新预计到达时间，不早于开始时间
    pub(crate) fn set_eta(&mut self, eta: Instant) {
        self.eta = eta.max(self.start_time);
    }
}

fn unix_millis(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contact() -> Contact {
        Contact::new("1", "Alice", "+15550100", "Sister")
    }

    #[test]
    fn test_trip_requires_contacts() {
        let result = Trip::new(
            TripMode::Timer,
            "N/A",
            "Timed Trip",
            Vec::new(),
            Instant::now(),
            Duration::from_secs(60),
        );
        assert_eq!(result.unwrap_err(), ValidationError::NoContacts);
    }

    #[test]
    fn test_trip_ids_are_unique() {
        let now = Instant::now();
        let a = Trip::new(TripMode::Timer, "N/A", "A", vec![contact()], now, Duration::ZERO).unwrap();
        let b = Trip::new(TripMode::Timer, "N/A", "B", vec![contact()], now, Duration::ZERO).unwrap();
        assert_ne!(a.id(), b.id());
        assert!(a.id().to_string().starts_with("trip-"));
    }

    #[test]
    fn test_set_eta_never_precedes_start() {
        let now = Instant::now();
        let mut trip = Trip::new(
            TripMode::Timer,
            "N/A",
            "Timed Trip",
            vec![contact()],
            now + Duration::from_secs(10),
            Duration::from_secs(60),
        )
        .unwrap();

        trip.set_eta(now);
        assert_eq!(trip.eta(), trip.start_time());
    }

    #[test]
    fn test_eta_unix_ms_tracks_offset() {
        let now = Instant::now();
        let trip = Trip::new(
            TripMode::Timer,
            "N/A",
            "Timed Trip",
            vec![contact()],
            now,
            Duration::from_secs(90),
        )
        .unwrap();

        assert_eq!(trip.eta_unix_ms() - trip.started_at_unix_ms(), 90_000);
    }

    #[test]
    fn test_contact_validation() {
        assert!(contact().validate().is_ok());

        let blank = Contact::new("2", " ", "+1", "Friend");
        assert_eq!(
            blank.validate(),
            Err(ValidationError::EmptyContactField("name"))
        );
    }
}
