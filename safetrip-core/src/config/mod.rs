//! 监控配置模块
//!
//! 提供行程监控参数的加载、保存和校验
//!
//! # 使用示例
//!
//! ```no_run
//! use safetrip_lib::config::{ConfigManager, MonitorConfig};
//!
//! // 加载配置（文件不存在时使用默认值）
//! let mut config = ConfigManager::load("safetrip.json").unwrap();
//!
//! // 修改配置
//! config.escalation.grace_period_secs = 45;
//!
//! // 保存配置
//! ConfigManager::save("safetrip.json", &config).unwrap();
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 配置错误类型
#[derive(Error, Debug)]
pub enum ConfigError {
    /// IO 错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON 序列化/反序列化错误
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// 配置值无效
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// 配置结果类型
pub type ConfigResult<T> = Result<T, ConfigError>;

/// 监控配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// 升级计时配置
    pub escalation: EscalationConfig,
    /// ETA 刷新配置
    pub eta: EtaConfig,
    /// 行程配置
    pub trip: TripConfig,
    /// 告警配置
    pub alert: AlertConfig,
    /// 传感器配置
    pub sensors: SensorConfig,
}

impl MonitorConfig {
    /// 校验配置
    ///
    /// # Errors
    ///
    /// 任何时长为零或联系人上限为零时返回 [`ConfigError::Invalid`]
    pub fn validate(&self) -> ConfigResult<()> {
        let checks = [
            ("escalation.grace_period_secs", self.escalation.grace_period_secs),
            ("escalation.check_in_window_secs", self.escalation.check_in_window_secs),
            ("escalation.alarm_duration_secs", self.escalation.alarm_duration_secs),
            ("escalation.extend_increment_mins", self.escalation.extend_increment_mins),
            ("eta.refresh_interval_secs", self.eta.refresh_interval_secs),
            ("eta.request_timeout_secs", self.eta.request_timeout_secs),
            ("trip.panic_trip_minutes", self.trip.panic_trip_minutes),
            ("trip.default_timer_minutes", self.trip.default_timer_minutes),
            ("alert.delivery_timeout_secs", self.alert.delivery_timeout_secs),
        ];

        for (name, value) in checks {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{name} must be greater than zero")));
            }
        }

        if self.trip.max_contacts == 0 {
            return Err(ConfigError::Invalid(
                "trip.max_contacts must be greater than zero".to_string(),
            ));
        }
        if self.sensors.listener_capacity == 0 {
            return Err(ConfigError::Invalid(
                "sensors.listener_capacity must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

/// 升级计时配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EscalationConfig {
    /// 到达 ETA 后的宽限期（秒）
    pub grace_period_secs: u64,
    /// 签到窗口（秒）
    pub check_in_window_secs: u64,
    /// 警报倒计时（秒）
    pub alarm_duration_secs: u64,
    /// 延长行程的增量（分钟）
    pub extend_increment_mins: u64,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            grace_period_secs: 30,
            check_in_window_secs: 30,
            alarm_duration_secs: 5,
            extend_increment_mins: 15,
        }
    }
}

/// ETA 刷新配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EtaConfig {
    /// 刷新间隔（秒）
    pub refresh_interval_secs: u64,
    /// 路线请求超时（秒）
    pub request_timeout_secs: u64,
}

impl Default for EtaConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: 120,
            request_timeout_secs: 10,
        }
    }
}

impl EtaConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// 行程配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TripConfig {
    /// 紧急求助行程的时长（分钟）
    pub panic_trip_minutes: u64,
    /// 定时行程的默认时长（分钟）
    pub default_timer_minutes: u64,
    /// 最多联系人数量
    pub max_contacts: usize,
}

impl Default for TripConfig {
    fn default() -> Self {
        Self {
            panic_trip_minutes: 5,
            default_timer_minutes: 30,
            max_contacts: 3,
        }
    }
}

/// 告警配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// 通知投递超时（秒）
    pub delivery_timeout_secs: u64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            delivery_timeout_secs: 15,
        }
    }
}

impl AlertConfig {
    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_secs(self.delivery_timeout_secs)
    }
}

/// 传感器配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// 传感器流结束后重新订阅的延迟（毫秒）
    pub restart_delay_ms: u64,
    /// 事件监听器队列容量
    pub listener_capacity: usize,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            restart_delay_ms: 1000,
            listener_capacity: 64,
        }
    }
}

impl SensorConfig {
    pub fn restart_delay(&self) -> Duration {
        Duration::from_millis(self.restart_delay_ms)
    }
}

/// 配置管理器
///
/// 提供配置的加载和保存功能
pub struct ConfigManager;

impl ConfigManager {
    /// 加载配置
    ///
    /// 从配置文件加载配置，如果文件不存在则返回默认配置
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<MonitorConfig> {
        let path = path.as_ref();

        tracing::debug!(path = %path.display(), "Loading config");

        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: MonitorConfig = serde_json::from_str(&content)?;
            config.validate()?;
            tracing::info!(path = %path.display(), "Config loaded successfully");
            Ok(config)
        } else {
            tracing::info!("Config file not found, using defaults");
            Ok(MonitorConfig::default())
        }
    }

    /// 保存配置
    ///
    /// 将配置保存到配置文件，必要时创建父目录
    pub fn save(path: impl AsRef<Path>, config: &MonitorConfig) -> ConfigResult<()> {
        let path = path.as_ref();
        config.validate()?;

        tracing::debug!(path = %path.display(), "Saving config");

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let content = serde_json::to_string_pretty(config)?;
        std::fs::write(path, content)?;

        tracing::info!(path = %path.display(), "Config saved successfully");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir()
            .join(format!("safetrip-config-{}-{}", std::process::id(), name))
            .join("config.json")
    }

    #[test]
    fn test_default_config() {
        let config = MonitorConfig::default();
        assert_eq!(config.escalation.grace_period_secs, 30);
        assert_eq!(config.escalation.check_in_window_secs, 30);
        assert_eq!(config.escalation.alarm_duration_secs, 5);
        assert_eq!(config.escalation.extend_increment_mins, 15);
        assert_eq!(config.eta.refresh_interval(), Duration::from_secs(120));
        assert_eq!(config.trip.max_contacts, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{ "escalation": { "grace_period_secs": 45 } }"#;
        let config: MonitorConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.escalation.grace_period_secs, 45);
        assert_eq!(config.escalation.check_in_window_secs, 30);
        assert_eq!(config.eta.refresh_interval_secs, 120);
    }

    #[test]
    fn test_validate_rejects_zero() {
        let mut config = MonitorConfig::default();
        config.escalation.alarm_duration_secs = 0;

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("alarm_duration_secs"));
    }

    #[test]
    fn test_load_missing_file_returns_default() {
        let config = ConfigManager::load(temp_path("missing")).unwrap();
        assert_eq!(config, MonitorConfig::default());
    }

    #[test]
    fn test_save_and_load() {
        let path = temp_path("roundtrip");
        let mut config = MonitorConfig::default();
        config.eta.refresh_interval_secs = 60;

        ConfigManager::save(&path, &config).unwrap();
        let loaded = ConfigManager::load(&path).unwrap();
        assert_eq!(loaded.eta.refresh_interval_secs, 60);

        if let Some(dir) = path.parent() {
            let _ = std::fs::remove_dir_all(dir);
        }
    }
}
