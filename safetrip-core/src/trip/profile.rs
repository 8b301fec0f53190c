//! 用户资料与安全凭据
//!
//! 资料的存储格式不在本模块范围内，这里只负责校验和只读访问

use serde::{Deserialize, Serialize};

use super::error::{ValidationError, ValidationResult};
use super::model::Contact;

/// PIN 最短长度
pub const MIN_PIN_LENGTH: usize = 4;

/// PIN 最长长度
pub const MAX_PIN_LENGTH: usize = 6;

/// 默认最多联系人数量
pub const DEFAULT_MAX_CONTACTS: usize = 3;

/// 校验 PIN 格式（4-6 位数字）
///
/// # Examples
///
/// ```
/// use safetrip_lib::trip::validate_pin_format;
///
/// assert!(validate_pin_format("1234").is_ok());
/// assert!(validate_pin_format("12").is_err());
/// assert!(validate_pin_format("12a4").is_err());
/// ```
pub fn validate_pin_format(pin: &str) -> ValidationResult<()> {
    let len = pin.chars().count();
    if !(MIN_PIN_LENGTH..=MAX_PIN_LENGTH).contains(&len) {
        return Err(ValidationError::MalformedPinLength(len));
    }
    if !pin.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::NonNumericPin);
    }
    Ok(())
}

/// PIN 比对结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinMatch {
    /// 安全 PIN
    Safe,
    /// 胁迫 PIN
    Duress,
    /// 不匹配
    NoMatch,
}

/// 安全凭据
///
/// 安全 PIN 与胁迫 PIN 必须不同
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyCredentials {
    safe_pin: String,
    duress_pin: String,
    safe_word: String,
}

impl SafetyCredentials {
    /// 创建并校验安全凭据
    ///
    /// 安全词会被转换为小写
    ///
    /// # Errors
    ///
    /// PIN 格式错误、两个 PIN 相同或安全词为空时返回 [`ValidationError`]
    pub fn new(
        safe_pin: impl Into<String>,
        duress_pin: impl Into<String>,
        safe_word: impl AsRef<str>,
    ) -> ValidationResult<Self> {
        let credentials = Self {
            safe_pin: safe_pin.into(),
            duress_pin: duress_pin.into(),
            safe_word: safe_word.as_ref().trim().to_lowercase(),
        };
        credentials.validate()?;
        Ok(credentials)
    }

    /// 重新校验（用于反序列化后的资料）
    pub fn validate(&self) -> ValidationResult<()> {
        validate_pin_format(&self.safe_pin)?;
        validate_pin_format(&self.duress_pin)?;
        if self.safe_pin == self.duress_pin {
            return Err(ValidationError::PinsNotDistinct);
        }
        if self.safe_word.is_empty() {
            return Err(ValidationError::EmptySafeWord);
        }
        Ok(())
    }

    /// 比对提交的 PIN
    pub fn verify(&self, pin: &str) -> PinMatch {
        if pin == self.safe_pin {
            PinMatch::Safe
        } else if pin == self.duress_pin {
            PinMatch::Duress
        } else {
            PinMatch::NoMatch
        }
    }

    /// 语音求救词（小写）
    pub fn safe_word(&self) -> &str {
        &self.safe_word
    }
}

/// 设备权限
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Permissions {
    pub location: bool,
    pub motion: bool,
    pub microphone: bool,
    pub notifications: bool,
}

impl Default for Permissions {
    fn default() -> Self {
        Self {
            location: false,
            motion: true,
            microphone: false,
            notifications: false,
        }
    }
}

/// 用户资料
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    /// 用户姓名
    pub name: String,
    /// 安全凭据
    pub credentials: SafetyCredentials,
    /// 紧急联系人
    pub contacts: Vec<Contact>,
    /// 设备权限
    #[serde(default)]
    pub permissions: Permissions,
}

impl UserProfile {
    /// 校验资料
    ///
    /// # Arguments
    ///
    /// * `max_contacts` - 允许的最多联系人数量
    pub fn validate(&self, max_contacts: usize) -> ValidationResult<()> {
        self.credentials.validate()?;
        if self.contacts.len() > max_contacts {
            return Err(ValidationError::TooManyContacts {
                max: max_contacts,
                actual: self.contacts.len(),
            });
        }
        for contact in &self.contacts {
            contact.validate()?;
        }
        Ok(())
    }

    /// 是否启用运动传感器
    pub fn motion_enabled(&self) -> bool {
        self.permissions.motion
    }

    /// 是否启用音频传感器（需要麦克风权限和安全词）
    pub fn audio_enabled(&self) -> bool {
        self.permissions.microphone && !self.credentials.safe_word().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pin_format() {
        assert!(validate_pin_format("1234").is_ok());
        assert!(validate_pin_format("123456").is_ok());
        assert_eq!(
            validate_pin_format("123"),
            Err(ValidationError::MalformedPinLength(3))
        );
        assert_eq!(
            validate_pin_format("1234567"),
            Err(ValidationError::MalformedPinLength(7))
        );
        assert_eq!(validate_pin_format("12a4"), Err(ValidationError::NonNumericPin));
    }

    #[test]
    fn test_credentials_must_differ() {
        let result = SafetyCredentials::new("1234", "1234", "pineapple");
        assert_eq!(result.unwrap_err(), ValidationError::PinsNotDistinct);
    }

    #[test]
    fn test_credentials_require_safe_word() {
        let result = SafetyCredentials::new("1234", "9876", "   ");
        assert_eq!(result.unwrap_err(), ValidationError::EmptySafeWord);
    }

    #[test]
    fn test_safe_word_lowercased() {
        let creds = SafetyCredentials::new("1234", "9876", "PineApple").unwrap();
        assert_eq!(creds.safe_word(), "pineapple");
    }

    #[test]
    fn test_verify() {
        let creds = SafetyCredentials::new("1234", "9876", "pineapple").unwrap();
        assert_eq!(creds.verify("1234"), PinMatch::Safe);
        assert_eq!(creds.verify("9876"), PinMatch::Duress);
        assert_eq!(creds.verify("0000"), PinMatch::NoMatch);
    }

    #[test]
    fn test_profile_contact_limit() {
        let contact = Contact::new("1", "Bob", "+1555", "Friend");
        let profile = UserProfile {
            name: "Jo".to_string(),
            credentials: SafetyCredentials::new("1234", "9876", "pineapple").unwrap(),
            contacts: vec![contact.clone(); 4],
            permissions: Permissions::default(),
        };

        assert_eq!(
            profile.validate(DEFAULT_MAX_CONTACTS),
            Err(ValidationError::TooManyContacts { max: 3, actual: 4 })
        );
    }

    #[test]
    fn test_audio_requires_microphone() {
        let mut profile = UserProfile {
            name: "Jo".to_string(),
            credentials: SafetyCredentials::new("1234", "9876", "pineapple").unwrap(),
            contacts: Vec::new(),
            permissions: Permissions::default(),
        };
        assert!(!profile.audio_enabled());
        assert!(profile.motion_enabled());

        profile.permissions.microphone = true;
        assert!(profile.audio_enabled());
    }
}
