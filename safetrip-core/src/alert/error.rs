/// Alert delivery errors
use thiserror::Error;

/// Notification errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotifyError {
    /// Notifier reported a failure
    #[error("Alert delivery failed: {0}")]
    DeliveryFailed(String),

    /// Notifier did not finish in time
    #[error("Alert delivery timed out after {0}ms")]
    Timeout(u64),

    /// Trip has nobody to notify
    #[error("No contacts to notify")]
    NoRecipients,
}

/// Result type for alert delivery
pub type NotifyResult<T> = Result<T, NotifyError>;
