/// Emergency contact notification
///
/// The monitor hands a fixed payload to an external notifier. Delivery is
/// at-most-once per trip; the transport (SMS, push, email) is not our
/// concern.

/// At-most-once dispatch
pub mod dispatcher;

/// Alert error types
pub mod error;

/// Alert payload and notifier contract
pub mod payload;

// Re-export commonly used types
pub use dispatcher::{AlertDispatcher, DispatchOutcome};
pub use error::{NotifyError, NotifyResult};
pub use payload::{AlertKind, AlertPayload, LogNotifier, Notifier, TripSummary};
