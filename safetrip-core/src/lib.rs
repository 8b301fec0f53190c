/// Trip data model, user profile and trip planning
pub mod trip;

/// Risk sensing, signal fusion and position tracking
pub mod sensors;

/// Routing provider contract and ETA tracking
pub mod routing;

/// Emergency contact notification
pub mod alert;

/// Trip state machine and presentation snapshots
pub mod state;

/// Per-trip monitoring event loop
pub mod monitor;

/// Monitor configuration
pub mod config;

/// Utility modules
pub mod utils;
