//! Diagnostics telemetry for the lifecycle tracker.
//!
//! Telemetry is a read-only side-effect layer. Decision logic in the tracker
//! never reads it back.

pub mod event;
pub mod metrics;
pub mod recorder;
