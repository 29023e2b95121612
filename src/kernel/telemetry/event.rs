use serde::{Deserialize, Serialize};

use crate::kernel::event::TransitionKind;

// Allowed: surface names, durations, counts. Attribution payloads stay out.

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TelemetryEvent {
    Transition {
        kind: TransitionKind,
        foreground_ms: i64,
        background_ms: i64,
        interruptions: u32,
    },

    /// A Started arrived while a background check was pending.
    DebounceAbsorbed {
        gap_ms: i64,
    },

    /// Backgrounding confirmed without waiting, for an allowlisted surface.
    ImmediateBackground {
        surface: String,
    },

    /// A pending check fired but the app was no longer eligible.
    CheckRejected {
        activity_count: u32,
        elapsed_ms: i64,
    },

    EmissionDropped {
        reason: DropReason,
    },

    KitFailed {
        kit: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DropReason {
    SinkFull,
    SinkClosed,
}
