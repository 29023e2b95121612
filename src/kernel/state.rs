use serde::{Deserialize, Serialize};

use super::telemetry::recorder::TelemetryRecorder;

/// Coarse app state as reported to collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppState {
    Foreground,
    Background,
    NotRunning,
}

impl AppState {
    pub const FOREGROUND: &'static str = "foreground";
    pub const BACKGROUND: &'static str = "background";
    pub const NOT_RUNNING: &'static str = "not_running";

    pub fn as_str(self) -> &'static str {
        match self {
            AppState::Foreground => Self::FOREGROUND,
            AppState::Background => Self::BACKGROUND,
            AppState::NotRunning => Self::NOT_RUNNING,
        }
    }
}

/// Finer view used by the tracker itself. Derived, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    /// No Started seen in this process yet.
    NotRunning,
    /// At least one surface started.
    Foreground,
    /// Nothing started, debounce window still open.
    PendingBackground,
    /// Backgrounding confirmed.
    Background,
}

impl Phase {
    /// A pending window still counts as foreground for collaborators.
    pub fn app_state(self) -> AppState {
        match self {
            Phase::NotRunning => AppState::NotRunning,
            Phase::Foreground | Phase::PendingBackground => AppState::Foreground,
            Phase::Background => AppState::Background,
        }
    }
}

/// Everything the tracker mutates besides the activity counter. Lives behind
/// one mutex so UI callbacks and the debounce check serialize on it.
#[derive(Debug)]
pub struct TrackerState {
    pub initialized: bool,
    pub confirmed_background: bool,
    /// Last started surface; cleared once a Background record carries it.
    pub current_surface: Option<String>,
    pub last_stopped_ms: i64,
    pub last_foreground_ms: i64,
    /// In-memory only; restarts at zero with the process.
    pub interruptions: u32,
    pub telemetry: TelemetryRecorder,
}

impl TrackerState {
    pub fn new(now_ms: i64) -> Self {
        Self {
            initialized: false,
            confirmed_background: false,
            current_surface: None,
            last_stopped_ms: now_ms,
            last_foreground_ms: now_ms,
            interruptions: 0,
            telemetry: TelemetryRecorder::new(),
        }
    }

    pub fn phase(&self, activity_count: u32) -> Phase {
        if !self.initialized {
            Phase::NotRunning
        } else if activity_count > 0 {
            Phase::Foreground
        } else if self.confirmed_background {
            Phase::Background
        } else {
            Phase::PendingBackground
        }
    }
}
