use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::attribution::AttributionSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleKind {
    Created,
    Started,
    Resumed,
    Paused,
    Stopped,
}

/// What the host knows about how a surface was launched.
/// Every field is optional; hosts frequently omit all of them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurfaceLaunchInfo {
    #[serde(default)]
    pub calling_package: Option<String>,
    #[serde(default)]
    pub data_uri: Option<String>,
    /// Raw JSON of the launch extras, parsed lazily by attribution capture.
    #[serde(default)]
    pub extras: Option<String>,
}

/// A host UI component with a start/stop lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Surface {
    /// Opaque identifier, typically a fully-qualified class name.
    pub name: String,
    #[serde(default)]
    pub launch: Option<SurfaceLaunchInfo>,
}

impl Surface {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            launch: None,
        }
    }

    pub fn with_launch(mut self, launch: SurfaceLaunchInfo) -> Self {
        self.launch = Some(launch);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleEvent {
    pub kind: LifecycleKind,
    pub surface: Surface,
    pub timestamp_ms: i64,
}

impl LifecycleEvent {
    pub fn new(kind: LifecycleKind, surface: Surface, timestamp_ms: i64) -> Self {
        Self {
            kind,
            surface,
            timestamp_ms,
        }
    }

    pub fn started(name: &str, timestamp_ms: i64) -> Self {
        Self::new(LifecycleKind::Started, Surface::named(name), timestamp_ms)
    }

    pub fn stopped(name: &str, timestamp_ms: i64) -> Self {
        Self::new(LifecycleKind::Stopped, Surface::named(name), timestamp_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    /// Cold start, or foregrounding after a confirmed background.
    Init,
    Background,
}

/// The single observable output of the core per transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateTransitionRecord {
    pub id: Uuid,
    pub kind: TransitionKind,
    pub surface: Option<String>,
    pub foreground_ms: i64,
    pub background_ms: i64,
    pub attribution: Option<AttributionSnapshot>,
    pub interruptions: u32,
}

impl StateTransitionRecord {
    pub fn init(
        surface: Option<String>,
        foreground_ms: i64,
        background_ms: i64,
        attribution: Option<AttributionSnapshot>,
        interruptions: u32,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: TransitionKind::Init,
            surface,
            foreground_ms,
            background_ms,
            attribution,
            interruptions,
        }
    }

    pub fn background(surface: Option<String>, interruptions: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: TransitionKind::Background,
            surface,
            foreground_ms: 0,
            background_ms: 0,
            attribution: None,
            interruptions,
        }
    }
}

/// Automatic screen tracking entry, emitted alongside transitions when enabled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenView {
    pub name: String,
    /// true on Started, false on Stopped.
    pub entering: bool,
}

/// Everything the core hands to the emitter.
#[derive(Debug, Clone, PartialEq)]
pub enum Emission {
    Transition(StateTransitionRecord),
    Screen(ScreenView),
}
