use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::kernel::attribution::AttributionSnapshot;
use crate::kernel::event::{Emission, ScreenView, StateTransitionRecord, TransitionKind};

/// Downstream session pipeline. Lives outside the core.
pub trait SessionManager: Send + Sync {
    fn on_init(
        &self,
        surface: Option<&str>,
        foreground_ms: i64,
        background_ms: i64,
        attribution: Option<&AttributionSnapshot>,
        interruptions: u32,
    ) -> Result<()>;

    fn on_background(&self, surface: Option<&str>) -> Result<()>;

    fn on_screen_view(&self, _view: &ScreenView) -> Result<()> {
        Ok(())
    }
}

/// Drains the emitter queue into a `SessionManager`, writing each record to the
/// diagnostics log on the way through.
pub struct SessionBridge {
    rx: mpsc::Receiver<Emission>,
    manager: Arc<dyn SessionManager>,
}

impl SessionBridge {
    pub fn new(rx: mpsc::Receiver<Emission>, manager: Arc<dyn SessionManager>) -> Self {
        Self { rx, manager }
    }

    /// Runs until every emitter handle is dropped.
    pub async fn run(mut self) {
        while let Some(emission) = self.rx.recv().await {
            self.dispatch(&emission);
        }
        info!("Session bridge drained, stopping");
    }

    fn dispatch(&self, emission: &Emission) {
        let outcome = match emission {
            Emission::Transition(record) => {
                log_record(record);
                forward(self.manager.as_ref(), record)
            }
            Emission::Screen(view) => self.manager.on_screen_view(view),
        };
        if let Err(e) = outcome {
            warn!("Session manager rejected {:?}: {:#}", emission, e);
        }
    }
}

fn forward(manager: &dyn SessionManager, record: &StateTransitionRecord) -> Result<()> {
    match record.kind {
        TransitionKind::Init => manager.on_init(
            record.surface.as_deref(),
            record.foreground_ms,
            record.background_ms,
            record.attribution.as_ref(),
            record.interruptions,
        ),
        TransitionKind::Background => manager.on_background(record.surface.as_deref()),
    }
}

fn log_record(record: &StateTransitionRecord) {
    info!(
        id = %record.id,
        kind = ?record.kind,
        surface = record.surface.as_deref().unwrap_or("-"),
        foreground_ms = record.foreground_ms,
        background_ms = record.background_ms,
        interruptions = record.interruptions,
        "state transition"
    );
}

/// Session manager that only logs. Used by the replay binary.
#[derive(Debug, Default)]
pub struct LoggingSessionManager;

impl SessionManager for LoggingSessionManager {
    fn on_init(
        &self,
        surface: Option<&str>,
        foreground_ms: i64,
        background_ms: i64,
        attribution: Option<&AttributionSnapshot>,
        interruptions: u32,
    ) -> Result<()> {
        let attribution = match attribution {
            Some(a) => serde_json::to_string(a)?,
            None => "null".to_string(),
        };
        println!(
            "[INIT] surface={} fg={}ms bg={}ms interruptions={} attribution={}",
            surface.unwrap_or("-"),
            foreground_ms,
            background_ms,
            interruptions,
            attribution
        );
        Ok(())
    }

    fn on_background(&self, surface: Option<&str>) -> Result<()> {
        println!("[BACKGROUND] surface={}", surface.unwrap_or("-"));
        Ok(())
    }

    fn on_screen_view(&self, view: &ScreenView) -> Result<()> {
        println!("[SCREEN] {} {}", if view.entering { "enter" } else { "leave" }, view.name);
        Ok(())
    }
}
