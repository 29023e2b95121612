use std::sync::Arc;

use anyhow::Result;
use tracing::warn;

use crate::kernel::event::{LifecycleKind, Surface};

/// Embedded third-party instrumentation that mirrors the host lifecycle.
pub trait KitLifecycle: Send + Sync {
    fn name(&self) -> &str;

    fn on_lifecycle(&self, kind: LifecycleKind, surface: &Surface, activity_count: u32) -> Result<()>;
}

/// Fans lifecycle notifications out to every registered kit. A failing kit is
/// logged and skipped; it never affects tracker state.
#[derive(Clone, Default)]
pub struct KitManager {
    kits: Vec<Arc<dyn KitLifecycle>>,
}

impl KitManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, kit: Arc<dyn KitLifecycle>) {
        self.kits.push(kit);
    }

    pub fn is_empty(&self) -> bool {
        self.kits.is_empty()
    }

    /// Returns the names of kits that failed.
    pub fn notify(&self, kind: LifecycleKind, surface: &Surface, activity_count: u32) -> Vec<String> {
        let mut failed = Vec::new();
        for kit in &self.kits {
            if let Err(e) = kit.on_lifecycle(kind, surface, activity_count) {
                warn!("Kit {} failed on {:?} for {}: {:#}", kit.name(), kind, surface.name, e);
                failed.push(kit.name().to_string());
            }
        }
        failed
    }
}
