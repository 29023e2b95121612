use std::sync::Arc;

use tracing::{debug, info};

use crate::store::durable::{DurableState, INSTALL_REFERRER};

/// Broadcast action sent by the store app after installing the host app.
pub const INSTALL_REFERRER_ACTION: &str = "com.android.vending.INSTALL_REFERRER";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallBroadcast {
    pub action: String,
    pub referrer: Option<String>,
}

/// Stores the install referrer so the next cold start can attribute it.
/// The tracker only ever reads the key.
pub struct InstallReferrerListener {
    durable: Arc<DurableState>,
}

impl InstallReferrerListener {
    pub fn new(durable: Arc<DurableState>) -> Self {
        Self { durable }
    }

    /// Returns whether the broadcast was recorded.
    pub fn on_install_broadcast(&self, broadcast: &InstallBroadcast) -> bool {
        if broadcast.action != INSTALL_REFERRER_ACTION {
            debug!("Ignoring broadcast {}", broadcast.action);
            return false;
        }
        match broadcast.referrer.as_deref().filter(|r| !r.is_empty()) {
            Some(referrer) => {
                info!("Install referrer received");
                self.durable.set_string(INSTALL_REFERRER, referrer);
                true
            }
            None => {
                self.durable.remove(INSTALL_REFERRER);
                false
            }
        }
    }
}
