use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

use super::event::Emission;
use super::telemetry::event::DropReason;

pub const DEFAULT_EMITTER_CAPACITY: usize = 256;

/// Sink end of the core. Enqueues only; a full or closed queue is logged and
/// reported back for telemetry, never escalated.
#[derive(Debug, Clone)]
pub struct TransitionEmitter {
    tx: mpsc::Sender<Emission>,
}

impl TransitionEmitter {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Emission>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    pub fn emit(&self, emission: Emission) -> Result<(), DropReason> {
        match self.tx.try_send(emission) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(dropped)) => {
                warn!("Session pipeline saturated, dropping {:?}", dropped);
                Err(DropReason::SinkFull)
            }
            Err(TrySendError::Closed(dropped)) => {
                debug!("Session pipeline closed: {:?}", dropped);
                warn!("Session pipeline unavailable, transition not forwarded");
                Err(DropReason::SinkClosed)
            }
        }
    }
}
