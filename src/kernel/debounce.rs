use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Debug)]
struct PendingCheck {
    generation: u64,
    token: CancellationToken,
}

#[derive(Debug, Default)]
struct Slot {
    next_generation: u64,
    pending: Option<PendingCheck>,
}

/// Owns at most one pending delayed check. Scheduling swaps the pending
/// handle under one lock and cancels whatever it replaced.
///
/// The callback may still run after a racing cancel (the sleep finished first),
/// so callers must re-validate their precondition inside it.
#[derive(Debug, Clone)]
pub struct DebounceTimer {
    runtime: Handle,
    slot: Arc<Mutex<Slot>>,
}

impl DebounceTimer {
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            slot: Arc::new(Mutex::new(Slot::default())),
        }
    }

    /// Binds to the runtime of the calling context. Panics outside a runtime,
    /// like `tokio::spawn`.
    pub fn current() -> Self {
        Self::new(Handle::current())
    }

    pub fn schedule_check<F>(&self, delay: Duration, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let token = CancellationToken::new();
        let (generation, replaced) = {
            let mut slot = lock(&self.slot);
            let generation = slot.next_generation;
            slot.next_generation += 1;
            let replaced = slot.pending.replace(PendingCheck {
                generation,
                token: token.clone(),
            });
            (generation, replaced)
        };
        if let Some(old) = replaced {
            debug!("Replacing pending check #{}", old.generation);
            old.token.cancel();
        }

        let slot = Arc::clone(&self.slot);
        self.runtime.spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }

            // Retire ourselves only if nobody rescheduled in the meantime.
            let still_current = {
                let mut slot = lock(&slot);
                match &slot.pending {
                    Some(p) if p.generation == generation => {
                        slot.pending = None;
                        true
                    }
                    _ => false,
                }
            };
            if still_current {
                callback();
            }
        });
    }

    /// Idempotent. Returns whether a check was pending.
    pub fn cancel_pending(&self) -> bool {
        let taken = lock(&self.slot).pending.take();
        match taken {
            Some(p) => {
                p.token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        lock(&self.slot).pending.is_some()
    }
}

fn lock(slot: &Mutex<Slot>) -> MutexGuard<'_, Slot> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}
