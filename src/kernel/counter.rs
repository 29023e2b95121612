use std::sync::atomic::{AtomicU32, Ordering};
use tracing::debug;

/// Number of currently-started surfaces. The authoritative
/// "is anything in the foreground" signal.
#[derive(Debug, Default)]
pub struct ActivityCounter {
    count: AtomicU32,
}

impl ActivityCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the count after incrementing.
    pub fn increment(&self) -> u32 {
        self.count.fetch_add(1, Ordering::AcqRel).saturating_add(1)
    }

    /// Returns the count after decrementing. A decrement at zero is a benign
    /// race (stop delivered without a matching start) and leaves it at zero.
    pub fn decrement(&self) -> u32 {
        match self
            .count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| c.checked_sub(1))
        {
            Ok(previous) => previous - 1,
            Err(_) => {
                debug!("Activity count already at zero, clamping decrement");
                0
            }
        }
    }

    pub fn current(&self) -> u32 {
        self.count.load(Ordering::Acquire)
    }
}
