use std::time::{Duration, Instant};

use serde::Deserialize;
use tracing::warn;

use crate::kernel::event::{LifecycleEvent, LifecycleKind, Surface};
use crate::kernel::time::{Clock, ManualClock};
use crate::kernel::tracker::LifecycleTracker;
use crate::referrer::{InstallBroadcast, InstallReferrerListener, INSTALL_REFERRER_ACTION};

// One JSON object per input line.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ReplayLine {
    Lifecycle {
        kind: LifecycleKind,
        surface: Surface,
        #[serde(default)]
        timestamp_ms: Option<i64>,
    },
    Install {
        install_referrer: String,
    },
}

/// Drives a tracker from recorded lifecycle lines.
///
/// The tracker must be built on the same `ManualClock`: the replay timeline
/// (recorded timestamps, or real time elapsed between untimed lines) is what
/// its debounce checks read.
pub struct Replayer {
    tracker: LifecycleTracker,
    clock: ManualClock,
    referrers: InstallReferrerListener,
    last_line: Instant,
}

impl Replayer {
    pub fn new(tracker: LifecycleTracker, clock: ManualClock, referrers: InstallReferrerListener) -> Self {
        Self {
            tracker,
            clock,
            referrers,
            last_line: Instant::now(),
        }
    }

    /// Returns whether the line was understood.
    pub fn feed_line(&mut self, line: &str) -> bool {
        if line.trim().is_empty() {
            return false;
        }
        let elapsed = self.last_line.elapsed().as_millis() as i64;
        self.last_line = Instant::now();

        match serde_json::from_str::<ReplayLine>(line) {
            Ok(ReplayLine::Lifecycle { kind, surface, timestamp_ms }) => {
                let ts = match timestamp_ms {
                    Some(ts) => {
                        self.clock.set(ts);
                        ts
                    }
                    None => self.clock.advance(elapsed),
                };
                self.tracker.handle(LifecycleEvent::new(kind, surface, ts));
                true
            }
            Ok(ReplayLine::Install { install_referrer }) => {
                self.referrers.on_install_broadcast(&InstallBroadcast {
                    action: INSTALL_REFERRER_ACTION.to_string(),
                    referrer: Some(install_referrer),
                });
                true
            }
            Err(e) => {
                warn!("Skipping malformed line {:?}: {}", line, e);
                false
            }
        }
    }

    /// Runs the replay timeline past the debounce window so an open check
    /// resolves before the caller reports.
    pub async fn settle(&self) {
        let window = self.tracker.debounce() + Duration::from_millis(50);
        self.clock.advance(window.as_millis().min(i64::MAX as u128) as i64);
        tokio::time::sleep(window).await;
    }

    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    pub fn tracker(&self) -> &LifecycleTracker {
        &self.tracker
    }

    pub fn into_tracker(self) -> LifecycleTracker {
        self.tracker
    }
}
