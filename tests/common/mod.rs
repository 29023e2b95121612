#![allow(dead_code)]

use std::sync::Arc;

use appstate::kernel::time::ManualClock;
use appstate::kits::KitManager;
use appstate::store::{DurableState, InMemoryStore, KeyValueStore};
use appstate::{Emission, LifecycleEvent, LifecycleTracker, StateTransitionRecord, TrackerConfig, TransitionEmitter};
use tokio::runtime::Handle;
use tokio::sync::mpsc;

pub struct Harness {
    pub tracker: LifecycleTracker,
    pub clock: ManualClock,
    pub durable: Arc<DurableState>,
    pub store: Arc<InMemoryStore>,
    rx: mpsc::Receiver<Emission>,
}

impl Harness {
    pub fn new(config: TrackerConfig) -> Self {
        Self::with(config, Arc::new(InMemoryStore::new()), KitManager::new())
    }

    pub fn with(config: TrackerConfig, store: Arc<InMemoryStore>, kits: KitManager) -> Self {
        let clock = ManualClock::new(0);
        let backing: Arc<dyn KeyValueStore> = store.clone();
        let durable = Arc::new(DurableState::open(backing, &Handle::current()));
        let (emitter, rx) = TransitionEmitter::channel(config.emitter_capacity);
        let tracker = LifecycleTracker::builder(durable.clone(), emitter)
            .config(config)
            .clock(Arc::new(clock.clone()))
            .kits(kits)
            .build();
        Self {
            tracker,
            clock,
            durable,
            store,
            rx,
        }
    }

    pub fn start(&self, surface: &str, at: i64) {
        self.clock.set(at);
        self.tracker.handle(LifecycleEvent::started(surface, at));
    }

    pub fn stop(&self, surface: &str, at: i64) {
        self.clock.set(at);
        self.tracker.handle(LifecycleEvent::stopped(surface, at));
    }

    /// Moves both the wall clock and (paused) tokio time forward.
    pub async fn idle(&self, ms: i64) {
        self.clock.advance(ms);
        tokio::time::sleep(std::time::Duration::from_millis(ms as u64)).await;
    }

    pub fn drain(&mut self) -> Vec<Emission> {
        let mut out = Vec::new();
        while let Ok(e) = self.rx.try_recv() {
            out.push(e);
        }
        out
    }

    pub fn records(&mut self) -> Vec<StateTransitionRecord> {
        self.drain()
            .into_iter()
            .filter_map(|e| match e {
                Emission::Transition(r) => Some(r),
                Emission::Screen(_) => None,
            })
            .collect()
    }
}
