use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tracing::{debug, info};

use super::attribution::{self, AttributionSnapshot};
use super::counter::ActivityCounter;
use super::debounce::DebounceTimer;
use super::emitter::TransitionEmitter;
use super::event::{Emission, LifecycleEvent, LifecycleKind, ScreenView, StateTransitionRecord, Surface};
use super::state::{AppState, Phase, TrackerState};
use super::telemetry::event::TelemetryEvent;
use super::telemetry::metrics::TelemetrySnapshot;
use super::time::{Clock, SystemClock};
use crate::config::TrackerConfig;
use crate::kits::KitManager;
use crate::store::durable::{DurableState, CRASHED_IN_FOREGROUND, INSTALL_REFERRER};

/// Host-side lifecycle hooks. The tracker depends on nothing platform-specific;
/// hosts adapt their framework callbacks onto this.
pub trait LifecycleCallbacks {
    fn on_surface_created(&self, surface: &Surface);
    fn on_surface_started(&self, surface: &Surface);
    fn on_surface_resumed(&self, surface: &Surface);
    fn on_surface_paused(&self, surface: &Surface);
    fn on_surface_stopped(&self, surface: &Surface);
}

pub struct TrackerBuilder {
    config: TrackerConfig,
    clock: Arc<dyn Clock>,
    activities: Arc<ActivityCounter>,
    timer: Option<DebounceTimer>,
    kits: KitManager,
    durable: Arc<DurableState>,
    emitter: TransitionEmitter,
}

impl TrackerBuilder {
    pub fn config(mut self, config: TrackerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn activities(mut self, activities: Arc<ActivityCounter>) -> Self {
        self.activities = activities;
        self
    }

    pub fn timer(mut self, timer: DebounceTimer) -> Self {
        self.timer = Some(timer);
        self
    }

    pub fn kits(mut self, kits: KitManager) -> Self {
        self.kits = kits;
        self
    }

    /// Without an explicit `.timer(..)` this binds to the tokio runtime of the
    /// calling context and panics if there is none.
    pub fn build(self) -> LifecycleTracker {
        let now = self.clock.now_ms();
        LifecycleTracker {
            inner: Arc::new(Inner {
                timer: self.timer.unwrap_or_else(DebounceTimer::current),
                config: self.config,
                clock: self.clock,
                activities: self.activities,
                kits: self.kits,
                durable: self.durable,
                emitter: self.emitter,
                state: Mutex::new(TrackerState::new(now)),
            }),
        }
    }
}

/// Infers foreground/background from lifecycle notifications.
///
/// Cheap to clone; clones share one state machine. Callable from any thread.
#[derive(Clone)]
pub struct LifecycleTracker {
    inner: Arc<Inner>,
}

struct Inner {
    config: TrackerConfig,
    clock: Arc<dyn Clock>,
    activities: Arc<ActivityCounter>,
    timer: DebounceTimer,
    kits: KitManager,
    durable: Arc<DurableState>,
    emitter: TransitionEmitter,
    state: Mutex<TrackerState>,
}

impl LifecycleTracker {
    /// Build inside a tokio runtime, or pass `.timer(DebounceTimer::new(handle))`
    /// when constructing from a thread without one (a host UI thread). Once
    /// built, the tracker may be driven from any thread.
    pub fn builder(durable: Arc<DurableState>, emitter: TransitionEmitter) -> TrackerBuilder {
        TrackerBuilder {
            config: TrackerConfig::default(),
            clock: Arc::new(SystemClock),
            activities: Arc::new(ActivityCounter::new()),
            timer: None,
            kits: KitManager::new(),
            durable,
            emitter,
        }
    }

    pub fn handle(&self, event: LifecycleEvent) {
        match event.kind {
            LifecycleKind::Started => self.inner.on_started(&event.surface, event.timestamp_ms),
            LifecycleKind::Stopped => Inner::on_stopped(&self.inner, &event.surface, event.timestamp_ms),
            kind => self.inner.notify_kits(kind, &event.surface),
        }
    }

    pub fn activity_count(&self) -> u32 {
        self.inner.activities.current()
    }

    pub fn interruptions(&self) -> u32 {
        self.inner.lock().interruptions
    }

    pub fn phase(&self) -> Phase {
        let state = self.inner.lock();
        state.phase(self.inner.activities.current())
    }

    pub fn app_state(&self) -> AppState {
        self.phase().app_state()
    }

    pub fn is_backgrounded(&self) -> bool {
        self.phase() == Phase::Background
    }

    pub fn current_surface(&self) -> Option<String> {
        self.inner.lock().current_surface.clone()
    }

    pub fn background_time_ms(&self) -> i64 {
        self.inner.durable.background_time_ms()
    }

    pub fn debounce(&self) -> Duration {
        self.inner.config.debounce()
    }

    pub fn telemetry_snapshot(&self) -> TelemetrySnapshot {
        self.inner.lock().telemetry.snapshot()
    }

    fn stamp(&self, kind: LifecycleKind, surface: &Surface) -> LifecycleEvent {
        LifecycleEvent::new(kind, surface.clone(), self.inner.clock.now_ms())
    }
}

impl LifecycleCallbacks for LifecycleTracker {
    fn on_surface_created(&self, surface: &Surface) {
        self.handle(self.stamp(LifecycleKind::Created, surface));
    }

    fn on_surface_started(&self, surface: &Surface) {
        self.handle(self.stamp(LifecycleKind::Started, surface));
    }

    fn on_surface_resumed(&self, surface: &Surface) {
        self.handle(self.stamp(LifecycleKind::Resumed, surface));
    }

    fn on_surface_paused(&self, surface: &Surface) {
        self.handle(self.stamp(LifecycleKind::Paused, surface));
    }

    fn on_surface_stopped(&self, surface: &Surface) {
        self.handle(self.stamp(LifecycleKind::Stopped, surface));
    }
}

impl Inner {
    fn delay_ms(&self) -> i64 {
        i64::try_from(self.config.debounce_ms).unwrap_or(i64::MAX)
    }

    fn on_started(&self, surface: &Surface, now: i64) {
        self.durable.set_bool(CRASHED_IN_FOREGROUND, true);

        let mut state = self.lock();

        // The fired check may already have left the timer slot while still
        // waiting on this lock, so the decision rests on count and elapsed time.
        let was_pending = self.timer.cancel_pending();
        if state.initialized && !state.confirmed_background && self.activities.current() == 0 {
            let gap = now - state.last_stopped_ms;
            if gap >= self.delay_ms() {
                // Due but not yet confirmed. Confirm now so the Background
                // record precedes the Init it leads to.
                self.confirm_background(&mut state);
            } else if was_pending {
                debug!("{} started {}ms after last stop, debounce absorbed it", surface.name, gap);
                state.telemetry.record(TelemetryEvent::DebounceAbsorbed { gap_ms: gap });
            }
        }

        state.current_surface = Some(surface.name.clone());
        let interruptions = state.interruptions;

        let attribution = if !state.initialized || state.confirmed_background {
            Some(self.capture_attribution(&mut state, surface))
        } else {
            None
        };

        if !state.initialized {
            state.initialized = true;
            state.last_foreground_ms = now;
            info!("Cold start on {}", surface.name);
            let record = StateTransitionRecord::init(Some(surface.name.clone()), 0, 0, attribution, 0);
            self.publish(&mut state, record);
        } else if state.confirmed_background {
            let background_ms = (now - state.last_stopped_ms).max(0);
            let foreground_ms = (state.last_stopped_ms - state.last_foreground_ms).max(0);
            let total = self.durable.add_background_time(background_ms);
            state.confirmed_background = false;
            state.last_foreground_ms = now;
            info!(
                "App foregrounded on {} after {}ms in background ({}ms total)",
                surface.name, background_ms, total
            );
            let record = StateTransitionRecord::init(
                Some(surface.name.clone()),
                foreground_ms,
                background_ms,
                attribution,
                interruptions,
            );
            self.publish(&mut state, record);
        }

        let count = self.activities.increment();
        if self.config.auto_track_screens {
            self.emit_screen(&mut state, &surface.name, true);
        }
        drop(state);

        self.notify_kits_with(LifecycleKind::Started, surface, count);
    }

    fn on_stopped(this: &Arc<Self>, surface: &Surface, now: i64) {
        this.durable.set_bool(CRASHED_IN_FOREGROUND, false);

        let mut state = this.lock();
        state.last_stopped_ms = now;
        let count = this.activities.decrement();

        if this.config.auto_track_screens {
            this.emit_screen(&mut state, &surface.name, false);
        }

        if count == 0 {
            if !state.initialized {
                debug!("{} stopped before any start, nothing to background", surface.name);
            } else if this.config.backgrounds_immediately(&surface.name) {
                this.timer.cancel_pending();
                state.telemetry.record(TelemetryEvent::ImmediateBackground {
                    surface: surface.name.clone(),
                });
                this.confirm_background(&mut state);
            } else {
                Self::schedule_check(this, this.config.debounce());
            }
        }
        drop(state);

        this.notify_kits_with(LifecycleKind::Stopped, surface, count);
    }

    fn schedule_check(this: &Arc<Self>, delay: Duration) {
        let weak: Weak<Self> = Arc::downgrade(this);
        this.timer.schedule_check(delay, move || {
            if let Some(inner) = weak.upgrade() {
                Inner::run_background_check(&inner);
            }
        });
    }

    /// Fired by the debounce timer. Trusts nothing from scheduling time.
    fn run_background_check(this: &Arc<Self>) {
        let mut state = this.lock();
        let count = this.activities.current();
        let elapsed = this.clock.now_ms() - state.last_stopped_ms;

        if count > 0 || !state.initialized || state.confirmed_background {
            debug!("Background check dropped: count={} elapsed={}ms", count, elapsed);
            state.telemetry.record(TelemetryEvent::CheckRejected {
                activity_count: count,
                elapsed_ms: elapsed,
            });
            return;
        }

        if elapsed < this.delay_ms() {
            // Timer ran ahead of the wall clock; wait out the remainder.
            let remaining = this.delay_ms().saturating_sub(elapsed) as u64;
            debug!("Background check early by {}ms, rescheduling", remaining);
            Self::schedule_check(this, Duration::from_millis(remaining));
            return;
        }

        this.confirm_background(&mut state);
    }

    fn confirm_background(&self, state: &mut TrackerState) {
        if state.confirmed_background {
            return;
        }
        state.confirmed_background = true;
        state.interruptions = state.interruptions.saturating_add(1);
        let surface = state.current_surface.take();
        info!("App backgrounded from {}", surface.as_deref().unwrap_or("-"));
        let record = StateTransitionRecord::background(surface, state.interruptions);
        self.publish(state, record);
    }

    /// Resets the interruption counter: a captured launch starts a new session.
    fn capture_attribution(&self, state: &mut TrackerState, surface: &Surface) -> AttributionSnapshot {
        state.interruptions = 0;
        let mut snapshot = attribution::capture(surface.launch.as_ref());
        if !state.initialized {
            snapshot.install_referrer = self.durable.get_string(INSTALL_REFERRER);
        }
        snapshot
    }

    /// Emits while the state lock is held, so records leave in confirmation order.
    fn publish(&self, state: &mut TrackerState, record: StateTransitionRecord) {
        state.telemetry.record(TelemetryEvent::Transition {
            kind: record.kind,
            foreground_ms: record.foreground_ms,
            background_ms: record.background_ms,
            interruptions: record.interruptions,
        });
        if let Err(reason) = self.emitter.emit(Emission::Transition(record)) {
            state.telemetry.record(TelemetryEvent::EmissionDropped { reason });
        }
    }

    fn emit_screen(&self, state: &mut TrackerState, name: &str, entering: bool) {
        let view = ScreenView {
            name: name.to_string(),
            entering,
        };
        if let Err(reason) = self.emitter.emit(Emission::Screen(view)) {
            state.telemetry.record(TelemetryEvent::EmissionDropped { reason });
        }
    }

    fn notify_kits(&self, kind: LifecycleKind, surface: &Surface) {
        self.notify_kits_with(kind, surface, self.activities.current());
    }

    fn notify_kits_with(&self, kind: LifecycleKind, surface: &Surface, count: u32) {
        if self.kits.is_empty() {
            return;
        }
        let failed = self.kits.notify(kind, surface, count);
        if !failed.is_empty() {
            let mut state = self.lock();
            for kit in failed {
                state.telemetry.record(TelemetryEvent::KitFailed { kit });
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
