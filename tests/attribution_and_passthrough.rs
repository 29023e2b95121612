mod common;

use std::sync::{Arc, Mutex};

use anyhow::Result;
use appstate::kernel::attribution::{AttributionSnapshot, APPLINK_KEY};
use appstate::kernel::event::{Emission, LifecycleKind, ScreenView, SurfaceLaunchInfo};
use appstate::kits::{KitLifecycle, KitManager};
use appstate::store::{InMemoryStore, KeyValueStore, StoredValue, INSTALL_REFERRER};
use appstate::{LifecycleCallbacks, LifecycleEvent, SessionBridge, SessionManager, Surface, TrackerConfig, TransitionKind};
use common::Harness;

fn deep_link_surface() -> Surface {
    Surface::named("com.app.DeepLinkActivity").with_launch(SurfaceLaunchInfo {
        calling_package: Some("com.partner.browser".into()),
        data_uri: Some("myapp://product/991?ref=newsletter".into()),
        extras: Some(r#"{"al_applink_data":{"target_url":"https://shop.example/p/991"}}"#.into()),
    })
}

#[tokio::test(start_paused = true)]
async fn cold_start_carries_launch_attribution() {
    let store = Arc::new(InMemoryStore::new());
    store
        .put(INSTALL_REFERRER, StoredValue::Text("utm_source=play".into()))
        .unwrap();
    let mut h = Harness::with(TrackerConfig::default(), store, KitManager::new());

    h.clock.set(0);
    h.tracker
        .handle(LifecycleEvent::new(LifecycleKind::Started, deep_link_surface(), 0));

    let records = h.records();
    let attribution = records[0].attribution.as_ref().expect("cold start attribution");
    assert_eq!(attribution.calling_package.as_deref(), Some("com.partner.browser"));
    assert_eq!(
        attribution.referrer_uri.as_deref(),
        Some("myapp://product/991?ref=newsletter")
    );
    assert_eq!(
        attribution.launch_parameters.as_ref().unwrap()[APPLINK_KEY]["target_url"],
        "https://shop.example/p/991"
    );
    assert_eq!(attribution.install_referrer.as_deref(), Some("utm_source=play"));
}

#[tokio::test(start_paused = true)]
async fn reentry_recaptures_attribution_without_install_referrer() {
    let store = Arc::new(InMemoryStore::new());
    store
        .put(INSTALL_REFERRER, StoredValue::Text("utm_source=play".into()))
        .unwrap();
    let mut h = Harness::with(TrackerConfig::default(), store, KitManager::new());

    h.start("com.app.Main", 0);
    h.stop("com.app.Main", 10);
    h.idle(1500).await;
    h.clock.set(9_000);
    h.tracker
        .handle(LifecycleEvent::new(LifecycleKind::Started, deep_link_surface(), 9_000));

    let records = h.records();
    assert_eq!(records.len(), 3);
    assert_eq!(records[0].attribution, Some(AttributionSnapshot {
        install_referrer: Some("utm_source=play".into()),
        ..Default::default()
    }));
    let reentry = records[2].attribution.as_ref().unwrap();
    assert_eq!(reentry.calling_package.as_deref(), Some("com.partner.browser"));
    assert_eq!(reentry.install_referrer, None);
}

#[tokio::test(start_paused = true)]
async fn foreground_restart_captures_nothing() {
    let mut h = Harness::new(TrackerConfig::default());
    h.start("com.app.Main", 0);
    h.clock.set(50);
    h.tracker
        .handle(LifecycleEvent::new(LifecycleKind::Started, deep_link_surface(), 50));

    assert_eq!(h.records().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn malformed_extras_degrade_to_partial_snapshot() {
    let mut h = Harness::new(TrackerConfig::default());
    let surface = Surface::named("A").with_launch(SurfaceLaunchInfo {
        calling_package: Some("com.partner".into()),
        data_uri: None,
        extras: Some("{\"al_applink_data\": [".into()),
    });
    h.tracker.handle(LifecycleEvent::new(LifecycleKind::Started, surface, 0));

    let records = h.records();
    let attribution = records[0].attribution.as_ref().unwrap();
    assert_eq!(attribution.calling_package.as_deref(), Some("com.partner"));
    assert!(attribution.referrer_uri.is_none());
    assert!(attribution.launch_parameters.is_none());
}

#[derive(Default)]
struct MirrorKit {
    seen: Mutex<Vec<(LifecycleKind, String, u32)>>,
}

impl KitLifecycle for MirrorKit {
    fn name(&self) -> &str {
        "mirror"
    }

    fn on_lifecycle(&self, kind: LifecycleKind, surface: &Surface, activity_count: u32) -> Result<()> {
        self.seen
            .lock()
            .unwrap()
            .push((kind, surface.name.clone(), activity_count));
        Ok(())
    }
}

struct BrokenKit;

impl KitLifecycle for BrokenKit {
    fn name(&self) -> &str {
        "broken"
    }

    fn on_lifecycle(&self, _: LifecycleKind, _: &Surface, _: u32) -> Result<()> {
        anyhow::bail!("not initialized")
    }
}

#[tokio::test(start_paused = true)]
async fn kits_mirror_every_callback_with_counts() {
    let mirror = Arc::new(MirrorKit::default());
    let mut kits = KitManager::new();
    kits.register(Arc::new(BrokenKit));
    kits.register(mirror.clone());
    let mut h = Harness::with(TrackerConfig::default(), Arc::new(InMemoryStore::new()), kits);

    let a = Surface::named("A");
    h.tracker.on_surface_created(&a);
    h.tracker.on_surface_started(&a);
    h.tracker.on_surface_resumed(&a);
    h.tracker.on_surface_paused(&a);
    h.tracker.on_surface_stopped(&a);

    let seen = mirror.seen.lock().unwrap().clone();
    assert_eq!(
        seen,
        vec![
            (LifecycleKind::Created, "A".to_string(), 0),
            (LifecycleKind::Started, "A".to_string(), 1),
            (LifecycleKind::Resumed, "A".to_string(), 1),
            (LifecycleKind::Paused, "A".to_string(), 1),
            (LifecycleKind::Stopped, "A".to_string(), 0),
        ]
    );

    // The broken kit changed nothing in the state machine.
    assert_eq!(h.records().len(), 1);
    assert_eq!(h.tracker.telemetry_snapshot().kit_failures, 5);
}

#[tokio::test(start_paused = true)]
async fn auto_tracking_emits_screen_views_in_order() {
    let config = TrackerConfig {
        auto_track_screens: true,
        ..TrackerConfig::default()
    };
    let mut h = Harness::new(config);
    h.start("A", 0);
    h.stop("A", 10);
    h.idle(2000).await;

    let emissions = h.drain();
    assert_eq!(emissions.len(), 4);
    assert!(matches!(&emissions[0], Emission::Transition(r) if r.kind == TransitionKind::Init));
    assert_eq!(
        emissions[1],
        Emission::Screen(ScreenView { name: "A".into(), entering: true })
    );
    assert_eq!(
        emissions[2],
        Emission::Screen(ScreenView { name: "A".into(), entering: false })
    );
    assert!(matches!(&emissions[3], Emission::Transition(r) if r.kind == TransitionKind::Background));
}

#[tokio::test(start_paused = true)]
async fn saturated_sink_drops_without_disturbing_state() {
    let config = TrackerConfig {
        emitter_capacity: 1,
        ..TrackerConfig::default()
    };
    let mut h = Harness::new(config);
    h.start("A", 0);
    h.stop("A", 10);
    h.idle(2000).await;

    // The Background record found the queue full.
    assert_eq!(h.records().len(), 1);
    assert!(h.tracker.is_backgrounded());
    assert_eq!(h.tracker.interruptions(), 1);
    assert_eq!(h.tracker.telemetry_snapshot().dropped_emissions, 1);
}

#[derive(Default)]
struct CollectingSession {
    calls: Mutex<Vec<String>>,
}

impl SessionManager for CollectingSession {
    fn on_init(
        &self,
        surface: Option<&str>,
        foreground_ms: i64,
        background_ms: i64,
        _attribution: Option<&AttributionSnapshot>,
        interruptions: u32,
    ) -> Result<()> {
        self.calls.lock().unwrap().push(format!(
            "init {} {} {} {}",
            surface.unwrap_or("-"),
            foreground_ms,
            background_ms,
            interruptions
        ));
        Ok(())
    }

    fn on_background(&self, surface: Option<&str>) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("background {}", surface.unwrap_or("-")));
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn session_bridge_sees_full_cycle() {
    let (emitter, rx) = appstate::TransitionEmitter::channel(16);
    let durable = Arc::new(appstate::store::DurableState::open(
        Arc::new(InMemoryStore::new()),
        &tokio::runtime::Handle::current(),
    ));
    let clock = appstate::kernel::time::ManualClock::new(0);
    let tracker = appstate::LifecycleTracker::builder(durable, emitter)
        .clock(Arc::new(clock.clone()))
        .build();
    let session = Arc::new(CollectingSession::default());
    let bridge = tokio::spawn(SessionBridge::new(rx, session.clone()).run());

    tracker.handle(LifecycleEvent::started("A", 0));
    tracker.handle(LifecycleEvent::stopped("A", 10));
    clock.set(2_010);
    tokio::time::sleep(std::time::Duration::from_millis(2_000)).await;
    clock.set(5_000);
    tracker.handle(LifecycleEvent::started("B", 5_000));

    drop(tracker);
    bridge.await.unwrap();

    assert_eq!(
        *session.calls.lock().unwrap(),
        vec!["init A 0 0 0", "background A", "init B 10 4990 1"]
    );
}
