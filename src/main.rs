use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::runtime::Handle;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use appstate::kernel::time::{Clock, ManualClock, SystemClock};
use appstate::referrer::InstallReferrerListener;
use appstate::replay::Replayer;
use appstate::session::LoggingSessionManager;
use appstate::store::{DurableState, FileStore};
use appstate::{LifecycleTracker, SessionBridge, TrackerConfig, TransitionEmitter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("setting default subscriber failed")?;

    let config = match std::env::var_os("APPSTATE_CONFIG") {
        Some(path) => TrackerConfig::load(Path::new(&path))?,
        None => TrackerConfig::default(),
    };
    let store_path = std::env::var_os("APPSTATE_STORE")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("appstate.json"));

    let store = FileStore::open(store_path.clone())
        .with_context(|| format!("opening state store {}", store_path.display()))?;
    let durable = Arc::new(DurableState::open(Arc::new(store), &Handle::current()));

    let (emitter, rx) = TransitionEmitter::channel(config.emitter_capacity);
    let bridge = tokio::spawn(SessionBridge::new(rx, Arc::new(LoggingSessionManager)).run());

    // Tracker and input share one timeline.
    let clock = ManualClock::new(SystemClock.now_ms());
    let tracker = LifecycleTracker::builder(durable.clone(), emitter)
        .config(config)
        .clock(Arc::new(clock.clone()))
        .build();
    let mut replay = Replayer::new(tracker, clock, InstallReferrerListener::new(durable.clone()));

    tracing::info!("Replaying lifecycle events from stdin");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        replay.feed_line(&line);
    }

    replay.settle().await;

    let tracker = replay.into_tracker();
    println!("state: {}", tracker.app_state().as_str());
    println!("time in background: {}ms", tracker.background_time_ms());
    println!("{:#?}", tracker.telemetry_snapshot());

    durable.flush().await;
    drop(tracker);
    bridge.await.context("session bridge panicked")?;
    Ok(())
}
