pub mod config;
pub mod kernel;
pub mod kits;
pub mod referrer;
pub mod replay;
pub mod session;
pub mod store;

// Re-export the pieces hosts wire together
pub use config::TrackerConfig;
pub use kernel::emitter::TransitionEmitter;
pub use kernel::event::{Emission, LifecycleEvent, LifecycleKind, StateTransitionRecord, Surface, TransitionKind};
pub use kernel::tracker::{LifecycleCallbacks, LifecycleTracker};
pub use session::{SessionBridge, SessionManager};
