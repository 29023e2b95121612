pub mod attribution;
pub mod counter;
pub mod debounce;
pub mod emitter;
pub mod event;
pub mod state;
pub mod telemetry;
pub mod time;
pub mod tracker;
