pub mod durable;
pub mod kv;

pub use durable::*;
pub use kv::*;
