//! # Ember Engine Core
//!
//! Basic utilities shared by the engine crates: shared byte blobs, the
//! driver-thread identity, the window surface trait, math aliases and
//! profiling macros.

pub mod math;
pub mod memory;
pub mod profiling;
pub mod thread;
pub mod window;

/// Core library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Log the core library version.
pub fn init() {
    log::info!("Ember Core v{} initialized", VERSION);
}
