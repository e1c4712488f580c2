//! # Ember Graphics
//!
//! Render hardware interface for the Ember engine.
//!
//! ## Overview
//!
//! This crate provides:
//! - [`Device`] - Resource factory, owner of the command queue and context
//! - [`CmdList`] - Per-thread command recorder, committed atomically
//! - [`CommandQueue`] - Thread-safe FIFO drained on the driver thread
//! - [`Context`] - Driver-thread state machine that talks to the [`Driver`]
//! - [`SharedRef`] - Intrusive reference counting with deferred native release
//! - [`NullDriver`] - Recording driver for tests and headless runs
//!
//! ## Example
//!
//! ```ignore
//! use ember_graphics::{BackendKind, Device, DeviceConfig, NullDriver};
//!
//! let driver = NullDriver::new(BackendKind::OpenGl);
//! let device = Device::new(Box::new(driver), DeviceConfig::default())?;
//!
//! // On any thread
//! let mut cmd = device.create_cmd_list();
//! cmd.begin_render_pass(RenderPassDescriptor::default(), window.clone());
//! cmd.draw(3, 0, 1, 0);
//! cmd.end_render_pass();
//! cmd.commit();
//!
//! // On the driver thread
//! device.execute_commands();
//! ```

pub mod backend;
pub mod command;
pub mod context;
pub mod device;
pub mod error;
pub mod refcount;
pub mod resources;
pub mod types;

// Re-export main types for convenience
pub use backend::{BackendKind, Driver, DriverCall, DriverLog, NativeHandle, NativeKind, NullDriver};
pub use command::{CmdList, Command, CommandQueue};
pub use context::{Context, ContextOp, ContextPhase, ContextStats};
pub use device::{Device, DeviceCaps, DeviceConfig};
pub use error::GraphicsError;
pub use refcount::{DestroyObject, SharedPtr, SharedRef, WeakPtr};
pub use resources::{
    Buffer, DeviceId, Framebuffer, GpuResource, Program, ResourceKind, Sampler, Texture,
    VertexDeclaration,
};
pub use types::{
    BufferDescriptor, BufferUsage, IndexFormat, ProgramDescriptor, RenderPassDescriptor,
    RenderTarget, SamplerDescriptor, TextureDescriptor, TextureFormat, TextureUsage,
};

/// Graphics library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the graphics subsystem.
///
/// Logs the crate versions; devices can be created without calling it.
pub fn init() {
    ember_core::init();
    log::info!("Ember Graphics v{} initialized", VERSION);
}
