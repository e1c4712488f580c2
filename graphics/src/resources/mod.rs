//! GPU resources.
//!
//! This module contains the resource types created by [`Device`]:
//! - [`Buffer`] - vertex, index or uniform buffer
//! - [`Texture`] - 2D texture with optional mip chain
//! - [`Sampler`] - texture sampler
//! - [`Program`] - compiled shader program with a polled status
//! - [`Framebuffer`] - offscreen render target over textures
//! - [`VertexDeclaration`] - vertex input layout
//!
//! Resources live behind [`SharedRef`](crate::SharedRef). Each one owns a
//! [`ResourceCore`] holding its native handle; when the last shared reference
//! goes away on any thread, the handle is taken out and a release command is
//! queued so the native object is destroyed on the driver thread.
//!
//! [`Device`]: crate::Device

mod buffer;
mod framebuffer;
mod program;
mod sampler;
mod texture;
mod vertex_declaration;

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use crate::backend::{NativeHandle, NativeKind};
use crate::command::CommandQueue;
use crate::refcount::DestroyObject;

pub use buffer::Buffer;
pub use framebuffer::Framebuffer;
pub use program::Program;
pub use sampler::Sampler;
pub use texture::Texture;
pub use vertex_declaration::VertexDeclaration;

/// Identifies the device that created a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceId(u32);

impl DeviceId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU32 = AtomicU32::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Concrete resource type, as seen by logs and the op trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    VertexBuffer,
    IndexBuffer,
    UniformBuffer,
    Texture,
    Sampler,
    Program,
    Framebuffer,
    VertexDeclaration,
}

impl ResourceKind {
    /// Category of the native object backing this resource.
    pub fn native_kind(self) -> NativeKind {
        match self {
            Self::VertexBuffer | Self::IndexBuffer | Self::UniformBuffer => NativeKind::Buffer,
            Self::Texture => NativeKind::Texture,
            Self::Sampler => NativeKind::Sampler,
            Self::Program => NativeKind::Program,
            Self::Framebuffer => NativeKind::Framebuffer,
            Self::VertexDeclaration => NativeKind::VertexLayout,
        }
    }
}

/// State shared by every resource type.
///
/// Written by the context on the driver thread, read from anywhere.
pub struct ResourceCore {
    device_id: DeviceId,
    kind: ResourceKind,
    native: AtomicU64,
    initialized: AtomicBool,
    queue: Weak<CommandQueue>,
    live: Arc<AtomicUsize>,
}

impl ResourceCore {
    pub(crate) fn new(
        device_id: DeviceId,
        kind: ResourceKind,
        queue: Weak<CommandQueue>,
        live: Arc<AtomicUsize>,
    ) -> Self {
        live.fetch_add(1, Ordering::Relaxed);
        Self {
            device_id,
            kind,
            native: AtomicU64::new(0),
            initialized: AtomicBool::new(false),
            queue,
            live,
        }
    }

    /// Device that created the resource.
    pub fn device_id(&self) -> DeviceId {
        self.device_id
    }

    /// Concrete resource type.
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Native handle, once initialized. Programs that failed to compile have none.
    pub fn native_handle(&self) -> Option<NativeHandle> {
        NativeHandle::new(self.native.load(Ordering::Acquire))
    }

    /// Whether the driver thread has run this resource's init.
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Record the outcome of initialization.
    pub(crate) fn set_initialized(&self, handle: Option<NativeHandle>) {
        assert!(
            !self.is_initialized(),
            "{:?} initialized twice",
            self.kind
        );
        self.native.store(handle.map_or(0, NativeHandle::raw), Ordering::Release);
        self.initialized.store(true, Ordering::Release);
    }

    /// Hand the native handle to the driver thread for destruction.
    fn release(&mut self) {
        self.live.fetch_sub(1, Ordering::AcqRel);
        let Some(handle) = NativeHandle::new(std::mem::take(self.native.get_mut())) else {
            return;
        };
        let kind = self.kind;
        match self.queue.upgrade() {
            Some(queue) => {
                log::trace!("queueing release of {kind:?} {handle}");
                queue.enqueue_one(Box::new(move |ctx| ctx.release_resource(kind, handle)));
            }
            None => log::warn!("{kind:?} {handle} outlived its device; native object leaked"),
        }
    }
}

impl fmt::Debug for ResourceCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceCore")
            .field("kind", &self.kind)
            .field("native", &self.native_handle())
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

/// Implemented by every resource type the context can operate on.
pub trait GpuResource: DestroyObject + Send + Sync + 'static {
    /// Shared resource state.
    fn core(&self) -> &ResourceCore;

    /// Whether the driver thread has run this resource's init.
    fn is_initialized(&self) -> bool {
        self.core().is_initialized()
    }

    /// Native handle, once initialized.
    fn native_handle(&self) -> Option<NativeHandle> {
        self.core().native_handle()
    }
}

macro_rules! impl_gpu_resource {
    ($($ty:ty),* $(,)?) => {
        $(
            impl GpuResource for $ty {
                fn core(&self) -> &ResourceCore {
                    &self.core
                }
            }

            impl DestroyObject for $ty {
                fn destroy_object(&mut self) {
                    self.core.release();
                }
            }

            static_assertions::assert_impl_all!($ty: Send, Sync);
        )*
    };
}

impl_gpu_resource!(Buffer, Texture, Sampler, Program, Framebuffer, VertexDeclaration);
