//! Native graphics API abstraction.
//!
//! The [`Context`](crate::Context) is the only caller of a [`Driver`]; every
//! method here runs on the driver thread. A driver speaks one of the closed set
//! of [`BackendKind`] conventions, which decide the clip-space correction and
//! whether vertex input goes through cached vertex array objects.
//!
//! # Available Drivers
//!
//! - [`NullDriver`]: headless driver that allocates handles and records calls,
//!   used by tests, benchmarks and the demos.

mod null;

use std::fmt;
use std::num::NonZeroU64;

use ember_core::math::Mat4;

use crate::device::DeviceCaps;
use crate::types::{
    ClearMask, ClearValues, DrawArgs, DrawIndexedArgs, IndexFormat, RasterState,
    SamplerDescriptor, TextureDescriptor, TextureRegion, VertexDeclarationDescriptor, Viewport,
};

pub use null::{DriverCall, DriverLog, NullDriver};

/// Graphics API conventions a driver follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// OpenGL: `[-1, 1]` depth, +Y up, vertex array objects.
    OpenGl,
    /// Vulkan: `[0, 1]` depth, +Y down, vertex buffers bound at draw time.
    Vulkan,
}

impl BackendKind {
    /// Human-readable name.
    pub fn name(self) -> &'static str {
        match self {
            Self::OpenGl => "OpenGL",
            Self::Vulkan => "Vulkan",
        }
    }

    /// Matrix that converts OpenGL-convention clip space to this backend's.
    pub fn clip_matrix(self) -> Mat4 {
        match self {
            Self::OpenGl => Mat4::identity(),
            #[rustfmt::skip]
            Self::Vulkan => Mat4::new(
                1.0,  0.0, 0.0, 0.0,
                0.0, -1.0, 0.0, 0.0,
                0.0,  0.0, 0.5, 0.5,
                0.0,  0.0, 0.0, 1.0,
            ),
        }
    }

    /// Whether vertex input state is baked into cached vertex array objects.
    pub fn uses_vertex_array_cache(self) -> bool {
        matches!(self, Self::OpenGl)
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Opaque non-zero name of a native object (a GL name or a Vulkan handle).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NativeHandle(NonZeroU64);

impl NativeHandle {
    /// Wrap a raw value; zero means "no object".
    pub fn new(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(Self)
    }

    /// Raw value.
    pub fn raw(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for NativeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Category of a native object, used when destroying it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeKind {
    /// Vertex, index or uniform buffer.
    Buffer,
    /// Texture.
    Texture,
    /// Sampler.
    Sampler,
    /// Linked program.
    Program,
    /// Offscreen framebuffer.
    Framebuffer,
    /// Vertex input layout.
    VertexLayout,
    /// Cached vertex array object.
    VertexArray,
}

/// Low-level graphics API surface driven by the context.
///
/// Implementations may assume every call happens on one thread and that
/// handles passed in were produced by the same driver.
pub trait Driver: Send + 'static {
    /// Driver name for logs.
    fn name(&self) -> &str;

    /// Conventions this driver follows.
    fn kind(&self) -> BackendKind;

    /// Query device limits. Called once when the device is created.
    fn query_caps(&mut self) -> DeviceCaps;

    /// Allocate a buffer of `size` bytes.
    fn create_buffer(&mut self, size: u64) -> NativeHandle;

    /// Copy `data` into a buffer at `offset`.
    fn write_buffer(&mut self, buffer: NativeHandle, offset: u64, data: &[u8]);

    /// Allocate texture storage for every mip level of `desc`.
    fn create_texture(&mut self, desc: &TextureDescriptor) -> NativeHandle;

    /// Upload texels into a region of one mip level.
    fn write_texture(
        &mut self,
        texture: NativeHandle,
        level: u32,
        region: TextureRegion,
        data: &[u8],
    );

    /// Fill every mip level below the base from level zero.
    fn generate_mipmaps(&mut self, texture: NativeHandle);

    /// Create a sampler object.
    fn create_sampler(&mut self, desc: &SamplerDescriptor) -> NativeHandle;

    /// Compile and link a program. The error carries the compiler log.
    fn create_program(
        &mut self,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<NativeHandle, String>;

    /// Create a framebuffer over the given textures.
    fn create_framebuffer(
        &mut self,
        colors: &[NativeHandle],
        depth: Option<NativeHandle>,
    ) -> NativeHandle;

    /// Create a vertex input layout object.
    fn create_vertex_layout(&mut self, desc: &VertexDeclarationDescriptor) -> NativeHandle;

    /// Build a vertex array object capturing layout and buffer bindings.
    fn create_vertex_array(
        &mut self,
        layout: NativeHandle,
        vertex_buffers: &[NativeHandle],
        index_buffer: Option<NativeHandle>,
    ) -> NativeHandle;

    /// Destroy a native object.
    fn destroy(&mut self, kind: NativeKind, handle: NativeHandle);

    /// Bind a framebuffer, or the window's default framebuffer for `None`.
    fn bind_render_target(&mut self, framebuffer: Option<NativeHandle>);

    /// Clear the selected aspects of the bound target.
    fn clear(&mut self, mask: ClearMask, values: &ClearValues);

    /// Set the viewport.
    fn set_viewport(&mut self, viewport: &Viewport);

    /// Tell the driver the selected aspects' contents are no longer needed.
    fn invalidate(&mut self, mask: ClearMask);

    /// Make a program current, or unbind with `None`.
    fn use_program(&mut self, program: Option<NativeHandle>);

    /// Apply raster, depth and blend state.
    fn set_raster_state(&mut self, state: &RasterState);

    /// Bind a vertex array object, or unbind with `None`.
    fn bind_vertex_array(&mut self, vertex_array: Option<NativeHandle>);

    /// Bind vertex buffers directly against a layout.
    fn bind_vertex_buffers(&mut self, layout: NativeHandle, buffers: &[NativeHandle]);

    /// Bind an index buffer directly.
    fn bind_index_buffer(&mut self, buffer: NativeHandle, format: IndexFormat);

    /// Bind a range of a uniform buffer to a block slot.
    fn bind_uniform_buffer(&mut self, slot: u32, buffer: NativeHandle, offset: u64, size: u64);

    /// Bind a texture to a texture unit.
    fn bind_texture(&mut self, slot: u32, texture: NativeHandle);

    /// Bind a sampler to a texture unit.
    fn bind_sampler(&mut self, slot: u32, sampler: NativeHandle);

    /// Issue an instanced non-indexed draw.
    fn draw(&mut self, args: &DrawArgs);

    /// Issue an instanced indexed draw.
    fn draw_indexed(&mut self, format: IndexFormat, args: &DrawIndexedArgs);
}
