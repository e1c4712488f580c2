//! Common types and descriptors for graphics resources.
//!
//! This module contains format enums, usage flags, and descriptor structs
//! used throughout the graphics system.

mod buffer;
mod draw;
mod framebuffer;
mod pipeline;
mod program;
mod render_pass;
mod sampler;
mod texture;
mod vertex;

pub use buffer::{BufferDescriptor, BufferKind, BufferUsage, IndexFormat};
pub use draw::{DrawArgs, DrawIndexedArgs};
pub use framebuffer::FramebufferDescriptor;
pub use pipeline::{BlendMode, CullMode, PipelineState, PrimitiveTopology, RasterState};
pub use program::{ProgramDescriptor, ProgramStatus};
pub use render_pass::{
    AttachmentOptions, ClearMask, ClearValues, LoadOp, RenderPassDescriptor, RenderTarget,
    RenderTargetOption, StoreOp, Viewport,
};
pub use sampler::{FilterMode, SamplerDescriptor, WrapMode};
pub use texture::{TextureDescriptor, TextureFormat, TextureRegion, TextureUsage, max_mip_levels};
pub use vertex::{
    VertexAttribute, VertexBufferLayout, VertexDeclarationDescriptor, VertexFormat, VertexStepMode,
};
