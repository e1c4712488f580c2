//! Render pass descriptors, attachment options and clear state.

use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;
use ember_core::window::Window;

use crate::refcount::SharedRef;
use crate::resources::Framebuffer;

/// What happens to an attachment's contents when a pass begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadOp {
    /// Clear to the pass clear value.
    Clear,
    /// Keep the previous contents.
    Load,
    /// Contents are undefined; the driver may skip loading them.
    Discard,
}

/// What happens to an attachment's contents when a pass ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    /// Keep the rendered result.
    Store,
    /// The result is not needed after the pass.
    Discard,
}

/// Load/store behaviour of one render pass attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RenderTargetOption {
    /// Clear on begin, keep on end.
    #[default]
    ClearStore,
    /// Clear on begin, drop on end.
    ClearDiscard,
    /// Keep previous contents, keep on end.
    LoadStore,
    /// Keep previous contents, drop on end.
    LoadDiscard,
    /// Undefined on begin, keep on end.
    DiscardStore,
    /// Undefined on begin, drop on end.
    DiscardDiscard,
}

impl RenderTargetOption {
    /// Build an option from its load and store halves.
    pub fn new(load: LoadOp, store: StoreOp) -> Self {
        match (load, store) {
            (LoadOp::Clear, StoreOp::Store) => Self::ClearStore,
            (LoadOp::Clear, StoreOp::Discard) => Self::ClearDiscard,
            (LoadOp::Load, StoreOp::Store) => Self::LoadStore,
            (LoadOp::Load, StoreOp::Discard) => Self::LoadDiscard,
            (LoadOp::Discard, StoreOp::Store) => Self::DiscardStore,
            (LoadOp::Discard, StoreOp::Discard) => Self::DiscardDiscard,
        }
    }

    /// Behaviour at the start of the pass.
    pub fn load_op(self) -> LoadOp {
        match self {
            Self::ClearStore | Self::ClearDiscard => LoadOp::Clear,
            Self::LoadStore | Self::LoadDiscard => LoadOp::Load,
            Self::DiscardStore | Self::DiscardDiscard => LoadOp::Discard,
        }
    }

    /// Behaviour at the end of the pass.
    pub fn store_op(self) -> StoreOp {
        match self {
            Self::ClearStore | Self::LoadStore | Self::DiscardStore => StoreOp::Store,
            Self::ClearDiscard | Self::LoadDiscard | Self::DiscardDiscard => StoreOp::Discard,
        }
    }
}

bitflags! {
    /// Set of framebuffer aspects affected by a clear or invalidate.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ClearMask: u8 {
        /// Colour attachment.
        const COLOR = 1 << 0;
        /// Depth attachment.
        const DEPTH = 1 << 1;
        /// Stencil attachment.
        const STENCIL = 1 << 2;
    }
}

/// Per-attachment options for a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AttachmentOptions {
    /// Colour attachment.
    pub color: RenderTargetOption,
    /// Depth attachment.
    pub depth: RenderTargetOption,
    /// Stencil attachment.
    pub stencil: RenderTargetOption,
}

impl AttachmentOptions {
    /// Same option for every attachment.
    pub fn uniform(option: RenderTargetOption) -> Self {
        Self {
            color: option,
            depth: option,
            stencil: option,
        }
    }

    /// Aspects whose load op is `op`.
    pub fn load_mask(&self, op: LoadOp) -> ClearMask {
        let mut mask = ClearMask::empty();
        mask.set(ClearMask::COLOR, self.color.load_op() == op);
        mask.set(ClearMask::DEPTH, self.depth.load_op() == op);
        mask.set(ClearMask::STENCIL, self.stencil.load_op() == op);
        mask
    }

    /// Aspects whose store op is `op`.
    pub fn store_mask(&self, op: StoreOp) -> ClearMask {
        let mut mask = ClearMask::empty();
        mask.set(ClearMask::COLOR, self.color.store_op() == op);
        mask.set(ClearMask::DEPTH, self.depth.store_op() == op);
        mask.set(ClearMask::STENCIL, self.stencil.store_op() == op);
        mask
    }
}

/// Values written by clear load ops.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClearValues {
    /// RGBA colour.
    pub color: [f32; 4],
    /// Depth value.
    pub depth: f32,
    /// Stencil value.
    pub stencil: u32,
}

impl Default for ClearValues {
    fn default() -> Self {
        Self {
            color: [0.0, 0.0, 0.0, 1.0],
            depth: 1.0,
            stencil: 0,
        }
    }
}

/// Viewport rectangle and depth range.
///
/// Depth range is expressed in the backend's convention; the context fills it
/// from the target size when a pass does not override it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    /// X coordinate of the top-left corner.
    pub x: f32,
    /// Y coordinate of the top-left corner.
    pub y: f32,
    /// Width of the viewport.
    pub width: f32,
    /// Height of the viewport.
    pub height: f32,
    /// Minimum depth value.
    pub min_depth: f32,
    /// Maximum depth value.
    pub max_depth: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(0.0, 0.0, 0.0, 0.0)
    }
}

impl Viewport {
    /// Create a new viewport with `[0, 1]` depth range.
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }

    /// Create a viewport from dimensions with origin at (0, 0).
    pub fn from_dimensions(width: u32, height: u32) -> Self {
        Self::new(0.0, 0.0, width as f32, height as f32)
    }

    /// Set the depth range.
    pub fn with_depth_range(mut self, min_depth: f32, max_depth: f32) -> Self {
        self.min_depth = min_depth;
        self.max_depth = max_depth;
        self
    }
}

/// Description of one render pass.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RenderPassDescriptor {
    /// Debug label.
    pub label: Option<String>,
    /// Load/store behaviour per attachment.
    pub options: AttachmentOptions,
    /// Clear values used by `Clear` load ops.
    pub clear: ClearValues,
    /// Viewport override; defaults to the full target.
    pub viewport: Option<Viewport>,
}

impl RenderPassDescriptor {
    /// Pass that clears every attachment and stores the result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the attachment options.
    pub fn with_options(mut self, options: AttachmentOptions) -> Self {
        self.options = options;
        self
    }

    /// Set the clear colour.
    pub fn with_clear_color(mut self, color: [f32; 4]) -> Self {
        self.clear.color = color;
        self
    }

    /// Set the clear depth and stencil.
    pub fn with_clear_depth_stencil(mut self, depth: f32, stencil: u32) -> Self {
        self.clear.depth = depth;
        self.clear.stencil = stencil;
        self
    }

    /// Override the viewport.
    pub fn with_viewport(mut self, viewport: Viewport) -> Self {
        self.viewport = Some(viewport);
        self
    }
}

/// Surface a render pass draws into.
#[derive(Clone)]
pub enum RenderTarget {
    /// Offscreen framebuffer.
    Framebuffer(SharedRef<Framebuffer>),
    /// The default framebuffer of an on-screen window.
    Window(Arc<dyn Window>),
}

impl RenderTarget {
    /// Size of the target in pixels.
    pub fn size(&self) -> (u32, u32) {
        match self {
            Self::Framebuffer(fb) => fb.size(),
            Self::Window(window) => window.size(),
        }
    }
}

impl From<SharedRef<Framebuffer>> for RenderTarget {
    fn from(fb: SharedRef<Framebuffer>) -> Self {
        Self::Framebuffer(fb)
    }
}

impl From<Arc<dyn Window>> for RenderTarget {
    fn from(window: Arc<dyn Window>) -> Self {
        Self::Window(window)
    }
}

impl fmt::Debug for RenderTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Framebuffer(fb) => f.debug_tuple("Framebuffer").field(&fb.label()).finish(),
            Self::Window(window) => f.debug_tuple("Window").field(&window.size()).finish(),
        }
    }
}
