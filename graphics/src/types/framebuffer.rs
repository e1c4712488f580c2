//! Framebuffer descriptor.

use crate::refcount::SharedRef;
use crate::resources::Texture;

/// Attachments of an offscreen framebuffer.
#[derive(Debug, Clone, Default)]
pub struct FramebufferDescriptor {
    /// Debug label.
    pub label: Option<String>,
    /// Colour attachments, in output order.
    pub colors: Vec<SharedRef<Texture>>,
    /// Depth/stencil attachment.
    pub depth: Option<SharedRef<Texture>>,
}

impl FramebufferDescriptor {
    /// Framebuffer with a single colour attachment.
    pub fn new(color: SharedRef<Texture>) -> Self {
        Self {
            label: None,
            colors: vec![color],
            depth: None,
        }
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Append a colour attachment.
    pub fn with_color(mut self, color: SharedRef<Texture>) -> Self {
        self.colors.push(color);
        self
    }

    /// Set the depth/stencil attachment.
    pub fn with_depth(mut self, depth: SharedRef<Texture>) -> Self {
        self.depth = Some(depth);
        self
    }
}
