//! Offscreen framebuffer resource.

use crate::refcount::SharedRef;

use super::{ResourceCore, Texture};

/// Render target made of texture attachments.
///
/// Holds shared references to its attachments, so the textures outlive the
/// framebuffer's native object.
pub struct Framebuffer {
    pub(super) core: ResourceCore,
    label: Option<String>,
    colors: Vec<SharedRef<Texture>>,
    depth: Option<SharedRef<Texture>>,
    size: (u32, u32),
}

impl Framebuffer {
    pub(crate) fn new(
        core: ResourceCore,
        label: Option<String>,
        colors: Vec<SharedRef<Texture>>,
        depth: Option<SharedRef<Texture>>,
        size: (u32, u32),
    ) -> Self {
        Self {
            core,
            label,
            colors,
            depth,
            size,
        }
    }

    /// Colour attachments.
    pub fn color_attachments(&self) -> &[SharedRef<Texture>] {
        &self.colors
    }

    /// Depth/stencil attachment.
    pub fn depth_attachment(&self) -> Option<&SharedRef<Texture>> {
        self.depth.as_ref()
    }

    /// Size shared by every attachment.
    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    /// Get the framebuffer label, if set.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }
}

impl std::fmt::Debug for Framebuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Framebuffer")
            .field("colors", &self.colors.len())
            .field("depth", &self.depth.is_some())
            .field("size", &self.size)
            .field("label", &self.label)
            .finish()
    }
}
