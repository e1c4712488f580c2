//! GPU texture resource.

use crate::types::{TextureDescriptor, TextureFormat, TextureUsage};

use super::ResourceCore;

/// A 2D texture.
///
/// Textures are created by [`Device::create_texture`](crate::Device::create_texture).
/// They can be sampled, used as framebuffer attachments, or both, depending on
/// their usage flags.
pub struct Texture {
    pub(super) core: ResourceCore,
    descriptor: TextureDescriptor,
}

impl Texture {
    pub(crate) fn new(core: ResourceCore, descriptor: TextureDescriptor) -> Self {
        Self { core, descriptor }
    }

    /// Get the texture descriptor.
    pub fn descriptor(&self) -> &TextureDescriptor {
        &self.descriptor
    }

    /// Get the texture width.
    pub fn width(&self) -> u32 {
        self.descriptor.width
    }

    /// Get the texture height.
    pub fn height(&self) -> u32 {
        self.descriptor.height
    }

    /// Get the texture format.
    pub fn format(&self) -> TextureFormat {
        self.descriptor.format
    }

    /// Get the usage flags.
    pub fn usage(&self) -> TextureUsage {
        self.descriptor.usage
    }

    /// Get the mip level count.
    pub fn mip_level_count(&self) -> u32 {
        self.descriptor.mip_level_count
    }

    /// Get the texture label, if set.
    pub fn label(&self) -> Option<&str> {
        self.descriptor.label.as_deref()
    }
}

impl std::fmt::Debug for Texture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Texture")
            .field("size", &(self.descriptor.width, self.descriptor.height))
            .field("format", &self.descriptor.format)
            .field("mips", &self.descriptor.mip_level_count)
            .field("label", &self.descriptor.label)
            .finish()
    }
}
