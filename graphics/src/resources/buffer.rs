//! GPU buffer resource.

use crate::types::{BufferDescriptor, BufferKind, IndexFormat};

use super::ResourceCore;

/// A vertex, index or uniform buffer.
///
/// Buffers are created by [`Device::create_vertex_buffer`] and friends and
/// live behind a [`SharedRef`](crate::SharedRef). Contents are written with
/// the `update_*_buffer` operations of a [`CmdList`](crate::CmdList).
///
/// [`Device::create_vertex_buffer`]: crate::Device::create_vertex_buffer
pub struct Buffer {
    pub(super) core: ResourceCore,
    kind: BufferKind,
    descriptor: BufferDescriptor,
    index_format: Option<IndexFormat>,
}

impl Buffer {
    pub(crate) fn new(
        core: ResourceCore,
        kind: BufferKind,
        descriptor: BufferDescriptor,
        index_format: Option<IndexFormat>,
    ) -> Self {
        debug_assert_eq!(kind == BufferKind::Index, index_format.is_some());
        Self {
            core,
            kind,
            descriptor,
            index_format,
        }
    }

    /// Role of the buffer.
    pub fn kind(&self) -> BufferKind {
        self.kind
    }

    /// Get the buffer descriptor.
    pub fn descriptor(&self) -> &BufferDescriptor {
        &self.descriptor
    }

    /// Get the buffer size in bytes.
    pub fn size(&self) -> u64 {
        self.descriptor.size
    }

    /// Element format, for index buffers.
    pub fn index_format(&self) -> Option<IndexFormat> {
        self.index_format
    }

    /// Get the buffer label, if set.
    pub fn label(&self) -> Option<&str> {
        self.descriptor.label.as_deref()
    }
}

impl std::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer")
            .field("kind", &self.kind)
            .field("size", &self.descriptor.size)
            .field("usage", &self.descriptor.usage)
            .field("label", &self.descriptor.label)
            .field("native", &self.core.native_handle())
            .finish()
    }
}
