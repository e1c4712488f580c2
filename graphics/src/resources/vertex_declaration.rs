//! Vertex declaration resource.

use crate::types::{VertexBufferLayout, VertexDeclarationDescriptor};

use super::ResourceCore;

/// Vertex input layout shared by the pipelines that reference it.
pub struct VertexDeclaration {
    pub(super) core: ResourceCore,
    descriptor: VertexDeclarationDescriptor,
}

impl VertexDeclaration {
    pub(crate) fn new(core: ResourceCore, descriptor: VertexDeclarationDescriptor) -> Self {
        Self { core, descriptor }
    }

    /// Get the declaration descriptor.
    pub fn descriptor(&self) -> &VertexDeclarationDescriptor {
        &self.descriptor
    }

    /// Buffer layouts, indexed by slot.
    pub fn buffer_layouts(&self) -> &[VertexBufferLayout] {
        &self.descriptor.buffers
    }

    /// Number of vertex buffers a draw must bind.
    pub fn buffer_count(&self) -> usize {
        self.descriptor.buffers.len()
    }
}

impl std::fmt::Debug for VertexDeclaration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VertexDeclaration")
            .field("buffers", &self.descriptor.buffers.len())
            .field("attributes", &self.descriptor.attributes.len())
            .field("label", &self.descriptor.label)
            .finish()
    }
}
