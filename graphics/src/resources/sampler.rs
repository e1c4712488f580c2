//! GPU sampler resource.

use crate::types::SamplerDescriptor;

use super::ResourceCore;

/// A texture sampler.
pub struct Sampler {
    pub(super) core: ResourceCore,
    descriptor: SamplerDescriptor,
}

impl Sampler {
    pub(crate) fn new(core: ResourceCore, descriptor: SamplerDescriptor) -> Self {
        Self { core, descriptor }
    }

    /// Get the sampler descriptor.
    pub fn descriptor(&self) -> &SamplerDescriptor {
        &self.descriptor
    }

    /// Get the sampler label, if set.
    pub fn label(&self) -> Option<&str> {
        self.descriptor.label.as_deref()
    }
}

impl std::fmt::Debug for Sampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sampler")
            .field("label", &self.descriptor.label)
            .finish_non_exhaustive()
    }
}
