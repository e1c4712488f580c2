//! Sampler descriptors.

/// Texel filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FilterMode {
    /// Nearest texel.
    Nearest,
    /// Linear interpolation.
    #[default]
    Linear,
}

/// Behaviour for coordinates outside `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WrapMode {
    /// Tile the texture.
    #[default]
    Repeat,
    /// Tile, mirroring every other repetition.
    MirroredRepeat,
    /// Clamp to the edge texel.
    ClampToEdge,
    /// Clamp to the border colour.
    ClampToBorder,
}

/// Descriptor for creating a sampler.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplerDescriptor {
    /// Debug label.
    pub label: Option<String>,
    /// Minification filter.
    pub min_filter: FilterMode,
    /// Magnification filter.
    pub mag_filter: FilterMode,
    /// Filter between mip levels.
    pub mip_filter: FilterMode,
    /// Wrap mode along U.
    pub wrap_u: WrapMode,
    /// Wrap mode along V.
    pub wrap_v: WrapMode,
    /// Wrap mode along W.
    pub wrap_w: WrapMode,
    /// Maximum anisotropy; 1.0 disables anisotropic filtering.
    pub max_anisotropy: f32,
}

impl SamplerDescriptor {
    /// Trilinear filtering with repeat wrapping.
    pub fn linear() -> Self {
        Self {
            label: None,
            min_filter: FilterMode::Linear,
            mag_filter: FilterMode::Linear,
            mip_filter: FilterMode::Linear,
            wrap_u: WrapMode::Repeat,
            wrap_v: WrapMode::Repeat,
            wrap_w: WrapMode::Repeat,
            max_anisotropy: 1.0,
        }
    }

    /// Point sampling clamped to the edge.
    pub fn nearest() -> Self {
        Self {
            min_filter: FilterMode::Nearest,
            mag_filter: FilterMode::Nearest,
            mip_filter: FilterMode::Nearest,
            wrap_u: WrapMode::ClampToEdge,
            wrap_v: WrapMode::ClampToEdge,
            wrap_w: WrapMode::ClampToEdge,
            ..Self::linear()
        }
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the wrap mode on every axis.
    pub fn with_wrap(mut self, wrap: WrapMode) -> Self {
        self.wrap_u = wrap;
        self.wrap_v = wrap;
        self.wrap_w = wrap;
        self
    }

    /// Set the maximum anisotropy.
    pub fn with_anisotropy(mut self, max_anisotropy: f32) -> Self {
        self.max_anisotropy = max_anisotropy;
        self
    }
}

impl Default for SamplerDescriptor {
    fn default() -> Self {
        Self::linear()
    }
}
