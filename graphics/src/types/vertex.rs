//! Vertex declaration layout.

/// Format of a single vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexFormat {
    /// One 32-bit float.
    Float32,
    /// Two 32-bit floats.
    Float32x2,
    /// Three 32-bit floats.
    Float32x3,
    /// Four 32-bit floats.
    Float32x4,
    /// Four normalized unsigned bytes (packed colour).
    Unorm8x4,
    /// One 32-bit unsigned integer.
    Uint32,
}

impl VertexFormat {
    /// Size in bytes.
    pub fn size(self) -> u32 {
        match self {
            Self::Float32 | Self::Unorm8x4 | Self::Uint32 => 4,
            Self::Float32x2 => 8,
            Self::Float32x3 => 12,
            Self::Float32x4 => 16,
        }
    }
}

/// Whether a vertex buffer advances per vertex or per instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VertexStepMode {
    /// Advance once per vertex.
    #[default]
    Vertex,
    /// Advance once per instance.
    Instance,
}

/// Layout of one bound vertex buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexBufferLayout {
    /// Distance between consecutive elements in bytes.
    pub stride: u32,
    /// Step mode.
    pub step_mode: VertexStepMode,
}

impl VertexBufferLayout {
    /// Per-vertex layout with the given stride.
    pub fn new(stride: u32) -> Self {
        Self {
            stride,
            step_mode: VertexStepMode::Vertex,
        }
    }

    /// Per-instance layout with the given stride.
    pub fn per_instance(stride: u32) -> Self {
        Self {
            stride,
            step_mode: VertexStepMode::Instance,
        }
    }
}

/// A single shader input fed from a vertex buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexAttribute {
    /// Shader input location.
    pub location: u32,
    /// Index into [`VertexDeclarationDescriptor::buffers`].
    pub buffer_slot: u32,
    /// Byte offset inside one element.
    pub offset: u32,
    /// Attribute format.
    pub format: VertexFormat,
}

impl VertexAttribute {
    /// Create an attribute description.
    pub fn new(location: u32, buffer_slot: u32, offset: u32, format: VertexFormat) -> Self {
        Self {
            location,
            buffer_slot,
            offset,
            format,
        }
    }
}

/// Full description of the vertex input of a pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct VertexDeclarationDescriptor {
    /// Debug label.
    pub label: Option<String>,
    /// Buffer layouts, indexed by buffer slot.
    pub buffers: Vec<VertexBufferLayout>,
    /// Attributes read by the vertex shader.
    pub attributes: Vec<VertexAttribute>,
}

impl VertexDeclarationDescriptor {
    /// Create an empty declaration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Append a buffer layout.
    pub fn with_buffer(mut self, layout: VertexBufferLayout) -> Self {
        self.buffers.push(layout);
        self
    }

    /// Append an attribute.
    pub fn with_attribute(mut self, attribute: VertexAttribute) -> Self {
        self.attributes.push(attribute);
        self
    }
}
