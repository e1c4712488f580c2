//! Fixed-function raster state and the pipeline state bound before drawing.

use crate::refcount::SharedRef;
use crate::resources::{Program, VertexDeclaration};

/// How vertices are assembled into primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PrimitiveTopology {
    /// Separate points.
    PointList,
    /// Separate line segments.
    LineList,
    /// Connected line strip.
    LineStrip,
    /// Separate triangles.
    #[default]
    TriangleList,
    /// Connected triangle strip.
    TriangleStrip,
}

/// Which faces are culled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CullMode {
    /// Draw both faces.
    None,
    /// Cull front faces.
    Front,
    /// Cull back faces.
    #[default]
    Back,
}

/// Colour blending preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendMode {
    /// Standard `src * a + dst * (1 - a)`.
    Alpha,
    /// Source colour already multiplied by alpha.
    Premultiplied,
    /// `src + dst`.
    Additive,
}

/// Rasterizer, depth and blend state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RasterState {
    /// Primitive topology.
    pub topology: PrimitiveTopology,
    /// Face culling.
    pub cull_mode: CullMode,
    /// Depth test enabled.
    pub depth_test: bool,
    /// Depth writes enabled.
    pub depth_write: bool,
    /// Blending; `None` writes the source colour unchanged.
    pub blend: Option<BlendMode>,
}

impl Default for RasterState {
    fn default() -> Self {
        Self {
            topology: PrimitiveTopology::TriangleList,
            cull_mode: CullMode::Back,
            depth_test: true,
            depth_write: true,
            blend: None,
        }
    }
}

impl RasterState {
    /// Opaque geometry with depth testing.
    pub fn opaque() -> Self {
        Self::default()
    }

    /// Alpha-blended geometry that tests but does not write depth.
    pub fn transparent() -> Self {
        Self {
            depth_write: false,
            blend: Some(BlendMode::Alpha),
            ..Self::default()
        }
    }

    /// Set the topology.
    pub fn with_topology(mut self, topology: PrimitiveTopology) -> Self {
        self.topology = topology;
        self
    }

    /// Set the cull mode.
    pub fn with_cull_mode(mut self, cull_mode: CullMode) -> Self {
        self.cull_mode = cull_mode;
        self
    }
}

/// Everything a draw needs besides resource bindings.
#[derive(Debug, Clone)]
pub struct PipelineState {
    /// Program run by the draw.
    pub program: SharedRef<Program>,
    /// Vertex input layout.
    pub vertex_declaration: SharedRef<VertexDeclaration>,
    /// Fixed-function state.
    pub raster: RasterState,
}

impl PipelineState {
    /// Pipeline with opaque raster state.
    pub fn new(
        program: SharedRef<Program>,
        vertex_declaration: SharedRef<VertexDeclaration>,
    ) -> Self {
        Self {
            program,
            vertex_declaration,
            raster: RasterState::default(),
        }
    }

    /// Set the raster state.
    pub fn with_raster(mut self, raster: RasterState) -> Self {
        self.raster = raster;
        self
    }
}
