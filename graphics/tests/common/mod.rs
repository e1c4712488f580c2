//! Shared setup for the command flow integration tests.
//!
//! Every test runs against a [`NullDriver`] configured with the conventions
//! of the backend under test, so the whole record/commit/drain path is
//! exercised without a GPU.

use std::sync::Arc;

use ember_core::window::{HeadlessWindow, Window};
use ember_graphics::types::{
    PipelineState, VertexAttribute, VertexBufferLayout, VertexDeclarationDescriptor, VertexFormat,
};
use ember_graphics::{
    BackendKind, Buffer, BufferDescriptor, BufferUsage, Device, DeviceConfig, DriverLog,
    NullDriver, ProgramDescriptor, SharedRef,
};

/// Size of one test vertex: position and colour, three floats each.
pub const VERTEX_SIZE: u64 = 24;

/// A trivially valid shader source.
pub const SHADER_SOURCE: &str = "void main() {}";

/// Device plus the resources needed to issue a draw.
pub struct TestContext {
    pub window: Arc<dyn Window>,
    pub pipeline: PipelineState,
    pub vertices: SharedRef<Buffer>,
    pub log: DriverLog,
    pub device: Arc<Device>,
}

impl TestContext {
    /// Create a traced device and a four-vertex triangle strip setup.
    pub fn new(kind: BackendKind) -> Self {
        Self::with_config(kind, DeviceConfig::default())
    }

    pub fn with_config(kind: BackendKind, config: DeviceConfig) -> Self {
        let _ = env_logger::builder().is_test(true).try_init();

        let driver = NullDriver::new(kind);
        let log = driver.log();
        let device = Device::new(Box::new(driver), config.with_backend(kind).with_trace_ops(true))
            .expect("null device");

        let declaration = device
            .create_vertex_declaration(
                &VertexDeclarationDescriptor::new()
                    .with_label("position_color")
                    .with_buffer(VertexBufferLayout::new(VERTEX_SIZE as u32))
                    .with_attribute(VertexAttribute::new(0, 0, 0, VertexFormat::Float32x3))
                    .with_attribute(VertexAttribute::new(1, 0, 12, VertexFormat::Float32x3)),
            )
            .expect("vertex declaration");
        let program = device
            .create_program(
                &ProgramDescriptor::new(SHADER_SOURCE, SHADER_SOURCE).with_label("flat"),
            )
            .expect("program");
        let vertices = device
            .create_vertex_buffer(
                &BufferDescriptor::new(4 * VERTEX_SIZE, BufferUsage::Static).with_label("quad"),
            )
            .expect("vertex buffer");

        device.take_op_trace();
        log.clear_calls();

        Self {
            window: Arc::new(HeadlessWindow::new(640, 480)),
            pipeline: PipelineState::new(program, declaration),
            vertices,
            log,
            device,
        }
    }
}

/// Four vertices of a unit quad, position then colour.
pub fn quad_vertices() -> [[f32; 6]; 4] {
    [
        [-1.0, -1.0, 0.0, 1.0, 0.0, 0.0],
        [1.0, -1.0, 0.0, 0.0, 1.0, 0.0],
        [-1.0, 1.0, 0.0, 0.0, 0.0, 1.0],
        [1.0, 1.0, 0.0, 1.0, 1.0, 1.0],
    ]
}
