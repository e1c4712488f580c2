use std::sync::Arc;
use std::thread;

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use ember_core::memory::Memory;
use ember_core::window::{HeadlessWindow, Window};
use ember_graphics::types::{
    PipelineState, VertexAttribute, VertexBufferLayout, VertexDeclarationDescriptor, VertexFormat,
};
use ember_graphics::{
    BackendKind, Buffer, BufferDescriptor, BufferUsage, Device, DeviceConfig, NullDriver,
    ProgramDescriptor, RenderPassDescriptor, SharedRef,
};

struct Scene {
    window: Arc<dyn Window>,
    pipeline: PipelineState,
    vertices: SharedRef<Buffer>,
    device: Arc<Device>,
}

fn scene(kind: BackendKind) -> Scene {
    let device = Device::new(Box::new(NullDriver::new(kind)), DeviceConfig::default()).unwrap();
    let declaration = device
        .create_vertex_declaration(
            &VertexDeclarationDescriptor::new()
                .with_buffer(VertexBufferLayout::new(24))
                .with_attribute(VertexAttribute::new(0, 0, 0, VertexFormat::Float32x3))
                .with_attribute(VertexAttribute::new(1, 0, 12, VertexFormat::Float32x3)),
        )
        .unwrap();
    let program = device
        .create_program(&ProgramDescriptor::new("void main() {}", "void main() {}"))
        .unwrap();
    let vertices = device
        .create_vertex_buffer(&BufferDescriptor::new(96, BufferUsage::Dynamic))
        .unwrap();
    Scene {
        window: Arc::new(HeadlessWindow::new(1280, 720)),
        pipeline: PipelineState::new(program, declaration),
        vertices,
        device,
    }
}

fn record_frame(scene: &Scene, draws: u32) {
    let mut cmd = scene.device.create_cmd_list();
    cmd.update_vertex_buffer(&scene.vertices, 0, 96, Memory::from_slice(&[0u8; 96]));
    cmd.begin_render_pass(RenderPassDescriptor::default(), Arc::clone(&scene.window));
    cmd.bind_pipeline_state(&scene.pipeline);
    cmd.bind_vertex_buffers(&[scene.vertices.clone()]);
    for i in 0..draws {
        cmd.draw(4, 0, 1, i);
    }
    cmd.end_render_pass();
    cmd.swap_buffers(Arc::clone(&scene.window));
    cmd.commit();
}

// ---------------------------------------------------------------------------
// Reference counting
// ---------------------------------------------------------------------------

fn bench_shared_ref_clone_drop(c: &mut Criterion) {
    let scene = scene(BackendKind::OpenGl);
    c.bench_function("shared_ref_clone_drop", |b| {
        b.iter(|| black_box(scene.vertices.clone()));
    });
}

fn bench_weak_upgrade(c: &mut Criterion) {
    let scene = scene(BackendKind::OpenGl);
    let weak = scene.vertices.downgrade();
    c.bench_function("weak_ptr_upgrade", |b| {
        b.iter(|| black_box(weak.upgrade()));
    });
}

// ---------------------------------------------------------------------------
// Record, commit and drain
// ---------------------------------------------------------------------------

fn bench_frame_opengl(c: &mut Criterion) {
    let scene = scene(BackendKind::OpenGl);
    c.bench_function("frame_100_draws_opengl", |b| {
        b.iter(|| {
            record_frame(&scene, 100);
            black_box(scene.device.execute_commands());
        });
    });
}

fn bench_frame_vulkan(c: &mut Criterion) {
    let scene = scene(BackendKind::Vulkan);
    c.bench_function("frame_100_draws_vulkan", |b| {
        b.iter(|| {
            record_frame(&scene, 100);
            black_box(scene.device.execute_commands());
        });
    });
}

fn bench_concurrent_commit(c: &mut Criterion) {
    let scene = scene(BackendKind::OpenGl);
    c.bench_function("commit_4_producers_25_draws", |b| {
        b.iter(|| {
            thread::scope(|s| {
                for _ in 0..4 {
                    s.spawn(|| record_frame(&scene, 25));
                }
            });
            black_box(scene.device.execute_commands());
        });
    });
}

criterion_group!(
    benches,
    bench_shared_ref_clone_drop,
    bench_weak_upgrade,
    bench_frame_opengl,
    bench_frame_vulkan,
    bench_concurrent_commit,
);
criterion_main!(benches);
