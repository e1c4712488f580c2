//! Command flow integration tests.
//!
//! These tests drive the full path a frame takes: producer threads create
//! resources and record into their own command lists, commits splice the
//! lists into the device queue, and the driver thread drains the queue
//! against the context.
//!
//! Tests are parameterized using `rstest` to run against both backend
//! conventions.
//!
//! ```bash
//! cargo test -p ember-graphics --test command_flow
//! ```

mod common;

use std::sync::{Arc, Barrier, mpsc};
use std::thread;

use ember_core::memory::Memory;
use ember_graphics::types::{BufferKind, DrawArgs};
use ember_graphics::{
    BackendKind, BufferDescriptor, BufferUsage, CmdList, ContextOp, DeviceConfig, DriverCall,
    GpuResource, IndexFormat, NativeKind, RenderPassDescriptor,
};
use parking_lot::Mutex;
use rstest::rstest;

use common::{TestContext, VERTEX_SIZE, quad_vertices};

// ============================================================================
// Ordering
// ============================================================================

/// Commands of one list execute in recording order.
#[rstest]
#[case::opengl(BackendKind::OpenGl)]
#[case::vulkan(BackendKind::Vulkan)]
fn test_list_preserves_recording_order(#[case] kind: BackendKind) {
    let ctx = TestContext::new(kind);
    let observed = Arc::new(Mutex::new(Vec::new()));

    let mut cmd = ctx.device.create_cmd_list();
    for i in 0..64 {
        let observed = Arc::clone(&observed);
        cmd.record(move |_| observed.lock().push(i));
    }
    assert_eq!(cmd.commit(), 64);
    assert_eq!(ctx.device.execute_commands(), 64);

    assert_eq!(*observed.lock(), (0..64).collect::<Vec<_>>());
}

/// A list committed before another (across a synchronization point) runs
/// entirely before it.
#[rstest]
#[case::opengl(BackendKind::OpenGl)]
#[case::vulkan(BackendKind::Vulkan)]
fn test_cross_list_fifo(#[case] kind: BackendKind) {
    let ctx = TestContext::new(kind);
    let observed = Arc::new(Mutex::new(Vec::new()));
    let (committed_tx, committed_rx) = mpsc::channel();

    thread::scope(|scope| {
        let device = &ctx.device;
        let first = Arc::clone(&observed);
        scope.spawn(move || {
            let mut cmd = device.create_cmd_list();
            for i in 0..16 {
                let first = Arc::clone(&first);
                cmd.record(move |_| first.lock().push(('a', i)));
            }
            cmd.commit();
            committed_tx.send(()).unwrap();
        });

        let second = Arc::clone(&observed);
        scope.spawn(move || {
            let mut cmd = device.create_cmd_list();
            for i in 0..16 {
                let second = Arc::clone(&second);
                cmd.record(move |_| second.lock().push(('b', i)));
            }
            committed_rx.recv().unwrap();
            cmd.commit();
        });
    });

    ctx.device.execute_commands();
    let observed = observed.lock();
    assert_eq!(observed.len(), 32);
    assert!(observed[..16].iter().all(|&(list, _)| list == 'a'));
    assert!(observed[16..].iter().all(|&(list, _)| list == 'b'));
}

/// Lists committed concurrently never interleave.
#[rstest]
#[case::opengl(BackendKind::OpenGl)]
#[case::vulkan(BackendKind::Vulkan)]
fn test_concurrent_lists_stay_contiguous(#[case] kind: BackendKind) {
    const PRODUCERS: usize = 8;
    const COMMANDS: usize = 32;

    let ctx = TestContext::new(kind);
    let observed = Arc::new(Mutex::new(Vec::new()));
    let barrier = Barrier::new(PRODUCERS);

    thread::scope(|scope| {
        for producer in 0..PRODUCERS {
            let observed = Arc::clone(&observed);
            let device = &ctx.device;
            let barrier = &barrier;
            scope.spawn(move || {
                let mut cmd = device.create_cmd_list();
                for _ in 0..COMMANDS {
                    let observed = Arc::clone(&observed);
                    cmd.record(move |_| observed.lock().push(producer));
                }
                barrier.wait();
                cmd.commit();
            });
        }
    });

    ctx.device.execute_commands();
    let observed = observed.lock();
    assert_eq!(observed.len(), PRODUCERS * COMMANDS);
    for run in observed.chunks(COMMANDS) {
        assert!(run.iter().all(|&producer| producer == run[0]));
    }
}

// ============================================================================
// Resource lifetime
// ============================================================================

/// A resource created off the driver thread and used right away is
/// initialized by the time the using command runs.
#[rstest]
#[case::opengl(BackendKind::OpenGl)]
#[case::vulkan(BackendKind::Vulkan)]
fn test_create_before_use(#[case] kind: BackendKind) {
    let ctx = TestContext::new(kind);
    let seen_initialized = Arc::new(Mutex::new(Vec::new()));

    thread::scope(|scope| {
        for _ in 0..4 {
            let device = &ctx.device;
            let seen_initialized = Arc::clone(&seen_initialized);
            scope.spawn(move || {
                let buffer = device
                    .create_vertex_buffer(&BufferDescriptor::new(
                        4 * VERTEX_SIZE,
                        BufferUsage::Dynamic,
                    ))
                    .unwrap();
                assert!(!buffer.is_initialized());

                let mut cmd = device.create_cmd_list();
                let data = Memory::from_pod(&quad_vertices());
                cmd.update_vertex_buffer(&buffer, 0, 4 * VERTEX_SIZE, data);
                let watched = buffer.clone();
                cmd.record(move |_| seen_initialized.lock().push(watched.is_initialized()));
                cmd.commit();
            });
        }
    });

    ctx.device.execute_until_idle();
    let seen = seen_initialized.lock();
    assert_eq!(seen.len(), 4);
    assert!(seen.iter().all(|&initialized| initialized));
    // Every buffer dropped on its producer thread was destroyed on the driver thread.
    assert_eq!(ctx.log.live_count(NativeKind::Buffer), 1);
    assert_eq!(ctx.device.live_resource_count(), 3);
}

/// Dropping the last reference anywhere queues the native destroy.
#[rstest]
#[case::opengl(BackendKind::OpenGl)]
#[case::vulkan(BackendKind::Vulkan)]
fn test_release_runs_on_driver_thread(#[case] kind: BackendKind) {
    let ctx = TestContext::new(kind);
    let index_buffer = ctx
        .device
        .create_index_buffer(&BufferDescriptor::new(12, BufferUsage::Static), IndexFormat::Uint16)
        .unwrap();
    let handle = index_buffer.native_handle().unwrap();

    let driver_thread = thread::current().id();
    let drained_on = Arc::new(Mutex::new(None));

    let mut cmd = ctx.device.create_cmd_list();
    cmd.begin_render_pass(RenderPassDescriptor::default(), Arc::clone(&ctx.window));
    cmd.bind_pipeline_state(&ctx.pipeline);
    cmd.bind_vertex_buffers(&[ctx.vertices.clone()]);
    cmd.bind_index_buffer(&index_buffer);
    cmd.draw_indexed(6, 0, 0, 1, 0);
    cmd.end_render_pass();
    let watched = Arc::clone(&drained_on);
    thread::spawn(move || {
        drop(index_buffer);
        cmd.commit();
    })
    .join()
    .unwrap();

    ctx.device.execute_commands();
    assert!(!ctx.log.calls().contains(&DriverCall::Destroy(NativeKind::Buffer, handle)));

    // The release was queued by the drain itself and runs on the next one.
    let mut marker = ctx.device.create_cmd_list();
    marker.record(move |_| *watched.lock() = Some(thread::current().id()));
    marker.commit();
    ctx.device.execute_until_idle();

    assert!(ctx.log.calls().contains(&DriverCall::Destroy(NativeKind::Buffer, handle)));
    assert_eq!(*drained_on.lock(), Some(driver_thread));
    assert_eq!(ctx.device.context_stats().draws, 1);
}

// ============================================================================
// Render pass state machine
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum Entry {
    Bare,
    InScene,
    AfterPass,
    Indexed,
}

/// Every sequence that reaches a draw without an open pass panics.
#[rstest]
#[case::bare(Entry::Bare)]
#[case::in_scene(Entry::InScene)]
#[case::after_pass(Entry::AfterPass)]
#[case::indexed(Entry::Indexed)]
#[should_panic(expected = "called outside a render pass")]
fn test_draw_outside_render_pass_panics(#[case] entry: Entry) {
    let ctx = TestContext::new(BackendKind::OpenGl);
    let mut cmd: CmdList = ctx.device.create_cmd_list();
    match entry {
        Entry::Bare => cmd.draw(3, 0, 1, 0),
        Entry::InScene => {
            cmd.begin_scene();
            cmd.draw(3, 0, 1, 0);
        }
        Entry::AfterPass => {
            cmd.begin_render_pass(RenderPassDescriptor::default(), Arc::clone(&ctx.window));
            cmd.end_render_pass();
            cmd.draw(3, 0, 1, 0);
        }
        Entry::Indexed => cmd.draw_indexed(3, 0, 0, 1, 0),
    }
    cmd.commit();
    ctx.device.execute_commands();
}

// ============================================================================
// End to end
// ============================================================================

/// A full frame executes as exactly its own six operations, untouched by an
/// unrelated list committed at the same time.
#[rstest]
#[case::opengl(BackendKind::OpenGl)]
#[case::vulkan(BackendKind::Vulkan)]
fn test_frame_executes_contiguously(#[case] kind: BackendKind) {
    let ctx = TestContext::new(kind);
    let barrier = Barrier::new(2);

    thread::scope(|scope| {
        scope.spawn(|| {
            let mut cmd = ctx.device.create_cmd_list();
            cmd.update_vertex_buffer(&ctx.vertices, 0, 96, Memory::from_pod(&quad_vertices()));
            cmd.begin_render_pass(RenderPassDescriptor::default(), Arc::clone(&ctx.window));
            cmd.bind_pipeline_state(&ctx.pipeline);
            cmd.bind_vertex_buffers(&[ctx.vertices.clone()]);
            cmd.draw(4, 0, 1, 0);
            cmd.end_render_pass();
            barrier.wait();
            assert_eq!(cmd.commit(), 6);
        });
        scope.spawn(|| {
            let mut cmd = ctx.device.create_cmd_list();
            for _ in 0..8 {
                cmd.record(|context| context.custom("unrelated"));
            }
            barrier.wait();
            cmd.commit();
        });
    });

    assert_eq!(ctx.device.execute_commands(), 14);
    let trace = ctx.device.take_op_trace();
    assert_eq!(trace.len(), 14);

    let expected = [
        ContextOp::UpdateBuffer(BufferKind::Vertex),
        ContextOp::BeginRenderPass,
        ContextOp::BindPipelineState,
        ContextOp::BindVertexBuffers(1),
        ContextOp::Draw(DrawArgs::new(4, 0, 1, 0)),
        ContextOp::EndRenderPass,
    ];
    let start = trace
        .iter()
        .position(|op| *op == expected[0])
        .expect("frame was executed");
    assert_eq!(&trace[start..start + expected.len()], &expected);
    assert_eq!(
        trace.iter().filter(|op| **op == ContextOp::Custom("unrelated")).count(),
        8
    );

    let contents = ctx.log.buffer_contents(ctx.vertices.native_handle().unwrap()).unwrap();
    assert_eq!(contents, bytemuck::cast_slice::<f32, u8>(quad_vertices().as_flattened()));
    assert_eq!(ctx.log.count(DriverCall::is_draw), 1);
}

/// The drain limit spreads a large backlog over several calls without
/// reordering it.
#[rstest]
#[case::opengl(BackendKind::OpenGl)]
#[case::vulkan(BackendKind::Vulkan)]
fn test_drain_limit(#[case] kind: BackendKind) {
    let config = DeviceConfig::default().with_max_commands_per_drain(10);
    let ctx = TestContext::with_config(kind, config);
    let mut cmd = ctx.device.create_cmd_list();
    cmd.begin_render_pass(RenderPassDescriptor::default(), Arc::clone(&ctx.window));
    cmd.bind_pipeline_state(&ctx.pipeline);
    cmd.bind_vertex_buffers(&[ctx.vertices.clone()]);
    for i in 0..20 {
        cmd.draw(4, 0, 1, i);
    }
    cmd.end_render_pass();
    cmd.commit();

    assert_eq!(ctx.device.execute_commands(), 10);
    assert_eq!(ctx.device.execute_commands(), 10);
    assert_eq!(ctx.device.execute_commands(), 4);
    assert_eq!(ctx.device.execute_commands(), 0);

    let draws: Vec<_> = ctx
        .device
        .take_op_trace()
        .into_iter()
        .filter_map(|op| match op {
            ContextOp::Draw(args) => Some(args.first_instance),
            _ => None,
        })
        .collect();
    assert_eq!(draws, (0..20).collect::<Vec<_>>());
}
