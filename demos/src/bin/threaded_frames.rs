//! # Threaded Frames
//!
//! Headless demo of the multi-producer command flow. Producer threads record
//! and commit their own command lists each frame while the main thread, which
//! owns the driver context, drains the queue.
//!
//! ```bash
//! cargo run -p ember-demos --bin threaded_frames -- --producers 8 --backend vulkan
//! ```

use std::sync::Arc;
use std::thread;
use std::time::Instant;

use clap::Parser;
use ember_core::window::{HeadlessWindow, Window};
use ember_core::{frame_mark, profile_scope, set_thread_name};
use ember_demos::args::DemoArgs;
use ember_demos::scene::DemoScene;
use ember_graphics::{BackendKind, Device, DeviceConfig, GraphicsError, NativeKind, NullDriver};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    ember_graphics::init();
    set_thread_name!("driver");

    let args = DemoArgs::parse();
    if let Err(err) = run(&args) {
        log::error!("demo failed: {err}");
        std::process::exit(1);
    }
}

fn run(args: &DemoArgs) -> Result<(), GraphicsError> {
    let kind = BackendKind::from(args.backend);
    let driver = NullDriver::new(kind);
    let driver_log = driver.log();
    let device = Device::new(
        Box::new(driver),
        DeviceConfig::default().with_label("threaded_frames").with_backend(kind),
    )?;

    let scene = DemoScene::new(Arc::clone(&device), args.producers.max(1), args.target_size)?;
    let window = HeadlessWindow::new(1280, 720);
    let presented = Arc::new(window);
    let window: Arc<dyn Window> = presented.clone();
    device.execute_until_idle();

    let start = Instant::now();
    for frame in 0..args.frames {
        let committed = thread::scope(|s| {
            let handles: Vec<_> = (0..scene.producers())
                .map(|producer| {
                    let scene = &scene;
                    s.spawn(move || scene.record_offscreen(producer, frame, args.draws))
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| match handle.join() {
                    Ok(result) => result,
                    Err(panic) => std::panic::resume_unwind(panic),
                })
                .sum::<Result<usize, GraphicsError>>()
        })?;
        let committed = committed + scene.record_present(&window);

        let executed = {
            profile_scope!("drain_frame");
            device.execute_until_idle()
        };
        log::debug!("frame {frame}: committed {committed}, executed {executed}");
        frame_mark!();
    }
    let elapsed = start.elapsed();

    let stats = device.context_stats();
    log::info!(
        "{} frames in {:.2?} ({} producers): {} passes, {} draws, {} VAOs built, {} reused",
        args.frames,
        elapsed,
        scene.producers(),
        stats.passes,
        stats.draws,
        stats.vertex_array_builds,
        stats.vertex_array_hits
    );
    log::info!(
        "presented {} frames; {} resources live, {} native buffers",
        presented.presented_frames(),
        device.live_resource_count(),
        driver_log.live_count(NativeKind::Buffer)
    );

    drop(scene);
    drop(device);
    log::info!("native objects left after shutdown: {}", driver_log.total_live());
    Ok(())
}
