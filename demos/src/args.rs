//! Command line arguments of the demo binaries.

use clap::Parser;
use ember_graphics::BackendKind;

/// Driver conventions selectable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum CliBackend {
    /// OpenGL conventions: identity clip matrix, cached vertex arrays.
    #[default]
    #[value(name = "gl")]
    OpenGl,
    /// Vulkan conventions: flipped Y, `[0, 1]` depth, per-draw vertex binds.
    Vulkan,
}

impl From<CliBackend> for BackendKind {
    fn from(cli: CliBackend) -> Self {
        match cli {
            CliBackend::OpenGl => BackendKind::OpenGl,
            CliBackend::Vulkan => BackendKind::Vulkan,
        }
    }
}

/// Arguments of the threaded frames demo.
#[derive(Parser, Debug)]
#[command(
    name = "threaded_frames",
    about = "Record frames on several producer threads and drain them on the driver thread",
    long_about = "Runs a headless device over the null driver. Every frame each producer \
        thread creates a transient uniform buffer, renders into its own offscreen \
        framebuffer and commits its command list; the main thread then presents the \
        first producer's target to a headless window and drains the queue.\n\n\
        EXAMPLES:\n\
          # Eight producers, Vulkan conventions\n\
          ./threaded_frames --producers 8 --backend vulkan\n\
        \n\
          # Short run with detailed logs\n\
          RUST_LOG=ember_graphics=trace ./threaded_frames --frames 2",
    version
)]
pub struct DemoArgs {
    /// Driver conventions to follow.
    #[arg(long, default_value = "gl", value_enum)]
    pub backend: CliBackend,

    /// Number of producer threads recording each frame.
    #[arg(long, default_value = "4")]
    pub producers: usize,

    /// Number of frames to render.
    #[arg(long, default_value = "60")]
    pub frames: u64,

    /// Draws recorded by each producer per frame.
    #[arg(long, default_value = "16")]
    pub draws: u32,

    /// Size of each offscreen target in pixels.
    #[arg(long, default_value = "256")]
    pub target_size: u32,
}
