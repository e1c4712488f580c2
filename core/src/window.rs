//! Minimal window surface used as an on-screen render target.
//!
//! Platform window glue lives outside the engine core; the renderer only
//! needs to make the window's context current, know its size and present.

/// An on-screen surface the driver thread can render into.
pub trait Window: Send + Sync {
    /// Bind this window's native context to the calling thread.
    fn make_context_current(&self);

    /// Drawable size in pixels.
    fn size(&self) -> (u32, u32);

    /// Present the back buffer.
    fn swap_buffers(&self);
}

/// A window with no native surface, for tests and offscreen tools.
#[derive(Debug)]
pub struct HeadlessWindow {
    width: u32,
    height: u32,
    presented: std::sync::atomic::AtomicU64,
}

impl HeadlessWindow {
    /// Create a headless window of the given size.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            presented: std::sync::atomic::AtomicU64::new(0),
        }
    }

    /// Number of times [`Window::swap_buffers`] was called.
    pub fn presented_frames(&self) -> u64 {
        self.presented.load(std::sync::atomic::Ordering::Acquire)
    }
}

impl Window for HeadlessWindow {
    fn make_context_current(&self) {}

    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn swap_buffers(&self) {
        self.presented
            .fetch_add(1, std::sync::atomic::Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headless_window_counts_presents() {
        let window = HeadlessWindow::new(640, 480);
        assert_eq!(window.size(), (640, 480));
        window.swap_buffers();
        window.swap_buffers();
        assert_eq!(window.presented_frames(), 2);
    }
}
