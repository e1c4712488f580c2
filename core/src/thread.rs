//! Driver-thread identity.
//!
//! Native graphics contexts are bound to exactly one thread. [`DriverThread`]
//! remembers which thread that is so resource factories can decide between
//! initializing an object in place and deferring the work to the driver.

use std::thread::{self, ThreadId};

use parking_lot::RwLock;

/// Identity of the thread that owns the native graphics context.
#[derive(Debug)]
pub struct DriverThread {
    id: RwLock<ThreadId>,
}

impl DriverThread {
    /// Bind to the calling thread.
    pub fn current() -> Self {
        Self {
            id: RwLock::new(thread::current().id()),
        }
    }

    /// Returns true when called from the driver thread.
    pub fn is_current(&self) -> bool {
        *self.id.read() == thread::current().id()
    }

    /// The bound thread id.
    pub fn id(&self) -> ThreadId {
        *self.id.read()
    }

    /// Re-bind to the calling thread, returning the previous id.
    ///
    /// Used when a dedicated render thread takes over the context after
    /// start-up on the main thread.
    pub fn rebind_to_current(&self) -> ThreadId {
        let mut id = self.id.write();
        std::mem::replace(&mut *id, thread::current().id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_thread_is_driver() {
        let driver = DriverThread::current();
        assert!(driver.is_current());
    }

    #[test]
    fn test_other_thread_is_not_driver() {
        let driver = std::sync::Arc::new(DriverThread::current());
        let remote = std::sync::Arc::clone(&driver);
        let on_other = thread::spawn(move || remote.is_current()).join().unwrap();
        assert!(!on_other);
    }

    #[test]
    fn test_rebind() {
        let driver = std::sync::Arc::new(DriverThread::current());
        let main_id = driver.id();
        let remote = std::sync::Arc::clone(&driver);
        let previous = thread::spawn(move || {
            let previous = remote.rebind_to_current();
            assert!(remote.is_current());
            previous
        })
        .join()
        .unwrap();
        assert_eq!(previous, main_id);
        assert!(!driver.is_current());
    }
}
