//! Cross-thread FIFO of recorded commands.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use ember_core::profile_scope;
use parking_lot::Mutex;

use crate::context::Context;

/// One recorded GPU operation, run once on the driver thread.
pub type Command = Box<dyn FnOnce(&mut Context) + Send + 'static>;

/// Unbounded queue between recording threads and the driver thread.
///
/// Any thread may [`enqueue`](Self::enqueue); only the driver thread drains.
/// A batch is spliced in under a single short critical section, so batches
/// committed concurrently never interleave and the drain order is the order
/// in which batches reached the lock.
///
/// Commands are never dropped while the lock is held: dropping a command can
/// release the last reference to a resource, and that release enqueues a
/// command of its own.
pub struct CommandQueue {
    pending: Mutex<VecDeque<Command>>,
    enqueued: AtomicU64,
    executed: AtomicU64,
}

impl CommandQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(VecDeque::new()),
            enqueued: AtomicU64::new(0),
            executed: AtomicU64::new(0),
        }
    }

    /// Append a batch atomically, preserving its internal order.
    pub fn enqueue(&self, batch: Vec<Command>) {
        if batch.is_empty() {
            return;
        }
        let count = batch.len() as u64;
        self.pending.lock().extend(batch);
        self.enqueued.fetch_add(count, Ordering::Relaxed);
    }

    /// Append a single command.
    pub fn enqueue_one(&self, command: Command) {
        self.pending.lock().push_back(command);
        self.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    /// Execute queued commands against `context` in FIFO order.
    ///
    /// Takes everything queued at the time of the call (or the first `limit`
    /// commands) and runs it outside the lock. Commands enqueued while this
    /// runs, including ones enqueued by the commands themselves, wait for the
    /// next drain. Returns the number of commands executed.
    pub fn drain_and_execute(&self, context: &mut Context, limit: Option<usize>) -> usize {
        profile_scope!("CommandQueue::drain_and_execute");

        let batch: VecDeque<Command> = {
            let mut pending = self.pending.lock();
            match limit {
                Some(limit) if limit < pending.len() => pending.drain(..limit).collect(),
                _ => std::mem::take(&mut *pending),
            }
        };

        let count = batch.len();
        if count == 0 {
            return 0;
        }
        log::trace!("draining {count} commands");
        for command in batch {
            command(context);
        }
        self.executed.fetch_add(count as u64, Ordering::Relaxed);
        count
    }

    /// Remove every pending command without running it.
    ///
    /// Used when the device is torn down off the driver thread.
    pub(crate) fn discard(&self) -> usize {
        let discarded = std::mem::take(&mut *self.pending.lock());
        let count = discarded.len();
        drop(discarded);
        count
    }

    /// Number of commands waiting to be executed.
    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    /// Returns true if no commands are waiting.
    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }

    /// Total number of commands ever enqueued.
    pub fn total_enqueued(&self) -> u64 {
        self.enqueued.load(Ordering::Relaxed)
    }

    /// Total number of commands ever executed.
    pub fn total_executed(&self) -> u64 {
        self.executed.load(Ordering::Relaxed)
    }
}

impl Default for CommandQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CommandQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandQueue")
            .field("pending", &self.len())
            .field("enqueued", &self.total_enqueued())
            .field("executed", &self.total_executed())
            .finish()
    }
}

static_assertions::assert_impl_all!(CommandQueue: Send, Sync);

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::backend::{BackendKind, NullDriver};
    use crate::context::ContextOp;
    use crate::device::{Device, DeviceConfig};

    fn tag(name: &'static str) -> Command {
        Box::new(move |ctx: &mut Context| ctx.custom(name))
    }

    fn device() -> Arc<Device> {
        let driver = NullDriver::new(BackendKind::OpenGl);
        Device::new(Box::new(driver), DeviceConfig::default().with_trace_ops(true)).unwrap()
    }

    fn custom_ops(device: &Device) -> Vec<&'static str> {
        device
            .take_op_trace()
            .into_iter()
            .filter_map(|op| match op {
                ContextOp::Custom(name) => Some(name),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_empty_drain_is_noop() {
        let device = device();
        assert_eq!(device.execute_commands(), 0);
        assert_eq!(device.execute_commands(), 0);
        assert!(device.queue().is_empty());
    }

    #[test]
    fn test_batches_drain_in_fifo_order() {
        let device = device();
        let queue = device.queue();
        queue.enqueue(vec![tag("a1"), tag("a2")]);
        queue.enqueue_one(tag("b1"));
        queue.enqueue(vec![tag("c1"), tag("c2"), tag("c3")]);
        assert_eq!(queue.len(), 6);

        assert_eq!(device.execute_commands(), 6);
        assert_eq!(custom_ops(&device), ["a1", "a2", "b1", "c1", "c2", "c3"]);
        assert_eq!(queue.total_enqueued(), 6);
        assert_eq!(queue.total_executed(), 6);
    }

    #[test]
    fn test_commands_enqueued_during_drain_wait_for_next_drain() {
        let device = device();
        let queue = Arc::clone(device.queue());
        let inner = Arc::clone(&queue);
        queue.enqueue_one(Box::new(move |ctx: &mut Context| {
            ctx.custom("outer");
            inner.enqueue_one(tag("inner"));
        }));

        assert_eq!(device.execute_commands(), 1);
        assert_eq!(custom_ops(&device), ["outer"]);
        assert_eq!(queue.len(), 1);

        assert_eq!(device.execute_commands(), 1);
        assert_eq!(custom_ops(&device), ["inner"]);
    }

    #[test]
    fn test_drain_limit_keeps_remainder_in_order() {
        let driver = NullDriver::new(BackendKind::Vulkan);
        let config = DeviceConfig::default()
            .with_trace_ops(true)
            .with_max_commands_per_drain(2);
        let device = Device::new(Box::new(driver), config).unwrap();
        device
            .queue()
            .enqueue(vec![tag("1"), tag("2"), tag("3"), tag("4"), tag("5")]);

        assert_eq!(device.execute_commands(), 2);
        assert_eq!(device.execute_commands(), 2);
        assert_eq!(device.execute_commands(), 1);
        assert_eq!(custom_ops(&device), ["1", "2", "3", "4", "5"]);
    }

    #[test]
    fn test_concurrent_batches_never_interleave() {
        const PRODUCERS: usize = 4;
        const BATCHES: usize = 50;
        const BATCH_LEN: usize = 8;

        let device = device();
        let seen = Arc::new(Mutex::new(Vec::new()));

        std::thread::scope(|scope| {
            for producer in 0..PRODUCERS {
                let queue = Arc::clone(device.queue());
                let seen = Arc::clone(&seen);
                scope.spawn(move || {
                    for batch in 0..BATCHES {
                        let commands = (0..BATCH_LEN)
                            .map(|i| {
                                let seen = Arc::clone(&seen);
                                Box::new(move |_: &mut Context| {
                                    seen.lock().push((producer, batch, i));
                                }) as Command
                            })
                            .collect();
                        queue.enqueue(commands);
                    }
                });
            }
        });

        device.execute_until_idle();
        let seen = seen.lock();
        assert_eq!(seen.len(), PRODUCERS * BATCHES * BATCH_LEN);
        for chunk in seen.chunks(BATCH_LEN) {
            let (producer, batch, _) = chunk[0];
            let expected: Vec<_> = (0..BATCH_LEN).map(|i| (producer, batch, i)).collect();
            assert_eq!(chunk, expected.as_slice());
        }
    }
}
