//! Intrusive shared/weak reference counting for GPU objects.
//!
//! Every object lives in a control block carrying two atomic counters:
//!
//! | Counter | Starts at | Reaching zero means                                     |
//! |---------|-----------|---------------------------------------------------------|
//! | shared  | 1         | [`DestroyObject::destroy_object`] runs, value is dropped |
//! | weak    | 1         | the control block allocation is freed                   |
//!
//! The initial weak reference belongs to the live object itself and is
//! released as part of the shared 1 → 0 transition, so the block outlives
//! any [`WeakPtr`] that might still try to upgrade.
//!
//! Unlike [`std::sync::Arc`], the object gets an explicit teardown hook. GPU
//! resources use it to hand their native handles to the driver thread
//! instead of destroying them on whichever thread dropped the last handle.
//!
//! ```ignore
//! let buffer: SharedRef<Buffer> = device.create_vertex_buffer(&desc)?;
//! let weak = buffer.downgrade();
//! drop(buffer);                       // destroy_object() queues the release
//! assert!(weak.upgrade().is_null());  // never resurrects
//! ```

use std::cell::UnsafeCell;
use std::fmt;
use std::marker::PhantomData;
use std::mem::ManuallyDrop;
use std::ops::Deref;
use std::ptr::NonNull;
use std::sync::atomic::{self, AtomicUsize, Ordering};

/// Counts above this abort the process instead of wrapping.
const MAX_REFCOUNT: usize = isize::MAX as usize;

/// Teardown hook invoked exactly once, when the last shared reference goes away.
pub trait DestroyObject {
    /// Release backend state owned by the object.
    ///
    /// Runs on whichever thread dropped the last shared reference; the value
    /// itself is dropped right after this returns.
    fn destroy_object(&mut self) {}
}

struct ControlBlock<T> {
    shared: AtomicUsize,
    weak: AtomicUsize,
    value: UnsafeCell<ManuallyDrop<T>>,
}

impl<T: DestroyObject> ControlBlock<T> {
    fn allocate(value: T) -> NonNull<Self> {
        let block = Box::new(Self {
            shared: AtomicUsize::new(1),
            weak: AtomicUsize::new(1),
            value: UnsafeCell::new(ManuallyDrop::new(value)),
        });
        NonNull::from(Box::leak(block))
    }

    fn add_shared_ref(&self) {
        let previous = self.shared.fetch_add(1, Ordering::Relaxed);
        if previous > MAX_REFCOUNT {
            std::process::abort();
        }
    }

    fn add_weak_ref(&self) {
        let previous = self.weak.fetch_add(1, Ordering::Relaxed);
        if previous > MAX_REFCOUNT {
            std::process::abort();
        }
    }

    /// Increment the shared count only while it is non-zero.
    fn try_add_shared_ref(&self) -> bool {
        let mut current = self.shared.load(Ordering::Relaxed);
        loop {
            if current == 0 {
                return false;
            }
            if current > MAX_REFCOUNT {
                std::process::abort();
            }
            match self.shared.compare_exchange_weak(
                current,
                current + 1,
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    /// # Safety
    ///
    /// `this` must point to a live block and the caller must own one shared
    /// reference, which is consumed.
    unsafe fn release_shared_ref(this: NonNull<Self>) {
        let shared = unsafe { &this.as_ref().shared };
        if shared.fetch_sub(1, Ordering::Release) != 1 {
            return;
        }
        atomic::fence(Ordering::Acquire);

        // SAFETY: the shared count is zero and `try_add_shared_ref` refuses to
        // leave zero, so no other thread can reach the value any more.
        unsafe {
            let value = &mut *this.as_ref().value.get();
            value.destroy_object();
            ManuallyDrop::drop(value);
            Self::release_weak_ref(this);
        }
    }

    /// # Safety
    ///
    /// `this` must point to a live block and the caller must own one weak
    /// reference, which is consumed.
    unsafe fn release_weak_ref(this: NonNull<Self>) {
        let weak = unsafe { &this.as_ref().weak };
        if weak.fetch_sub(1, Ordering::Release) != 1 {
            return;
        }
        atomic::fence(Ordering::Acquire);

        // SAFETY: last reference of any kind; the value was already dropped
        // and `ManuallyDrop` keeps the box from dropping it again.
        drop(unsafe { Box::from_raw(this.as_ptr()) });
    }
}

/// Non-null owning handle to a reference-counted object.
pub struct SharedRef<T: DestroyObject> {
    block: NonNull<ControlBlock<T>>,
    _owns: PhantomData<ControlBlock<T>>,
}

// SAFETY: the counters are atomic and the value is only handed out as `&T`,
// so sharing needs `T: Sync` and moving the last drop across threads needs `T: Send`.
unsafe impl<T: DestroyObject + Send + Sync> Send for SharedRef<T> {}
unsafe impl<T: DestroyObject + Send + Sync> Sync for SharedRef<T> {}

impl<T: DestroyObject> SharedRef<T> {
    /// Wrap a value in a fresh control block (shared = 1, weak = 1).
    pub fn new(value: T) -> Self {
        Self {
            block: ControlBlock::allocate(value),
            _owns: PhantomData,
        }
    }

    fn block(&self) -> &ControlBlock<T> {
        // SAFETY: a SharedRef keeps the block allocated.
        unsafe { self.block.as_ref() }
    }

    /// Create a weak handle to the same object.
    pub fn downgrade(&self) -> WeakPtr<T> {
        self.block().add_weak_ref();
        WeakPtr {
            block: Some(self.block),
            _owns: PhantomData,
        }
    }

    /// Current shared reference count.
    pub fn shared_count(&self) -> usize {
        self.block().shared.load(Ordering::Acquire)
    }

    /// Current weak reference count, including the one held by the live object.
    pub fn weak_count(&self) -> usize {
        self.block().weak.load(Ordering::Acquire)
    }

    /// Returns true if both handles point at the same object.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        a.block == b.block
    }
}

impl<T: DestroyObject> Clone for SharedRef<T> {
    fn clone(&self) -> Self {
        self.block().add_shared_ref();
        Self {
            block: self.block,
            _owns: PhantomData,
        }
    }
}

impl<T: DestroyObject> Drop for SharedRef<T> {
    fn drop(&mut self) {
        // SAFETY: this handle owns exactly one shared reference.
        unsafe { ControlBlock::release_shared_ref(self.block) };
    }
}

impl<T: DestroyObject> Deref for SharedRef<T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: shared count > 0 while this handle exists, so the value is alive.
        unsafe { &**self.block().value.get() }
    }
}

impl<T: DestroyObject + fmt::Debug> fmt::Debug for SharedRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

/// Nullable owning handle.
///
/// Dereferencing a null pointer is a programming error and panics.
pub struct SharedPtr<T: DestroyObject> {
    inner: Option<SharedRef<T>>,
}

impl<T: DestroyObject> SharedPtr<T> {
    /// A null pointer.
    pub fn null() -> Self {
        Self { inner: None }
    }

    /// Wrap a value in a fresh control block.
    pub fn new(value: T) -> Self {
        Self {
            inner: Some(SharedRef::new(value)),
        }
    }

    /// Returns true if the pointer is null.
    pub fn is_null(&self) -> bool {
        self.inner.is_none()
    }

    /// Borrow the object, if any.
    pub fn get(&self) -> Option<&T> {
        self.inner.as_deref()
    }

    /// Borrow the non-null handle, if any.
    pub fn as_shared_ref(&self) -> Option<&SharedRef<T>> {
        self.inner.as_ref()
    }

    /// Convert into a non-null handle, if any.
    pub fn into_shared_ref(self) -> Option<SharedRef<T>> {
        self.inner
    }

    /// Create a weak handle; null pointers produce a null weak handle.
    pub fn downgrade(&self) -> WeakPtr<T> {
        match &self.inner {
            Some(shared) => shared.downgrade(),
            None => WeakPtr::new(),
        }
    }

    /// Drop the held reference, leaving the pointer null.
    pub fn reset(&mut self) {
        self.inner = None;
    }
}

impl<T: DestroyObject> Default for SharedPtr<T> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T: DestroyObject> Clone for SharedPtr<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: DestroyObject> From<SharedRef<T>> for SharedPtr<T> {
    fn from(shared: SharedRef<T>) -> Self {
        Self {
            inner: Some(shared),
        }
    }
}

impl<T: DestroyObject> Deref for SharedPtr<T> {
    type Target = T;

    fn deref(&self) -> &T {
        match &self.inner {
            Some(shared) => shared,
            None => panic!("dereferenced a null SharedPtr"),
        }
    }
}

impl<T: DestroyObject + fmt::Debug> fmt::Debug for SharedPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            Some(shared) => f.debug_tuple("SharedPtr").field(&**shared).finish(),
            None => f.write_str("SharedPtr(null)"),
        }
    }
}

/// Weak handle that must be upgraded before use.
pub struct WeakPtr<T: DestroyObject> {
    block: Option<NonNull<ControlBlock<T>>>,
    _owns: PhantomData<ControlBlock<T>>,
}

// SAFETY: same reasoning as SharedRef; a WeakPtr can be upgraded into one.
unsafe impl<T: DestroyObject + Send + Sync> Send for WeakPtr<T> {}
unsafe impl<T: DestroyObject + Send + Sync> Sync for WeakPtr<T> {}

impl<T: DestroyObject> WeakPtr<T> {
    /// A weak handle pointing at nothing.
    pub fn new() -> Self {
        Self {
            block: None,
            _owns: PhantomData,
        }
    }

    /// Try to obtain a shared reference.
    ///
    /// Yields a null pointer once the object has been destroyed.
    pub fn upgrade(&self) -> SharedPtr<T> {
        let Some(block) = self.block else {
            return SharedPtr::null();
        };
        // SAFETY: the weak reference keeps the block allocated.
        if unsafe { block.as_ref() }.try_add_shared_ref() {
            SharedPtr::from(SharedRef {
                block,
                _owns: PhantomData,
            })
        } else {
            SharedPtr::null()
        }
    }

    /// Alias of [`upgrade`](Self::upgrade).
    pub fn to_shared_ptr(&self) -> SharedPtr<T> {
        self.upgrade()
    }

    /// Returns true if the object is gone (or the handle was always null).
    pub fn is_expired(&self) -> bool {
        match self.block {
            // SAFETY: the weak reference keeps the block allocated.
            Some(block) => unsafe { block.as_ref() }.shared.load(Ordering::Acquire) == 0,
            None => true,
        }
    }
}

impl<T: DestroyObject> Default for WeakPtr<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: DestroyObject> Clone for WeakPtr<T> {
    fn clone(&self) -> Self {
        if let Some(block) = self.block {
            // SAFETY: the weak reference keeps the block allocated.
            unsafe { block.as_ref() }.add_weak_ref();
        }
        Self {
            block: self.block,
            _owns: PhantomData,
        }
    }
}

impl<T: DestroyObject> Drop for WeakPtr<T> {
    fn drop(&mut self) {
        if let Some(block) = self.block {
            // SAFETY: this handle owns exactly one weak reference.
            unsafe { ControlBlock::release_weak_ref(block) };
        }
    }
}

impl<T: DestroyObject> fmt::Debug for WeakPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakPtr")
            .field("expired", &self.is_expired())
            .finish()
    }
}
