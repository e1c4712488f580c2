//! Reference-counted, immutable byte blobs.
//!
//! [`Memory`] is the hand-off type between code that produces bytes
//! (image decoders, mesh importers, shader loaders) and GPU upload commands.
//! Cloning is cheap and shares the allocation, so a recorded command can
//! capture its operand by value and keep it alive until the command runs on
//! the driver thread.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// Read-only shared bytes.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Memory {
    bytes: Arc<[u8]>,
}

impl Memory {
    /// Copy a slice into a new blob.
    pub fn from_slice(data: &[u8]) -> Self {
        Self {
            bytes: Arc::from(data),
        }
    }

    /// Take ownership of a vector without copying its contents twice.
    pub fn from_vec(data: Vec<u8>) -> Self {
        Self {
            bytes: Arc::from(data.into_boxed_slice()),
        }
    }

    /// Copy plain-old-data values (vertices, indices, uniforms) into a blob.
    pub fn from_pod<T: bytemuck::Pod>(values: &[T]) -> Self {
        Self::from_slice(bytemuck::cast_slice(values))
    }

    /// An empty blob.
    pub fn empty() -> Self {
        Self::from_slice(&[])
    }

    /// The stored bytes.
    pub fn data(&self) -> &[u8] {
        &self.bytes
    }

    /// Size in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the blob holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Number of live clones sharing this allocation.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.bytes)
    }
}

impl Deref for Memory {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.bytes
    }
}

impl AsRef<[u8]> for Memory {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

impl From<Vec<u8>> for Memory {
    fn from(data: Vec<u8>) -> Self {
        Self::from_vec(data)
    }
}

impl From<&[u8]> for Memory {
    fn from(data: &[u8]) -> Self {
        Self::from_slice(data)
    }
}

impl fmt::Debug for Memory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Memory")
            .field("len", &self.bytes.len())
            .finish()
    }
}
