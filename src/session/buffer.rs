//! Reusable scratch buffers for outbound encoding.
//!
//! The send pipeline leases one buffer per outbound item and returns it on
//! every exit path through [`Drop`].

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use parking_lot::Mutex;

// ============================================================================
// Constants
// ============================================================================

/// Maximum number of idle buffers kept in the free list.
pub const MAX_POOLED_BUFFERS: usize = 16;

/// Buffers grown beyond this capacity are released instead of pooled.
pub const MAX_RETAINED_CAPACITY: usize = 64 * 1024;

// ============================================================================
// BufferPool
// ============================================================================

/// Free-list pool of byte buffers.
///
/// Cloning shares the same free list.
#[derive(Clone, Default)]
pub struct BufferPool {
    free: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl BufferPool {
    /// Creates an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Leases an empty buffer, reusing a pooled one when available.
    #[must_use]
    pub fn take(&self) -> PooledBuffer {
        let buffer = self.free.lock().pop().unwrap_or_default();
        PooledBuffer {
            buffer,
            pool: Arc::clone(&self.free),
        }
    }

    /// Returns the number of idle buffers.
    #[must_use]
    pub fn available(&self) -> usize {
        self.free.lock().len()
    }
}

impl fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferPool")
            .field("available", &self.available())
            .finish()
    }
}

// ============================================================================
// PooledBuffer
// ============================================================================

/// Buffer leased from a [`BufferPool`].
pub struct PooledBuffer {
    buffer: Vec<u8>,
    pool: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl Deref for PooledBuffer {
    type Target = Vec<u8>;

    fn deref(&self) -> &Self::Target {
        &self.buffer
    }
}

impl DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.buffer
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        let mut buffer = std::mem::take(&mut self.buffer);
        if buffer.capacity() == 0 || buffer.capacity() > MAX_RETAINED_CAPACITY {
            return;
        }
        buffer.clear();

        let mut free = self.pool.lock();
        if free.len() < MAX_POOLED_BUFFERS {
            free.push(buffer);
        }
    }
}

impl fmt::Debug for PooledBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledBuffer")
            .field("len", &self.buffer.len())
            .field("capacity", &self.buffer.capacity())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
