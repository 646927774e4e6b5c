//! Buffer Pool
//!
//! Recycles `BytesMut` staging buffers between the frame codec, the segment
//! writer and the recovery reader.
//!
//! ## Responsibilities
//! - Hand out a buffer with at least the requested capacity
//! - Reuse released buffers instead of allocating new ones
//! - Stay usable from any thread
//!
//! There is no eviction: the free list grows to the peak number of buffers
//! that were outstanding at the same time.

use std::sync::atomic::{AtomicU64, Ordering};

use bytes::BytesMut;
use parking_lot::Mutex;

/// Pool of reusable byte buffers
///
/// ## Concurrency:
/// - `free`: Protected by a Mutex held only for the list operation
/// - Counters: Atomic (lock-free)
#[derive(Default)]
pub struct BufferPool {
    /// Released buffers waiting for reuse
    free: Mutex<Vec<BytesMut>>,

    /// Buffers created because nothing in the free list was large enough
    allocated: AtomicU64,

    /// Requests served from the free list
    reused: AtomicU64,
}

/// Point-in-time view of pool activity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub allocated: u64,
    pub reused: u64,
    pub pooled: usize,
}

impl BufferPool {
    /// Create an empty pool
    pub fn new() -> Self {
        Self::default()
    }

    /// Get an empty buffer with capacity for at least `size` bytes
    ///
    /// Takes the first pooled buffer that is large enough; otherwise
    /// allocates a new one.
    pub fn allocate(&self, size: usize) -> BytesMut {
        let reused = {
            let mut free = self.free.lock();
            free.iter()
                .position(|buf| buf.capacity() >= size)
                .map(|pos| free.swap_remove(pos))
        };

        match reused {
            Some(mut buf) => {
                buf.clear();
                self.reused.fetch_add(1, Ordering::Relaxed);
                buf
            }
            None => {
                self.allocated.fetch_add(1, Ordering::Relaxed);
                BytesMut::with_capacity(size)
            }
        }
    }

    /// Return a buffer to the pool
    pub fn release(&self, mut buf: BytesMut) {
        // A split-off or frozen remainder may have no spare room at all
        if buf.capacity() == 0 {
            return;
        }
        buf.clear();
        self.free.lock().push(buf);
    }

    /// Drop every pooled buffer
    pub fn clear(&self) {
        self.free.lock().clear();
    }

    /// Snapshot of allocation counters
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            allocated: self.allocated.load(Ordering::Relaxed),
            reused: self.reused.load(Ordering::Relaxed),
            pooled: self.free.lock().len(),
        }
    }
}
