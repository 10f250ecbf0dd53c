//! Pre-allocated capture buffer pool with `bytes::Bytes` integration.
//!
//! One [`FrameBufferPool`] is created per acquisition run, sized by the
//! buffer sizing policy in `gx-core`. The acquisition thread borrows a
//! buffer, lets the SDK fill it, then freezes it into [`Bytes`] so the
//! decoded frame can be shared with the display without copying.
//!
//! ## Memory Flow
//!
//! ```text
//! 1. FrameBufferPool::try_new pre-allocates every buffer (fallible)
//! 2. try_acquire() hands out a PooledBuffer (lock-free pop)
//! 3. SDK writes into as_mut_slice(); set_len() records the payload
//! 4. freeze() wraps the buffer in Bytes (no copy)
//! 5. When the last Bytes clone drops, the buffer goes back to the pool
//! ```
//!
//! Every frozen buffer holds the shared pool state, so a single
//! outstanding frame keeps all of the pool's buffers allocated after the
//! pool handle is dropped. Long-lived holders must copy the pixels out
//! (the session controller does this for the last displayed frame when
//! acquisition stops).

use bytes::Bytes;
use crossbeam_queue::SegQueue;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Failures while building or filling pool buffers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// A pool needs at least one buffer of at least one byte.
    #[error("pool size ({pool_size}) and buffer capacity ({buffer_capacity}) must be > 0")]
    EmptyPool {
        /// Requested buffer count.
        pool_size: usize,
        /// Requested bytes per buffer.
        buffer_capacity: usize,
    },

    /// The allocator refused the requested memory.
    #[error("failed to allocate {requested_bytes} bytes for frame buffers")]
    AllocationFailed {
        /// Total bytes requested for the pool.
        requested_bytes: usize,
    },

    /// More data was declared than a buffer can hold.
    #[error("length ({len}) exceeds buffer capacity ({capacity})")]
    LengthExceedsCapacity {
        /// Declared length.
        len: usize,
        /// Buffer capacity.
        capacity: usize,
    },
}

/// Internal state shared by the pool handle and every outstanding buffer.
struct PoolInner {
    /// Lock-free queue of available buffers
    free_buffers: SegQueue<Box<[u8]>>,
    /// Capacity of each buffer in bytes
    buffer_capacity: usize,
    /// Total number of buffers in the pool
    pool_size: usize,
    /// Number of buffers currently available
    available: AtomicUsize,
    /// Metrics: total acquires
    total_acquires: AtomicU64,
    /// Metrics: total returns
    total_returns: AtomicU64,
}

impl PoolInner {
    fn give_back(&self, buffer: Box<[u8]>) {
        self.free_buffers.push(buffer);
        self.available.fetch_add(1, Ordering::Release);
        self.total_returns.fetch_add(1, Ordering::Relaxed);
    }
}

/// Fixed-size pool of capture buffers.
///
/// Cheap to clone; clones share the same buffers.
#[derive(Clone)]
pub struct FrameBufferPool {
    inner: Arc<PoolInner>,
}

impl FrameBufferPool {
    /// Pre-allocate `pool_size` buffers of `buffer_capacity` bytes each.
    ///
    /// Allocation is fallible: if the allocator refuses any buffer the whole
    /// pool is released and [`PoolError::AllocationFailed`] is returned.
    pub fn try_new(pool_size: usize, buffer_capacity: usize) -> Result<Self, PoolError> {
        if pool_size == 0 || buffer_capacity == 0 {
            return Err(PoolError::EmptyPool {
                pool_size,
                buffer_capacity,
            });
        }

        let requested_bytes = pool_size
            .checked_mul(buffer_capacity)
            .ok_or(PoolError::AllocationFailed {
                requested_bytes: usize::MAX,
            })?;

        let free_buffers = SegQueue::new();
        for _ in 0..pool_size {
            let buffer = allocate_buffer(buffer_capacity)
                .ok_or(PoolError::AllocationFailed { requested_bytes })?;
            free_buffers.push(buffer);
        }

        info!(
            pool_size,
            buffer_capacity_kb = buffer_capacity as f64 / 1024.0,
            total_mb = requested_bytes as f64 / (1024.0 * 1024.0),
            "Frame buffer pool created"
        );

        Ok(Self {
            inner: Arc::new(PoolInner {
                free_buffers,
                buffer_capacity,
                pool_size,
                available: AtomicUsize::new(pool_size),
                total_acquires: AtomicU64::new(0),
                total_returns: AtomicU64::new(0),
            }),
        })
    }

    /// Try to take a buffer without blocking.
    ///
    /// Returns `None` when every buffer is in use (backpressure indicator).
    #[must_use]
    pub fn try_acquire(&self) -> Option<PooledBuffer> {
        let buffer = self.inner.free_buffers.pop()?;

        self.inner.available.fetch_sub(1, Ordering::Acquire);
        self.inner.total_acquires.fetch_add(1, Ordering::Relaxed);

        Some(PooledBuffer {
            buffer: Some(buffer),
            actual_len: 0,
            pool: Arc::clone(&self.inner),
        })
    }

    /// Number of currently available buffers.
    #[must_use]
    pub fn available(&self) -> usize {
        self.inner.available.load(Ordering::Acquire)
    }

    /// Total number of buffers in the pool.
    #[must_use]
    pub fn size(&self) -> usize {
        self.inner.pool_size
    }

    /// Capacity of each buffer in bytes.
    #[must_use]
    pub fn buffer_capacity(&self) -> usize {
        self.inner.buffer_capacity
    }

    /// Total number of buffer acquisitions since pool creation.
    #[must_use]
    pub fn total_acquires(&self) -> u64 {
        self.inner.total_acquires.load(Ordering::Relaxed)
    }

    /// Total number of buffer returns since pool creation.
    #[must_use]
    pub fn total_returns(&self) -> u64 {
        self.inner.total_returns.load(Ordering::Relaxed)
    }

    /// True when both handles refer to the same set of buffers.
    #[must_use]
    pub fn same_pool(&self, other: &FrameBufferPool) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for FrameBufferPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameBufferPool")
            .field("size", &self.size())
            .field("available", &self.available())
            .field("buffer_capacity", &self.buffer_capacity())
            .finish()
    }
}

fn allocate_buffer(capacity: usize) -> Option<Box<[u8]>> {
    let mut buffer = Vec::new();
    buffer.try_reserve_exact(capacity).ok()?;
    buffer.resize(capacity, 0u8);
    Some(buffer.into_boxed_slice())
}

/// A buffer on loan from the pool, returned automatically on drop.
pub struct PooledBuffer {
    /// The actual buffer (Option for take-on-freeze)
    buffer: Option<Box<[u8]>>,
    /// Actual length of valid data (may be < buffer capacity)
    actual_len: usize,
    /// Reference to pool for return on drop
    pool: Arc<PoolInner>,
}

impl PooledBuffer {
    /// Valid data written so far.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        match &self.buffer {
            Some(buf) => &buf[..self.actual_len],
            None => &[],
        }
    }

    /// Full-capacity writable view for the SDK to fill.
    ///
    /// Call [`PooledBuffer::set_len`] afterwards.
    #[must_use]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        match &mut self.buffer {
            Some(buf) => buf,
            None => &mut [],
        }
    }

    /// Buffer capacity in bytes.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.buffer.as_ref().map_or(0, |b| b.len())
    }

    /// Length of valid data.
    #[must_use]
    pub fn len(&self) -> usize {
        self.actual_len
    }

    /// True when no data has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actual_len == 0
    }

    /// Record how many bytes of the buffer hold valid data.
    pub fn set_len(&mut self, len: usize) -> Result<(), PoolError> {
        let capacity = self.capacity();
        if len > capacity {
            return Err(PoolError::LengthExceedsCapacity { len, capacity });
        }
        self.actual_len = len;
        Ok(())
    }

    /// Copy `src` into the buffer and record its length.
    pub fn copy_from_slice(&mut self, src: &[u8]) -> Result<(), PoolError> {
        let capacity = self.capacity();
        if src.len() > capacity {
            return Err(PoolError::LengthExceedsCapacity {
                len: src.len(),
                capacity,
            });
        }
        self.as_mut_slice()[..src.len()].copy_from_slice(src);
        self.actual_len = src.len();
        Ok(())
    }

    /// Convert into [`Bytes`] without copying.
    ///
    /// The buffer returns to the pool when every clone of the returned
    /// `Bytes` has been dropped.
    #[must_use]
    pub fn freeze(mut self) -> Bytes {
        match self.buffer.take() {
            Some(buffer) => Bytes::from_owner(BufferOwner {
                buffer: Some(buffer),
                actual_len: self.actual_len,
                pool: Arc::clone(&self.pool),
            }),
            None => Bytes::new(),
        }
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        // Not frozen: return straight to the pool
        if let Some(buffer) = self.buffer.take() {
            self.pool.give_back(buffer);
        }
    }
}

impl AsRef<[u8]> for PooledBuffer {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

/// Owner stored inside `Bytes` after `freeze()`; returns the buffer on drop.
struct BufferOwner {
    buffer: Option<Box<[u8]>>,
    actual_len: usize,
    pool: Arc<PoolInner>,
}

impl AsRef<[u8]> for BufferOwner {
    fn as_ref(&self) -> &[u8] {
        match &self.buffer {
            Some(buf) => &buf[..self.actual_len],
            None => &[],
        }
    }
}

impl Drop for BufferOwner {
    fn drop(&mut self) {
        if let Some(buffer) = self.buffer.take() {
            self.pool.give_back(buffer);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_creation() {
        let pool = FrameBufferPool::try_new(4, 1024).unwrap();
        assert_eq!(pool.size(), 4);
        assert_eq!(pool.available(), 4);
        assert_eq!(pool.buffer_capacity(), 1024);
    }

    #[test]
    fn test_empty_pool_rejected() {
        assert!(matches!(
            FrameBufferPool::try_new(0, 1024),
            Err(PoolError::EmptyPool { .. })
        ));
        assert!(matches!(
            FrameBufferPool::try_new(4, 0),
            Err(PoolError::EmptyPool { .. })
        ));
    }

    #[test]
    fn test_oversized_pool_fails_cleanly() {
        let result = FrameBufferPool::try_new(usize::MAX / 2, 4);
        assert!(matches!(result, Err(PoolError::AllocationFailed { .. })));
    }

    #[test]
    fn test_try_acquire_until_exhausted() {
        let pool = FrameBufferPool::try_new(2, 64).unwrap();

        let buf1 = pool.try_acquire();
        assert!(buf1.is_some());
        assert_eq!(pool.available(), 1);

        let buf2 = pool.try_acquire();
        assert!(buf2.is_some());
        assert!(pool.try_acquire().is_none());

        drop(buf1);
        assert_eq!(pool.available(), 1);
        assert!(pool.try_acquire().is_some());
    }

    #[test]
    fn test_reused_buffer_keeps_full_capacity() {
        let pool = FrameBufferPool::try_new(1, 16).unwrap();

        let mut buf = pool.try_acquire().unwrap();
        buf.copy_from_slice(b"abc").unwrap();
        drop(buf.freeze());

        let mut again = pool.try_acquire().unwrap();
        assert_eq!(again.capacity(), 16);
        assert_eq!(again.as_mut_slice().len(), 16);
        assert!(again.is_empty());
    }

    #[test]
    fn test_sdk_style_fill() {
        let pool = FrameBufferPool::try_new(1, 8).unwrap();
        let mut buf = pool.try_acquire().unwrap();

        buf.as_mut_slice()[..4].copy_from_slice(&[1, 2, 3, 4]);
        buf.set_len(4).unwrap();
        assert_eq!(buf.as_slice(), &[1, 2, 3, 4]);

        assert_eq!(
            buf.set_len(9),
            Err(PoolError::LengthExceedsCapacity { len: 9, capacity: 8 })
        );
    }

    #[test]
    fn test_freeze_returns_on_last_clone() {
        let pool = FrameBufferPool::try_new(1, 1024).unwrap();
        let mut buf = pool.try_acquire().unwrap();
        buf.copy_from_slice(b"test data").unwrap();

        let bytes1 = buf.freeze();
        let bytes2 = bytes1.clone();
        assert_eq!(bytes1.as_ref(), b"test data");
        assert_eq!(pool.available(), 0);

        drop(bytes1);
        assert_eq!(pool.available(), 0);

        drop(bytes2);
        assert_eq!(pool.available(), 1);
    }

    #[test]
    fn test_metrics() {
        let pool = FrameBufferPool::try_new(2, 32).unwrap();

        let buf1 = pool.try_acquire().unwrap();
        let buf2 = pool.try_acquire().unwrap();
        assert_eq!(pool.total_acquires(), 2);

        drop(buf1);
        assert_eq!(pool.total_returns(), 1);

        drop(buf2.freeze());
        assert_eq!(pool.total_returns(), 2);
    }

    #[test]
    fn test_pools_are_independent() {
        let a = FrameBufferPool::try_new(1, 8).unwrap();
        let b = FrameBufferPool::try_new(1, 8).unwrap();
        assert!(!a.same_pool(&b));
        assert!(a.same_pool(&a.clone()));

        let _held = a.try_acquire().unwrap();
        assert_eq!(b.available(), 1);
    }

    #[test]
    fn test_buffer_outlives_pool_handle() {
        let pool = FrameBufferPool::try_new(1, 4).unwrap();
        let mut buf = pool.try_acquire().unwrap();
        buf.copy_from_slice(&[9, 9]).unwrap();
        let bytes = buf.freeze();
        drop(pool);
        assert_eq!(bytes.as_ref(), &[9, 9]);
    }
}
