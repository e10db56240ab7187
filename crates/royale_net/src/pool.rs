//! Reusable fixed-size write buffers for per-tick broadcast.
//!
//! [`BufferPool::acquire`] pops a free [`BufferWriter`] or builds a new one,
//! wrapped in a [`PooledBuffer`]. The buffer goes back to the pool when the
//! `PooledBuffer` is dropped, which transports do only once the send has
//! completed or failed. Release therefore happens exactly once per acquire on
//! every path, and a buffer is never reused while its bytes are still queued.
//!
//! The pool grows and never shrinks. Under sustained transport backpressure
//! every queued frame pins its own buffer, so memory grows with the backlog.
//! That trades bounded memory for never blocking the tick driver; there is
//! no high-water mark.

use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use tracing::debug;

use crate::frames::{BufferWriter, PLAYER_MOVEMENT_SIZE};

/// Point-in-time counters for a [`BufferPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Buffers ever constructed. This is the pool's total size.
    pub created: usize,
    /// Buffers sitting on the free list.
    pub free: usize,
    /// Buffers acquired and not yet released.
    pub in_flight: usize,
    /// Smallest free-list length seen since the last
    /// [`BufferPool::reset_low_water`].
    pub low_water: usize,
}

#[derive(Debug)]
struct PoolState {
    free: Vec<BufferWriter>,
    created: usize,
    low_water: usize,
}

#[derive(Debug)]
struct PoolShared {
    buffer_size: usize,
    state: Mutex<PoolState>,
}

impl PoolShared {
    fn lock(&self) -> MutexGuard<'_, PoolState> {
        // A panic while holding the lock cannot leave the free list torn, so
        // a poisoned guard is still usable.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn release(&self, mut writer: BufferWriter) {
        writer.reset();
        self.lock().free.push(writer);
    }
}

/// A slab of reusable fixed-size write buffers.
///
/// Cloning is cheap and yields a handle to the same pool.
#[derive(Debug, Clone)]
pub struct BufferPool {
    shared: Arc<PoolShared>,
}

impl BufferPool {
    /// Create an empty pool whose buffers hold `buffer_size` bytes.
    #[must_use]
    pub fn new(buffer_size: usize) -> Self {
        Self {
            shared: Arc::new(PoolShared {
                buffer_size,
                state: Mutex::new(PoolState {
                    free: Vec::new(),
                    created: 0,
                    low_water: 0,
                }),
            }),
        }
    }

    /// A pool sized for exactly one entity position update per buffer.
    #[must_use]
    pub fn for_entity_updates() -> Self {
        Self::new(PLAYER_MOVEMENT_SIZE)
    }

    /// Size of each buffer in bytes.
    #[must_use]
    pub fn buffer_size(&self) -> usize {
        self.shared.buffer_size
    }

    /// Take a buffer off the free list, constructing one if the list is empty.
    #[must_use]
    pub fn acquire(&self) -> PooledBuffer {
        let mut state = self.shared.lock();
        let writer = match state.free.pop() {
            Some(writer) => writer,
            None => {
                state.created += 1;
                debug!(
                    created = state.created,
                    buffer_size = self.shared.buffer_size,
                    "buffer pool grew"
                );
                BufferWriter::new(self.shared.buffer_size)
            }
        };
        state.low_water = state.low_water.min(state.free.len());
        drop(state);

        PooledBuffer {
            writer: Some(writer),
            pool: Arc::clone(&self.shared),
        }
    }

    /// Current counters.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let state = self.shared.lock();
        PoolStats {
            created: state.created,
            free: state.free.len(),
            in_flight: state.created - state.free.len(),
            low_water: state.low_water,
        }
    }

    /// Restart low-water tracking from the current free-list length.
    pub fn reset_low_water(&self) {
        let mut state = self.shared.lock();
        state.low_water = state.free.len();
    }
}

/// A buffer on loan from a [`BufferPool`].
///
/// Dereferences to the underlying [`BufferWriter`]. Dropping it resets the
/// cursor and returns the buffer to its pool.
#[derive(Debug)]
pub struct PooledBuffer {
    writer: Option<BufferWriter>,
    pool: Arc<PoolShared>,
}

impl Deref for PooledBuffer {
    type Target = BufferWriter;

    fn deref(&self) -> &BufferWriter {
        // Only `Drop` takes the writer out.
        match &self.writer {
            Some(writer) => writer,
            None => unreachable!("pooled buffer used after release"),
        }
    }
}

impl DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut BufferWriter {
        match &mut self.writer {
            Some(writer) => writer,
            None => unreachable!("pooled buffer used after release"),
        }
    }
}

impl PooledBuffer {
    /// Hand the encoded bytes over as a [`Bytes`] payload without copying.
    ///
    /// The payload owns the buffer. It returns to the pool when the last
    /// clone of the payload is dropped.
    #[must_use]
    pub fn into_bytes(self) -> Bytes {
        Bytes::from_owner(self)
    }
}

impl AsRef<[u8]> for PooledBuffer {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.take() {
            self.pool.release(writer);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_cycles_reuse_single_buffer() {
        let pool = BufferPool::for_entity_updates();
        for _ in 0..100 {
            let buf = pool.acquire();
            assert_eq!(buf.capacity(), PLAYER_MOVEMENT_SIZE);
            drop(buf);
            assert!(pool.stats().created <= 1);
        }
        let stats = pool.stats();
        assert_eq!(stats.created, 1);
        assert_eq!(stats.free, 1);
        assert_eq!(stats.in_flight, 0);
    }

    #[test]
    fn test_in_flight_buffers_are_not_reused() {
        let pool = BufferPool::for_entity_updates();
        let k = 8;
        let mut held: Vec<PooledBuffer> = Vec::new();
        for i in 0..k {
            let mut buf = pool.acquire();
            // Each live buffer is a fresh, empty writer.
            assert!(buf.is_empty());
            buf.write_bytes(&[i as u8]).unwrap();
            held.push(buf);
        }

        let stats = pool.stats();
        assert_eq!(stats.created, k);
        assert_eq!(stats.in_flight, k);
        assert_eq!(stats.low_water, 0);
        for (i, buf) in held.iter().enumerate() {
            assert_eq!(buf.as_bytes(), &[i as u8]);
        }

        drop(held);
        let stats = pool.stats();
        assert_eq!(stats.free, k);
        assert_eq!(stats.in_flight, 0);
    }

    #[test]
    fn test_release_resets_cursor() {
        let pool = BufferPool::new(4);
        let mut buf = pool.acquire();
        buf.write_bytes(&[7]).unwrap();
        drop(buf);

        let buf = pool.acquire();
        assert!(buf.is_empty());
        assert_eq!(pool.stats().created, 1);
    }

    #[test]
    fn test_release_from_another_thread() {
        let pool = BufferPool::new(4);
        let buf = pool.acquire();
        std::thread::spawn(move || drop(buf)).join().unwrap();
        assert_eq!(pool.stats().free, 1);
    }

    #[test]
    fn test_payload_keeps_buffer_until_dropped() {
        let pool = BufferPool::new(4);
        let mut buf = pool.acquire();
        buf.write_bytes(&[1, 2, 3]).unwrap();

        let payload = buf.into_bytes();
        assert_eq!(&payload[..], &[1, 2, 3]);
        assert_eq!(pool.stats().in_flight, 1);

        let copy = payload.clone();
        drop(payload);
        assert_eq!(pool.stats().in_flight, 1);
        assert_eq!(&copy[..], &[1, 2, 3]);

        drop(copy);
        let stats = pool.stats();
        assert_eq!(stats.in_flight, 0);
        assert_eq!(stats.free, 1);
    }

    #[test]
    fn test_low_water_tracks_from_reset() {
        let pool = BufferPool::new(4);
        drop((pool.acquire(), pool.acquire()));
        pool.reset_low_water();
        assert_eq!(pool.stats().low_water, 2);

        let _a = pool.acquire();
        assert_eq!(pool.stats().low_water, 1);
    }
}
