//! Pooled byte buffers
//!
//! Request handling borrows scratch buffers from a shared pool. A
//! `PooledBuffer` goes back to the pool when dropped, whichever way the
//! request ends. Buffers that grew past `retain_threshold` are freed
//! instead of pooled.

use crate::config::PoolConfig;
use parking_lot::Mutex;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct PoolInner {
    free: Mutex<Vec<Vec<u8>>>,
    max_pooled: usize,
    retain_threshold: usize,
    outstanding: AtomicUsize,
}

#[derive(Clone)]
pub struct BufferPool {
    inner: Arc<PoolInner>,
}

impl BufferPool {
    pub fn new(config: &PoolConfig) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                free: Mutex::new(Vec::with_capacity(config.max_pooled)),
                max_pooled: config.max_pooled,
                retain_threshold: config.retain_threshold,
                outstanding: AtomicUsize::new(0),
            }),
        }
    }

    /// Borrow an empty buffer with at least `capacity` bytes reserved.
    pub fn rent(&self, capacity: usize) -> PooledBuffer {
        let mut buf = self.inner.free.lock().pop().unwrap_or_default();
        buf.reserve(capacity);
        self.inner.outstanding.fetch_add(1, Ordering::Relaxed);
        PooledBuffer {
            buf,
            pool: Arc::clone(&self.inner),
        }
    }

    /// Buffers currently borrowed and not yet returned.
    pub fn outstanding(&self) -> usize {
        self.inner.outstanding.load(Ordering::Relaxed)
    }

    /// Buffers sitting idle in the pool.
    pub fn idle(&self) -> usize {
        self.inner.free.lock().len()
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(&PoolConfig::default())
    }
}

impl std::fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferPool")
            .field("outstanding", &self.outstanding())
            .field("idle", &self.idle())
            .finish()
    }
}

/// Borrowed buffer. Derefs to `Vec<u8>`; returned to its pool on drop.
pub struct PooledBuffer {
    buf: Vec<u8>,
    pool: Arc<PoolInner>,
}

impl PooledBuffer {
    /// Copy the contents out, leaving the buffer to be returned.
    pub fn to_vec(&self) -> Vec<u8> {
        self.buf.clone()
    }
}

impl Deref for PooledBuffer {
    type Target = Vec<u8>;

    #[inline]
    fn deref(&self) -> &Vec<u8> {
        &self.buf
    }
}

impl DerefMut for PooledBuffer {
    #[inline]
    fn deref_mut(&mut self) -> &mut Vec<u8> {
        &mut self.buf
    }
}

impl AsRef<[u8]> for PooledBuffer {
    fn as_ref(&self) -> &[u8] {
        &self.buf
    }
}

impl std::fmt::Debug for PooledBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledBuffer").field("len", &self.buf.len()).finish()
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        self.pool.outstanding.fetch_sub(1, Ordering::Relaxed);
        let mut buf = std::mem::take(&mut self.buf);
        if buf.capacity() > self.pool.retain_threshold {
            return;
        }
        buf.clear();
        let mut free = self.pool.free.lock();
        if free.len() < self.pool.max_pooled {
            free.push(buf);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rent_and_return() {
        let pool = BufferPool::default();
        {
            let mut a = pool.rent(16);
            a.extend_from_slice(b"hello");
            assert_eq!(pool.outstanding(), 1);
        }
        assert_eq!(pool.outstanding(), 0);
        assert_eq!(pool.idle(), 1);

        let b = pool.rent(0);
        assert!(b.is_empty(), "returned buffers are cleared");
        assert!(b.capacity() >= 5);
    }

    #[test]
    fn test_oversized_buffers_are_dropped() {
        let pool = BufferPool::new(&PoolConfig { max_pooled: 4, retain_threshold: 64 });
        drop(pool.rent(1024));
        assert_eq!(pool.idle(), 0);
        drop(pool.rent(32));
        assert_eq!(pool.idle(), 1);
    }

    #[test]
    fn test_pool_is_bounded() {
        let pool = BufferPool::new(&PoolConfig { max_pooled: 2, retain_threshold: 1 << 20 });
        let held: Vec<_> = (0..5).map(|_| pool.rent(8)).collect();
        assert_eq!(pool.outstanding(), 5);
        drop(held);
        assert_eq!(pool.outstanding(), 0);
        assert_eq!(pool.idle(), 2);
    }

    #[test]
    fn test_returned_on_early_exit() {
        fn fails(pool: &BufferPool) -> Result<(), String> {
            let mut scratch = pool.rent(8);
            scratch.push(1);
            Err("boom".into())
        }
        let pool = BufferPool::default();
        assert!(fails(&pool).is_err());
        assert_eq!(pool.outstanding(), 0);
    }
}
