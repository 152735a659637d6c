//! Reusable output buffers for inflated payloads.
//!
//! Inflating into a pooled buffer avoids a fresh allocation per read when the
//! caller only needs the bytes for a short while. Buffers go back to the pool
//! when the [`PooledBuffer`] guard is dropped.

use std::ops::Deref;

use parking_lot::Mutex;

/// Configuration for the buffer pool.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PoolConfig {
    /// Maximum number of idle buffers kept for reuse.
    pub max_buffers: usize,
    /// Buffers with a larger capacity are freed instead of pooled.
    pub max_retained_capacity: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_buffers: 16,
            max_retained_capacity: 4 * 1024 * 1024, // 4MB
        }
    }
}

/// A pool of byte buffers shared by all reads of one archive.
#[derive(Debug, Default)]
pub struct BufferPool {
    free: Mutex<Vec<Vec<u8>>>,
    config: PoolConfig,
}

impl BufferPool {
    /// Create a pool with default configuration.
    pub fn new() -> Self {
        Self::with_config(PoolConfig::default())
    }

    /// Create a pool with custom configuration.
    pub fn with_config(config: PoolConfig) -> Self {
        Self {
            free: Mutex::new(Vec::new()),
            config,
        }
    }

    /// Take an empty buffer able to hold at least `size` bytes.
    pub fn acquire(&self, size: usize) -> PooledBuffer<'_> {
        let recycled = {
            let mut free = self.free.lock();
            free.iter()
                .position(|b| b.capacity() >= size)
                .map(|i| free.swap_remove(i))
                .or_else(|| free.pop())
        };

        let mut data = recycled.unwrap_or_default();
        data.clear();
        data.reserve_exact(size);
        PooledBuffer { data, pool: self }
    }

    fn release(&self, mut data: Vec<u8>) {
        if data.capacity() == 0 || data.capacity() > self.config.max_retained_capacity {
            return;
        }
        let mut free = self.free.lock();
        if free.len() < self.config.max_buffers {
            data.clear();
            free.push(data);
        }
    }

    /// Number of idle buffers currently held.
    pub fn idle_count(&self) -> usize {
        self.free.lock().len()
    }
}

/// A buffer on loan from a [`BufferPool`].
#[derive(Debug)]
pub struct PooledBuffer<'a> {
    data: Vec<u8>,
    pool: &'a BufferPool,
}

impl PooledBuffer<'_> {
    /// Mutable access to the underlying vector.
    pub fn as_mut_vec(&mut self) -> &mut Vec<u8> {
        &mut self.data
    }

    /// Detach the bytes from the pool.
    pub fn into_vec(mut self) -> Vec<u8> {
        std::mem::take(&mut self.data)
    }
}

impl Deref for PooledBuffer<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.data
    }
}

impl Drop for PooledBuffer<'_> {
    fn drop(&mut self) {
        self.pool.release(std::mem::take(&mut self.data));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_returns_to_pool() {
        let pool = BufferPool::new();
        {
            let mut buffer = pool.acquire(100);
            buffer.as_mut_vec().extend_from_slice(b"hello");
            assert_eq!(&*buffer, b"hello");
        }
        assert_eq!(pool.idle_count(), 1);

        let buffer = pool.acquire(50);
        assert!(buffer.is_empty());
        assert_eq!(pool.idle_count(), 0);
    }

    #[test]
    fn test_detached_buffer_is_not_pooled() {
        let pool = BufferPool::new();
        let mut buffer = pool.acquire(8);
        buffer.as_mut_vec().push(1);
        let bytes = buffer.into_vec();
        assert_eq!(bytes, vec![1]);
        assert_eq!(pool.idle_count(), 0);
    }

    #[test]
    fn test_oversized_buffers_are_freed() {
        let pool = BufferPool::with_config(PoolConfig {
            max_buffers: 4,
            max_retained_capacity: 16,
        });
        drop(pool.acquire(1024));
        assert_eq!(pool.idle_count(), 0);
    }

    #[test]
    fn test_pool_is_bounded() {
        let pool = BufferPool::with_config(PoolConfig {
            max_buffers: 2,
            max_retained_capacity: 1024,
        });
        let buffers: Vec<_> = (0..4).map(|_| pool.acquire(8)).collect();
        drop(buffers);
        assert_eq!(pool.idle_count(), 2);
    }
}
