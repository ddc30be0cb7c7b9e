//! Fixed-capacity byte ring used as the receive accumulation buffer.
//!
//! Consuming from the front is O(1); nothing is shifted on resync or after a
//! packet is extracted.

/// Fixed-capacity ring buffer with O(1) advance.
///
/// Generic const parameter `N` sets buffer capacity.
pub struct RingBuffer<const N: usize> {
    data: [u8; N],
    head: usize, // next empty slot
    tail: usize, // first valid byte
    len: usize,
}

impl<const N: usize> RingBuffer<N> {
    /// Create a new empty ring buffer.
    pub const fn new() -> Self {
        Self {
            data: [0u8; N],
            head: 0,
            tail: 0,
            len: 0,
        }
    }

    /// Total capacity in bytes.
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Number of bytes available to read.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Free space in bytes.
    #[inline]
    pub fn remaining(&self) -> usize {
        N - self.len
    }

    /// Append as many bytes as fit; returns how many were taken.
    pub fn extend(&mut self, bytes: &[u8]) -> usize {
        let mut taken = 0;
        while taken < bytes.len() && self.len < N {
            let slot = self.free_slice_mut();
            let n = slot.len().min(bytes.len() - taken);
            slot[..n].copy_from_slice(&bytes[taken..taken + n]);
            self.commit(n);
            taken += n;
        }
        taken
    }

    /// Contiguous free region starting at the write position.
    ///
    /// May be shorter than [`RingBuffer::remaining`] when the free space wraps.
    /// Fill it and then call [`RingBuffer::commit`].
    pub fn free_slice_mut(&mut self) -> &mut [u8] {
        if self.len == N {
            return &mut [];
        }
        let end = if self.head >= self.tail { N } else { self.tail };
        &mut self.data[self.head..end]
    }

    /// Mark `n` bytes of the free region as written.
    pub fn commit(&mut self, n: usize) {
        let n = n.min(self.remaining());
        self.head = (self.head + n) % N;
        self.len += n;
    }

    /// Consume n bytes from the front.
    #[inline]
    pub fn advance(&mut self, n: usize) {
        let n = n.min(self.len);
        self.tail = (self.tail + n) % N;
        self.len -= n;
    }

    /// Read byte at logical index (handles wraparound).
    #[inline]
    pub fn get(&self, index: usize) -> Option<u8> {
        if index < self.len {
            Some(self.data[(self.tail + index) % N])
        } else {
            None
        }
    }

    /// Little-endian `u16` at the front, if two bytes are buffered.
    pub fn peek_u16_le(&self) -> Option<u16> {
        Some(u16::from_le_bytes([self.get(0)?, self.get(1)?]))
    }

    /// Copy `dst.len()` bytes starting at the front into `dst`.
    ///
    /// Returns `false` (copying nothing) if fewer bytes are buffered.
    pub fn copy_front(&self, dst: &mut [u8]) -> bool {
        if dst.len() > self.len {
            return false;
        }
        let first = dst.len().min(N - self.tail);
        dst[..first].copy_from_slice(&self.data[self.tail..self.tail + first]);
        let rest = dst.len() - first;
        dst[first..].copy_from_slice(&self.data[..rest]);
        true
    }

    /// Drop all buffered bytes.
    pub fn clear(&mut self) {
        self.head = 0;
        self.tail = 0;
        self.len = 0;
    }
}

impl<const N: usize> Default for RingBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}
