//! Fixed-capacity byte FIFO
//!
//! Filtered data waits here until the consumer reads it. Storage is
//! allocated once; head and length cursors make push and pop O(1).

/// Circular byte buffer with a hard capacity
pub struct ByteRing {
    buf: Box<[u8]>,
    head: usize,
    len: usize,
}

impl ByteRing {
    /// Create a ring holding at most `capacity` bytes (minimum 1)
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: vec![0u8; capacity.max(1)].into_boxed_slice(),
            head: 0,
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.buf.len()
    }

    /// Free slots
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.len
    }

    /// Append a byte. Returns false (and stores nothing) when full.
    pub fn push(&mut self, byte: u8) -> bool {
        if self.is_full() {
            return false;
        }
        let tail = (self.head + self.len) % self.buf.len();
        self.buf[tail] = byte;
        self.len += 1;
        true
    }

    /// Move up to `out.len()` bytes into `out`, oldest first
    pub fn pop_into(&mut self, out: &mut [u8]) -> usize {
        let count = out.len().min(self.len);
        let cap = self.buf.len();

        // At most two contiguous runs: head..end, then 0..
        let first = count.min(cap - self.head);
        out[..first].copy_from_slice(&self.buf[self.head..self.head + first]);
        let second = count - first;
        if second > 0 {
            out[first..count].copy_from_slice(&self.buf[..second]);
        }

        self.head = (self.head + count) % cap;
        self.len -= count;
        if self.len == 0 {
            self.head = 0;
        }
        count
    }

    pub fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }
}
