//! Fixed-capacity stream buffer.
//!
//! One buffer serves both roles of a stream. Which role is active is decided
//! by the stream's last operation, not by the buffer itself:
//! - read role: `[0, filled)` holds bytes fetched from the descriptor and
//!   `pos` marks how many the caller has consumed.
//! - write role: `[0, pos)` holds application bytes not yet flushed, and
//!   `filled` tracks `pos`.
//!
//! Invariant: `pos <= filled <= BUFSIZE`.

use std::fmt;

/// Buffer capacity. Refill requests and flush thresholds are exactly this size.
pub const BUFSIZE: usize = 4096;

pub struct StreamBuffer {
    data: Box<[u8; BUFSIZE]>,
    /// Consumption point (read role) or accumulation point (write role).
    pos: usize,
    /// Number of valid bytes in the buffer.
    filled: usize,
}

impl StreamBuffer {
    /// Create an empty, zeroed buffer.
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: Box::new([0u8; BUFSIZE]),
            pos: 0,
            filled: 0,
        }
    }

    /// Buffer capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        BUFSIZE
    }

    /// Current cursor.
    #[must_use]
    pub const fn pos(&self) -> usize {
        self.pos
    }

    /// Number of valid bytes.
    #[must_use]
    pub const fn filled(&self) -> usize {
        self.filled
    }

    /// Discard all buffered bytes in either role.
    pub fn reset(&mut self) {
        self.pos = 0;
        self.filled = 0;
    }

    // -----------------------------------------------------------------------
    // Write role
    // -----------------------------------------------------------------------

    /// Free space left for accumulation.
    #[must_use]
    pub const fn space(&self) -> usize {
        BUFSIZE - self.pos
    }

    /// Append one byte. Returns `false` if the buffer is full.
    pub fn push(&mut self, byte: u8) -> bool {
        if self.pos == BUFSIZE {
            return false;
        }
        self.data[self.pos] = byte;
        self.pos += 1;
        self.filled = self.pos;
        true
    }

    /// Copy as much of `src` as fits. Returns the count copied.
    pub fn append(&mut self, src: &[u8]) -> usize {
        let take = src.len().min(self.space());
        self.data[self.pos..self.pos + take].copy_from_slice(&src[..take]);
        self.pos += take;
        self.filled = self.pos;
        take
    }

    /// Bytes awaiting transfer to the descriptor.
    #[must_use]
    pub fn pending_write_data(&self) -> &[u8] {
        &self.data[..self.pos]
    }

    /// Drop the first `n` pending bytes after a partial transfer, keeping
    /// the rest at the front of the buffer in order.
    pub fn consume_flushed(&mut self, n: usize) {
        let n = n.min(self.pos);
        self.data.copy_within(n..self.pos, 0);
        self.pos -= n;
        self.filled = self.pos;
    }

    // -----------------------------------------------------------------------
    // Read role
    // -----------------------------------------------------------------------

    /// Fetched bytes not yet consumed.
    #[must_use]
    pub const fn readable(&self) -> usize {
        self.filled - self.pos
    }

    /// True when every fetched byte has been consumed.
    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.pos == self.filled
    }

    /// True when no more bytes can be fetched without a reset.
    #[must_use]
    pub const fn is_full(&self) -> bool {
        self.filled == BUFSIZE
    }

    /// Unfilled tail, the destination of the next descriptor read.
    pub fn spare_mut(&mut self) -> &mut [u8] {
        &mut self.data[self.filled..]
    }

    /// Record that `n` bytes were read into [`Self::spare_mut`].
    pub fn commit_fill(&mut self, n: usize) {
        debug_assert!(self.filled + n <= BUFSIZE);
        self.filled = (self.filled + n).min(BUFSIZE);
    }

    /// Consume the next fetched byte.
    pub fn next_byte(&mut self) -> Option<u8> {
        if self.is_exhausted() {
            return None;
        }
        let b = self.data[self.pos];
        self.pos += 1;
        Some(b)
    }

    /// Copy fetched bytes into `dst`. Returns the count copied.
    pub fn read_into(&mut self, dst: &mut [u8]) -> usize {
        let take = dst.len().min(self.readable());
        dst[..take].copy_from_slice(&self.data[self.pos..self.pos + take]);
        self.pos += take;
        take
    }
}

impl Default for StreamBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StreamBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamBuffer")
            .field("capacity", &BUFSIZE)
            .field("pos", &self.pos)
            .field("filled", &self.filled)
            .finish()
    }
}
