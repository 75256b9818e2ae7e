//! Byte-oriented FIFO that delays the loudspeaker reference signal.
//!
//! The echo canceller expects the reference to line up with the moment the
//! loudspeaker output actually reaches the microphones.  [`DelayRingBuffer`]
//! is pre-filled with `delay` bytes of silence, so whatever is enqueued comes
//! back out exactly `delay` bytes later.
//!
//! Unlike a capture ring buffer, this one never overwrites: an enqueue that
//! does not fit is rejected whole, and a dequeue of more than is stored
//! yields silence.  Both cases leave the cursors untouched.
//!
//! # Example
//!
//! ```rust
//! use afe_pipeline::audio::DelayRingBuffer;
//!
//! let mut delay = DelayRingBuffer::new(8, 2); // 2 bytes of leading silence
//! delay.enqueue(&[1, 2, 3]).unwrap();
//!
//! let mut out = [0u8; 5];
//! delay.dequeue(&mut out).unwrap();
//! assert_eq!(out, [0, 0, 1, 2, 3]);
//! ```

use thiserror::Error;

// ---------------------------------------------------------------------------
// DelayBufferError
// ---------------------------------------------------------------------------

/// Degraded outcomes of a ring operation.  Neither corrupts the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DelayBufferError {
    /// Not enough free space; nothing was written.
    #[error("delay buffer overflow: {requested} bytes requested, {free} free")]
    Overflow { requested: usize, free: usize },

    /// Fewer bytes stored than requested; the destination was zero-filled
    /// and nothing was consumed.
    #[error("delay buffer underflow: {requested} bytes requested, {available} available")]
    Underflow { requested: usize, available: usize },
}

// ---------------------------------------------------------------------------
// DelayRingBuffer
// ---------------------------------------------------------------------------

/// Fixed-capacity circular byte queue.
///
/// `head` is the next byte to read, `tail` the next byte to write; both stay
/// in `[0, capacity)`.  `occupied` disambiguates the full and empty cases
/// where `head == tail`.
pub struct DelayRingBuffer {
    buf: Vec<u8>,
    head: usize,
    tail: usize,
    occupied: usize,
}

impl DelayRingBuffer {
    /// Create a buffer of `capacity` bytes whose first `prefill` bytes read
    /// back as zero.
    ///
    /// # Panics
    ///
    /// Panics if `capacity == 0` or `prefill > capacity`.
    pub fn new(capacity: usize, prefill: usize) -> Self {
        assert!(capacity > 0, "DelayRingBuffer capacity must be > 0");
        assert!(
            prefill <= capacity,
            "DelayRingBuffer prefill ({prefill}) exceeds capacity ({capacity})"
        );
        Self {
            buf: vec![0; capacity],
            head: 0,
            tail: prefill % capacity,
            occupied: prefill,
        }
    }

    /// Size a buffer for a reference stream: `delay_samples` frames of
    /// silence up front plus room for two host periods, so a steady
    /// enqueue-one-period / dequeue-one-period cycle never starves or fills.
    pub fn for_reference(
        delay_samples: usize,
        period_frames: usize,
        channels: usize,
        sample_width: usize,
    ) -> Self {
        let frame_bytes = channels * sample_width;
        let prefill = delay_samples * frame_bytes;
        let capacity = (prefill + 2 * period_frames * frame_bytes).max(1);
        Self::new(capacity, prefill)
    }

    /// Append `data` at the tail, wrapping at most once.
    ///
    /// Returns [`DelayBufferError::Overflow`] without writing anything when
    /// `data` does not fit.
    pub fn enqueue(&mut self, data: &[u8]) -> Result<(), DelayBufferError> {
        let free = self.free();
        if data.len() > free {
            return Err(DelayBufferError::Overflow {
                requested: data.len(),
                free,
            });
        }

        let first = data.len().min(self.capacity() - self.tail);
        self.buf[self.tail..self.tail + first].copy_from_slice(&data[..first]);
        let rest = data.len() - first;
        if rest > 0 {
            self.buf[..rest].copy_from_slice(&data[first..]);
        }

        self.tail = (self.tail + data.len()) % self.capacity();
        self.occupied += data.len();
        Ok(())
    }

    /// Fill `out` from the head, wrapping at most once.
    ///
    /// When fewer than `out.len()` bytes are stored, `out` is zero-filled,
    /// nothing is consumed, and [`DelayBufferError::Underflow`] is returned.
    pub fn dequeue(&mut self, out: &mut [u8]) -> Result<(), DelayBufferError> {
        if out.len() > self.occupied {
            out.fill(0);
            return Err(DelayBufferError::Underflow {
                requested: out.len(),
                available: self.occupied,
            });
        }

        let first = out.len().min(self.capacity() - self.head);
        out[..first].copy_from_slice(&self.buf[self.head..self.head + first]);
        let rest = out.len() - first;
        if rest > 0 {
            out[first..].copy_from_slice(&self.buf[..rest]);
        }

        self.advance_head(out.len());
        Ok(())
    }

    /// Drop up to `count` bytes from the head without copying them.
    ///
    /// Returns the number of bytes actually dropped.
    pub fn discard(&mut self, count: usize) -> usize {
        let n = count.min(self.occupied);
        self.advance_head(n);
        n
    }

    fn advance_head(&mut self, n: usize) {
        self.head = (self.head + n) % self.capacity();
        self.occupied -= n;
    }

    /// Bytes currently stored.
    pub fn len(&self) -> usize {
        self.occupied
    }

    pub fn is_empty(&self) -> bool {
        self.occupied == 0
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Bytes that can be enqueued before overflow.
    pub fn free(&self) -> usize {
        self.capacity() - self.occupied
    }

    /// Read cursor position.
    pub fn head(&self) -> usize {
        self.head
    }

    /// Write cursor position.
    pub fn tail(&self) -> usize {
        self.tail
    }
}

impl std::fmt::Debug for DelayRingBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelayRingBuffer")
            .field("capacity", &self.capacity())
            .field("head", &self.head)
            .field("tail", &self.tail)
            .field("occupied", &self.occupied)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
