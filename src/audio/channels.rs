//! Planar `f32` scratch buffers handed to the enhancement engine.
//!
//! One contiguous allocation holds every channel back to back; channel `c`
//! occupies `data[c * frames .. (c + 1) * frames]`.  The buffer is filled
//! once per native frame and never grows after construction.

/// Fixed-size planar (non-interleaved) sample buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanarBuffer {
    data: Vec<f32>,
    channels: usize,
    frames: usize,
}

impl PlanarBuffer {
    /// Allocate a zeroed buffer of `channels` planes of `frames` samples.
    pub fn new(channels: usize, frames: usize) -> Self {
        Self {
            data: vec![0.0; channels * frames],
            channels,
            frames,
        }
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Samples per channel.
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Samples of channel `ch`.
    ///
    /// # Panics
    ///
    /// Panics if `ch >= channels()`.
    pub fn channel(&self, ch: usize) -> &[f32] {
        &self.data[ch * self.frames..(ch + 1) * self.frames]
    }

    pub fn channel_mut(&mut self, ch: usize) -> &mut [f32] {
        &mut self.data[ch * self.frames..(ch + 1) * self.frames]
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
