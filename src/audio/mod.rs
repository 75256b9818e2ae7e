//! Sample-level building blocks — reference delay, planar scratch buffers,
//! PCM ↔ float conversion.
//!
//! # Data flow for one native frame
//!
//! ```text
//! reference block ─▶ DelayRingBuffer ─▶ ref window bytes ─┐
//!                                                         ├─▶ pcm_to_planar ─▶ PlanarBuffer ─▶ engine
//! mic block (interleaved bytes) ──────────────────────────┘
//!
//! engine output (f32) ─▶ float_to_pcm ─▶ output block
//! ```

pub mod channels;
pub mod delay;
pub mod format;

pub use channels::PlanarBuffer;
pub use delay::{DelayBufferError, DelayRingBuffer};
pub use format::{fill_silence, float_to_pcm, pcm_to_planar, SampleFormat, UnknownSampleFormat};
