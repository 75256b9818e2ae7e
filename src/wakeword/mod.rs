//! Wake-word signaling — enhanced audio out, keyword offsets back in.
//!
//! # Exchange per output frame
//!
//! ```text
//! front end                                   wake-word process
//!    │ ── enhanced_audio (f32 frame) ──────────────▶ │
//!    │ ── iteration (i32) ─────────────────────────▶ │
//!    │ ── trigger_enable (i32) ────────────────────▶ │
//!    │ ◀──────────────────── keyword_offset (i32) ── │  (bounded wait)
//! ```
//!
//! A non-zero offset is passed to the engine and arms [`TriggerState`]'s
//! debounce window.

pub mod forwarder;
pub mod link;
pub mod trigger;

pub use forwarder::{Forwarder, SIGNALING_LOG_EVERY};
pub use link::{DatagramLink, SignalingError, WakeWordLink};
pub use trigger::TriggerState;

#[cfg(test)]
pub use link::{MockLink, SentLog};
