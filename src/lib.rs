//! Real-time multichannel audio front end.
//!
//! Aligns the loudspeaker reference with the microphones, slices each host
//! period into native engine frames, runs an acoustic enhancement engine,
//! and forwards the enhanced output to a wake-word process.

pub mod audio;
pub mod config;
pub mod engine;
pub mod pipeline;
pub mod wakeword;

pub use config::FrontEndConfig;
pub use pipeline::{create_processor, AudioProcessor, ProcessorError, ProcessorState, SignalProcessor};
