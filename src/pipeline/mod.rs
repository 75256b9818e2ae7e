//! Frame orchestration: lifecycle, size checks, and the per-period loop.
//!
//! # Architecture
//!
//! ```text
//! host audio callback (once per period)
//!        │ mic block, reference block, output block
//!        ▼
//! SignalProcessor::process ── size checks ──▶ BufferSizeMismatch
//!        │  Opened → Filtering
//!        ▼
//! FrameDispatcher::run
//!        ├─ DelayRingBuffer   (reference delayed by N samples)
//!        ├─ Enhancer::process (once per native frame)
//!        └─ Forwarder         (wake-word exchange, optional)
//!        │  Filtering → Opened
//!        ▼
//! output block filled
//! ```
//!
//! # Quick start
//!
//! ```rust
//! use afe_pipeline::config::ProcessorConfig;
//! use afe_pipeline::engine::PassthroughEnhancer;
//! use afe_pipeline::pipeline::{AudioProcessor, SignalProcessor};
//!
//! let config = ProcessorConfig::default();
//! let mut processor = SignalProcessor::new(config.clone(), Box::new(PassthroughEnhancer::new(200)));
//! processor.open(None).unwrap();
//!
//! let mic = vec![0u8; config.mic_block_bytes()];
//! let reference = vec![0u8; config.reference_block_bytes()];
//! let mut out = vec![0u8; config.output_block_bytes()];
//! processor.process(&mic, &reference, &mut out).unwrap();
//! processor.close().unwrap();
//! ```

pub mod dispatch;
pub mod error;
pub mod processor;
pub mod state;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use dispatch::{DispatchStats, FrameDispatcher};
pub use error::{BufferKind, ProcessorError};
pub use processor::{create_processor, AudioProcessor, SignalProcessor};
pub use state::ProcessorState;
