//! Acoustic enhancement engine boundary.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │              Enhancer (trait)                │
//! │                                              │
//! │  configure(EngineSetup) ─▶ EngineConstants   │
//! │  process(mic, ref)      ─▶ Option<&[f32]>    │
//! │  trigger_found(offset)                       │
//! └──────────────────────────────────────────────┘
//!          ▲                        ▲
//!   PassthroughEnhancer      vendor engine binding
//! ```

pub mod enhancer;

pub use enhancer::{EngineConstants, EngineError, EngineSetup, Enhancer, PassthroughEnhancer};

// test-only re-export so the pipeline tests can script engine behaviour.
#[cfg(test)]
pub use enhancer::MockEnhancer;
