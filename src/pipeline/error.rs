//! Errors surfaced to the host by the processor.

use thiserror::Error;

use crate::config::ConfigError;
use crate::engine::EngineError;

/// Which host buffer failed the size check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferKind {
    Microphone,
    Reference,
    Output,
}

impl std::fmt::Display for BufferKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            BufferKind::Microphone => "microphone",
            BufferKind::Reference => "reference",
            BufferKind::Output => "output",
        })
    }
}

/// Everything `open`, `process` and `close` can fail with.
///
/// None of these leave the processor in a different lifecycle state than
/// before the call, and none corrupt the delay buffer.
#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(#[from] ConfigError),

    #[error("processor is already open")]
    AlreadyOpen,

    #[error("processor is not open")]
    NotOpen,

    #[error("processor is busy")]
    Busy,

    #[error("{buffer} buffer is {actual} bytes, expected {expected}")]
    BufferSizeMismatch {
        buffer: BufferKind,
        expected: usize,
        actual: usize,
    },

    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl ProcessorError {
    /// Negative status code for hosts that speak the integer plugin ABI.
    ///
    /// Size mismatches are told apart by buffer; everything else is `-1`.
    pub fn code(&self) -> i32 {
        match self {
            ProcessorError::BufferSizeMismatch { buffer, .. } => match buffer {
                BufferKind::Microphone => -1,
                BufferKind::Reference => -2,
                BufferKind::Output => -3,
            },
            _ => -1,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
