//! Processor lifecycle state.
//!
//! ```text
//! Closed ──open──▶ Opened ──process──▶ Filtering ──return──▶ Opened
//!   ▲                 │
//!   └─────close───────┘
//! ```
//!
//! `Filtering` only lasts for the duration of one `process` call.  Seeing it
//! from outside means a call never returned (it panicked, or the host is
//! calling concurrently), and every other operation refuses with `Busy`.

/// Lifecycle state of a [`SignalProcessor`](super::SignalProcessor).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessorState {
    /// No buffers allocated; only `open` is accepted.
    #[default]
    Closed,

    /// Buffers allocated and the engine configured; ready for `process`.
    Opened,

    /// A `process` call is in flight.
    Filtering,
}

impl ProcessorState {
    /// `true` for every state in which buffers are allocated.
    ///
    /// ```
    /// use afe_pipeline::pipeline::ProcessorState;
    ///
    /// assert!(!ProcessorState::Closed.is_open());
    /// assert!(ProcessorState::Opened.is_open());
    /// assert!(ProcessorState::Filtering.is_open());
    /// ```
    pub fn is_open(self) -> bool {
        !matches!(self, ProcessorState::Closed)
    }

    /// `true` while a `process` call is in flight.
    pub fn is_busy(self) -> bool {
        matches!(self, ProcessorState::Filtering)
    }

    /// Short label for logs.
    pub fn label(self) -> &'static str {
        match self {
            ProcessorState::Closed => "closed",
            ProcessorState::Opened => "opened",
            ProcessorState::Filtering => "filtering",
        }
    }
}

impl std::fmt::Display for ProcessorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_closed() {
        assert_eq!(ProcessorState::default(), ProcessorState::Closed);
    }

    #[test]
    fn only_filtering_is_busy() {
        assert!(!ProcessorState::Closed.is_busy());
        assert!(!ProcessorState::Opened.is_busy());
        assert!(ProcessorState::Filtering.is_busy());
    }

    #[test]
    fn labels() {
        assert_eq!(ProcessorState::Closed.label(), "closed");
        assert_eq!(ProcessorState::Opened.to_string(), "opened");
        assert_eq!(ProcessorState::Filtering.label(), "filtering");
    }
}
