//! Per-frame exchange with the wake-word process, degrading on failure.
//!
//! A missing or slow wake-word process must never stall or abort the audio
//! path.  [`Forwarder::exchange`] therefore turns every [`SignalingError`]
//! into "no keyword this frame" and logs failures rate-limited: the first
//! one of a streak, then one line every [`SIGNALING_LOG_EVERY`] failures.

use std::time::Duration;

use super::link::{SignalingError, WakeWordLink};

/// Failures between two repeated warnings.
pub const SIGNALING_LOG_EVERY: u64 = 1000;

/// Drives one send-then-receive exchange per output frame.
pub struct Forwarder {
    link: Box<dyn WakeWordLink>,
    timeout: Duration,
    /// Consecutive failed exchanges.
    failure_streak: u64,
}

impl Forwarder {
    /// `timeout` bounds the offset wait of every exchange.
    pub fn new(link: Box<dyn WakeWordLink>, timeout: Duration) -> Self {
        Self {
            link,
            timeout,
            failure_streak: 0,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    pub fn failure_streak(&self) -> u64 {
        self.failure_streak
    }

    /// Send `frame` and return a keyword offset if one was reported.
    ///
    /// Returns `None` for "no keyword", a receive timeout, or any transport
    /// failure.
    pub fn exchange(&mut self, frame: &[f32], iteration: i32, trigger_enabled: bool) -> Option<i32> {
        match self.try_exchange(frame, iteration, trigger_enabled) {
            Ok(offset) => {
                if self.failure_streak > 0 {
                    log::info!(
                        "wakeword: link recovered after {} failed frames",
                        self.failure_streak
                    );
                    self.failure_streak = 0;
                }
                offset.filter(|&o| o != 0)
            }
            Err(e) => {
                self.record_failure(&e);
                None
            }
        }
    }

    fn try_exchange(
        &mut self,
        frame: &[f32],
        iteration: i32,
        trigger_enabled: bool,
    ) -> Result<Option<i32>, SignalingError> {
        self.link.send_frame(frame, iteration, trigger_enabled)?;
        self.link.receive_offset(self.timeout)
    }

    fn record_failure(&mut self, e: &SignalingError) {
        if self.failure_streak % SIGNALING_LOG_EVERY == 0 {
            log::warn!(
                "wakeword: skipping forward ({e}); {} consecutive failures",
                self.failure_streak + 1
            );
        }
        self.failure_streak += 1;
    }
}

impl std::fmt::Debug for Forwarder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Forwarder")
            .field("timeout", &self.timeout)
            .field("failure_streak", &self.failure_streak)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wakeword::MockLink;

    fn forwarder(link: MockLink) -> Forwarder {
        Forwarder::new(Box::new(link), Duration::from_millis(1))
    }

    #[test]
    fn zero_offset_means_no_keyword() {
        let mut link = MockLink::default();
        link.offsets.extend([0, 64]);
        let mut fwd = forwarder(link);

        assert_eq!(fwd.exchange(&[0.0; 4], 1, true), None);
        assert_eq!(fwd.exchange(&[0.0; 4], 1, true), Some(64));
        assert_eq!(fwd.exchange(&[0.0; 4], 1, true), None); // timeout
    }

    #[test]
    fn send_failure_degrades_to_none_and_counts() {
        let link = MockLink {
            fail_sends: true,
            default_offset: Some(10),
            ..Default::default()
        };
        let mut fwd = forwarder(link);

        for _ in 0..3 {
            assert_eq!(fwd.exchange(&[0.0; 2], 1, true), None);
        }
        assert_eq!(fwd.failure_streak(), 3);
    }
}
