//! Re-trigger debounce and the per-call iteration counter.
//!
//! After a keyword is reported the wake-word process is told to stop
//! triggering for a while, so one utterance cannot fire twice.  The window
//! is counted in native frames: `debounce_secs × output_frame_rate`.

/// Debounce countdown plus the iteration counter shipped with every frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerState {
    /// Frames left before triggering is allowed again; `<= 0` means allowed.
    disable_trigger_frames: i64,
    /// Length of a freshly armed window, in native frames.
    debounce_frames: i64,
    /// Host calls since open.  Wraps like the 32-bit field it is sent as.
    iteration: i32,
}

impl TriggerState {
    /// `debounce_secs × output_frame_rate`, rounded to whole frames.
    pub fn new(debounce_secs: f32, output_frame_rate: f32) -> Self {
        let frames = (debounce_secs.max(0.0) * output_frame_rate.max(0.0)).round() as i64;
        Self {
            disable_trigger_frames: 0,
            debounce_frames: frames,
            iteration: 0,
        }
    }

    /// Count one host call and return the new iteration number.
    pub fn next_iteration(&mut self) -> i32 {
        self.iteration = self.iteration.wrapping_add(1);
        self.iteration
    }

    pub fn iteration(&self) -> i32 {
        self.iteration
    }

    /// Start a native frame: report whether triggering is enabled for it and
    /// tick the countdown.
    pub fn begin_frame(&mut self) -> bool {
        let enabled = self.disable_trigger_frames <= 0;
        if !enabled {
            self.disable_trigger_frames -= 1;
        }
        enabled
    }

    /// A keyword was accepted: disable triggering for the next
    /// `debounce_frames` native frames.
    pub fn arm(&mut self) {
        self.disable_trigger_frames = self.debounce_frames;
    }

    /// Frames left in the current debounce window.
    pub fn remaining(&self) -> i64 {
        self.disable_trigger_frames.max(0)
    }

    pub fn debounce_frames(&self) -> i64 {
        self.debounce_frames
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_is_seconds_times_frame_rate() {
        // 1.5 s at 80 output frames/s (16 kHz / 200).
        let t = TriggerState::new(1.5, 80.0);
        assert_eq!(t.debounce_frames(), 120);
    }

    #[test]
    fn enabled_until_armed() {
        let mut t = TriggerState::new(1.0, 10.0);
        for _ in 0..50 {
            assert!(t.begin_frame());
        }
        assert_eq!(t.remaining(), 0);
    }

    #[test]
    fn armed_window_disables_exactly_debounce_frames() {
        let mut t = TriggerState::new(0.5, 10.0); // 5 frames
        assert!(t.begin_frame());
        t.arm();

        let disabled = (0..20).take_while(|_| !t.begin_frame()).count();
        assert_eq!(disabled, 5);
        assert!(t.begin_frame());
    }

    #[test]
    fn rearming_restarts_the_window() {
        let mut t = TriggerState::new(0.3, 10.0); // 3 frames
        t.arm();
        assert!(!t.begin_frame());
        t.arm();
        assert_eq!(t.remaining(), 3);
    }

    #[test]
    fn zero_debounce_never_disables() {
        let mut t = TriggerState::new(0.0, 80.0);
        t.arm();
        assert!(t.begin_frame());
    }

    #[test]
    fn iteration_counts_and_wraps() {
        let mut t = TriggerState::new(1.0, 1.0);
        assert_eq!(t.next_iteration(), 1);
        assert_eq!(t.next_iteration(), 2);

        t.iteration = i32::MAX;
        assert_eq!(t.next_iteration(), i32::MIN);
    }
}
