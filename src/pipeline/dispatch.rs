//! Slices one host period into native engine frames.
//!
//! # Per host call
//!
//! ```text
//! reference block ──enqueue──▶ DelayRingBuffer
//!
//! for each whole native frame i:
//!   ring ──dequeue ref_frame──▶ ref window ──decode──▶ ref planes ─┐
//!   mic[i·stride ..]           ──────────────decode──▶ mic planes ─┤
//!                                                                  ▼
//!                                                        Enhancer::process
//!                                                                  │ Some(frame)
//!                      out[cursor ..] ◀──encode────────────────────┤
//!                      Forwarder::exchange ◀───────────────────────┘
//!                          └─ offset ─▶ Enhancer::trigger_found + arm debounce
//!
//! leftover reference bytes of the period ──discard──▶ (alignment kept)
//! unwritten output slots ──▶ encoded silence
//! ```
//!
//! Everything touched inside [`FrameDispatcher::run`] is allocated up front
//! in [`FrameDispatcher::new`].

use crate::audio::{fill_silence, float_to_pcm, pcm_to_planar, DelayRingBuffer, PlanarBuffer, SampleFormat};
use crate::config::ProcessorConfig;
use crate::engine::{EngineConstants, EngineError, Enhancer};
use crate::wakeword::{Forwarder, TriggerState};

// ---------------------------------------------------------------------------
// DispatchStats
// ---------------------------------------------------------------------------

/// Counters for one host call.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchStats {
    /// Native frames handed to the engine.
    pub frames: usize,
    /// Output frames the engine produced.
    pub emitted: usize,
    /// Output frames that did not fit in the output buffer.
    pub dropped: usize,
    /// Reference reads that found the delay buffer short.
    pub underflows: usize,
    /// Keyword offsets passed on to the engine.
    pub triggers: usize,
}

// ---------------------------------------------------------------------------
// FrameDispatcher
// ---------------------------------------------------------------------------

/// Per-session frame loop state: strides, scratch planes and the trigger
/// debounce.
#[derive(Debug)]
pub struct FrameDispatcher {
    format: SampleFormat,
    constants: EngineConstants,
    frames_per_period: usize,

    mic_frame_bytes: usize,
    ref_frame_bytes: usize,
    out_frame_bytes: usize,
    period_ref_bytes: usize,

    mic: PlanarBuffer,
    reference: PlanarBuffer,
    ref_window: Vec<u8>,

    trigger: TriggerState,
}

impl FrameDispatcher {
    /// Check the engine strides against the period and allocate scratch.
    ///
    /// Fails when a period cannot hold one native frame, or when the whole
    /// frames of a period would read more reference than a period supplies.
    pub fn new(
        config: &ProcessorConfig,
        constants: EngineConstants,
        debounce_secs: f32,
    ) -> Result<Self, EngineError> {
        let EngineConstants {
            mic_frame_size,
            ref_frame_size,
            out_frame_size,
            ..
        } = constants;

        if mic_frame_size == 0 || ref_frame_size == 0 || out_frame_size == 0 {
            return Err(EngineError::Unsupported(format!(
                "zero native frame size (mic {mic_frame_size}, ref {ref_frame_size}, out {out_frame_size})"
            )));
        }
        let frames_per_period = config.period_size / mic_frame_size;
        if frames_per_period == 0 {
            return Err(EngineError::Unsupported(format!(
                "native frame of {mic_frame_size} samples does not fit a period of {}",
                config.period_size
            )));
        }
        if frames_per_period * ref_frame_size > config.period_size {
            return Err(EngineError::Unsupported(format!(
                "{frames_per_period} reference frames of {ref_frame_size} samples exceed a period of {}",
                config.period_size
            )));
        }

        let leftover = config.period_size % mic_frame_size;
        if leftover != 0 {
            log::warn!(
                "dispatch: period {} is not a multiple of frame {}; last {} samples of every period are skipped",
                config.period_size,
                mic_frame_size,
                leftover
            );
        }

        let width = config.sample_width();
        Ok(Self {
            format: config.sample_format,
            constants,
            frames_per_period,
            mic_frame_bytes: mic_frame_size * config.input_channels * width,
            ref_frame_bytes: ref_frame_size * config.reference_channels * width,
            out_frame_bytes: out_frame_size * width,
            period_ref_bytes: config.reference_block_bytes(),
            mic: PlanarBuffer::new(config.input_channels, mic_frame_size),
            reference: PlanarBuffer::new(config.reference_channels, ref_frame_size),
            ref_window: vec![0; ref_frame_size * config.reference_channels * width],
            trigger: TriggerState::new(debounce_secs, constants.output_frame_rate()),
        })
    }

    pub fn constants(&self) -> EngineConstants {
        self.constants
    }

    /// Whole native frames run per host call.
    pub fn frames_per_period(&self) -> usize {
        self.frames_per_period
    }

    pub fn trigger(&self) -> &TriggerState {
        &self.trigger
    }

    /// Run one host period.
    ///
    /// The three blocks must already have been size-checked against the
    /// session configuration.  On an engine failure the reference bytes of
    /// the frames not yet run are discarded, the rest of `out` is silenced,
    /// and the error is returned.
    pub fn run(
        &mut self,
        mic: &[u8],
        reference: &[u8],
        out: &mut [u8],
        delay: &mut DelayRingBuffer,
        engine: &mut dyn Enhancer,
        mut forwarder: Option<&mut Forwarder>,
    ) -> Result<DispatchStats, EngineError> {
        let iteration = self.trigger.next_iteration();
        let mut stats = DispatchStats::default();

        if let Err(e) = delay.enqueue(reference) {
            log::warn!("delay: {e}; reference block dropped");
        }

        let mut ref_consumed = 0;
        let mut out_cursor = 0;

        for mic_frame in mic.chunks_exact(self.mic_frame_bytes).take(self.frames_per_period) {
            let trigger_enabled = self.trigger.begin_frame();

            if let Err(e) = delay.dequeue(&mut self.ref_window) {
                log::warn!("delay: {e}; engine gets silent reference");
                stats.underflows += 1;
            }
            ref_consumed += self.ref_frame_bytes;

            pcm_to_planar(mic_frame, self.format, &mut self.mic);
            pcm_to_planar(&self.ref_window, self.format, &mut self.reference);
            stats.frames += 1;

            let offset = match engine.process(&self.mic, &self.reference) {
                Err(e) => {
                    delay.discard(self.period_ref_bytes.saturating_sub(ref_consumed));
                    fill_silence(self.format, &mut out[out_cursor..]);
                    log::error!(
                        "dispatch: engine failed on frame {} of {}: {e}",
                        stats.frames,
                        self.frames_per_period
                    );
                    return Err(e);
                }
                Ok(None) => None,
                Ok(Some(frame)) => {
                    stats.emitted += 1;
                    let end = out_cursor + self.out_frame_bytes;
                    if end <= out.len() {
                        float_to_pcm(frame, self.format, &mut out[out_cursor..end]);
                        out_cursor = end;
                    } else {
                        stats.dropped += 1;
                        log::warn!("dispatch: output buffer full; frame {} dropped", stats.frames);
                    }
                    match forwarder.as_deref_mut() {
                        Some(fwd) => fwd.exchange(frame, iteration, trigger_enabled),
                        None => None,
                    }
                }
            };

            if let Some(offset) = offset {
                if trigger_enabled {
                    engine.trigger_found(offset);
                    self.trigger.arm();
                    stats.triggers += 1;
                    log::info!("dispatch: keyword at offset {offset} (iteration {iteration})");
                } else {
                    log::debug!(
                        "dispatch: keyword at offset {offset} ignored, {} frames of debounce left",
                        self.trigger.remaining()
                    );
                }
            }
        }

        delay.discard(self.period_ref_bytes.saturating_sub(ref_consumed));
        fill_silence(self.format, &mut out[out_cursor..]);
        Ok(stats)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
