//! Enhancement engine capability trait and the built-in passthrough engine.
//!
//! # Overview
//!
//! [`Enhancer`] is the seam between the frame orchestration and whatever
//! does the actual beamforming / echo cancellation / noise suppression.  The
//! processor owns it as a `Box<dyn Enhancer>` and drives it one native frame
//! at a time.
//!
//! [`PassthroughEnhancer`] forwards the selected microphone channel
//! unchanged.  It keeps the pipeline runnable end to end when no vendor
//! engine is linked in.
//!
//! [`MockEnhancer`] (available under `#[cfg(test)]`) records calls and can
//! be scripted to withhold output, fail, or panic.

use thiserror::Error;

use crate::audio::PlanarBuffer;

// ---------------------------------------------------------------------------
// EngineError
// ---------------------------------------------------------------------------

/// Failures reported by an enhancement engine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// The engine rejected the stream layout at configure time.
    #[error("engine rejected configuration: {0}")]
    Unsupported(String),

    /// The per-frame processing call returned a non-success status.
    #[error("engine processing failed with status {0}")]
    Status(i32),
}

// ---------------------------------------------------------------------------
// Setup / constants
// ---------------------------------------------------------------------------

/// Stream layout handed to [`Enhancer::configure`] on every open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSetup {
    pub sample_rate: u32,
    pub mic_channels: usize,
    pub reference_channels: usize,
    /// Preferred microphone channel for the single output.
    pub output_channel: usize,
}

/// Native strides reported back by the engine.
///
/// Mic and reference strides are reported separately; the dispatcher never
/// assumes they match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConstants {
    pub sample_rate: u32,
    /// Samples per mic channel consumed by one `process` call.
    pub mic_frame_size: usize,
    /// Samples per reference channel consumed by one `process` call.
    pub ref_frame_size: usize,
    /// Samples in one output frame.
    pub out_frame_size: usize,
}

impl EngineConstants {
    /// Output frames per second.
    pub fn output_frame_rate(&self) -> f32 {
        self.sample_rate as f32 / self.out_frame_size.max(1) as f32
    }
}

// ---------------------------------------------------------------------------
// Enhancer trait
// ---------------------------------------------------------------------------

/// An acoustic enhancement engine driven one native frame at a time.
///
/// # Contract
///
/// - `configure` is called on every processor open and must leave the
///   engine in a fresh state for the given layout.
/// - `process` receives `mic` with `mic_channels × mic_frame_size` samples
///   and `reference` with `reference_channels × ref_frame_size` samples.
///   It returns `Ok(None)` while it is still buffering, or exactly one
///   frame of `out_frame_size` samples.  The returned slice is only valid
///   until the next call.
/// - `trigger_found` reports a keyword starting `offset` samples into the
///   most recent output frame.
pub trait Enhancer: Send {
    fn configure(&mut self, setup: &EngineSetup) -> Result<EngineConstants, EngineError>;

    fn process(
        &mut self,
        mic: &PlanarBuffer,
        reference: &PlanarBuffer,
    ) -> Result<Option<&[f32]>, EngineError>;

    fn trigger_found(&mut self, offset: i32);

    /// Short identifier for logs.
    fn name(&self) -> &str;
}

// Compile-time assertion: Box<dyn Enhancer> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn Enhancer>) {}
};

// ---------------------------------------------------------------------------
// PassthroughEnhancer
// ---------------------------------------------------------------------------

/// Copies the configured output channel straight to the output frame.
///
/// ```rust
/// use afe_pipeline::audio::PlanarBuffer;
/// use afe_pipeline::engine::{Enhancer, EngineSetup, PassthroughEnhancer};
///
/// let mut engine = PassthroughEnhancer::new(4);
/// let constants = engine
///     .configure(&EngineSetup {
///         sample_rate: 16_000,
///         mic_channels: 2,
///         reference_channels: 1,
///         output_channel: 1,
///     })
///     .unwrap();
/// assert_eq!(constants.out_frame_size, 4);
///
/// let mut mic = PlanarBuffer::new(2, 4);
/// mic.channel_mut(1).fill(0.25);
/// let reference = PlanarBuffer::new(1, 4);
/// let out = engine.process(&mic, &reference).unwrap().unwrap();
/// assert_eq!(out, &[0.25; 4]);
/// ```
#[derive(Debug)]
pub struct PassthroughEnhancer {
    frame_size: usize,
    output_channel: usize,
    out: Vec<f32>,
    triggers: u64,
}

impl PassthroughEnhancer {
    pub fn new(frame_size: usize) -> Self {
        Self {
            frame_size,
            output_channel: 0,
            out: vec![0.0; frame_size],
            triggers: 0,
        }
    }

    /// Keyword notifications received since the last configure.
    pub fn triggers(&self) -> u64 {
        self.triggers
    }
}

impl Enhancer for PassthroughEnhancer {
    fn configure(&mut self, setup: &EngineSetup) -> Result<EngineConstants, EngineError> {
        if self.frame_size == 0 {
            return Err(EngineError::Unsupported("frame size must be positive".into()));
        }
        if setup.output_channel >= setup.mic_channels {
            return Err(EngineError::Unsupported(format!(
                "output channel {} not among {} mics",
                setup.output_channel, setup.mic_channels
            )));
        }
        self.output_channel = setup.output_channel;
        self.out.fill(0.0);
        self.triggers = 0;

        Ok(EngineConstants {
            sample_rate: setup.sample_rate,
            mic_frame_size: self.frame_size,
            ref_frame_size: self.frame_size,
            out_frame_size: self.frame_size,
        })
    }

    fn process(
        &mut self,
        mic: &PlanarBuffer,
        _reference: &PlanarBuffer,
    ) -> Result<Option<&[f32]>, EngineError> {
        self.out.copy_from_slice(mic.channel(self.output_channel));
        Ok(Some(&self.out))
    }

    fn trigger_found(&mut self, offset: i32) {
        self.triggers += 1;
        log::info!("engine: keyword reported at offset {offset}");
    }

    fn name(&self) -> &str {
        "passthrough"
    }
}

// ---------------------------------------------------------------------------
// MockEnhancer  (test-only)
// ---------------------------------------------------------------------------

/// Scripted test double.
///
/// Emits `value` as every output sample, optionally skipping the first
/// `warmup` frames, failing on frame `fail_at`, or panicking on frame
/// `panic_at` (frames counted from 0 since the last configure).
#[cfg(test)]
#[derive(Debug, Clone)]
pub struct MockEnhancer {
    pub constants: EngineConstants,
    pub value: f32,
    /// Emit the mean of the first reference channel instead of `value`.
    pub echo_reference: bool,
    pub warmup: usize,
    pub fail_at: Option<usize>,
    pub panic_at: Option<usize>,
    pub frames: usize,
    pub configures: usize,
    pub triggers: Vec<i32>,
    pub reference_log: Vec<f32>,
    out: Vec<f32>,
}

#[cfg(test)]
impl MockEnhancer {
    pub fn new(mic_frame_size: usize, ref_frame_size: usize, out_frame_size: usize) -> Self {
        Self {
            constants: EngineConstants {
                sample_rate: 16_000,
                mic_frame_size,
                ref_frame_size,
                out_frame_size,
            },
            value: 0.0,
            echo_reference: false,
            warmup: 0,
            fail_at: None,
            panic_at: None,
            frames: 0,
            configures: 0,
            triggers: Vec::new(),
            reference_log: Vec::new(),
            out: vec![0.0; out_frame_size],
        }
    }
}

#[cfg(test)]
impl Enhancer for MockEnhancer {
    fn configure(&mut self, setup: &EngineSetup) -> Result<EngineConstants, EngineError> {
        self.configures += 1;
        self.frames = 0;
        self.triggers.clear();
        self.reference_log.clear();
        self.constants.sample_rate = setup.sample_rate;
        Ok(self.constants)
    }

    fn process(
        &mut self,
        mic: &PlanarBuffer,
        reference: &PlanarBuffer,
    ) -> Result<Option<&[f32]>, EngineError> {
        assert_eq!(mic.frames(), self.constants.mic_frame_size);
        assert_eq!(reference.frames(), self.constants.ref_frame_size);

        let frame = self.frames;
        self.frames += 1;
        if self.panic_at == Some(frame) {
            panic!("mock engine panic at frame {frame}");
        }
        if self.fail_at == Some(frame) {
            return Err(EngineError::Status(-7));
        }

        let ref_mean = reference.channel(0).iter().sum::<f32>() / reference.frames().max(1) as f32;
        self.reference_log.push(ref_mean);

        if frame < self.warmup {
            return Ok(None);
        }
        let v = if self.echo_reference { ref_mean } else { self.value };
        self.out.fill(v);
        Ok(Some(&self.out))
    }

    fn trigger_found(&mut self, offset: i32) {
        self.triggers.push(offset);
    }

    fn name(&self) -> &str {
        "mock"
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
