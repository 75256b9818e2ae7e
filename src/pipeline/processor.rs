//! The processor a host drives: `open`, `process` once per period, `close`.
//!
//! [`SignalProcessor`] owns the enhancement engine, the optional wake-word
//! [`Forwarder`], and, while open, a [`Session`] holding everything sized
//! from the negotiated configuration (delay buffer, dispatcher scratch).
//! Closing drops the session, so a later `open` always starts from zeroed
//! buffers and a freshly configured engine.
//!
//! Hosts that load the front end as a plugin go through
//! [`create_processor`], which returns the [`AudioProcessor`] capability
//! trait object.

use std::collections::HashMap;
use std::time::Duration;

use crate::audio::{DelayRingBuffer, SampleFormat};
use crate::config::{FrontEndConfig, ProcessorConfig, WakeWordConfig};
use crate::engine::{EngineSetup, Enhancer, PassthroughEnhancer};
use crate::wakeword::{DatagramLink, Forwarder, WakeWordLink};

use super::dispatch::{DispatchStats, FrameDispatcher};
use super::error::{BufferKind, ProcessorError};
use super::state::ProcessorState;

/// Offset waits never take more than this share of one native frame's
/// wall-clock time.
const OFFSET_WAIT_FRACTION: f64 = 1.0 / 8.0;

// ---------------------------------------------------------------------------
// AudioProcessor trait
// ---------------------------------------------------------------------------

/// Capability interface seen by the audio host.
pub trait AudioProcessor: Send {
    /// Allocate buffers and configure the engine.  `settings` are string
    /// overrides on top of the built-in configuration.
    fn open(&mut self, settings: Option<&HashMap<String, String>>) -> Result<(), ProcessorError>;

    /// Release everything `open` allocated.
    fn close(&mut self) -> Result<(), ProcessorError>;

    /// Process one period.
    fn process(&mut self, mic: &[u8], reference: &[u8], out: &mut [u8]) -> Result<(), ProcessorError>;

    fn sample_rate(&self) -> u32;
    fn sample_format(&self) -> SampleFormat;
    fn period_size(&self) -> usize;
    fn input_channels(&self) -> usize;
    fn reference_channels(&self) -> usize;

    /// `major << 24 | minor << 16 | patch`.
    fn version_number(&self) -> u32;

    /// Defaults and accepted override values as JSON.
    fn config_description(&self) -> serde_json::Value;

    fn state(&self) -> ProcessorState;
}

// Compile-time assertion: Box<dyn AudioProcessor> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn AudioProcessor>) {}
};

/// Build the processor described by `config`: the passthrough engine, plus
/// the datagram wake-word link when enabled.
///
/// A link that cannot be bound is logged and left out; the processor still
/// works without wake-word forwarding.
pub fn create_processor(config: &FrontEndConfig) -> Box<dyn AudioProcessor> {
    let engine = Box::new(PassthroughEnhancer::new(config.engine.frame_size));
    let mut processor = SignalProcessor::new(config.processor.clone(), engine);

    if config.wake_word.enabled {
        match DatagramLink::bind(&config.wake_word.socket_dir) {
            Ok(link) => processor = processor.with_wake_word(Box::new(link), &config.wake_word),
            Err(e) => log::warn!("processor: wake-word forwarding disabled: {e}"),
        }
    }
    Box::new(processor)
}

// ---------------------------------------------------------------------------
// SignalProcessor
// ---------------------------------------------------------------------------

/// Buffers that only exist while the processor is open.
#[derive(Debug)]
struct Session {
    config: ProcessorConfig,
    delay: DelayRingBuffer,
    dispatcher: FrameDispatcher,
}

/// Frame orchestration around one enhancement engine.
pub struct SignalProcessor {
    /// Configuration used when `open` gets no overrides, and reported by the
    /// accessors while closed.
    base: ProcessorConfig,
    engine: Box<dyn Enhancer>,
    forwarder: Option<Forwarder>,
    debounce_secs: f32,
    offset_timeout: Duration,
    state: ProcessorState,
    session: Option<Session>,
}

impl SignalProcessor {
    pub fn new(base: ProcessorConfig, engine: Box<dyn Enhancer>) -> Self {
        let wake_word = WakeWordConfig::default();
        Self {
            base,
            engine,
            forwarder: None,
            debounce_secs: wake_word.debounce_secs,
            offset_timeout: Duration::from_millis(wake_word.offset_timeout_ms),
            state: ProcessorState::Closed,
            session: None,
        }
    }

    /// Forward every output frame through `link`.
    pub fn with_wake_word(mut self, link: Box<dyn WakeWordLink>, settings: &WakeWordConfig) -> Self {
        self.debounce_secs = settings.debounce_secs;
        self.offset_timeout = Duration::from_millis(settings.offset_timeout_ms);
        self.forwarder = Some(Forwarder::new(link, self.offset_timeout));
        self
    }

    /// Configuration in effect: the negotiated one while open, the base one
    /// otherwise.
    pub fn config(&self) -> &ProcessorConfig {
        self.session.as_ref().map_or(&self.base, |s| &s.config)
    }

    fn check_size(buffer: BufferKind, expected: usize, actual: usize) -> Result<(), ProcessorError> {
        if expected != actual {
            return Err(ProcessorError::BufferSizeMismatch {
                buffer,
                expected,
                actual,
            });
        }
        Ok(())
    }

    fn log_stats(&self, stats: &DispatchStats) {
        if stats.dropped > 0 || stats.underflows > 0 {
            log::debug!(
                "processor: {} frames, {} emitted, {} dropped, {} underflows",
                stats.frames,
                stats.emitted,
                stats.dropped,
                stats.underflows
            );
        }
    }
}

impl AudioProcessor for SignalProcessor {
    fn open(&mut self, settings: Option<&HashMap<String, String>>) -> Result<(), ProcessorError> {
        if self.state.is_open() {
            return Err(ProcessorError::AlreadyOpen);
        }

        let config = match settings {
            Some(settings) => self.base.with_overrides(settings)?,
            None => {
                self.base.validate()?;
                self.base.clone()
            }
        };

        let constants = self.engine.configure(&EngineSetup {
            sample_rate: config.sample_rate,
            mic_channels: config.input_channels,
            reference_channels: config.reference_channels,
            output_channel: config.channel2output,
        })?;
        let dispatcher = FrameDispatcher::new(&config, constants, self.debounce_secs)?;
        let delay = DelayRingBuffer::for_reference(
            config.reference_delay_samples,
            config.period_size,
            config.reference_channels,
            config.sample_width(),
        );

        if let Some(forwarder) = self.forwarder.as_mut() {
            let frame_secs = constants.mic_frame_size as f64 / config.sample_rate as f64;
            let bound = Duration::from_secs_f64(frame_secs * OFFSET_WAIT_FRACTION);
            let timeout = self.offset_timeout.min(bound);
            if timeout < self.offset_timeout {
                log::info!(
                    "processor: offset wait clamped to {} µs to fit the frame time",
                    timeout.as_micros()
                );
            }
            forwarder.set_timeout(timeout);
        }

        log::info!(
            "processor: opened {} @ {} Hz, period {}, {} mics / {} refs, engine {} ({} frames of {} per period), delay {} samples",
            config.sample_format,
            config.sample_rate,
            config.period_size,
            config.input_channels,
            config.reference_channels,
            self.engine.name(),
            dispatcher.frames_per_period(),
            constants.mic_frame_size,
            config.reference_delay_samples
        );

        self.session = Some(Session {
            config,
            delay,
            dispatcher,
        });
        self.state = ProcessorState::Opened;
        Ok(())
    }

    fn close(&mut self) -> Result<(), ProcessorError> {
        if self.state.is_busy() {
            return Err(ProcessorError::Busy);
        }
        if !self.state.is_open() {
            return Err(ProcessorError::NotOpen);
        }
        self.session = None;
        self.state = ProcessorState::Closed;
        log::info!("processor: closed");
        Ok(())
    }

    fn process(&mut self, mic: &[u8], reference: &[u8], out: &mut [u8]) -> Result<(), ProcessorError> {
        if self.state.is_busy() {
            return Err(ProcessorError::Busy);
        }
        if !self.state.is_open() {
            return Err(ProcessorError::NotOpen);
        }
        let Some(session) = self.session.as_mut() else {
            return Err(ProcessorError::NotOpen);
        };

        let config = &session.config;
        Self::check_size(BufferKind::Microphone, config.mic_block_bytes(), mic.len())?;
        Self::check_size(BufferKind::Reference, config.reference_block_bytes(), reference.len())?;
        Self::check_size(BufferKind::Output, config.output_block_bytes(), out.len())?;

        self.state = ProcessorState::Filtering;
        let result = session.dispatcher.run(
            mic,
            reference,
            out,
            &mut session.delay,
            self.engine.as_mut(),
            self.forwarder.as_mut(),
        );
        self.state = ProcessorState::Opened;

        let stats = result?;
        self.log_stats(&stats);
        Ok(())
    }

    fn sample_rate(&self) -> u32 {
        self.config().sample_rate
    }

    fn sample_format(&self) -> SampleFormat {
        self.config().sample_format
    }

    fn period_size(&self) -> usize {
        self.config().period_size
    }

    fn input_channels(&self) -> usize {
        self.config().input_channels
    }

    fn reference_channels(&self) -> usize {
        self.config().reference_channels
    }

    fn version_number(&self) -> u32 {
        let part = |s: &str| s.parse::<u32>().unwrap_or(0) & 0xFF;
        part(env!("CARGO_PKG_VERSION_MAJOR")) << 24
            | part(env!("CARGO_PKG_VERSION_MINOR")) << 16
            | part(env!("CARGO_PKG_VERSION_PATCH"))
    }

    fn config_description(&self) -> serde_json::Value {
        self.base.description()
    }

    fn state(&self) -> ProcessorState {
        self.state
    }
}

impl std::fmt::Debug for SignalProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalProcessor")
            .field("engine", &self.engine.name())
            .field("state", &self.state)
            .field("config", self.config())
            .field("forwarder", &self.forwarder)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::panic::{catch_unwind, AssertUnwindSafe};

    use super::*;
    use crate::engine::{EngineError, MockEnhancer};
    use crate::wakeword::MockLink;

    fn default_processor() -> SignalProcessor {
        SignalProcessor::new(ProcessorConfig::default(), Box::new(PassthroughEnhancer::new(200)))
    }

    /// S16_LE, period 8, 2 mics, 1 reference, 4 samples of delay.
    fn small_config() -> ProcessorConfig {
        ProcessorConfig {
            sample_format: SampleFormat::S16Le,
            period_size: 8,
            input_channels: 2,
            reference_channels: 1,
            reference_delay_samples: 4,
            ..ProcessorConfig::default()
        }
    }

    fn blocks(config: &ProcessorConfig) -> (Vec<u8>, Vec<u8>, Vec<u8>) {
        (
            vec![0; config.mic_block_bytes()],
            vec![0; config.reference_block_bytes()],
            vec![0; config.output_block_bytes()],
        )
    }

    fn occupancy(p: &SignalProcessor) -> (usize, usize, usize) {
        let delay = &p.session.as_ref().expect("open").delay;
        (delay.len(), delay.head(), delay.tail())
    }

    fn samples(out: &[u8]) -> Vec<i16> {
        out.chunks_exact(2).map(|c| i16::from_le_bytes([c[0], c[1]])).collect()
    }

    // ---- Default scenario --------------------------------------------------

    #[test]
    fn default_period_processes_silence() {
        let mut p = default_processor();
        p.open(None).unwrap();

        let mic = vec![0u8; 12_800];
        let reference = vec![0u8; 6_400];
        let mut out = vec![0u8; 3_200];
        p.process(&mic, &reference, &mut out).unwrap();

        assert_eq!(out.len(), 3_200);
        assert!(out.iter().all(|&b| b == 0));
        assert_eq!(p.state(), ProcessorState::Opened);
    }

    #[test]
    fn short_mic_block_is_rejected_without_side_effects() {
        let mut p = default_processor();
        p.open(None).unwrap();
        let before = occupancy(&p);

        let mic = vec![0u8; 12_799];
        let reference = vec![0u8; 6_400];
        let mut out = vec![0u8; 3_200];
        let err = p.process(&mic, &reference, &mut out).unwrap_err();

        assert!(matches!(
            err,
            ProcessorError::BufferSizeMismatch {
                buffer: BufferKind::Microphone,
                expected: 12_800,
                actual: 12_799
            }
        ));
        assert_eq!(err.code(), -1);
        assert_eq!(occupancy(&p), before);
        assert_eq!(p.state(), ProcessorState::Opened);
    }

    #[test]
    fn reference_and_output_mismatches_have_their_own_codes() {
        let mut p = default_processor();
        p.open(None).unwrap();
        let mic = vec![0u8; 12_800];

        let err = p.process(&mic, &[0u8; 6_000], &mut [0u8; 3_200]).unwrap_err();
        assert_eq!(err.code(), -2);
        let err = p.process(&mic, &[0u8; 6_400], &mut [0u8; 100]).unwrap_err();
        assert_eq!(err.code(), -3);
    }

    #[test]
    fn passthrough_forwards_selected_channel() {
        let config = ProcessorConfig {
            reference_delay_samples: 0,
            channel2output: 1,
            ..small_config()
        };
        let mut p = SignalProcessor::new(config.clone(), Box::new(PassthroughEnhancer::new(4)));
        p.open(None).unwrap();

        let (_, reference, mut out) = blocks(&config);
        // Interleaved: channel 0 = 100, channel 1 = -200.
        let mic: Vec<u8> = (0..8)
            .flat_map(|_| [100i16.to_le_bytes(), (-200i16).to_le_bytes()])
            .flatten()
            .collect();
        p.process(&mic, &reference, &mut out).unwrap();
        assert_eq!(samples(&out), vec![-200; 8]);
    }

    // ---- Lifecycle ---------------------------------------------------------

    #[test]
    fn process_before_open_is_not_open() {
        let mut p = default_processor();
        let err = p.process(&[], &[], &mut []).unwrap_err();
        assert!(matches!(err, ProcessorError::NotOpen));
    }

    #[test]
    fn double_open_is_rejected() {
        let mut p = default_processor();
        p.open(None).unwrap();
        assert!(matches!(p.open(None), Err(ProcessorError::AlreadyOpen)));
        assert_eq!(p.state(), ProcessorState::Opened);
    }

    #[test]
    fn close_requires_open() {
        let mut p = default_processor();
        assert!(matches!(p.close(), Err(ProcessorError::NotOpen)));
        p.open(None).unwrap();
        p.close().unwrap();
        assert_eq!(p.state(), ProcessorState::Closed);
    }

    #[test]
    fn reopen_starts_from_zeroed_buffers() {
        let config = small_config();
        let mut engine = MockEnhancer::new(2, 2, 2);
        engine.echo_reference = true;
        let mut p = SignalProcessor::new(config.clone(), Box::new(engine));
        p.open(None).unwrap();
        let fresh = occupancy(&p);

        let (mic, _, mut out) = blocks(&config);
        let reference: Vec<u8> = std::iter::repeat(0x4000i16.to_le_bytes()).take(8).flatten().collect();
        p.process(&mic, &reference, &mut out).unwrap();
        p.process(&mic, &reference, &mut out).unwrap();
        assert_eq!(samples(&out), vec![16_384; 8]);

        p.close().unwrap();
        p.open(None).unwrap();
        assert_eq!(occupancy(&p), fresh);

        p.process(&mic, &reference, &mut out).unwrap();
        assert_eq!(samples(&out), vec![0, 0, 0, 0, 16_384, 16_384, 16_384, 16_384]);
    }

    #[test]
    fn first_delay_samples_are_silent() {
        let config = ProcessorConfig {
            reference_delay_samples: 6,
            ..small_config()
        };
        let mut engine = MockEnhancer::new(2, 2, 2);
        engine.echo_reference = true;
        let mut p = SignalProcessor::new(config.clone(), Box::new(engine));
        p.open(None).unwrap();

        let (mic, _, mut out) = blocks(&config);
        let reference: Vec<u8> = std::iter::repeat(0x4000i16.to_le_bytes()).take(8).flatten().collect();
        p.process(&mic, &reference, &mut out).unwrap();
        // Six samples of silence, then the reference arrives.
        assert_eq!(samples(&out), vec![0, 0, 0, 0, 0, 0, 16_384, 16_384]);
    }

    // ---- Configuration -----------------------------------------------------

    #[test]
    fn overrides_change_negotiated_layout() {
        let mut p = default_processor();
        let settings: HashMap<String, String> = [
            ("sample_format", "S16_LE"),
            ("period_size", "400"),
            ("input_channels", "2"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        p.open(Some(&settings)).unwrap();

        assert_eq!(p.sample_format(), SampleFormat::S16Le);
        assert_eq!(p.period_size(), 400);
        assert_eq!(p.input_channels(), 2);
        assert_eq!(p.reference_channels(), 2);

        let mut out = vec![0u8; 800];
        p.process(&[0u8; 1_600], &[0u8; 1_600], &mut out).unwrap();
    }

    #[test]
    fn invalid_override_keeps_processor_closed() {
        let mut p = default_processor();
        let settings = HashMap::from([("channel2output".to_string(), "4".to_string())]);
        let err = p.open(Some(&settings)).unwrap_err();
        assert!(matches!(err, ProcessorError::InvalidConfiguration(_)));
        assert_eq!(p.state(), ProcessorState::Closed);
        assert!(p.session.is_none());
    }

    #[test]
    fn close_resets_to_base_configuration() {
        let mut p = default_processor();
        let settings = HashMap::from([("period_size".to_string(), "400".to_string())]);
        p.open(Some(&settings)).unwrap();
        assert_eq!(p.period_size(), 400);
        p.close().unwrap();
        assert_eq!(p.period_size(), 800);
        assert_eq!(p.sample_rate(), 16_000);
    }

    #[test]
    fn engine_frame_larger_than_period_fails_open() {
        let mut p = default_processor();
        let settings = HashMap::from([("period_size".to_string(), "100".to_string())]);
        let err = p.open(Some(&settings)).unwrap_err();
        assert!(matches!(err, ProcessorError::Engine(EngineError::Unsupported(_))));
        assert_eq!(p.state(), ProcessorState::Closed);
    }

    #[test]
    fn version_is_one_zero_zero() {
        assert_eq!(default_processor().version_number(), 1 << 24);
    }

    #[test]
    fn description_comes_from_base_config() {
        let desc = default_processor().config_description();
        assert_eq!(desc["default_config"]["input_channels"], 4);
    }

    // ---- Failure paths -----------------------------------------------------

    #[test]
    fn engine_failure_reverts_to_opened() {
        let config = small_config();
        let mut engine = MockEnhancer::new(2, 2, 2);
        engine.fail_at = Some(0);
        let mut p = SignalProcessor::new(config.clone(), Box::new(engine));
        p.open(None).unwrap();
        let before = occupancy(&p);

        let (mic, reference, mut out) = blocks(&config);
        let err = p.process(&mic, &reference, &mut out).unwrap_err();
        assert!(matches!(err, ProcessorError::Engine(EngineError::Status(-7))));
        assert_eq!(p.state(), ProcessorState::Opened);
        assert_eq!(occupancy(&p).0, before.0);

        p.process(&mic, &reference, &mut out).unwrap();
    }

    #[test]
    fn interrupted_call_leaves_processor_busy() {
        let config = small_config();
        let mut engine = MockEnhancer::new(2, 2, 2);
        engine.panic_at = Some(0);
        let mut p = SignalProcessor::new(config.clone(), Box::new(engine));
        p.open(None).unwrap();

        let (mic, reference, mut out) = blocks(&config);
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            let _ = p.process(&mic, &reference, &mut out);
        }));
        assert!(outcome.is_err());

        assert_eq!(p.state(), ProcessorState::Filtering);
        assert!(matches!(p.close(), Err(ProcessorError::Busy)));
        assert!(matches!(p.process(&mic, &reference, &mut out), Err(ProcessorError::Busy)));
        assert!(matches!(p.open(None), Err(ProcessorError::AlreadyOpen)));
    }

    // ---- Wake-word ---------------------------------------------------------

    #[test]
    fn offset_wait_is_clamped_to_frame_time() {
        let settings = WakeWordConfig {
            offset_timeout_ms: 2,
            ..WakeWordConfig::default()
        };
        let mut p = default_processor().with_wake_word(Box::new(MockLink::default()), &settings);
        p.open(None).unwrap();

        // 200 samples at 16 kHz = 12.5 ms per frame; one eighth of that.
        let nanos = p.forwarder.as_ref().unwrap().timeout().as_nanos();
        assert!((1_562_499..=1_562_501).contains(&nanos), "{nanos}");
    }

    #[test]
    fn keyword_offsets_reach_engine_with_debounce() {
        let config = ProcessorConfig {
            reference_delay_samples: 0,
            ..small_config()
        };
        // 8000 output frames/s; 0.5 ms => 4 frames of debounce.
        let settings = WakeWordConfig {
            debounce_secs: 0.0005,
            ..WakeWordConfig::default()
        };
        let link = MockLink {
            default_offset: Some(3),
            ..Default::default()
        };
        let mut p = SignalProcessor::new(config.clone(), Box::new(MockEnhancer::new(2, 2, 2)))
            .with_wake_word(Box::new(link), &settings);
        p.open(None).unwrap();

        let (mic, reference, mut out) = blocks(&config);
        p.process(&mic, &reference, &mut out).unwrap();
        let trigger = p.session.as_ref().unwrap().dispatcher.trigger();
        assert_eq!(trigger.iteration(), 1);
        assert_eq!(trigger.remaining(), 1);
    }

    #[test]
    fn factory_without_wake_word_builds_closed_processor() {
        let mut config = FrontEndConfig::default();
        config.wake_word.enabled = false;
        let mut p = create_processor(&config);
        assert_eq!(p.state(), ProcessorState::Closed);
        p.open(None).unwrap();
        assert_eq!(p.period_size(), 800);
    }

    #[test]
    fn factory_binds_wake_word_link_in_socket_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = FrontEndConfig::default();
        config.wake_word.socket_dir = dir.path().to_path_buf();
        let mut p = create_processor(&config);
        assert!(dir.path().join(crate::wakeword::link::OFFSET_CHANNEL).exists());

        // No wake-word process listening: frames are still produced.
        p.open(None).unwrap();
        let mut out = vec![0u8; 3_200];
        p.process(&[0u8; 12_800], &[0u8; 6_400], &mut out).unwrap();
    }
}
