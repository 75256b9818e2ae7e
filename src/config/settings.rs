//! Front-end settings, host overrides and TOML persistence.
//!
//! [`FrontEndConfig`] is resolved once at start-up (file or defaults) and
//! handed to the processor as an immutable value.  At `open` time a host may
//! layer string overrides on top of [`ProcessorConfig`] through
//! [`ProcessorConfig::with_overrides`]; every key is parsed and range-checked
//! before anything is allocated.

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::AppPaths;
use crate::audio::SampleFormat;

// ---------------------------------------------------------------------------
// Limits
// ---------------------------------------------------------------------------

/// Inclusive bounds accepted for `period_size` overrides.
pub const PERIOD_SIZE_RANGE: (usize, usize) = (1, 4096);
/// Inclusive bounds accepted for `input_channels` overrides.
pub const INPUT_CHANNELS_RANGE: (usize, usize) = (1, 1024);
/// Inclusive bounds accepted for `ref_channels` overrides.
pub const REFERENCE_CHANNELS_RANGE: (usize, usize) = (1, 64);

/// Reference delay applied when nothing else is configured, in samples.
pub const DEFAULT_REFERENCE_DELAY: usize = 3211;

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// A setting was malformed or out of range.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("unknown sample format {0:?}")]
    UnknownSampleFormat(String),

    #[error("{key}: {value:?} is not an integer")]
    NotAnInteger { key: &'static str, value: String },

    #[error("{key}: {value} outside {min}..={max}")]
    OutOfRange {
        key: &'static str,
        value: usize,
        min: usize,
        max: usize,
    },

    #[error("channel2output {channel} must be below input_channels {input_channels}")]
    OutputChannel {
        channel: usize,
        input_channels: usize,
    },

    #[error("sample_rate must be positive")]
    ZeroSampleRate,
}

// ---------------------------------------------------------------------------
// ProcessorConfig
// ---------------------------------------------------------------------------

/// Stream layout negotiated with the audio backend.
///
/// Immutable while the processor is open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Encoding of every host buffer (mic, reference and output).
    pub sample_format: SampleFormat,
    /// Frames per host call.
    pub period_size: usize,
    /// Microphone channels interleaved in the mic block.
    pub input_channels: usize,
    /// Loudspeaker reference channels interleaved in the reference block.
    pub reference_channels: usize,
    /// Microphone channel the engine should favour for its single output.
    pub channel2output: usize,
    /// Samples the reference is delayed by before it reaches the engine.
    pub reference_delay_samples: usize,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            sample_format: SampleFormat::S32Le,
            period_size: 800,
            input_channels: 4,
            reference_channels: 2,
            channel2output: 0,
            reference_delay_samples: DEFAULT_REFERENCE_DELAY,
        }
    }
}

impl ProcessorConfig {
    /// Bytes per sample of [`sample_format`](Self::sample_format).
    pub fn sample_width(&self) -> usize {
        self.sample_format.width()
    }

    /// Expected size of the interleaved mic block.
    pub fn mic_block_bytes(&self) -> usize {
        self.input_channels * self.period_size * self.sample_width()
    }

    /// Expected size of the interleaved reference block.
    pub fn reference_block_bytes(&self) -> usize {
        self.reference_channels * self.period_size * self.sample_width()
    }

    /// Expected size of the single-channel output block.
    pub fn output_block_bytes(&self) -> usize {
        self.period_size * self.sample_width()
    }

    /// Wall-clock duration of one period, in seconds.
    pub fn period_secs(&self) -> f64 {
        self.period_size as f64 / self.sample_rate.max(1) as f64
    }

    /// Check ranges and cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_rate == 0 {
            return Err(ConfigError::ZeroSampleRate);
        }
        check_range("period_size", self.period_size, PERIOD_SIZE_RANGE)?;
        check_range("input_channels", self.input_channels, INPUT_CHANNELS_RANGE)?;
        check_range("ref_channels", self.reference_channels, REFERENCE_CHANNELS_RANGE)?;
        if self.channel2output >= self.input_channels {
            return Err(ConfigError::OutputChannel {
                channel: self.channel2output,
                input_channels: self.input_channels,
            });
        }
        Ok(())
    }

    /// Return a copy with host string overrides applied, then validated.
    ///
    /// Recognised keys: `sample_format`, `period_size`, `input_channels`,
    /// `ref_channels`, `channel2output`.  Unknown keys are logged and
    /// ignored.  `self` is never modified, so a failed override leaves the
    /// caller's configuration intact.
    pub fn with_overrides(&self, settings: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let mut cfg = self.clone();

        for (key, value) in settings {
            match key.as_str() {
                "sample_format" => {
                    cfg.sample_format = value
                        .parse()
                        .map_err(|_| ConfigError::UnknownSampleFormat(value.clone()))?;
                }
                "period_size" => cfg.period_size = parse_int("period_size", value)?,
                "input_channels" => cfg.input_channels = parse_int("input_channels", value)?,
                "ref_channels" => cfg.reference_channels = parse_int("ref_channels", value)?,
                "channel2output" => cfg.channel2output = parse_int("channel2output", value)?,
                other => log::warn!("config: ignoring unknown setting {other:?}"),
            }
        }

        cfg.validate()?;
        Ok(cfg)
    }

    /// JSON document describing the defaults and the accepted override
    /// values, for hosts that build their settings UI dynamically.
    pub fn description(&self) -> serde_json::Value {
        let formats: Vec<&str> = SampleFormat::ALL.iter().map(|f| f.name()).collect();
        serde_json::json!({
            "default_config": {
                "sample_rate": self.sample_rate,
                "sample_format": self.sample_format.name(),
                "period_size": self.period_size,
                "input_channels": self.input_channels,
                "ref_channels": self.reference_channels,
                "channel2output": self.channel2output,
            },
            "valid_options": {
                "sample_format": ["string", "enum", formats],
                "period_size": ["int", "range", PERIOD_SIZE_RANGE.0, PERIOD_SIZE_RANGE.1],
                "input_channels": ["int", "range", INPUT_CHANNELS_RANGE.0, INPUT_CHANNELS_RANGE.1],
                "ref_channels": ["int", "range", REFERENCE_CHANNELS_RANGE.0, REFERENCE_CHANNELS_RANGE.1],
                "channel2output": ["int", "range", 0, "input_channels_max"],
            }
        })
    }
}

fn parse_int(key: &'static str, value: &str) -> Result<usize, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::NotAnInteger {
        key,
        value: value.to_string(),
    })
}

fn check_range(key: &'static str, value: usize, (min, max): (usize, usize)) -> Result<(), ConfigError> {
    if value < min || value > max {
        return Err(ConfigError::OutOfRange { key, value, min, max });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// EngineConfig
// ---------------------------------------------------------------------------

/// Settings for the built-in passthrough enhancement engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Native frame size in samples, used for input and output.
    pub frame_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { frame_size: 200 }
    }
}

// ---------------------------------------------------------------------------
// WakeWordConfig
// ---------------------------------------------------------------------------

/// Settings for forwarding enhanced audio to the wake-word process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WakeWordConfig {
    /// Forward every output frame and consume keyword offsets.
    pub enabled: bool,
    /// Directory holding the four datagram sockets shared with the
    /// wake-word process.
    pub socket_dir: PathBuf,
    /// Seconds during which re-triggering stays disabled after a keyword.
    pub debounce_secs: f32,
    /// Upper bound on the wait for a keyword offset, per output frame.
    pub offset_timeout_ms: u64,
}

impl Default for WakeWordConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            socket_dir: AppPaths::new().runtime_dir,
            debounce_secs: 1.5,
            offset_timeout_ms: 2,
        }
    }
}

// ---------------------------------------------------------------------------
// FrontEndConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level configuration, read from `afe.toml`.
///
/// # Loading
///
/// ```rust,no_run
/// use afe_pipeline::config::FrontEndConfig;
///
/// // Returns Default when the file is missing.
/// let config = FrontEndConfig::load().unwrap();
/// assert!(config.processor.validate().is_ok());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrontEndConfig {
    pub processor: ProcessorConfig,
    pub engine: EngineConfig,
    pub wake_word: WakeWordConfig,
}

impl FrontEndConfig {
    /// Load from the platform-appropriate `afe.toml`.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path.  A missing file yields the defaults.
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
