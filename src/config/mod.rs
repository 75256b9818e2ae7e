//! Configuration module.
//!
//! Provides [`FrontEndConfig`] (top-level settings), the per-subsystem
//! sections, host override parsing, `AppPaths` for platform directories, and
//! TOML persistence via `FrontEndConfig::load` / `FrontEndConfig::save`.

pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{
    ConfigError, EngineConfig, FrontEndConfig, ProcessorConfig, WakeWordConfig,
    DEFAULT_REFERENCE_DELAY,
};
