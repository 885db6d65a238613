//! Builder for configuring and constructing an [`Engine`].

use std::path::Path;

use cadenza_core::{Engine, EngineConfig};

use crate::Result;

/// Values set explicitly on the builder override those loaded from a
/// config file, whatever the call order.
///
/// # Example
///
/// ```ignore
/// use cadenza::prelude::*;
///
/// let engine = EngineBuilder::default()
///     .config_file("cadenza.toml")?
///     .max_frames_per_slice(512)
///     .build()?;
/// ```
#[derive(Debug, Default)]
pub struct EngineBuilder {
    base: EngineConfig,
    sample_rate: Option<f64>,
    max_frames_per_slice: Option<u32>,
    offline_slice_frames: Option<u32>,
}

impl EngineBuilder {
    /// Default: 44100
    pub fn sample_rate(mut self, sample_rate: f64) -> Self {
        self.sample_rate = Some(sample_rate);
        self
    }

    /// Default: 4096
    pub fn max_frames_per_slice(mut self, frames: u32) -> Self {
        self.max_frames_per_slice = Some(frames);
        self
    }

    /// Default: 1024
    pub fn offline_slice_frames(mut self, frames: u32) -> Self {
        self.offline_slice_frames = Some(frames);
        self
    }

    /// Replaces the base configuration.
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.base = config;
        self
    }

    /// Parses a TOML configuration. Missing keys keep their defaults.
    pub fn config_str(mut self, toml_str: &str) -> Result<Self> {
        self.base = toml::from_str(toml_str)?;
        Ok(self)
    }

    /// Reads a TOML configuration file.
    pub fn config_file(self, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        tracing::debug!(path = %path.display(), "loading engine config");
        self.config_str(&content)
    }

    /// The configuration `build` would use.
    pub fn resolved_config(&self) -> EngineConfig {
        let mut config = self.base.clone();
        if let Some(sample_rate) = self.sample_rate {
            config.sample_rate = sample_rate;
        }
        if let Some(frames) = self.max_frames_per_slice {
            config.max_frames_per_slice = frames;
        }
        if let Some(frames) = self.offline_slice_frames {
            config.offline_slice_frames = frames;
        }
        config
    }

    pub fn build(self) -> Result<Engine> {
        let config = self.resolved_config();
        let engine = Engine::new(config)?;
        tracing::debug!(config = ?engine.config(), "engine built");
        Ok(engine)
    }
}
