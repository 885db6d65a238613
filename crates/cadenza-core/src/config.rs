//! Engine configuration.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Largest slice a render core or the offline driver may request. Unmapped
/// channels of a slice this long fit the zero scratch at any sample width.
pub const MAX_FRAMES_LIMIT: u32 = 4096;

/// Configuration for the audio engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub sample_rate: f64,
    /// Passed to the render core before it starts.
    pub max_frames_per_slice: u32,
    /// Frames per slice when rendering offline.
    pub offline_slice_frames: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100.0,
            max_frames_per_slice: 4096,
            offline_slice_frames: 1024,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if !(8000.0..=384000.0).contains(&self.sample_rate) {
            return Err(Error::InvalidConfig(format!(
                "sample_rate {} out of range (8000-384000 Hz)",
                self.sample_rate
            )));
        }
        for (name, frames) in [
            ("max_frames_per_slice", self.max_frames_per_slice),
            ("offline_slice_frames", self.offline_slice_frames),
        ] {
            if frames == 0 || frames > MAX_FRAMES_LIMIT {
                return Err(Error::InvalidConfig(format!(
                    "{name} {frames} out of range (1-{MAX_FRAMES_LIMIT})"
                )));
            }
        }
        Ok(())
    }
}
