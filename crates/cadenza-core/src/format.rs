//! PCM stream description.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// How a single sample is stored in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleRepresentation {
    #[default]
    Float32,
    Float64,
    Int16,
    /// Signed 8.24 fixed point stored in an `i32`.
    Fixed824,
}

impl SampleRepresentation {
    /// Size of one sample in bytes.
    #[inline]
    pub const fn byte_count(self) -> usize {
        match self {
            SampleRepresentation::Float32 | SampleRepresentation::Fixed824 => 4,
            SampleRepresentation::Float64 => 8,
            SampleRepresentation::Int16 => 2,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            SampleRepresentation::Float32 => "float32",
            SampleRepresentation::Float64 => "float64",
            SampleRepresentation::Int16 => "int16",
            SampleRepresentation::Fixed824 => "fixed8.24",
        }
    }
}

impl fmt::Display for SampleRepresentation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Immutable description of a PCM stream shape.
///
/// Two formats are equal only when every field is equal, including the
/// sample rate. Connections compare formats this way at render time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Format {
    sample_rate: f64,
    channel_count: u32,
    representation: SampleRepresentation,
    interleaved: bool,
}

impl Format {
    pub fn new(
        sample_rate: f64,
        channel_count: u32,
        representation: SampleRepresentation,
        interleaved: bool,
    ) -> Result<Self> {
        if !(sample_rate > 0.0) || !sample_rate.is_finite() {
            return Err(Error::InvalidArgument(format!(
                "sample_rate must be positive, got {sample_rate}"
            )));
        }
        if channel_count == 0 {
            return Err(Error::InvalidArgument(
                "channel_count must be at least 1".into(),
            ));
        }
        Ok(Self {
            sample_rate,
            channel_count,
            representation,
            interleaved,
        })
    }

    /// Non-interleaved float32, the format nodes exchange by default.
    pub fn standard(sample_rate: f64, channel_count: u32) -> Result<Self> {
        Self::new(sample_rate, channel_count, SampleRepresentation::Float32, false)
    }

    #[inline]
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    #[inline]
    pub fn channel_count(&self) -> u32 {
        self.channel_count
    }

    #[inline]
    pub fn representation(&self) -> SampleRepresentation {
        self.representation
    }

    #[inline]
    pub fn is_interleaved(&self) -> bool {
        self.interleaved
    }

    /// Number of separate memory regions a buffer of this format holds.
    #[inline]
    pub fn buffer_count(&self) -> u32 {
        if self.interleaved {
            1
        } else {
            self.channel_count
        }
    }

    /// Samples between two consecutive frames of one channel.
    #[inline]
    pub fn stride(&self) -> u32 {
        if self.interleaved {
            self.channel_count
        } else {
            1
        }
    }

    #[inline]
    pub fn bytes_per_sample(&self) -> usize {
        self.representation.byte_count()
    }

    /// Bytes one frame occupies inside a single buffer region.
    #[inline]
    pub fn bytes_per_frame(&self) -> usize {
        self.bytes_per_sample() * self.stride() as usize
    }

    /// Returns a copy with a different channel count.
    pub fn with_channel_count(&self, channel_count: u32) -> Result<Self> {
        Self::new(
            self.sample_rate,
            channel_count,
            self.representation,
            self.interleaved,
        )
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} Hz, {} ch, {}, {}",
            self.sample_rate,
            self.channel_count,
            self.representation,
            if self.interleaved {
                "interleaved"
            } else {
                "non-interleaved"
            }
        )
    }
}
