//! Render timestamps.

/// Tolerance applied to sample positions when comparing [`Time`]s.
pub const SAMPLE_TIME_TOLERANCE: f64 = 0.0001;

const NANOS_PER_SECOND: f64 = 1_000_000_000.0;

/// Timestamp handed down through a render call.
///
/// Carries a host clock (nanoseconds), a sample clock paired with a sample
/// rate, or both. Sample positions may be fractional when a device reports
/// them that way.
#[derive(Debug, Clone, Copy)]
pub struct Time {
    host_time: Option<u64>,
    sample_position: Option<f64>,
    sample_rate: f64,
}

impl Time {
    pub fn new(host_time: u64, sample_time: i64, sample_rate: f64) -> Self {
        Self {
            host_time: Some(host_time),
            sample_position: Some(sample_time as f64),
            sample_rate,
        }
    }

    pub fn from_host_time(host_time: u64) -> Self {
        Self {
            host_time: Some(host_time),
            sample_position: None,
            sample_rate: 0.0,
        }
    }

    pub fn from_sample_time(sample_time: i64, sample_rate: f64) -> Self {
        Self::from_sample_position(sample_time as f64, sample_rate)
    }

    pub fn from_sample_position(sample_position: f64, sample_rate: f64) -> Self {
        Self {
            host_time: None,
            sample_position: Some(sample_position),
            sample_rate,
        }
    }

    pub(crate) fn from_parts(host_time: Option<u64>, sample_position: Option<f64>, sample_rate: f64) -> Self {
        Self {
            host_time,
            sample_position,
            sample_rate,
        }
    }

    #[inline]
    pub fn is_host_time_valid(&self) -> bool {
        self.host_time.is_some()
    }

    #[inline]
    pub fn is_sample_time_valid(&self) -> bool {
        self.sample_position.is_some()
    }

    #[inline]
    pub fn host_time(&self) -> Option<u64> {
        self.host_time
    }

    /// Sample clock rounded to the nearest frame.
    #[inline]
    pub fn sample_time(&self) -> Option<i64> {
        self.sample_position.map(|position| position.round() as i64)
    }

    #[inline]
    pub fn sample_position(&self) -> Option<f64> {
        self.sample_position
    }

    #[inline]
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Sample clock in seconds, when both the clock and rate are known.
    pub fn seconds(&self) -> Option<f64> {
        let position = self.sample_position?;
        (self.sample_rate > 0.0).then(|| position / self.sample_rate)
    }

    /// The time `frames` later on every valid clock.
    pub fn advanced_by(&self, frames: u32) -> Self {
        let host_time = self.host_time.map(|host| {
            if self.sample_rate > 0.0 {
                host + host_time_for_seconds(frames as f64 / self.sample_rate)
            } else {
                host
            }
        });
        Self {
            host_time,
            sample_position: self.sample_position.map(|position| position + frames as f64),
            sample_rate: self.sample_rate,
        }
    }
}

impl PartialEq for Time {
    fn eq(&self, other: &Self) -> bool {
        let samples_equal = match (self.sample_position, other.sample_position) {
            (Some(a), Some(b)) => (a - b).abs() <= SAMPLE_TIME_TOLERANCE,
            (None, None) => true,
            _ => false,
        };
        self.host_time == other.host_time && samples_equal && self.sample_rate == other.sample_rate
    }
}

/// Host clock ticks (nanoseconds) for a duration in seconds.
pub fn host_time_for_seconds(seconds: f64) -> u64 {
    (seconds * NANOS_PER_SECOND).round() as u64
}

pub fn seconds_for_host_time(host_time: u64) -> f64 {
    host_time as f64 / NANOS_PER_SECOND
}
