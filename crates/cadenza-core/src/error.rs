//! Error types for cadenza-core.

use thiserror::Error;

/// Error type for cadenza-core operations.
///
/// Only control-thread operations return these. The render path never
/// propagates an error; it skips the offending sub-render instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Out of range: {what} {index} (limit {limit})")]
    OutOfRange {
        what: &'static str,
        index: u64,
        limit: u64,
    },

    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("Invalid buffer: region {region} holds {frames} frames, expected {expected}")]
    InvalidBuffer {
        region: usize,
        frames: u32,
        expected: u32,
    },

    #[error("Bus {bus} out of range (bus count {count})")]
    BusOutOfRange { bus: u32, count: u32 },

    #[error("Bus {bus} is already occupied")]
    BusOccupied { bus: u32 },

    #[error("Connection not found")]
    ConnectionNotFound,

    #[error("Engine is already running")]
    AlreadyRunning,

    #[error("Scratch overflow: {needed} bytes requested, capacity {capacity}")]
    Overflow { needed: usize, capacity: usize },

    #[error("Render core failed to start")]
    StartFailed,

    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

impl Error {
    pub(crate) fn out_of_range(what: &'static str, index: impl Into<u64>, limit: impl Into<u64>) -> Self {
        Error::OutOfRange {
            what,
            index: index.into(),
            limit: limit.into(),
        }
    }
}

/// Result type alias.
pub type Result<T> = core::result::Result<T, Error>;
