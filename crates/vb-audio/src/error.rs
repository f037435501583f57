//! Channel and stream error types

use thiserror::Error;
use vb_dsp::DspError;

/// Failures from opening or controlling a device stream
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StreamError {
    #[error("Input device selection does not resolve to a device")]
    BadInputDevice,

    #[error("Output device selection does not resolve to a device")]
    BadOutputDevice,

    #[error("Backend error {code}: {message}")]
    Backend { code: i32, message: String },

    #[error("Stream already running")]
    AlreadyRunning,
}

impl StreamError {
    /// Numeric status code; `0` is reserved for success
    pub fn code(&self) -> i32 {
        match self {
            Self::BadInputDevice => -1,
            Self::BadOutputDevice => -2,
            Self::Backend { code, .. } => *code,
            Self::AlreadyRunning => -3,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChannelError {
    #[error("Channel id {id} out of range (capacity {capacity})")]
    InvalidId { id: usize, capacity: usize },

    #[error("Channel {0} not found")]
    NotFound(usize),

    #[error("Channel slot {0} already occupied")]
    SlotOccupied(usize),

    #[error("Invalid channel configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Dsp(#[from] DspError),

    #[error(transparent)]
    Stream(#[from] StreamError),
}

pub type ChannelResult<T> = Result<T, ChannelError>;
