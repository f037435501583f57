//! DSP error types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DspError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Resampler error: {0}")]
    Resampler(String),

    #[error("Mixer input {index} out of range ({inputs} inputs)")]
    InputOutOfRange { index: usize, inputs: usize },
}

pub type DspResult<T> = Result<T, DspError>;
