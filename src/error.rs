//! Error kinds raised by the DSP stages.
//!
//! Every stage fails fast: there is no recovery path, the caller aborts the
//! current participant/stimulus and the batch binaries surface the error with
//! context attached through `anyhow`.
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    /// Malformed or missing signal (non-mono audio, empty corpus, out-of-range
    /// sample window, unknown channel name).
    #[error("input error: {0}")]
    Input(String),

    /// Invalid parameters (frequency ranges, polarity, spectrum limits,
    /// filter family).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Presentation order does not map one-to-one onto the EEG trials.
    #[error("alignment error: {0}")]
    Alignment(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn input(msg: impl Into<String>) -> Self {
        Error::Input(msg.into())
    }

    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Error::Configuration(msg.into())
    }

    pub(crate) fn alignment(msg: impl Into<String>) -> Self {
        Error::Alignment(msg.into())
    }
}
