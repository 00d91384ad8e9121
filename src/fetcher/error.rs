//! Error types for candidate fetching

use thiserror::Error;

/// Errors that can occur while fetching one candidate's observations
#[derive(Error, Debug)]
pub enum FetchError {
    /// HTTP request error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success status from the data source
    #[error("Server returned status {0}")]
    Status(u16),

    /// Response body could not be decoded
    #[error("Decoding error: {0}")]
    Decode(String),

    /// Fewer than two observations in the lookback window
    #[error("Insufficient data: {0} observations")]
    InsufficientData(usize),

    /// Malformed observation row
    #[error("Invalid observation: {0}")]
    InvalidObservation(String),

    /// No value column configured for the candidate's source
    #[error("No column configured for source '{0}'")]
    MissingColumn(String),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl FetchError {
    /// Whether repeating the same request could plausibly succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            Self::Status(code) => *code == 429 || *code >= 500,
            _ => false,
        }
    }
}
