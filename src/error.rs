// src/error.rs

use thiserror::Error;

/// Errors carried as values through the pipeline. A stage that receives one in
/// place of data surfaces it to its own caller instead of processing it.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed `RequestConfig`, detected before any I/O.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// Network or HTTP failure, preserving the transport's own error text.
    #[error("transport error fetching {url}: {message}")]
    Transport { url: String, message: String },

    /// Response body does not match the expected row/feature shape.
    #[error("decode error: {0}")]
    Decode(String),
}

impl Error {
    pub fn transport(url: impl Into<String>, message: impl ToString) -> Self {
        Error::Transport {
            url: url.into(),
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
