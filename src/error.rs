use std::io::Error as IoError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] IoError),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("message length {0} overflows the 3-byte length field")]
    MessageTooLarge(u32),

    #[error("message exceeds {max} bytes, discard it")]
    OversizedMessage { max: u32 },

    #[error("command error: {0}")]
    Command(String),

    #[error("invalid server response data")]
    InvalidResponse,

    #[error("writer was cancelled")]
    Cancelled,

    #[error("packet queue saturated")]
    Saturated,

    #[error("{0} timed out")]
    Timeout(&'static str),

    #[error("invalid rtmp url: {0}")]
    InvalidUrl(String),
}

impl Error {
    /// Malformed wire data; the connection is doomed.
    pub fn protocol(msg: impl Into<String>) -> Self {
        Error::Protocol(msg.into())
    }

    /// Semantic failure of the command dialogue.
    pub fn command(msg: impl Into<String>) -> Self {
        Error::Command(msg.into())
    }

    pub fn invalid_url(msg: impl Into<String>) -> Self {
        Error::InvalidUrl(msg.into())
    }
}

/// Result type alias for the library.
pub type Result<T> = std::result::Result<T, Error>;
