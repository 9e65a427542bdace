//! Error types
//!
//! Errors surfaced by relay construction and by frame sources.

/// Error type for relay operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Throttle delay could not be coerced to a non-negative millisecond count
    InvalidDelay(String),
    /// The producer stopped before it broadcast a first frame
    ProducerStopped,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidDelay(raw) => write!(f, "Invalid delay: {:?}", raw),
            Error::ProducerStopped => {
                write!(f, "Producer stopped before broadcasting a frame")
            }
        }
    }
}

impl std::error::Error for Error {}

/// Result alias for relay operations
pub type Result<T> = std::result::Result<T, Error>;

/// Failure reported by a frame source while producing frames
///
/// The producer treats this like the end of the sequence: it is logged and
/// the producer stops. It never reaches consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceError {
    message: String,
}

impl SourceError {
    /// Create a new source error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Frame source error: {}", self.message)
    }
}

impl std::error::Error for SourceError {}
