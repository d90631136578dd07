use std::error::Error;
use std::fmt;

/// The reason a decode request ended without producing its chunk.
///
/// Delivered through a request's `on_reject` callback, exclusively with
/// `on_decode_all`.
#[derive(Debug)]
pub enum DecodeError {
    /// The request was superseded by a newer `request_decode`. Non-fatal;
    /// clients typically ignore it.
    Outdated,
    /// The decode worker failed. The session was aborted and nothing was
    /// admitted to the cache. The decoder stays usable.
    Worker(WorkerError),
}

impl DecodeError {
    /// Whether this is the supersession signal rather than a real
    /// decode failure.
    pub fn is_outdated(&self) -> bool {
        matches!(self, DecodeError::Outdated)
    }
}

impl Error for DecodeError {}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Outdated => write!(f, "request superseded by a newer request"),
            DecodeError::Worker(e) => write!(f, "decode worker failed: {}", e),
        }
    }
}

/// An error reported by a codec or archive worker.
#[derive(Debug, Clone)]
pub struct WorkerError {
    message: String,
}

impl WorkerError {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        WorkerError {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Error for WorkerError {}

impl fmt::Display for WorkerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// A misuse of `request_decode`, reported synchronously before any state
/// changes.
#[derive(Debug, PartialEq, Eq)]
pub enum RequestError {
    /// The frame number list was empty.
    EmptyFrameNumbers,
    /// The frame numbers were not strictly ascending. `index` is the
    /// position of the first offending entry.
    UnorderedFrameNumbers { index: usize },
    /// The decoder has been closed.
    Closed,
}

impl Error for RequestError {}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestError::EmptyFrameNumbers => {
                write!(f, "a decode request needs at least one frame number")
            }
            RequestError::UnorderedFrameNumbers { index } => {
                write!(
                    f,
                    "frame numbers must be strictly ascending (violated at index {})",
                    index
                )
            }
            RequestError::Closed => write!(f, "the decoder is closed"),
        }
    }
}
