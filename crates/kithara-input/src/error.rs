use std::io;

use thiserror::Error;

/// Opaque error produced by a backend or its connection.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type used by `kithara-input`.
pub type InputResult<T> = Result<T, InputError>;

/// Errors surfaced to stream consumers.
///
/// Notes:
/// - `Backend` wraps whatever the backend failed with. It is created on the loop
///   thread, stored, and delivered once on the consumer side.
/// - Contract violations (buffer overflow, overlapping seeks, hooks off the loop
///   thread) are not represented here: they panic.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("backend error: {0}")]
    Backend(#[source] BoxError),

    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("stream is not ready")]
    NotReady,

    #[error("stream is not seekable")]
    NotSeekable,

    #[error("seek requires known length, but stream length is unknown")]
    UnknownLength,

    #[error("invalid seek position")]
    InvalidSeek,

    #[error("stream closed")]
    Closed,

    #[error("invalid options: {0}")]
    InvalidOptions(String),
}

impl InputError {
    pub fn backend(error: impl Into<BoxError>) -> Self {
        Self::Backend(error.into())
    }
}

impl From<InputError> for io::Error {
    fn from(err: InputError) -> Self {
        match err {
            InputError::Io(e) => e,
            InputError::NotSeekable | InputError::UnknownLength => {
                Self::new(io::ErrorKind::Unsupported, err)
            }
            InputError::InvalidSeek => Self::new(io::ErrorKind::InvalidInput, err),
            InputError::Closed => Self::new(io::ErrorKind::BrokenPipe, err),
            other => Self::other(other),
        }
    }
}
