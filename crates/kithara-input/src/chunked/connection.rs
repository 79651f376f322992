use std::io;

use bytes::Bytes;
use thiserror::Error;

use crate::InputError;

/// Errors reported by a [`Connection`].
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("connection io error: {0}")]
    Io(#[from] io::Error),

    #[error("connection is not open")]
    NotOpen,

    #[error("connection failed: {0}")]
    Other(String),
}

impl ConnectionError {
    pub fn other<S: Into<String>>(msg: S) -> Self {
        Self::Other(msg.into())
    }
}

impl From<ConnectionError> for InputError {
    fn from(err: ConnectionError) -> Self {
        Self::backend(err)
    }
}

/// Blocking random-access byte source.
///
/// Methods may block; [`ChunkedBackend`](super::ChunkedBackend) only calls
/// them from a [`ThreadPool`](kithara_platform::ThreadPool) thread, never from
/// the event loop.
pub trait Connection: Send + 'static {
    /// (Re)establish the connection and return the resource size.
    ///
    /// # Errors
    ///
    /// Returns error if the resource cannot be reached.
    fn open(&mut self) -> Result<u64, ConnectionError>;

    /// Read up to `len` bytes at `offset`. An empty result means end of data.
    ///
    /// # Errors
    ///
    /// Returns error if the read fails or the connection is not open.
    fn read_at(&mut self, offset: u64, len: usize) -> Result<Bytes, ConnectionError>;

    /// Release the connection. Reopening with [`open`](Self::open) is allowed.
    fn close(&mut self) {}
}
