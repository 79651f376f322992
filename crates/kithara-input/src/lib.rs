//! # Kithara input streams
//!
//! Blocking byte streams fed by non-blocking backends.
//!
//! A backend (file, network share, HTTP, ...) implements [`InputBackend`]. It
//! runs entirely on one [`EventLoop`](kithara_platform::EventLoop) thread and
//! pushes bytes into a bounded ring buffer through [`Producer`] hooks. Any
//! number of consumer threads read from the same [`InputStream`] and block
//! until data, EOF or an error is available.
//!
//! ## Backpressure (Normative)
//!
//! The buffer never grows. When it is full the backend calls
//! [`Producer::pause`] and stops fetching. Once a consumer drained the buffer to
//! [`InputOptions::resume_at`] bytes or fewer, the stream schedules exactly one
//! [`InputBackend::do_resume`] on the loop.
//!
//! ## Errors (Normative)
//!
//! Backend failures are never returned on the loop thread. They are stored and
//! raised by the next consumer call, once. A failure that arrives while paused
//! is held back until the stream resumes, so the backend may recover in
//! `do_resume` (see [`Producer::take_held_error`]).
//!
//! ## EOF
//!
//! `read` returns `Ok(0)` only when the known size was reached, or the backend
//! called [`Producer::set_closed`] and the buffer is drained.
//!
//! ## Seeking
//!
//! Forward seeks inside the buffered window are served locally. Otherwise the
//! buffer is dropped and the seek is executed by the backend on the loop while
//! the caller waits. A seek issued while another one is still scheduled
//! replaces it.

#![forbid(unsafe_code)]

mod backend;
pub mod chunked;
mod error;
mod input;
mod options;
mod producer;
mod state;
mod tag;

pub use backend::InputBackend;
pub use chunked::{ChunkedBackend, ChunkedOptions, Connection, ConnectionError, FileConnection};
pub use error::{BoxError, InputError, InputResult};
pub use input::InputStream;
pub use options::{DEFAULT_BUFFER_SIZE, DEFAULT_RESUME_AT, InputOptions};
pub use producer::{Producer, ProducerHandle};
pub use tag::Tag;
