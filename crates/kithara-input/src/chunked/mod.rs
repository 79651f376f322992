//! Backend that fetches a [`Connection`] chunk by chunk.
//!
//! Each chunk is read on the [`ThreadPool`] and appended on the loop thread.
//! Reads are tagged with an epoch; a seek or close bumps it so completions of
//! abandoned reads are dropped instead of reaching the buffer.

mod connection;
mod file;

use std::sync::Arc;

use bytes::Bytes;
use kithara_platform::{LoopHandle, Mutex, ThreadPool};
use tracing::{debug, trace, warn};

pub use self::{
    connection::{Connection, ConnectionError},
    file::FileConnection,
};
use crate::{
    InputBackend, InputError, InputOptions, InputResult, InputStream, Producer, ProducerHandle,
};

/// Default bytes requested per read.
pub const DEFAULT_CHUNK_SIZE: usize = 32 * 1024;

/// Fetch configuration of a [`ChunkedBackend`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChunkedOptions {
    /// Upper bound of a single `read_at`.
    pub chunk_size: usize,
    /// Reopen the connection on resume when it failed while paused, instead
    /// of surfacing the error.
    pub reconnect_on_resume: bool,
}

impl Default for ChunkedOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            reconnect_on_resume: true,
        }
    }
}

impl ChunkedOptions {
    #[must_use]
    pub const fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    #[must_use]
    pub const fn with_reconnect_on_resume(mut self, reconnect: bool) -> Self {
        self.reconnect_on_resume = reconnect;
        self
    }

    /// # Errors
    ///
    /// Returns [`InputError::InvalidOptions`] for a zero chunk size.
    pub fn validate(&self) -> InputResult<()> {
        if self.chunk_size == 0 {
            return Err(InputError::InvalidOptions(
                "chunk_size must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// [`InputBackend`] over a blocking [`Connection`].
pub struct ChunkedBackend<C: Connection> {
    producer: ProducerHandle<Self>,
    pool: ThreadPool,
    connection: Arc<Mutex<C>>,
    options: ChunkedOptions,

    size: u64,
    /// Offset of the next byte to fetch (end of the buffered window).
    next_offset: u64,
    epoch: u64,
    in_flight: bool,
    /// The last open succeeded and no failure was reported since.
    connected: bool,
}

impl<C: Connection> ChunkedBackend<C> {
    pub fn new(
        producer: ProducerHandle<Self>,
        pool: ThreadPool,
        connection: C,
        options: ChunkedOptions,
    ) -> Self {
        Self {
            producer,
            pool,
            connection: Arc::new(Mutex::new(connection)),
            options,
            size: 0,
            next_offset: 0,
            epoch: 0,
            in_flight: false,
            connected: false,
        }
    }

    /// Create a stream over `connection` and start fetching.
    ///
    /// # Errors
    ///
    /// Returns [`InputError::InvalidOptions`] if either option set does not
    /// validate.
    pub fn open_stream(
        handle: LoopHandle,
        pool: ThreadPool,
        connection: C,
        input: &InputOptions,
        options: ChunkedOptions,
    ) -> InputResult<InputStream<Self>> {
        options.validate()?;
        let stream = InputStream::new(handle, input, |producer| {
            Self::new(producer, pool, connection, options)
        })?;
        stream.open();
        Ok(stream)
    }

    /// Report a failure detected outside of a read, e.g. a shared session
    /// that dropped. Abandons the read in flight.
    pub fn connection_failed(&mut self, producer: &mut Producer<'_>, error: ConnectionError) {
        self.invalidate();
        self.connected = false;
        self.fail(producer, error);
    }

    fn invalidate(&mut self) {
        self.epoch = self.epoch.wrapping_add(1);
        self.in_flight = false;
    }

    fn start_open(&mut self, reopen: bool) {
        let epoch = self.epoch;
        let connection = Arc::clone(&self.connection);
        let producer = self.producer.clone();
        self.in_flight = true;

        self.pool.spawn_then(
            self.producer.loop_handle(),
            move || {
                let mut conn = connection.lock();
                if reopen {
                    conn.close();
                }
                conn.open()
            },
            move |result| {
                producer.with(|backend, p| backend.on_open(p, epoch, result));
            },
        );
    }

    fn on_open(&mut self, p: &mut Producer<'_>, epoch: u64, result: Result<u64, ConnectionError>) {
        if epoch != self.epoch {
            trace!(epoch, "stale open dropped");
            return;
        }
        self.in_flight = false;

        match result {
            Ok(size) => {
                debug!(size, offset = self.next_offset, "connection open");
                self.size = size;
                self.connected = true;
                if !p.is_ready() {
                    p.set_size(Some(size));
                    p.set_seekable(true);
                    p.set_ready();
                }
                self.do_read(p);
            }
            Err(error) => self.fail(p, error),
        }
    }

    fn do_read(&mut self, p: &mut Producer<'_>) {
        if self.in_flight || !self.connected {
            return;
        }
        if self.next_offset >= self.size {
            p.set_closed();
            return;
        }

        let space = p.buffer_space();
        if space == 0 {
            p.pause();
            return;
        }

        let remaining = usize::try_from(self.size - self.next_offset).unwrap_or(usize::MAX);
        let len = remaining.min(self.options.chunk_size).min(space);
        let offset = self.next_offset;
        let epoch = self.epoch;
        let connection = Arc::clone(&self.connection);
        let producer = self.producer.clone();
        self.in_flight = true;
        trace!(offset, len, "read started");

        self.pool.spawn_then(
            self.producer.loop_handle(),
            move || connection.lock().read_at(offset, len),
            move |result| {
                producer.with(|backend, p| backend.on_read(p, epoch, len, result));
            },
        );
    }

    fn on_read(
        &mut self,
        p: &mut Producer<'_>,
        epoch: u64,
        len: usize,
        result: Result<Bytes, ConnectionError>,
    ) {
        if epoch != self.epoch {
            trace!(epoch, "stale read dropped");
            return;
        }
        self.in_flight = false;

        match result {
            Ok(mut data) => {
                if data.is_empty() {
                    debug!(offset = self.next_offset, "connection reported end of data");
                    p.set_closed();
                    return;
                }
                data.truncate(len.min(p.buffer_space()));
                self.next_offset += data.len() as u64;
                p.append_to_buffer(&data);
                self.do_read(p);
            }
            Err(error) => self.fail(p, error),
        }
    }

    fn fail(&mut self, p: &mut Producer<'_>, error: ConnectionError) {
        warn!(%error, offset = self.next_offset, "connection failed");
        p.postpone_error(error.into());
    }
}

impl<C: Connection> InputBackend for ChunkedBackend<C> {
    fn open(&mut self, _producer: &mut Producer<'_>) -> InputResult<()> {
        self.start_open(false);
        Ok(())
    }

    fn do_resume(&mut self, producer: &mut Producer<'_>) -> InputResult<()> {
        if self.options.reconnect_on_resume
            && let Some(error) = producer.take_held_error()
        {
            debug!(%error, offset = self.next_offset, "reconnecting");
            self.invalidate();
            self.start_open(true);
            return Ok(());
        }
        self.do_read(producer);
        Ok(())
    }

    fn do_seek(&mut self, producer: &mut Producer<'_>, offset: u64) -> InputResult<()> {
        self.invalidate();
        self.next_offset = offset;
        producer.seek_done();
        if self.connected {
            self.do_read(producer);
        } else {
            self.start_open(true);
        }
        Ok(())
    }

    fn close(&mut self) {
        self.invalidate();
        // a read in flight holds the lock; let the pool close after it
        if let Some(mut conn) = self.connection.try_lock() {
            conn.close();
        } else {
            let connection = Arc::clone(&self.connection);
            self.pool.spawn(move || connection.lock().close());
        }
        debug!(offset = self.next_offset, "backend closed");
    }
}
