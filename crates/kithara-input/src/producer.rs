//! Backend-facing side of an input stream.

use std::{fmt, sync::Weak};

use kithara_platform::{Condvar, LoopHandle};
use tracing::{debug, trace};

use crate::{
    InputBackend, InputError, Tag,
    input::AsyncInput,
    state::{InputState, SeekState},
};

/// Producer hooks, valid while the stream lock is held on the loop thread.
///
/// Backends receive a `&mut Producer` in every [`InputBackend`] method and in
/// [`ProducerHandle::with`]. Hooks never block.
pub struct Producer<'a> {
    state: &'a mut InputState,
    cond: &'a Condvar,
}

impl<'a> Producer<'a> {
    pub(crate) fn new(state: &'a mut InputState, cond: &'a Condvar, handle: &LoopHandle) -> Self {
        assert!(
            handle.is_inside(),
            "producer hooks must run on the event loop thread"
        );
        Self { state, cond }
    }

    /// Wake consumers waiting for data, EOF, an error or a finished seek.
    pub fn notify_available(&self) {
        self.cond.notify_all();
    }

    #[must_use]
    pub const fn is_ready(&self) -> bool {
        self.state.ready
    }

    /// Publish size/seekability (set them first) and wake consumers.
    pub fn set_ready(&mut self) {
        if !self.state.ready {
            trace!(size = ?self.state.size, seekable = self.state.seekable, "stream ready");
            self.state.ready = true;
        }
        self.cond.notify_all();
    }

    pub const fn set_size(&mut self, size: Option<u64>) {
        self.state.size = size;
    }

    pub const fn set_seekable(&mut self, seekable: bool) {
        self.state.seekable = seekable;
    }

    pub fn set_mime_type(&mut self, mime_type: impl Into<String>) {
        self.state.mime_type = Some(mime_type.into());
    }

    /// Consumer read position.
    #[must_use]
    pub const fn offset(&self) -> u64 {
        self.state.offset
    }

    /// Override the consumer read position, e.g. when a seek landed elsewhere
    /// than requested.
    pub const fn set_offset(&mut self, offset: u64) {
        self.state.offset = offset;
    }

    #[must_use]
    pub fn buffer_space(&self) -> usize {
        self.state.buffer.space()
    }

    #[must_use]
    pub fn is_buffer_full(&self) -> bool {
        self.state.buffer.is_full()
    }

    #[must_use]
    pub fn is_buffer_empty(&self) -> bool {
        self.state.buffer.is_empty()
    }

    /// Contiguous free span for zero-copy writes; finish with
    /// [`commit_write`](Self::commit_write).
    pub fn prepare_write(&mut self) -> &mut [u8] {
        self.state.buffer.prepare_write()
    }

    /// # Panics
    ///
    /// Panics if `n` exceeds the span returned by `prepare_write`.
    pub fn commit_write(&mut self, n: usize) {
        self.state.buffer.commit_write(n);
        self.data_committed();
    }

    /// Copy `data` into the buffer.
    ///
    /// # Panics
    ///
    /// The caller must have checked [`buffer_space`](Self::buffer_space);
    /// appending more than fits panics.
    pub fn append_to_buffer(&mut self, data: &[u8]) {
        let space = self.state.buffer.space();
        assert!(
            data.len() <= space,
            "append of {} bytes exceeds buffer space of {space}",
            data.len()
        );
        self.state.buffer.write_from(data);
        self.data_committed();
    }

    fn data_committed(&mut self) {
        if self.state.ready {
            self.cond.notify_all();
        } else {
            self.set_ready();
        }
    }

    /// No more bytes will arrive. Consumers drain the buffer, then see EOF.
    pub fn set_closed(&mut self) {
        trace!(offset = self.state.offset, "producer closed");
        self.state.open = false;
        self.cond.notify_all();
    }

    /// Stash a metadata block for the next `read_tag`.
    pub fn set_tag(&mut self, tag: Tag) {
        self.state.tag = Some(tag);
        self.cond.notify_all();
    }

    pub fn clear_tag(&mut self) {
        self.state.tag = None;
    }

    /// Stop producing until the core calls
    /// [`InputBackend::do_resume`]. Call when the buffer is full.
    pub fn pause(&mut self) {
        if !self.state.paused {
            debug!(buffered = self.state.buffer.len(), "paused");
            self.state.paused = true;
        }
    }

    #[must_use]
    pub const fn is_paused(&self) -> bool {
        self.state.paused
    }

    #[must_use]
    pub fn is_seek_pending(&self) -> bool {
        self.state.seek == SeekState::Pending
    }

    /// Confirm the seek handed to [`InputBackend::do_seek`].
    ///
    /// # Panics
    ///
    /// Panics if no seek is pending.
    pub fn seek_done(&mut self) {
        assert!(
            self.state.seek == SeekState::Pending,
            "seek_done without a pending seek"
        );
        debug!(offset = self.state.offset, "seek done");
        // a stream that hit EOF is readable again at its new position
        self.state.open = true;
        self.state.seek = SeekState::None;
        self.cond.notify_all();
    }

    /// Hand a failure to the consumer side.
    ///
    /// While paused the error is held back until the stream resumes, giving the
    /// backend a chance to recover in [`InputBackend::do_resume`]. Otherwise it
    /// is raised by the next consumer call; a pending seek ends and an unready
    /// stream becomes ready.
    pub fn postpone_error(&mut self, error: InputError) {
        if self.state.paused {
            debug!(%error, "error while paused, held until resume");
            if self.state.held_error.is_none() {
                self.state.held_error = Some(error);
            }
            return;
        }
        self.raise(error);
    }

    /// Take the error held while paused, e.g. to reconnect instead of failing.
    pub fn take_held_error(&mut self) -> Option<InputError> {
        self.state.held_error.take()
    }

    pub(crate) fn promote_held_error(&mut self) {
        if !self.state.paused
            && let Some(error) = self.state.held_error.take()
        {
            self.raise(error);
        }
    }

    pub(crate) fn state(&mut self) -> &mut InputState {
        &mut *self.state
    }

    fn raise(&mut self, error: InputError) {
        if self.state.error.is_some() {
            debug!(%error, "error dropped, another one is still pending");
        } else {
            debug!(%error, "error postponed");
            self.state.error = Some(error);
        }
        self.state.seek = SeekState::None;
        self.state.ready = true;
        self.cond.notify_all();
    }
}

impl fmt::Debug for Producer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Producer")
            .field("offset", &self.state.offset)
            .field("buffered", &self.state.buffer.len())
            .field("paused", &self.state.paused)
            .finish_non_exhaustive()
    }
}

/// Weak handle a backend keeps to reach its stream from loop jobs.
///
/// Does not keep the stream alive. Once the stream is closed or dropped,
/// [`with`](Self::with) returns `None` and deferred closures are skipped.
pub struct ProducerHandle<B> {
    shared: Weak<AsyncInput<B>>,
    handle: LoopHandle,
}

impl<B> Clone for ProducerHandle<B> {
    fn clone(&self) -> Self {
        Self {
            shared: Weak::clone(&self.shared),
            handle: self.handle.clone(),
        }
    }
}

impl<B: InputBackend> ProducerHandle<B> {
    pub(crate) const fn new(shared: Weak<AsyncInput<B>>, handle: LoopHandle) -> Self {
        Self { shared, handle }
    }

    #[must_use]
    pub const fn loop_handle(&self) -> &LoopHandle {
        &self.handle
    }

    /// Lock the stream and run `f` with the backend and its producer hooks.
    ///
    /// Must be called on the loop thread, outside of any backend method (the
    /// lock is not reentrant).
    pub fn with<R>(&self, f: impl FnOnce(&mut B, &mut Producer<'_>) -> R) -> Option<R> {
        self.shared.upgrade()?.with_backend(f)
    }

    /// Post `f` to the loop, then run it as [`with`](Self::with) would.
    ///
    /// Used to move work that originates on another thread onto the loop
    /// before it touches backend state.
    pub fn defer<F>(&self, f: F)
    where
        F: FnOnce(&mut B, &mut Producer<'_>) + Send + 'static,
    {
        let this = self.clone();
        self.handle.post(move || {
            if this.with(f).is_none() {
                trace!("stream gone, deferred producer call skipped");
            }
        });
    }
}

impl<B> fmt::Debug for ProducerHandle<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProducerHandle")
            .field("alive", &(self.shared.strong_count() > 0))
            .finish_non_exhaustive()
    }
}
