//! Shared stream core and its consumer handle.

use std::{
    fmt,
    io::{self, Read, Seek, SeekFrom},
    sync::{Arc, Weak},
};

use kithara_platform::{Condvar, DeferEvent, LoopHandle, Mutex};
use tracing::{debug, trace};

use crate::{
    InputBackend, InputError, InputOptions, InputResult, Producer, ProducerHandle, Tag,
    state::{InputState, SeekState},
};

struct Locked<B> {
    state: InputState,
    /// Taken out by `close`.
    backend: Option<B>,
}

/// State shared between consumers and the loop thread.
pub(crate) struct AsyncInput<B> {
    locked: Mutex<Locked<B>>,
    cond: Condvar,
    handle: LoopHandle,
    resume: DeferEvent,
    seek: DeferEvent,
}

impl<B: InputBackend> AsyncInput<B> {
    /// Lock the core and run `f` with the backend and its producer hooks.
    ///
    /// Returns `None` once the stream is shut down.
    pub(crate) fn with_backend<R>(
        &self,
        f: impl FnOnce(&mut B, &mut Producer<'_>) -> R,
    ) -> Option<R> {
        let mut guard = self.locked.lock();
        let Locked { state, backend } = &mut *guard;
        if state.shutdown {
            return None;
        }
        let backend = backend.as_mut()?;
        let mut producer = Producer::new(state, &self.cond, &self.handle);
        Some(f(backend, &mut producer))
    }

    fn deferred_resume(&self) {
        self.with_backend(|backend, p| resume(backend, p));
    }

    fn deferred_seek(&self) {
        self.with_backend(|backend, p| {
            if p.state().seek != SeekState::Scheduled {
                return;
            }

            resume(backend, p);
            // resuming failed, the error already ended the seek
            if p.state().seek != SeekState::Scheduled {
                return;
            }

            let state = p.state();
            let offset = state.seek_offset;
            state.seek = SeekState::Pending;
            state.buffer.clear();
            state.paused = false;
            state.offset = offset;
            debug!(offset, "seek started");

            if let Err(error) = backend.do_seek(p, offset) {
                p.postpone_error(error);
            }
        });
    }

    fn close_backend(&self) {
        let backend = self.locked.lock().backend.take();
        if let Some(mut backend) = backend {
            backend.close();
        }
    }
}

fn resume<B: InputBackend>(backend: &mut B, p: &mut Producer<'_>) {
    if !p.is_paused() {
        return;
    }
    p.state().paused = false;
    debug!(offset = p.offset(), "resuming");

    if let Err(error) = backend.do_resume(p) {
        p.postpone_error(error);
    }
    p.promote_held_error();
}

/// Consumer handle of an input stream.
///
/// Blocking reads and seeks are served from a ring buffer that the backend
/// fills on the loop thread. All methods take `&self`; any number of threads
/// may share one stream, except the loop thread itself which must never
/// block on it.
///
/// Dropping the stream closes it.
pub struct InputStream<B: InputBackend> {
    core: Arc<AsyncInput<B>>,
}

impl<B: InputBackend> InputStream<B> {
    /// Create a stream driven by `handle`.
    ///
    /// `make_backend` receives the [`ProducerHandle`] the backend keeps to
    /// report completions. Nothing is fetched until [`open`](Self::open).
    ///
    /// # Errors
    ///
    /// Returns [`InputError::InvalidOptions`] if `options` do not validate.
    pub fn new<F>(handle: LoopHandle, options: &InputOptions, make_backend: F) -> InputResult<Self>
    where
        F: FnOnce(ProducerHandle<B>) -> B,
    {
        options.validate()?;

        let core = Arc::new_cyclic(|weak: &Weak<AsyncInput<B>>| {
            let resume = {
                let weak = Weak::clone(weak);
                DeferEvent::new(handle.clone(), move || {
                    if let Some(core) = weak.upgrade() {
                        core.deferred_resume();
                    }
                })
            };
            let seek = {
                let weak = Weak::clone(weak);
                DeferEvent::new(handle.clone(), move || {
                    if let Some(core) = weak.upgrade() {
                        core.deferred_seek();
                    }
                })
            };
            let backend = make_backend(ProducerHandle::new(Weak::clone(weak), handle.clone()));

            AsyncInput {
                locked: Mutex::new(Locked {
                    state: InputState::new(options),
                    backend: Some(backend),
                }),
                cond: Condvar::new(),
                handle,
                resume,
                seek,
            }
        });

        trace!(buffer_size = options.buffer_size, "input stream created");
        Ok(Self { core })
    }

    /// Ask the backend to start fetching. Returns at once; use
    /// [`wait_ready`](Self::wait_ready) or [`is_ready`](Self::is_ready).
    pub fn open(&self) {
        let weak = Arc::downgrade(&self.core);
        self.core.handle.post(move || {
            let Some(core) = weak.upgrade() else {
                return;
            };
            core.with_backend(|backend, p| {
                if let Err(error) = backend.open(p) {
                    p.postpone_error(error);
                }
            });
        });
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.core.locked.lock().state.ready
    }

    /// Block until size and seekability are known.
    ///
    /// # Errors
    ///
    /// Returns the error that made the stream ready, or
    /// [`InputError::Closed`] if the stream was closed while waiting.
    ///
    /// # Panics
    ///
    /// Panics when called on the loop thread.
    pub fn wait_ready(&self) -> InputResult<()> {
        self.assert_off_loop("wait_ready");

        let mut guard = self.core.locked.lock();
        while !guard.state.ready && !guard.state.shutdown {
            self.core.cond.wait(&mut guard);
        }
        guard.state.check()?;
        if guard.state.shutdown {
            return Err(InputError::Closed);
        }
        Ok(())
    }

    /// Read up to `dest.len()` bytes, blocking until at least one byte, EOF or
    /// an error is available.
    ///
    /// Returns `Ok(0)` at end of stream. An empty `dest` also returns `Ok(0)`
    /// without blocking, as [`io::Read`] does; use [`is_eof`](Self::is_eof)
    /// to tell the two apart.
    ///
    /// # Errors
    ///
    /// Returns the postponed backend error (once), or
    /// [`InputError::Closed`] after [`close`](Self::close).
    ///
    /// # Panics
    ///
    /// Panics when called on the loop thread.
    pub fn read(&self, dest: &mut [u8]) -> InputResult<usize> {
        self.assert_off_loop("read");

        let mut guard = self.core.locked.lock();
        loop {
            let state = &mut guard.state;
            state.check()?;
            if dest.is_empty() {
                return Ok(0);
            }

            let n = state.read_from_buffer(dest);
            if state.wants_resume() {
                self.core.resume.schedule();
            }
            if n > 0 {
                return Ok(n);
            }
            if state.is_eof() {
                return Ok(0);
            }
            if state.shutdown {
                return Err(InputError::Closed);
            }

            self.core.cond.wait(&mut guard);
        }
    }

    /// Move the read position to `offset` and wait until the backend
    /// continues from there.
    ///
    /// A forward target that is already buffered is reached without the
    /// backend. A seek issued while another one is still scheduled replaces
    /// it, even when the target equals the current offset.
    ///
    /// # Errors
    ///
    /// - [`InputError::NotReady`] before the stream is ready
    /// - [`InputError::NotSeekable`] / [`InputError::InvalidSeek`] for
    ///   unsupported targets
    /// - the backend error that ended the seek
    ///
    /// # Panics
    ///
    /// Panics when called on the loop thread, or while the backend is
    /// executing another seek.
    pub fn seek(&self, offset: u64) -> InputResult<()> {
        self.assert_off_loop("seek");

        let mut guard = self.core.locked.lock();
        let state = &mut guard.state;
        if state.shutdown {
            return Err(InputError::Closed);
        }
        if !state.ready {
            return Err(InputError::NotReady);
        }
        // a scheduled seek moves the position, so neither shortcut applies
        let idle = state.seek == SeekState::None;
        if idle && offset == state.offset {
            return Ok(());
        }
        if !state.seekable {
            return Err(InputError::NotSeekable);
        }
        if let Some(size) = state.size
            && offset > size
        {
            return Err(InputError::InvalidSeek);
        }

        if idle && state.fast_forward(offset) {
            if state.wants_resume() {
                self.core.resume.schedule();
            }
            return Ok(());
        }

        match state.seek {
            SeekState::Pending => panic!("seek issued while the backend is executing another seek"),
            SeekState::Scheduled => {
                debug!(from = state.seek_offset, to = offset, "scheduled seek replaced");
            }
            SeekState::None => debug!(offset, "seek scheduled"),
        }

        state.buffer.clear();
        state.seek_offset = offset;
        state.seek = SeekState::Scheduled;
        self.core.seek.schedule();

        while guard.state.seek != SeekState::None && !guard.state.shutdown {
            self.core.cond.wait(&mut guard);
        }
        guard.state.check()?;
        if guard.state.shutdown {
            return Err(InputError::Closed);
        }
        Ok(())
    }

    /// Take the metadata block the backend pushed last, if any.
    ///
    /// # Errors
    ///
    /// Returns the postponed backend error (once).
    pub fn read_tag(&self) -> InputResult<Option<Tag>> {
        let mut guard = self.core.locked.lock();
        guard.state.check()?;
        Ok(guard.state.tag.take())
    }

    /// Raise the postponed backend error, if any. Each error is returned once.
    ///
    /// # Errors
    ///
    /// Returns the postponed error.
    pub fn check(&self) -> InputResult<()> {
        self.core.locked.lock().state.check()
    }

    /// Target of the seek that is scheduled or running, if any.
    #[must_use]
    pub fn seek_target(&self) -> Option<u64> {
        let guard = self.core.locked.lock();
        (guard.state.seek != SeekState::None).then_some(guard.state.seek_offset)
    }

    #[must_use]
    pub fn is_eof(&self) -> bool {
        self.core.locked.lock().state.is_eof()
    }

    /// `read` would not block: an error is pending, EOF was reached, or
    /// bytes are buffered.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.core.locked.lock().state.is_available()
    }

    /// Current read position.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.core.locked.lock().state.offset
    }

    /// Total length, when the backend knows it.
    #[must_use]
    pub fn size(&self) -> Option<u64> {
        self.core.locked.lock().state.size
    }

    #[must_use]
    pub fn is_seekable(&self) -> bool {
        self.core.locked.lock().state.seekable
    }

    #[must_use]
    pub fn mime_type(&self) -> Option<String> {
        self.core.locked.lock().state.mime_type.clone()
    }

    /// Handle for posting producer work from outside the backend.
    #[must_use]
    pub fn producer(&self) -> ProducerHandle<B> {
        ProducerHandle::new(Arc::downgrade(&self.core), self.core.handle.clone())
    }

    #[must_use]
    pub fn loop_handle(&self) -> &LoopHandle {
        &self.core.handle
    }

    /// Shut the stream down.
    ///
    /// Blocked reads and seeks return [`InputError::Closed`]. The backend is
    /// closed on the loop thread before this returns; loop jobs still queued
    /// for the stream become no-ops. Idempotent.
    pub fn close(&self) {
        {
            let mut guard = self.core.locked.lock();
            let state = &mut guard.state;
            if state.shutdown {
                return;
            }
            state.shutdown = true;
            if let Some(error) = state.held_error.take() {
                debug!(%error, "held error discarded on close");
            }
        }

        self.core.resume.cancel();
        self.core.seek.cancel();
        self.core.cond.notify_all();

        let core = Arc::clone(&self.core);
        if self
            .core
            .handle
            .try_call(move || core.close_backend())
            .is_none()
        {
            // loop already stopped, nothing can race with us
            self.core.close_backend();
        }
        debug!("input stream closed");
    }

    fn assert_off_loop(&self, op: &str) {
        assert!(
            !self.core.handle.is_inside(),
            "{op} would block the event loop thread"
        );
    }

    fn resolve(&self, pos: SeekFrom) -> InputResult<u64> {
        let (offset, size) = {
            let guard = self.core.locked.lock();
            (guard.state.offset, guard.state.size)
        };
        match pos {
            SeekFrom::Start(n) => Ok(n),
            SeekFrom::Current(delta) => offset
                .checked_add_signed(delta)
                .ok_or(InputError::InvalidSeek),
            SeekFrom::End(delta) => size
                .ok_or(InputError::UnknownLength)?
                .checked_add_signed(delta)
                .ok_or(InputError::InvalidSeek),
        }
    }
}

impl<B: InputBackend> Drop for InputStream<B> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<B: InputBackend> fmt::Debug for InputStream<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let guard = self.core.locked.lock();
        f.debug_struct("InputStream")
            .field("offset", &guard.state.offset)
            .field("size", &guard.state.size)
            .field("ready", &guard.state.ready)
            .field("buffered", &guard.state.buffer.len())
            .finish_non_exhaustive()
    }
}

impl<B: InputBackend> Read for &InputStream<B> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        InputStream::read(*self, buf).map_err(io::Error::from)
    }
}

impl<B: InputBackend> Read for InputStream<B> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Read::read(&mut &*self, buf)
    }
}

impl<B: InputBackend> Seek for &InputStream<B> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = self.resolve(pos)?;
        InputStream::seek(*self, target)?;
        Ok(self.offset())
    }
}

impl<B: InputBackend> Seek for InputStream<B> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        Seek::seek(&mut &*self, pos)
    }
}
