//! Single-threaded run loop.
//!
//! Jobs are closures sent through an unbounded `kanal` channel and executed
//! in order on one named thread. The loop thread is the only place where
//! backend state may be touched.

use std::{
    fmt, io,
    panic::{self, AssertUnwindSafe},
    thread::{self, JoinHandle, ThreadId},
};

use tracing::{debug, trace};

type Job = Box<dyn FnOnce() + Send + 'static>;

enum LoopMsg {
    Run(Job),
    Quit,
}

/// Cheap, cloneable handle used to submit work to an [`EventLoop`].
#[derive(Clone)]
pub struct LoopHandle {
    tx: kanal::Sender<LoopMsg>,
    thread_id: ThreadId,
}

impl LoopHandle {
    /// Is the calling thread the loop thread?
    #[must_use]
    pub fn is_inside(&self) -> bool {
        thread::current().id() == self.thread_id
    }

    /// Queue `f` to run on the loop thread. Returns immediately.
    ///
    /// Jobs posted after the loop stopped are dropped without running.
    pub fn post<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.tx.send(LoopMsg::Run(Box::new(f))).is_err() {
            trace!("event loop stopped, job dropped");
        }
    }

    /// Run `f` on the loop thread and wait for its result.
    ///
    /// Runs inline when called from the loop thread itself. A panic inside
    /// `f` is resumed on the calling thread; the loop keeps running.
    ///
    /// # Panics
    ///
    /// Panics if the loop stopped before `f` could run.
    pub fn call<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        self.try_call(f)
            .unwrap_or_else(|| panic!("event loop stopped before the call could run"))
    }

    /// Like [`call`](Self::call), but returns `None` instead of panicking when
    /// the loop has stopped (`f` is dropped without running).
    pub fn try_call<F, R>(&self, f: F) -> Option<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        if self.is_inside() {
            return Some(f());
        }

        let (tx, rx) = kanal::bounded(1);
        self.post(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(f));
            let _ = tx.send(result);
        });

        match rx.recv() {
            Ok(Ok(value)) => Some(value),
            Ok(Err(payload)) => panic::resume_unwind(payload),
            Err(_) => None,
        }
    }

    /// Wait until every job posted before this call has run.
    ///
    /// No-op on the loop thread. Returns early if the loop already stopped.
    pub fn flush(&self) {
        if self.is_inside() {
            return;
        }
        let (tx, rx) = kanal::bounded::<()>(1);
        self.post(move || {
            let _ = tx.send(());
        });
        let _ = rx.recv();
    }
}

impl fmt::Debug for LoopHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoopHandle")
            .field("thread_id", &self.thread_id)
            .finish_non_exhaustive()
    }
}

/// Owner of the loop thread. Dropping it stops the loop after the jobs
/// already queued, then joins the thread.
pub struct EventLoop {
    handle: LoopHandle,
    thread: Option<JoinHandle<()>>,
}

impl EventLoop {
    /// Spawn the loop thread.
    ///
    /// # Errors
    ///
    /// Returns error if the OS refuses to spawn the thread.
    pub fn start(name: impl Into<String>) -> io::Result<Self> {
        let (tx, rx) = kanal::unbounded::<LoopMsg>();
        let name = name.into();
        let thread = thread::Builder::new()
            .name(name.clone())
            .spawn(move || run(&name, &rx))?;

        Ok(Self {
            handle: LoopHandle {
                tx,
                thread_id: thread.thread().id(),
            },
            thread: Some(thread),
        })
    }

    #[must_use]
    pub fn handle(&self) -> LoopHandle {
        self.handle.clone()
    }
}

impl fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLoop")
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

impl Drop for EventLoop {
    fn drop(&mut self) {
        let _ = self.handle.tx.send(LoopMsg::Quit);
        if self.handle.is_inside() {
            return;
        }
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            debug!("event loop thread panicked");
        }
    }
}

fn run(name: &str, rx: &kanal::Receiver<LoopMsg>) {
    debug!(name, "event loop started");
    while let Ok(msg) = rx.recv() {
        match msg {
            LoopMsg::Run(job) => job(),
            LoopMsg::Quit => break,
        }
    }
    debug!(name, "event loop stopped");
}
