//! Thread pool for blocking connection I/O.
//!
//! Wraps [`rayon::ThreadPool`]. Backends hand blocking reads to the pool with
//! [`ThreadPool::spawn_then`] and receive the result as a job on their
//! [`LoopHandle`], which keeps the loop thread free while I/O is in flight.

use std::{fmt, sync::Arc};

use crate::LoopHandle;

/// Shared pool for blocking work.
///
/// When no custom pool is configured the global rayon pool is used. Cloning is
/// an `Arc` increment; streams should share one pool.
#[derive(Clone)]
pub struct ThreadPool {
    inner: Option<Arc<rayon::ThreadPool>>,
}

impl ThreadPool {
    /// Use the global rayon pool.
    #[must_use]
    pub const fn global() -> Self {
        Self { inner: None }
    }

    /// Create a pool with `n` threads.
    ///
    /// # Errors
    ///
    /// Returns an error if the rayon pool cannot be built.
    pub fn with_num_threads(n: usize) -> Result<Self, rayon::ThreadPoolBuildError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .thread_name(|i| format!("kithara-io-{i}"))
            .build()?;
        Ok(Self {
            inner: Some(Arc::new(pool)),
        })
    }

    /// Run `f` on a pool thread (fire-and-forget).
    pub fn spawn<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        match self.inner {
            Some(ref pool) => pool.spawn(f),
            None => rayon::spawn(f),
        }
    }

    /// Run `work` on a pool thread, then post `then(result)` to `handle`.
    ///
    /// This is the non-blocking kick-off used by backends: the caller returns
    /// at once and the completion runs later on the loop thread. If the loop
    /// has stopped in the meantime the completion is dropped.
    pub fn spawn_then<W, T, C>(&self, handle: &LoopHandle, work: W, then: C)
    where
        W: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
        C: FnOnce(T) + Send + 'static,
    {
        let handle = handle.clone();
        self.spawn(move || {
            let result = work();
            handle.post(move || then(result));
        });
    }
}

impl Default for ThreadPool {
    fn default() -> Self {
        Self::global()
    }
}

impl fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner {
            Some(ref pool) => f
                .debug_struct("ThreadPool")
                .field("kind", &"custom")
                .field("num_threads", &pool.current_num_threads())
                .finish(),
            None => f
                .debug_struct("ThreadPool")
                .field("kind", &"global")
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EventLoop;

    #[test]
    fn test_spawn_completes() {
        let pool = ThreadPool::with_num_threads(2).unwrap();
        let (tx, rx) = kanal::bounded(1);
        pool.spawn(move || {
            let _ = tx.send(42);
        });
        assert_eq!(rx.recv().unwrap(), 42);
    }

    #[test]
    fn test_spawn_then_delivers_on_loop() {
        let ev = EventLoop::start("pool-test").unwrap();
        let pool = ThreadPool::with_num_threads(1).unwrap();
        let handle = ev.handle();
        let (tx, rx) = kanal::bounded(1);

        let inner = handle.clone();
        pool.spawn_then(
            &handle,
            || std::thread::current().name().map(str::to_owned),
            move |worker_name| {
                let _ = tx.send((worker_name, inner.is_inside()));
            },
        );

        let (worker_name, on_loop) = rx.recv().unwrap();
        assert_eq!(worker_name.as_deref(), Some("kithara-io-0"));
        assert!(on_loop);
    }

    #[test]
    fn test_debug_reports_kind() {
        assert!(format!("{:?}", ThreadPool::global()).contains("global"));
        let custom = ThreadPool::with_num_threads(3).unwrap();
        let s = format!("{custom:?}");
        assert!(s.contains("custom"));
        assert!(s.contains('3'));
    }

    #[test]
    fn test_default_is_global() {
        assert!(ThreadPool::default().inner.is_none());
    }
}
