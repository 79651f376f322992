//! Scripted [`Connection`] with call counters and fault injection.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use bytes::Bytes;
use kithara_input::{Connection, ConnectionError};
use parking_lot::{Condvar, Mutex};

/// Deterministic test payload: byte `i` is `i % 251`, so misplaced chunks
/// show up as mismatches.
#[must_use]
#[expect(clippy::cast_possible_truncation, reason = "value is below 251")]
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// Counters observed by a test.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MockStats {
    pub opens: usize,
    pub reads: usize,
    pub closes: usize,
    /// Reads currently blocked by [`MockControl::block_reads`].
    pub parked: usize,
}

#[derive(Default)]
struct MockState {
    stats: MockStats,
    fail_opens: usize,
    fail_read_at: Option<u64>,
    blocked: bool,
    read_offsets: Vec<u64>,
}

struct Inner {
    state: Mutex<MockState>,
    cond: Condvar,
}

/// Test-side handle of a [`MockConnection`].
#[derive(Clone)]
pub struct MockControl {
    inner: Arc<Inner>,
}

impl MockControl {
    #[must_use]
    pub fn stats(&self) -> MockStats {
        self.inner.state.lock().stats
    }

    /// Offsets of every `read_at` call so far.
    #[must_use]
    pub fn read_offsets(&self) -> Vec<u64> {
        self.inner.state.lock().read_offsets.clone()
    }

    /// Fail the next `n` opens.
    pub fn fail_opens(&self, n: usize) {
        self.inner.state.lock().fail_opens = n;
    }

    /// Fail the next read whose range covers `offset`.
    pub fn fail_read_at(&self, offset: u64) {
        self.inner.state.lock().fail_read_at = Some(offset);
    }

    /// Park every read until [`unblock_reads`](Self::unblock_reads).
    pub fn block_reads(&self) {
        self.inner.state.lock().blocked = true;
    }

    pub fn unblock_reads(&self) {
        self.inner.state.lock().blocked = false;
        self.inner.cond.notify_all();
    }

    /// Wait until `pred` holds for the counters. Returns `false` on timeout.
    pub fn wait_for(&self, timeout: Duration, pred: impl Fn(MockStats) -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.inner.state.lock();
        loop {
            if pred(state.stats) {
                return true;
            }
            if self.inner.cond.wait_until(&mut state, deadline).timed_out() {
                return pred(state.stats);
            }
        }
    }
}

/// In-memory [`Connection`] over a fixed payload.
pub struct MockConnection {
    data: Bytes,
    open: bool,
    control: MockControl,
}

impl MockConnection {
    #[must_use]
    pub fn new(data: impl Into<Bytes>) -> (Self, MockControl) {
        let control = MockControl {
            inner: Arc::new(Inner {
                state: Mutex::new(MockState::default()),
                cond: Condvar::new(),
            }),
        };
        let conn = Self {
            data: data.into(),
            open: false,
            control: control.clone(),
        };
        (conn, control)
    }

    /// Connection over [`pattern`]`(len)`.
    #[must_use]
    pub fn with_pattern(len: usize) -> (Self, MockControl) {
        Self::new(pattern(len))
    }
}

impl Connection for MockConnection {
    fn open(&mut self) -> Result<u64, ConnectionError> {
        let inner = &self.control.inner;
        let mut state = inner.state.lock();
        state.stats.opens += 1;
        inner.cond.notify_all();

        if state.fail_opens > 0 {
            state.fail_opens -= 1;
            return Err(ConnectionError::other("scripted open failure"));
        }
        self.open = true;
        Ok(self.data.len() as u64)
    }

    fn read_at(&mut self, offset: u64, len: usize) -> Result<Bytes, ConnectionError> {
        let inner = &self.control.inner;
        let mut state = inner.state.lock();
        state.stats.reads += 1;
        state.read_offsets.push(offset);
        inner.cond.notify_all();

        while state.blocked {
            state.stats.parked += 1;
            inner.cond.notify_all();
            inner.cond.wait(&mut state);
            state.stats.parked -= 1;
        }

        if !self.open {
            return Err(ConnectionError::NotOpen);
        }
        if let Some(at) = state.fail_read_at
            && offset <= at
            && at < offset + len as u64
        {
            state.fail_read_at = None;
            return Err(ConnectionError::other("scripted read failure"));
        }
        drop(state);

        let start = usize::try_from(offset).map_or(self.data.len(), |o| o.min(self.data.len()));
        let end = start.saturating_add(len).min(self.data.len());
        Ok(self.data.slice(start..end))
    }

    fn close(&mut self) {
        self.open = false;
        let inner = &self.control.inner;
        inner.state.lock().stats.closes += 1;
        inner.cond.notify_all();
    }
}
