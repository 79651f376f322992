//! Threading primitives shared by Kithara input streams.
//!
//! # Synchronization
//!
//! Re-exports [`parking_lot`] lock types directly. Every stream keeps its
//! whole state behind one [`Mutex`] and wakes blocked readers through a
//! [`Condvar`].
//!
//! # Event loop
//!
//! [`EventLoop`] owns a single thread on which all backend callbacks run.
//! Other threads reach it through a [`LoopHandle`]: [`LoopHandle::post`] for
//! fire-and-forget work, [`LoopHandle::call`] to block until a closure ran
//! there. [`DeferEvent`] is a cancellable, fire-once invocation on the loop.
//!
//! # Blocking work
//!
//! [`ThreadPool`] runs blocking connection I/O off the loop and delivers the
//! result back onto it, so the loop itself never blocks.

#![forbid(unsafe_code)]

mod defer;
mod event_loop;
mod pool;

pub use defer::DeferEvent;
pub use event_loop::{EventLoop, LoopHandle};
pub use parking_lot::{Condvar, Mutex, MutexGuard};
pub use pool::ThreadPool;
