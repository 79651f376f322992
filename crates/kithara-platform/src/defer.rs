use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use crate::LoopHandle;

struct DeferShared {
    pending: AtomicBool,
    callback: Box<dyn Fn() + Send + Sync>,
}

/// Fire-once, cancellable invocation of a fixed callback on the loop thread.
///
/// - [`schedule`](Self::schedule) queues one invocation; calling it again
///   before the callback ran is a no-op.
/// - [`cancel`](Self::cancel) withdraws a queued invocation. The flag is
///   checked right before the callback body runs, so a cancelled event never
///   fires.
/// - Dropping the event cancels it.
///
/// The callback usually captures a `Weak` reference to its owner, so a queued
/// job never keeps the owner alive.
pub struct DeferEvent {
    handle: LoopHandle,
    shared: Arc<DeferShared>,
}

impl DeferEvent {
    pub fn new<F>(handle: LoopHandle, callback: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            handle,
            shared: Arc::new(DeferShared {
                pending: AtomicBool::new(false),
                callback: Box::new(callback),
            }),
        }
    }

    pub fn schedule(&self) {
        if self.shared.pending.swap(true, Ordering::AcqRel) {
            return;
        }
        let shared = Arc::clone(&self.shared);
        self.handle.post(move || {
            if shared.pending.swap(false, Ordering::AcqRel) {
                (shared.callback)();
            }
        });
    }

    pub fn cancel(&self) {
        self.shared.pending.store(false, Ordering::Release);
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.shared.pending.load(Ordering::Acquire)
    }
}

impl Drop for DeferEvent {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl fmt::Debug for DeferEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferEvent")
            .field("pending", &self.is_pending())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::EventLoop;

    fn counting_event(ev: &EventLoop) -> (DeferEvent, Arc<AtomicUsize>) {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        let event = DeferEvent::new(ev.handle(), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        (event, fired)
    }

    #[test]
    fn test_schedule_fires_once() {
        let ev = EventLoop::start("defer-test").unwrap();
        let (event, fired) = counting_event(&ev);

        event.schedule();
        ev.handle().flush();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!event.is_pending());
    }

    #[test]
    fn test_repeated_schedule_coalesces() {
        let ev = EventLoop::start("defer-test").unwrap();
        let (event, fired) = counting_event(&ev);

        // hold the loop so all schedules land before the first job runs
        let (gate_tx, gate_rx) = kanal::bounded::<()>(0);
        ev.handle().post(move || {
            let _ = gate_rx.recv();
        });
        for _ in 0..10 {
            event.schedule();
        }
        assert!(event.is_pending());
        gate_tx.send(()).unwrap();

        ev.handle().flush();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_cancel_before_run_suppresses_callback() {
        let ev = EventLoop::start("defer-test").unwrap();
        let (event, fired) = counting_event(&ev);

        let (gate_tx, gate_rx) = kanal::bounded::<()>(0);
        ev.handle().post(move || {
            let _ = gate_rx.recv();
        });
        event.schedule();
        event.cancel();
        gate_tx.send(()).unwrap();

        ev.handle().flush();
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_reschedule_after_fire_fires_again() {
        let ev = EventLoop::start("defer-test").unwrap();
        let (event, fired) = counting_event(&ev);

        event.schedule();
        ev.handle().flush();
        event.schedule();
        ev.handle().flush();
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_drop_cancels() {
        let ev = EventLoop::start("defer-test").unwrap();
        let (event, fired) = counting_event(&ev);

        let (gate_tx, gate_rx) = kanal::bounded::<()>(0);
        ev.handle().post(move || {
            let _ = gate_rx.recv();
        });
        event.schedule();
        drop(event);
        gate_tx.send(()).unwrap();

        ev.handle().flush();
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
