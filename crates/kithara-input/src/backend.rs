use crate::{InputResult, Producer};

/// Protocol-specific half of an input stream.
///
/// One implementation per protocol (file, network share, HTTP, ...). Every
/// method runs on the loop thread with the stream lock held and must not
/// block: kick off I/O and report completion later through a
/// [`ProducerHandle`](crate::ProducerHandle).
///
/// Returning an error from any method is equivalent to calling
/// [`Producer::postpone_error`].
pub trait InputBackend: Send + 'static {
    /// Start fetching. Readiness is published later with
    /// [`Producer::set_ready`].
    ///
    /// # Errors
    ///
    /// Returns error if the fetch cannot even be started.
    fn open(&mut self, producer: &mut Producer<'_>) -> InputResult<()>;

    /// Continue after [`Producer::pause`]: the consumer drained the buffer
    /// below the resume threshold.
    ///
    /// An error that arrived while paused is still held; take it with
    /// [`Producer::take_held_error`] to recover (e.g. reconnect). Whatever is
    /// left held when this returns is raised to the consumer.
    ///
    /// # Errors
    ///
    /// Returns error if resuming fails.
    fn do_resume(&mut self, producer: &mut Producer<'_>) -> InputResult<()>;

    /// Abandon any read in flight and continue from `offset`, then call
    /// [`Producer::seek_done`]. The buffer has already been cleared and the
    /// consumer offset set to `offset`.
    ///
    /// # Errors
    ///
    /// Returns error if the seek fails; the waiting consumer receives it.
    fn do_seek(&mut self, producer: &mut Producer<'_>, offset: u64) -> InputResult<()>;

    /// Cancel outstanding work and release the connection. Called once, on the
    /// loop thread, before the stream state is freed.
    fn close(&mut self) {}
}
