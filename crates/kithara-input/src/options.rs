use crate::{InputError, InputResult};

/// Default ring buffer size. Large enough to ride out high-latency links,
/// small enough for low-end machines.
pub const DEFAULT_BUFFER_SIZE: usize = 512 * 1024;

/// Default resume threshold after the producer paused on a full buffer.
pub const DEFAULT_RESUME_AT: usize = 384 * 1024;

/// Buffering configuration of one input stream.
///
/// The producer pauses when the buffer is full and is resumed once the
/// consumer drained it down to `resume_at` bytes. Keeping `resume_at` below the
/// capacity gives hysteresis instead of a pause/resume per read.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InputOptions {
    /// Ring buffer storage in bytes, allocated once. One byte is never used.
    pub buffer_size: usize,
    /// Buffered byte count at or below which a paused producer is resumed.
    pub resume_at: usize,
}

impl Default for InputOptions {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            resume_at: DEFAULT_RESUME_AT,
        }
    }
}

impl InputOptions {
    /// Set ring buffer size in bytes.
    #[must_use]
    pub const fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    /// Set resume threshold in bytes.
    #[must_use]
    pub const fn with_resume_at(mut self, resume_at: usize) -> Self {
        self.resume_at = resume_at;
        self
    }

    /// Check the thresholds are usable.
    ///
    /// # Errors
    ///
    /// Returns [`InputError::InvalidOptions`] when the buffer cannot hold a
    /// byte or when `resume_at` is not below the usable capacity.
    pub fn validate(&self) -> InputResult<()> {
        if self.buffer_size < 2 {
            return Err(InputError::InvalidOptions(format!(
                "buffer_size {} must be at least 2",
                self.buffer_size
            )));
        }
        if self.resume_at >= self.buffer_size - 1 {
            return Err(InputError::InvalidOptions(format!(
                "resume_at {} must be below usable capacity {}",
                self.resume_at,
                self.buffer_size - 1
            )));
        }
        Ok(())
    }
}
