use kithara_ring::RingBuffer;
use tracing::debug;

use crate::{InputError, InputOptions, InputResult, Tag};

/// Progress of a consumer-requested seek.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SeekState {
    None,
    /// Requested by a consumer, not yet started on the loop.
    Scheduled,
    /// Handed to the backend, waiting for `seek_done`.
    Pending,
}

/// Everything guarded by the stream lock.
pub(crate) struct InputState {
    pub(crate) buffer: RingBuffer<u8>,
    pub(crate) resume_at: usize,

    /// Size/seekability are known, or a terminal error occurred.
    pub(crate) ready: bool,
    /// The producer has not declared end of data.
    pub(crate) open: bool,
    /// The producer stopped because the buffer was full.
    pub(crate) paused: bool,
    /// The consumer closed the stream; late backend callbacks are ignored.
    pub(crate) shutdown: bool,

    pub(crate) seek: SeekState,
    pub(crate) seek_offset: u64,

    pub(crate) tag: Option<Tag>,
    /// Waiting to be raised by the next consumer call.
    pub(crate) error: Option<InputError>,
    /// Arrived while paused; raised only after a resume.
    pub(crate) held_error: Option<InputError>,

    /// Read position of the consumer.
    pub(crate) offset: u64,
    pub(crate) size: Option<u64>,
    pub(crate) seekable: bool,
    pub(crate) mime_type: Option<String>,
}

impl InputState {
    pub(crate) fn new(options: &InputOptions) -> Self {
        Self {
            buffer: RingBuffer::new(vec![0u8; options.buffer_size].into_boxed_slice()),
            resume_at: options.resume_at,
            ready: false,
            open: true,
            paused: false,
            shutdown: false,
            seek: SeekState::None,
            seek_offset: 0,
            tag: None,
            error: None,
            held_error: None,
            offset: 0,
            size: None,
            seekable: false,
            mime_type: None,
        }
    }

    /// Raise the postponed error once.
    pub(crate) fn check(&mut self) -> InputResult<()> {
        self.error.take().map_or(Ok(()), Err)
    }

    pub(crate) fn is_eof(&self) -> bool {
        if let Some(size) = self.size
            && self.offset >= size
        {
            return true;
        }
        !self.open && self.buffer.is_empty()
    }

    pub(crate) fn is_available(&self) -> bool {
        self.error.is_some() || self.is_eof() || !self.buffer.is_empty()
    }

    /// A paused producer should be resumed.
    pub(crate) fn wants_resume(&self) -> bool {
        self.paused && self.buffer.len() <= self.resume_at
    }

    pub(crate) fn read_from_buffer(&mut self, dest: &mut [u8]) -> usize {
        let n = self.buffer.read_into(dest);
        self.offset += n as u64;
        n
    }

    /// Skip buffered bytes up to `target`. Returns `true` when the target was
    /// reached without a backend seek.
    pub(crate) fn fast_forward(&mut self, target: u64) -> bool {
        while target > self.offset {
            let available = self.buffer.prepare_read().len();
            if available == 0 {
                break;
            }
            let remaining = usize::try_from(target - self.offset).unwrap_or(usize::MAX);
            let n = available.min(remaining);
            self.buffer.consume(n);
            self.offset += n as u64;
        }

        if target == self.offset {
            debug!(offset = target, "seek satisfied from buffer");
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(buffer_size: usize, resume_at: usize) -> InputState {
        InputState::new(&InputOptions {
            buffer_size,
            resume_at,
        })
    }

    #[test]
    fn test_check_raises_once() {
        let mut s = state(16, 4);
        s.error = Some(InputError::NotReady);
        assert!(matches!(s.check(), Err(InputError::NotReady)));
        assert!(s.check().is_ok());
    }

    #[test]
    fn test_eof_requires_closed_and_drained() {
        let mut s = state(16, 4);
        s.buffer.write_from(b"abc");
        assert!(!s.is_eof());

        s.open = false;
        assert!(!s.is_eof());

        let mut out = [0u8; 3];
        assert_eq!(s.read_from_buffer(&mut out), 3);
        assert!(s.is_eof());
        assert_eq!(s.offset, 3);
    }

    #[test]
    fn test_eof_from_known_size() {
        let mut s = state(16, 4);
        s.size = Some(10);
        s.offset = 10;
        assert!(s.is_eof());
    }

    #[test]
    fn test_available() {
        let mut s = state(16, 4);
        assert!(!s.is_available());
        s.buffer.write_from(b"x");
        assert!(s.is_available());
        s.buffer.clear();
        s.error = Some(InputError::Closed);
        assert!(s.is_available());
    }

    #[test]
    fn test_wants_resume_threshold() {
        let mut s = state(16, 4);
        s.buffer.write_from(&[0u8; 15]);
        assert!(!s.wants_resume());

        s.paused = true;
        assert!(!s.wants_resume());

        let mut out = [0u8; 11];
        s.read_from_buffer(&mut out);
        assert_eq!(s.buffer.len(), 4);
        assert!(s.wants_resume());
    }

    #[test]
    fn test_fast_forward_within_buffer() {
        let mut s = state(8, 2);
        s.buffer.write_from(b"0123456");
        assert!(s.fast_forward(5));
        assert_eq!(s.offset, 5);

        let mut out = [0u8; 2];
        s.read_from_buffer(&mut out);
        assert_eq!(&out, b"56");
    }

    #[test]
    fn test_fast_forward_past_buffer_drains_it() {
        let mut s = state(8, 2);
        s.buffer.write_from(b"012");
        assert!(!s.fast_forward(100));
        assert_eq!(s.offset, 3);
        assert!(s.buffer.is_empty());
    }

    #[test]
    fn test_fast_forward_across_wrap() {
        let mut s = state(8, 2);
        s.buffer.write_from(b"abcdef");
        let mut out = [0u8; 5];
        s.read_from_buffer(&mut out);
        s.buffer.write_from(b"ghij");
        // offset 5, buffered "fghij" split around the end of storage
        assert!(s.fast_forward(9));
        let mut rest = [0u8; 1];
        s.read_from_buffer(&mut rest);
        assert_eq!(&rest, b"j");
    }
}
