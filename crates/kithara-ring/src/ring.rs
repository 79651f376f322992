use std::{fmt, marker::PhantomData};

/// Circular buffer over externally supplied storage.
///
/// Producer workflow: [`prepare_write`](Self::prepare_write) → fill the span →
/// [`commit_write`](Self::commit_write). After wraparound the free space may be
/// split in two, so a second `prepare_write` is needed to claim all of it.
///
/// Consumer workflow: [`prepare_read`](Self::prepare_read) → copy out →
/// [`consume`](Self::consume).
///
/// Committing or consuming more than the prepared span is a broken invariant
/// and panics.
pub struct RingBuffer<T, S = Box<[T]>> {
    /// Next index to be read.
    head: usize,
    /// Next index to be written.
    tail: usize,
    capacity: usize,
    storage: S,
    _marker: PhantomData<T>,
}

impl<T, S> RingBuffer<T, S>
where
    S: AsRef<[T]> + AsMut<[T]>,
{
    /// Wrap `storage`; its length becomes the capacity.
    ///
    /// # Panics
    ///
    /// Panics if `storage` is empty.
    pub fn new(storage: S) -> Self {
        let capacity = storage.as_ref().len();
        assert!(capacity > 0, "ring buffer storage must not be empty");
        Self {
            head: 0,
            tail: 0,
            capacity,
            storage,
            _marker: PhantomData,
        }
    }

    /// Give the storage back. Contents are left as they were.
    pub fn into_storage(self) -> S {
        self.storage
    }

    #[inline]
    const fn next(&self, i: usize) -> usize {
        if i + 1 == self.capacity { 0 } else { i + 1 }
    }

    /// Drop all contents without touching the storage.
    pub const fn clear(&mut self) {
        self.head = 0;
        self.tail = 0;
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.head == self.tail
    }

    #[must_use]
    pub const fn is_full(&self) -> bool {
        self.next(self.tail) == self.head
    }

    /// Number of stored elements.
    #[must_use]
    pub const fn len(&self) -> usize {
        if self.head <= self.tail {
            self.tail - self.head
        } else {
            self.capacity - self.head + self.tail
        }
    }

    /// Number of elements that can still be added.
    #[must_use]
    pub const fn space(&self) -> usize {
        // capacity - len - 1
        let free = if self.head <= self.tail {
            self.capacity - self.tail + self.head
        } else {
            self.head - self.tail
        };
        free - 1
    }

    /// End (exclusive) of the contiguous writable span starting at `tail`.
    const fn write_end(&self) -> usize {
        if self.tail < self.head {
            self.head - 1
        } else if self.head == 0 {
            // the last cell stays unused, `tail` may not wrap onto `head`
            self.capacity - 1
        } else {
            self.capacity
        }
    }

    /// End (exclusive) of the contiguous readable span starting at `head`.
    const fn read_end(&self) -> usize {
        if self.tail < self.head {
            self.capacity
        } else {
            self.tail
        }
    }

    /// Contiguous span that may be written. Empty when full.
    pub fn prepare_write(&mut self) -> &mut [T] {
        let (start, end) = (self.tail, self.write_end());
        &mut self.storage.as_mut()[start..end]
    }

    /// Expand the tail by `n` elements written into the last
    /// [`prepare_write`](Self::prepare_write) span.
    ///
    /// # Panics
    ///
    /// Panics if `n` exceeds that span.
    pub fn commit_write(&mut self, n: usize) {
        let writable = self.write_end() - self.tail;
        assert!(
            n <= writable,
            "commit of {n} exceeds writable span of {writable}"
        );

        self.tail += n;
        if self.tail == self.capacity {
            debug_assert!(self.head > 0);
            self.tail = 0;
        }
    }

    /// Contiguous span that may be read. Empty when empty.
    pub fn prepare_read(&self) -> &[T] {
        &self.storage.as_ref()[self.head..self.read_end()]
    }

    /// Same as [`prepare_read`](Self::prepare_read), but writable, for in-place
    /// parsing.
    pub fn prepare_read_mut(&mut self) -> &mut [T] {
        let (start, end) = (self.head, self.read_end());
        &mut self.storage.as_mut()[start..end]
    }

    /// Mark `n` elements of the last [`prepare_read`](Self::prepare_read) span
    /// as consumed.
    ///
    /// # Panics
    ///
    /// Panics if `n` exceeds that span.
    pub fn consume(&mut self, n: usize) {
        let readable = self.read_end() - self.head;
        assert!(
            n <= readable,
            "consume of {n} exceeds readable span of {readable}"
        );

        self.head += n;
        if self.head == self.capacity {
            self.head = 0;
        }
    }
}

impl<T, S> RingBuffer<T, S>
where
    T: Copy,
    S: AsRef<[T]> + AsMut<[T]>,
{
    /// Copy as much of `src` as fits. Returns the number of elements stored.
    pub fn write_from(&mut self, src: &[T]) -> usize {
        let mut written = 0;
        // at most two passes: up to the end of storage, then from the start
        while written < src.len() {
            let span = self.prepare_write();
            if span.is_empty() {
                break;
            }
            let n = span.len().min(src.len() - written);
            span[..n].copy_from_slice(&src[written..written + n]);
            self.commit_write(n);
            written += n;
        }
        written
    }

    /// Copy the oldest elements into `dest` and consume them. Returns the
    /// number of elements copied.
    pub fn read_into(&mut self, dest: &mut [T]) -> usize {
        let mut read = 0;
        while read < dest.len() {
            let span = self.prepare_read();
            if span.is_empty() {
                break;
            }
            let n = span.len().min(dest.len() - read);
            dest[read..read + n].copy_from_slice(&span[..n]);
            self.consume(n);
            read += n;
        }
        read
    }
}

impl<T, S> fmt::Debug for RingBuffer<T, S>
where
    S: AsRef<[T]> + AsMut<[T]>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RingBuffer")
            .field("head", &self.head)
            .field("tail", &self.tail)
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn ring(capacity: usize) -> RingBuffer<u8> {
        RingBuffer::new(vec![0u8; capacity].into_boxed_slice())
    }

    #[test]
    fn test_new_buffer_is_empty() {
        let r = ring(8);
        assert!(r.is_empty());
        assert!(!r.is_full());
        assert_eq!(r.len(), 0);
        assert_eq!(r.space(), 7);
        assert_eq!(r.capacity(), 8);
    }

    #[test]
    #[should_panic(expected = "must not be empty")]
    fn test_zero_capacity_panics() {
        let _ = ring(0);
    }

    #[test]
    fn test_capacity_one_is_both_empty_and_full() {
        let mut r = ring(1);
        assert!(r.is_empty());
        assert!(r.is_full());
        assert!(r.prepare_write().is_empty());
        assert_eq!(r.space(), 0);
    }

    #[test]
    fn test_first_write_span_leaves_last_cell() {
        let mut r = ring(8);
        assert_eq!(r.prepare_write().len(), 7);
    }

    #[test]
    fn test_write_span_splits_after_wrap() {
        let mut r = ring(8);
        assert_eq!(r.write_from(b"ABCDE"), 5);
        r.consume(4);

        // tail = 5, head = 4: contiguous span runs to the end of storage
        assert_eq!(r.prepare_write().len(), 3);
        r.commit_write(3);
        assert_eq!(r.space(), 3);

        // second call claims the rest, stopping one short of head
        assert_eq!(r.prepare_write().len(), 3);
    }

    #[test]
    fn test_read_span_splits_after_wrap() {
        let mut r = ring(4);
        r.write_from(b"abc");
        r.consume(2);
        r.write_from(b"de");

        assert_eq!(r.prepare_read(), b"cd");
        r.consume(2);
        assert_eq!(r.prepare_read(), b"e");
    }

    #[test]
    fn test_clear_resets_cursors() {
        let mut r = ring(4);
        r.write_from(b"xyz");
        r.consume(1);
        r.clear();
        assert!(r.is_empty());
        assert_eq!(r.space(), 3);
        assert_eq!(r.prepare_write().len(), 3);
    }

    #[test]
    #[should_panic(expected = "exceeds writable span")]
    fn test_overcommit_panics() {
        let mut r = ring(4);
        r.commit_write(4);
    }

    #[test]
    #[should_panic(expected = "exceeds readable span")]
    fn test_overconsume_panics() {
        let mut r = ring(4);
        r.write_from(b"a");
        r.consume(2);
    }

    #[test]
    fn test_prepare_read_mut_allows_in_place_edit() {
        let mut r = ring(4);
        r.write_from(b"ab");
        r.prepare_read_mut()[0] = b'z';
        let mut out = [0u8; 2];
        r.read_into(&mut out);
        assert_eq!(&out, b"zb");
    }

    #[rstest]
    #[case::fits(8, 5, 5)]
    #[case::exact(8, 7, 7)]
    #[case::truncated(8, 20, 7)]
    #[case::tiny(2, 3, 1)]
    fn test_write_from_stores_what_fits(
        #[case] capacity: usize,
        #[case] input: usize,
        #[case] stored: usize,
    ) {
        let mut r = ring(capacity);
        let data = vec![0xAB; input];
        assert_eq!(r.write_from(&data), stored);
        assert_eq!(r.len(), stored);
        assert_eq!(r.len() + r.space(), capacity - 1);
    }

    #[test]
    fn test_works_over_borrowed_storage() {
        let mut backing = [0u16; 5];
        let mut r = RingBuffer::new(&mut backing[..]);
        r.write_from(&[1, 2, 3]);
        let mut out = [0u16; 2];
        r.read_into(&mut out);
        assert_eq!(out, [1, 2]);
        drop(r);
        assert_eq!(&backing[..3], &[1, 2, 3]);
    }

    #[test]
    fn test_into_storage_returns_contents() {
        let mut r = ring(4);
        r.write_from(b"xyz");
        let storage = r.into_storage();
        assert_eq!(&storage[..3], b"xyz");
        assert_eq!(storage.len(), 4);
    }

    #[test]
    fn test_debug_shows_cursors() {
        let r = ring(4);
        let s = format!("{r:?}");
        assert!(s.contains("RingBuffer"));
        assert!(s.contains("capacity: 4"));
    }
}
