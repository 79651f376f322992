#![forbid(unsafe_code)]

//! `kithara-ring`
//!
//! Fixed-capacity circular buffer for Kithara input streams.
//!
//! [`RingBuffer`] does not own or allocate memory: the storage is handed in at
//! construction (a `Box<[T]>`, a `Vec<T>`, a borrowed slice, an array) and
//! handed back by [`RingBuffer::into_storage`]. It is not synchronized; the
//! owner serializes access (see `kithara-input`, which keeps it under the
//! stream lock).
//!
//! ## Layout
//!
//! Everything between `head` and `tail` is valid data (it may wrap around).
//! `head == tail` means empty, so one cell is never used:
//! `len() + space() == capacity() - 1` at all times.
//!
//! ## Usage
//!
//! ```
//! use kithara_ring::RingBuffer;
//!
//! let mut ring = RingBuffer::new(vec![0u8; 8]);
//! assert_eq!(ring.write_from(b"ABCDEFG"), 7);
//! assert!(ring.is_full());
//!
//! let mut out = [0u8; 3];
//! assert_eq!(ring.read_into(&mut out), 3);
//! assert_eq!(&out, b"ABC");
//! ```

mod ring;

pub use ring::RingBuffer;
