// src/readers/slidingwindow.rs

//! Implements a [`SlidingWindow`], a growable byte buffer over a
//! [`Read`] source.
//!
//! The "window" is the bytes read from the source and not yet released.
//! Releasing bytes only advances an offset; the released bytes are
//! overwritten by later [`extend`] calls, which compact or grow the storage
//! as needed.
//!
//! [`extend`]: SlidingWindow::extend

use std::fmt;
use std::io::{ErrorKind, Read};

use ::more_asserts::{debug_assert_le, debug_assert_lt};
#[allow(unused_imports)]
use ::si_trace_print::{defn, defo, defx, defñ};

use crate::common::Count;

/// Size of a newly allocated window storage.
pub const BUFSZ_NEW: usize = 4096;

/// Smallest free space an [`extend`] will read into. Less free space than
/// this forces compaction or growth.
///
/// [`extend`]: SlidingWindow::extend
pub const READSZ_MIN: usize = BUFSZ_NEW >> 2;

/// State of the underlying source.
///
/// `Exhausted` is sticky; once set no more reads are attempted.
#[derive(Debug)]
pub enum WindowState {
    /// The source may have more bytes.
    Open,
    /// The source returned end-of-stream (`None`) or failed (`Some`).
    Exhausted(Option<std::io::Error>),
}

/// A sliding window over `reader`.
///
/// Invariants:
/// * `offset <= len <= data.len()`
/// * [`window`] is `data[offset..len]`
///
/// `data` is fully initialized storage; its length is the usable capacity.
///
/// [`window`]: SlidingWindow::window
pub struct SlidingWindow<R> {
    /// storage; `data.len()` is the capacity of the window
    data: Vec<u8>,
    /// end of the bytes read into `data`
    len: usize,
    /// count of released bytes at the front of `data`
    offset: usize,
    reader: R,
    state: WindowState,
    /// count of bytes read from `reader`
    pub(crate) bytes_read: Count,
    /// count of times the storage was reallocated
    pub(crate) grows: Count,
    /// count of times the window was moved to the front of the storage
    pub(crate) compacts: Count,
}

impl<R> fmt::Debug for SlidingWindow<R> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("SlidingWindow")
            .field("cap", &self.data.len())
            .field("len", &self.len)
            .field("offset", &self.offset)
            .field("state", &self.state)
            .field("bytes_read", &self.bytes_read)
            .finish()
    }
}

impl<R: Read> SlidingWindow<R> {
    /// Create a `SlidingWindow` that reads from `reader`. No storage is
    /// allocated until the first [`extend`].
    ///
    /// [`extend`]: SlidingWindow::extend
    pub fn new(reader: R) -> SlidingWindow<R> {
        SlidingWindow::with_buffer(reader, Vec::new())
    }

    /// Create a `SlidingWindow` that reuses the storage of `buffer`.
    /// The contents of `buffer` are ignored.
    pub fn with_buffer(reader: R, mut buffer: Vec<u8>) -> SlidingWindow<R> {
        let cap = buffer.capacity();
        buffer.resize(cap, 0);
        SlidingWindow {
            data: buffer,
            len: 0,
            offset: 0,
            reader,
            state: WindowState::Open,
            bytes_read: 0,
            grows: 0,
            compacts: 0,
        }
    }

    /// Discard `n` bytes from the front of the window.
    #[inline(always)]
    pub fn release(&mut self, n: usize) {
        debug_assert_le!(n, self.len - self.offset, "release({}) more than the window", n);
        self.offset += n;
    }

    /// Read more bytes from the source onto the end of the window.
    ///
    /// Returns the count of bytes appended. Returns `0` only if the source
    /// is exhausted, in which case every later call also returns `0`.
    pub fn extend(&mut self) -> usize {
        if !self.is_open() {
            return 0;
        }
        defn!("{:?}", self);
        let remaining: usize = self.len - self.offset;
        if remaining == 0 {
            self.len = 0;
            self.offset = 0;
        }
        let cap: usize = self.data.len();
        if cap - self.len >= READSZ_MIN {
            // enough free space after the window
        } else if cap - remaining >= READSZ_MIN {
            self.compact();
        } else {
            self.grow();
        }
        debug_assert_lt!(self.len, self.data.len(), "no free space to read into");
        let n: usize = loop {
            match self.reader.read(&mut self.data[self.len..]) {
                Ok(0) => {
                    defo!("reader exhausted");
                    self.state = WindowState::Exhausted(None);
                    break 0;
                }
                Ok(n) => break n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => {
                    defo!("reader error {}", err);
                    self.state = WindowState::Exhausted(Some(err));
                    break 0;
                }
            }
        };
        self.len += n;
        self.bytes_read += n as Count;
        defx!("read {} bytes", n);

        n
    }

    /// Move the window to the front of the storage.
    fn compact(&mut self) {
        defñ!("offset {}, len {}", self.offset, self.len);
        self.data.copy_within(self.offset..self.len, 0);
        self.len -= self.offset;
        self.offset = 0;
        self.compacts += 1;
    }

    /// Replace the storage with one at least twice as large, the window
    /// moved to its front.
    fn grow(&mut self) {
        let cap_new: usize = std::cmp::max(self.data.len() * 2, BUFSZ_NEW);
        defñ!("{} → {}", self.data.len(), cap_new);
        let mut data: Vec<u8> = vec![0; cap_new];
        let remaining = self.len - self.offset;
        data[..remaining].copy_from_slice(&self.data[self.offset..self.len]);
        self.data = data;
        self.len = remaining;
        self.offset = 0;
        self.grows += 1;
    }
}

impl<R> SlidingWindow<R> {
    /// The unreleased bytes.
    ///
    /// Invalidated by the next [`release`] or [`extend`].
    ///
    /// [`release`]: SlidingWindow::release
    /// [`extend`]: SlidingWindow::extend
    #[inline(always)]
    pub fn window(&self) -> &[u8] {
        &self.data[self.offset..self.len]
    }

    /// `true` until the source has returned end-of-stream or an error.
    #[inline(always)]
    pub const fn is_open(&self) -> bool {
        matches!(self.state, WindowState::Open)
    }

    /// The error that ended the source, if any. `None` while open or after
    /// a clean end-of-stream.
    pub fn error(&self) -> Option<&std::io::Error> {
        match &self.state {
            WindowState::Exhausted(Some(err)) => Some(err),
            _ => None,
        }
    }

    /// Capacity of the storage.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Empty the window and mark the source open again, keeping the
    /// storage. Used after the source itself was pointed at a new stream.
    pub fn reset(&mut self) {
        defñ!();
        self.len = 0;
        self.offset = 0;
        self.state = WindowState::Open;
    }

    /// Install `buffer` as the storage and return the old storage. The
    /// window is emptied; the source state is kept. The contents of
    /// `buffer` are ignored.
    ///
    /// Pass `Vec::new()` to release the storage.
    pub fn replace_storage(&mut self, mut buffer: Vec<u8>) -> Vec<u8> {
        defñ!("{} → {}", self.data.len(), buffer.capacity());
        let cap = buffer.capacity();
        buffer.resize(cap, 0);
        self.len = 0;
        self.offset = 0;

        std::mem::replace(&mut self.data, buffer)
    }

    pub fn get_ref(&self) -> &R {
        &self.reader
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.reader
    }

    /// Consume this `SlidingWindow` returning the source and the storage.
    pub fn into_parts(self) -> (R, Vec<u8>) {
        (self.reader, self.data)
    }
}
