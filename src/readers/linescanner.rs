// src/readers/linescanner.rs

//! Implements a [`LineScanner`], the driver of a [`SlidingWindow`] that
//! finds successive lines.
//!
//! A line ends with a newline `'\n'` or with the end of the stream.
//! The bytes of a found line are borrowed from the window; they are valid
//! until the next [`scan`].
//!
//! [`scan`]: LineScanner::scan

use std::io::Read;

use ::memchr::memchr;
#[allow(unused_imports)]
use ::si_trace_print::{defn, defo, defx, defñ};

use crate::common::{Count, NLu8};
#[cfg(any(debug_assertions, test))]
use crate::debug::printers::buffer_to_String_noraw;
use crate::readers::slidingwindow::SlidingWindow;

/// Finds lines within a [`SlidingWindow`] without copying them.
#[derive(Debug)]
pub struct LineScanner<R> {
    window: SlidingWindow<R>,
    /// length of the current line at the front of the window
    pos: usize,
    /// bytes at the front of the window already searched for a newline
    searched: usize,
    /// the last `scan` returned `false`
    ended: bool,
    /// count of lines found
    pub(crate) lines: Count,
}

impl<R: Read> LineScanner<R> {
    pub fn new(reader: R) -> LineScanner<R> {
        LineScanner::from_window(SlidingWindow::new(reader))
    }

    pub fn from_window(window: SlidingWindow<R>) -> LineScanner<R> {
        LineScanner {
            window,
            pos: 0,
            searched: 0,
            ended: false,
            lines: 0,
        }
    }

    /// Advance to the next line. Returns `false` at the end of the stream,
    /// see [`error`] for why it ended.
    ///
    /// A stream that ends without a newline has a final line of the
    /// remaining bytes. A stream that ends with a newline has no extra empty
    /// final line. A stream that fails has no final line; the unterminated
    /// bytes before the failure are dropped.
    ///
    /// [`error`]: LineScanner::error
    pub fn scan(&mut self) -> bool {
        if self.ended {
            return false;
        }
        self.window.release(self.pos);
        self.pos = 0;
        self.searched = 0;
        loop {
            let window: &[u8] = self.window.window();
            if let Some(idx) = memchr(NLu8, &window[self.searched..]) {
                self.pos = self.searched + idx + 1;
                self.lines += 1;
                return true;
            }
            self.searched = window.len();
            if self.window.extend() == 0 {
                let remaining: usize = self.window.window().len();
                if remaining == 0 || self.window.error().is_some() {
                    defñ!("done, dropped {} bytes", remaining);
                    self.window.release(remaining);
                    self.ended = true;
                    return false;
                }
                self.pos = remaining;
                self.lines += 1;
                defñ!("final line {:?}", buffer_to_String_noraw(self.bytes()));
                return true;
            }
        }
    }
}

impl<R> LineScanner<R> {
    /// The current line, including its newline if it has one.
    #[inline(always)]
    pub fn bytes(&self) -> &[u8] {
        &self.window.window()[..self.pos]
    }

    /// The error that ended the stream. `None` while lines remain or after
    /// a clean end-of-stream.
    pub fn error(&self) -> Option<&std::io::Error> {
        if !self.ended {
            return None;
        }
        self.window.error()
    }

    /// `true` once [`scan`] returned `false`; every line was returned and
    /// the stream has ended, cleanly or not.
    ///
    /// [`scan`]: LineScanner::scan
    pub const fn is_exhausted(&self) -> bool {
        self.ended
    }

    /// Forget the current line and the stream state, keeping the window
    /// storage. Call after pointing the source at a new stream.
    pub fn reset(&mut self) {
        self.window.reset();
        self.pos = 0;
        self.searched = 0;
        self.ended = false;
    }

    /// Forget the current line and swap the window storage, see
    /// [`SlidingWindow::replace_storage`].
    pub fn replace_storage(&mut self, buffer: Vec<u8>) -> Vec<u8> {
        self.pos = 0;
        self.searched = 0;
        self.window.replace_storage(buffer)
    }

    pub fn window(&self) -> &SlidingWindow<R> {
        &self.window
    }

    pub fn get_ref(&self) -> &R {
        self.window.get_ref()
    }

    pub fn get_mut(&mut self) -> &mut R {
        self.window.get_mut()
    }
}
