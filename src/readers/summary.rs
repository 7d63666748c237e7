// src/readers/summary.rs

//! Implements `SummaryScanner` statistics tracking struct.

#![allow(non_snake_case)]

use std::fmt;
use std::ops::AddAssign;

use crate::common::Count;

/// Accumulated statistics of a [`SingleHourScanner`], or of all the
/// `SingleHourScanner`s of a [`ConcurrentScanner`].
///
/// For the command-line option `--debug`.
///
/// [`SingleHourScanner`]: crate::readers::singlescanner::SingleHourScanner
/// [`ConcurrentScanner`]: crate::readers::concurrentscanner::ConcurrentScanner
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SummaryScanner {
    /// count of hourly objects opened
    pub ObjectReader_opened: Count,
    /// count of decompressed bytes read
    pub SlidingWindow_bytes: Count,
    /// count of times the window storage grew
    pub SlidingWindow_grows: Count,
    /// count of times the window was moved to the front of its storage
    pub SlidingWindow_compacts: Count,
    /// count of lines found
    pub LineScanner_lines: Count,
    /// count of lines rejected by the validators
    pub Scanner_rejected: Count,
    /// count of lines returned to the caller
    pub Scanner_returned: Count,
}

impl AddAssign for SummaryScanner {
    fn add_assign(&mut self, other: SummaryScanner) {
        self.ObjectReader_opened += other.ObjectReader_opened;
        self.SlidingWindow_bytes += other.SlidingWindow_bytes;
        self.SlidingWindow_grows += other.SlidingWindow_grows;
        self.SlidingWindow_compacts += other.SlidingWindow_compacts;
        self.LineScanner_lines += other.LineScanner_lines;
        self.Scanner_rejected += other.Scanner_rejected;
        self.Scanner_returned += other.Scanner_returned;
    }
}

impl fmt::Display for SummaryScanner {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "objects {}, bytes {}, window grows {}, window compacts {}, lines {}, rejected {}, returned {}",
            self.ObjectReader_opened,
            self.SlidingWindow_bytes,
            self.SlidingWindow_grows,
            self.SlidingWindow_compacts,
            self.LineScanner_lines,
            self.Scanner_rejected,
            self.Scanner_returned,
        )
    }
}
