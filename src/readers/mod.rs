// src/readers/mod.rs

//! "Readers" for _gharchivelib_.
//!
//! ## Overview of readers
//!
//! * A [`ConcurrentScanner`] drives one [`SingleHourScanner`] per hour on a
//!   pool of worker threads and merges their lines.
//! * A `SingleHourScanner` drives a [`LineScanner`] over an
//!   [`ObjectReader`], one hourly object after another, filtering lines
//!   with [`Validators`].
//! * A `LineScanner` drives a [`SlidingWindow`] to find lines.
//! * An `ObjectReader` decompresses the [`ObjectStream`] opened by an
//!   [`ObjectStore`].
//!
//! <br/>
//!
//! * A `SlidingWindow` and a `LineScanner` only handle `u8` bytes; lines
//!   are never converted to `str`.
//! * A found line is borrowed from the `SlidingWindow` until the next scan.
//!   A `ConcurrentScanner` copies each line before handing it to another
//!   thread.
//!
//! <br/>
//!
//! Callers start from [`new_scanner`].
//!
//! [`ConcurrentScanner`]: crate::readers::concurrentscanner::ConcurrentScanner
//! [`SingleHourScanner`]: crate::readers::singlescanner::SingleHourScanner
//! [`LineScanner`]: crate::readers::linescanner::LineScanner
//! [`ObjectReader`]: crate::readers::objectreader::ObjectReader
//! [`Validators`]: crate::readers::validators::Validators
//! [`SlidingWindow`]: crate::readers::slidingwindow::SlidingWindow
//! [`ObjectStream`]: crate::readers::objectstore::ObjectStream
//! [`ObjectStore`]: crate::readers::objectstore::ObjectStore
//! [`new_scanner`]: crate::readers::scanner::new_scanner

pub mod concurrentscanner;
pub mod linescanner;
pub mod objectreader;
pub mod objectstore;
pub mod scanner;
pub mod signal;
pub mod singlescanner;
pub mod slidingwindow;
pub mod summary;
pub mod validators;
