// src/data/mod.rs

//! The `data` module is definitions of the archive's data addressing.
//!
//! ## Definitions of data
//!
//! ### Hourly object
//!
//! An "hourly object" is one gzip compressed file the archive publishes per
//! UTC hour. It holds the events created in that hour, one JSON object per
//! line, in chronological order.
//!
//! An hourly object is addressed by a key derived from its hour, see
//! [`hour_key`].
//!
//! ### Line
//!
//! A "line" is a sequence of bytes of a decompressed hourly object that:
//!
//! * begins after a prior "line" or at the beginning of the object.
//! * ends with a newline character `'\n'` or at the end of the object.
//!
//! A "line" is found by a [`LineScanner`].
//!
//! [`hour_key`]: crate::data::datetime::hour_key
//! [`LineScanner`]: crate::readers::linescanner::LineScanner

pub mod datetime;
