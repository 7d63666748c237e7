// src/common.rs
//
// common imports, type aliases, and other globals (avoids circular imports)

//! Common type aliases, the crate [`Error`], and the custom [`ResultS3`]
//! enum shared by the _Readers_.

use std::io::ErrorKind;

use ::thiserror::Error as ThisError;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// bytes and counts
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// General purpose counting type, typically used for internal statistics.
pub type Count = u64;

/// An owned copy of one line. Used where a line must outlive the
/// sliding window it was found in.
pub type LineBytes = Vec<u8>;

/// Newline byte.
#[allow(non_upper_case_globals)]
pub const NLu8: u8 = b'\n';

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Error
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Terminal conditions of scanning an hourly object.
///
/// Every variant carries owned `String`s so an `Error` may be copied out of
/// the per-worker result slots of a [`ConcurrentScanner`].
///
/// Clean end of a stream is not an `Error`; it is [`ResultS3::Done`] or a
/// `false` return from `scan` with no `err()`.
///
/// [`ConcurrentScanner`]: crate::readers::concurrentscanner::ConcurrentScanner
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum Error {
    /// The requested hour has no object.
    #[error("object {key:?} not found in bucket {bucket:?}")]
    NotFound { bucket: String, key: String },
    /// Network or storage failure while opening or reading an object.
    #[error("transport error for {key:?}: {message}")]
    Transport { key: String, message: String },
    /// Malformed compressed data.
    #[error("decode error for {key:?}: {message}")]
    Decode { key: String, message: String },
    /// Cooperative cancellation was observed.
    #[error("cancelled")]
    Cancelled,
    /// Bad options or a collaborator that could not be created.
    #[error("configuration error: {0}")]
    Config(String),
    /// A worker thread could not be spawned.
    #[error("thread error: {0}")]
    Thread(String),
}

impl Error {
    /// Classify an [`std::io::Error`] returned while reading object `key`.
    ///
    /// The gzip decoder reports malformed data as `InvalidData`,
    /// `InvalidInput` or a truncated stream as `UnexpectedEof`; anything else
    /// came from the underlying transport.
    pub fn from_read(key: &str, err: &std::io::Error) -> Error {
        match err.kind() {
            ErrorKind::InvalidData
            | ErrorKind::InvalidInput
            | ErrorKind::UnexpectedEof => Error::Decode {
                key: key.to_string(),
                message: err.to_string(),
            },
            _ => Error::Transport {
                key: key.to_string(),
                message: err.to_string(),
            },
        }
    }

    /// Returns `true` if this is [`Error::Cancelled`].
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

/// `Result` with the crate [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// custom Results enums for various *Reader functions
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

// XXX: ripped from '\.rustup\toolchains\beta-x86_64-pc-windows-msvc\lib\rustlib\src\rust\library\core\src\result.rs'
//      https://doc.rust-lang.org/src/core/result.rs.html#481-495

/// `Result` Extended
/// for pulling lines out of a stream
#[derive(Debug, PartialEq)]
pub enum ResultS3<T, E> {
    /// Contains the success data
    Found(T),
    /// Stream is exhausted, nothing to return, but no bad errors happened
    Done,
    /// Contains the error value, something bad happened
    Err(E),
}

impl<T, E> ResultS3<T, E> {
    /// Returns `true` if the result is [`Found`, 'Done`].
    #[inline(always)]
    pub const fn is_ok(&self) -> bool {
        matches!(*self, ResultS3::Found(_) | ResultS3::Done)
    }

    /// Returns `true` if the result is [`Found`].
    #[inline(always)]
    pub const fn is_found(&self) -> bool {
        matches!(*self, ResultS3::Found(_))
    }

    /// Returns `true` if the result is [`Err`].
    #[inline(always)]
    pub const fn is_err(&self) -> bool {
        !self.is_ok()
    }

    /// Returns `true` if the result is [`Done`].
    #[inline(always)]
    pub const fn is_done(&self) -> bool {
        matches!(*self, ResultS3::Done)
    }

    /// Converts from `ResultS3<T, E>` to [`Option<E>`], discarding the
    /// success value, if any.
    #[inline(always)]
    pub fn err(self) -> Option<E> {
        match self {
            ResultS3::Found(_) => None,
            ResultS3::Done => None,
            ResultS3::Err(x) => Some(x),
        }
    }
}

impl<T, E> std::fmt::Display for ResultS3<T, E>
where
    E: std::fmt::Display,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResultS3::Found(_) => { write!(f, "ResultS3::Found") },
            ResultS3::Done => { write!(f, "ResultS3::Done") },
            ResultS3::Err(err) => { write!(f, "ResultS3::Err({})", err) },
        }
    }
}
