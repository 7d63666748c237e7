// src/readers/scanner.rs

//! The caller-facing entry: [`ScannerOptions`], the resolved
//! [`ScannerConfig`], the [`LineScan`] pull interface, and
//! [`new_scanner`].
//!
//! ```no_run
//! use gharchivelib::data::datetime::datetime_parse_arg;
//! use gharchivelib::readers::scanner::{new_scanner, ScannerOptions};
//! use gharchivelib::readers::signal::CancelToken;
//!
//! let cancel = CancelToken::new();
//! let start = datetime_parse_arg("2020-01-02").unwrap();
//! let mut scanner = new_scanner(&cancel, start, ScannerOptions::default()).unwrap();
//! while scanner.scan(&cancel) {
//!     let _line: &[u8] = scanner.bytes();
//! }
//! assert!(scanner.err().is_none());
//! scanner.close().unwrap();
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

#[allow(unused_imports)]
use ::si_trace_print::{defn, defo, defx, defñ};

use crate::common::{Error, Result};
use crate::data::datetime::{hour_next, DateTimeU};
use crate::readers::concurrentscanner::ConcurrentScanner;
use crate::readers::objectstore::{
    HttpObjectStore,
    ObjectStore,
    BUCKET_DEFAULT,
    ENDPOINT_DEFAULT,
    HTTP_TIMEOUT_DEFAULT,
};
use crate::readers::signal::CancelToken;
use crate::readers::singlescanner::SingleHourScanner;
use crate::readers::summary::SummaryScanner;
use crate::readers::validators::Validators;

/// Default lines queued per worker of a [`ConcurrentScanner`].
pub const QUEUE_LINES_PER_WORKER_DEFAULT: usize = 100_000;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// options
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Options of a scanner. Every `None` takes a default, see
/// [`with_defaults`].
///
/// [`with_defaults`]: ScannerOptions::with_defaults
#[derive(Clone, Default)]
pub struct ScannerOptions {
    /// Opens the hourly objects. Default is an [`HttpObjectStore`] against
    /// `endpoint`.
    pub store: Option<Arc<dyn ObjectStore>>,
    /// Default [`BUCKET_DEFAULT`].
    pub bucket: Option<String>,
    /// Default accepts every line.
    pub validators: Validators,
    /// End of the range, exclusive. Default is one hour after the hour of
    /// the start.
    pub end_time: Option<DateTimeU>,
    /// Scan only the hour of the start, one object.
    pub single_hour: bool,
    /// Maximum hours scanned at once. Default is the available parallelism.
    pub concurrency: Option<usize>,
    /// Return lines in archive order; forces `concurrency` to 1.
    pub preserve_order: bool,
    /// Default [`QUEUE_LINES_PER_WORKER_DEFAULT`].
    pub queue_lines_per_worker: Option<usize>,
    /// Cancelled by a validator that knows no later line can pass, e.g.
    /// [`validate_created_at_window`]. Each hour's scanner then ends
    /// cleanly; lines already accepted are still returned.
    ///
    /// [`validate_created_at_window`]: crate::readers::validators::validate_created_at_window
    pub early_stop: Option<CancelToken>,
    /// Default [`ENDPOINT_DEFAULT`]. Ignored if `store` is set.
    pub endpoint: Option<String>,
    /// Default [`HTTP_TIMEOUT_DEFAULT`]. Ignored if `store` is set.
    pub http_timeout: Option<Duration>,
}

impl fmt::Debug for ScannerOptions {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ScannerOptions")
            .field("store", &self.store.is_some())
            .field("bucket", &self.bucket)
            .field("validators", &self.validators)
            .field("end_time", &self.end_time)
            .field("single_hour", &self.single_hour)
            .field("concurrency", &self.concurrency)
            .field("preserve_order", &self.preserve_order)
            .field("queue_lines_per_worker", &self.queue_lines_per_worker)
            .field("early_stop", &self.early_stop.is_some())
            .field("endpoint", &self.endpoint)
            .field("http_timeout", &self.http_timeout)
            .finish()
    }
}

/// Count of threads to use when the caller does not say.
pub fn concurrency_default() -> usize {
    match std::thread::available_parallelism() {
        Ok(count) => count.get(),
        Err(_err) => {
            defñ!("available_parallelism() failed {}", _err);
            1
        }
    }
}

impl ScannerOptions {
    /// Resolve every default. Creates the HTTP client if no `store` was
    /// passed.
    pub fn with_defaults(self) -> Result<ScannerConfig> {
        defn!("{:?}", self);
        let store: Arc<dyn ObjectStore> = match self.store {
            Some(store) => store,
            None => {
                let endpoint: &str = self
                    .endpoint
                    .as_deref()
                    .unwrap_or(ENDPOINT_DEFAULT);
                let timeout = self
                    .http_timeout
                    .unwrap_or(HTTP_TIMEOUT_DEFAULT);
                Arc::new(HttpObjectStore::new(endpoint, timeout)?)
            }
        };
        let bucket: String = match self.bucket {
            Some(bucket) if bucket.is_empty() => {
                defx!("empty bucket");
                return Err(Error::Config(String::from("bucket name is empty")));
            }
            Some(bucket) => bucket,
            None => String::from(BUCKET_DEFAULT),
        };
        let concurrency: usize = if self.preserve_order {
            1
        } else {
            match self.concurrency {
                Some(0) | None => concurrency_default(),
                Some(count) => count,
            }
        };
        let queue_lines_per_worker: usize = match self.queue_lines_per_worker {
            Some(0) => {
                defx!("queue_lines_per_worker 0");
                return Err(Error::Config(String::from("queue lines per worker must be at least 1")));
            }
            Some(count) => count,
            None => QUEUE_LINES_PER_WORKER_DEFAULT,
        };
        let config = ScannerConfig {
            store,
            bucket,
            validators: Arc::new(self.validators),
            end_time: self.end_time,
            single_hour: self.single_hour,
            concurrency,
            preserve_order: self.preserve_order,
            queue_lines_per_worker,
            early_stop: self.early_stop,
        };
        defx!("{:?}", config);

        Ok(config)
    }
}

/// [`ScannerOptions`] with every default resolved.
#[derive(Clone)]
pub struct ScannerConfig {
    pub store: Arc<dyn ObjectStore>,
    pub bucket: String,
    pub validators: Arc<Validators>,
    pub end_time: Option<DateTimeU>,
    pub single_hour: bool,
    /// at least 1; 1 if `preserve_order`
    pub concurrency: usize,
    pub preserve_order: bool,
    /// at least 1
    pub queue_lines_per_worker: usize,
    pub early_stop: Option<CancelToken>,
}

impl fmt::Debug for ScannerConfig {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ScannerConfig")
            .field("bucket", &self.bucket)
            .field("validators", &self.validators)
            .field("end_time", &self.end_time)
            .field("single_hour", &self.single_hour)
            .field("concurrency", &self.concurrency)
            .field("preserve_order", &self.preserve_order)
            .field("queue_lines_per_worker", &self.queue_lines_per_worker)
            .field("early_stop", &self.early_stop.is_some())
            .finish()
    }
}

impl ScannerConfig {
    /// End of the range of a scan from `start`.
    pub fn end_for(&self, start: &DateTimeU) -> DateTimeU {
        match self.end_time {
            Some(end) => end,
            None => hour_next(start),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// LineScan
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Pull interface common to [`SingleHourScanner`] and
/// [`ConcurrentScanner`].
pub trait LineScan: Send {
    /// Advance to the next line. `false` means no more lines; check
    /// [`err`](LineScan::err).
    fn scan(&mut self, cancel: &CancelToken) -> bool;
    /// The current line. Valid until the next `scan`.
    fn bytes(&self) -> &[u8];
    /// The terminal error; `None` for a clean end or while lines remain.
    fn err(&self) -> Option<Error>;
    /// Release every resource. Safe to call more than once.
    fn close(&mut self) -> Result<()>;
    /// Statistics so far.
    fn summary(&self) -> SummaryScanner;
}

impl LineScan for SingleHourScanner {
    fn scan(&mut self, cancel: &CancelToken) -> bool {
        SingleHourScanner::scan(self, cancel)
    }

    fn bytes(&self) -> &[u8] {
        SingleHourScanner::bytes(self)
    }

    fn err(&self) -> Option<Error> {
        SingleHourScanner::err(self).cloned()
    }

    fn close(&mut self) -> Result<()> {
        SingleHourScanner::close(self)
    }

    fn summary(&self) -> SummaryScanner {
        SingleHourScanner::summary(self)
    }
}

impl LineScan for ConcurrentScanner {
    fn scan(&mut self, cancel: &CancelToken) -> bool {
        ConcurrentScanner::scan(self, cancel)
    }

    fn bytes(&self) -> &[u8] {
        ConcurrentScanner::bytes(self)
    }

    fn err(&self) -> Option<Error> {
        ConcurrentScanner::err(self).cloned()
    }

    fn close(&mut self) -> Result<()> {
        ConcurrentScanner::close(self)
    }

    fn summary(&self) -> SummaryScanner {
        ConcurrentScanner::summary(self)
    }
}

/// Create a scanner of the lines of the hourly objects from `start`.
///
/// With `options.single_hour` the result is a [`SingleHourScanner`] of the
/// hour of `start`. Otherwise it is a [`ConcurrentScanner`] of the range;
/// with `options.preserve_order` it runs one worker so lines are in archive
/// order.
pub fn new_scanner(
    cancel: &CancelToken,
    start: DateTimeU,
    options: ScannerOptions,
) -> Result<Box<dyn LineScan>> {
    let config: ScannerConfig = options.with_defaults()?;
    defn!("start {}, {:?}", start, config);
    if config.single_hour {
        defx!("SingleHourScanner");
        let scanner = SingleHourScanner::new(
            Arc::clone(&config.store),
            &config.bucket,
            Arc::clone(&config.validators),
            start,
            config.end_for(&start),
            true,
        )
        .with_early_stop(config.early_stop.clone());

        return Ok(Box::new(scanner));
    }
    let scanner = ConcurrentScanner::new(cancel, start, &config)?;
    defx!("ConcurrentScanner concurrency {}", scanner.concurrency());

    Ok(Box::new(scanner))
}
