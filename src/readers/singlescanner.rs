// src/readers/singlescanner.rs

//! Implements a [`SingleHourScanner`], the sequential driver of an
//! [`ObjectReader`] and a [`LineScanner`] over consecutive hourly objects.
//!
//! ## States
//!
//! ```text
//!   NoObject ──open hour──▶ ObjectOpen ──object ended──▶ NoObject
//!      │                       │    │
//!      │ past end              │    │ object ended and single hour
//!      ▼                       │    ▼
//!   Exhausted ◀────────────────┘  Exhausted
//!
//!   early stop ──▶ Exhausted
//!   any open error, read error, or cancellation ──▶ Errored
//!   close() ──▶ Closed
//! ```
//!
//! `Exhausted`, `Errored`, and `Closed` are terminal.

use std::fmt;
use std::sync::Arc;

#[allow(unused_imports)]
use ::si_trace_print::{defn, defo, defx, defñ};

use crate::common::{Count, Error, Result};
use crate::data::datetime::{hour_key, hour_next, DateTimeU, HourRange};
use crate::readers::linescanner::LineScanner;
use crate::readers::objectreader::ObjectReader;
use crate::readers::objectstore::ObjectStore;
use crate::readers::signal::CancelToken;
use crate::readers::summary::SummaryScanner;
use crate::readers::validators::Validators;

/// State of a [`SingleHourScanner`], see the module documentation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScannerState {
    NoObject,
    ObjectOpen,
    Exhausted,
    Errored,
    Closed,
}

/// Scans the lines of the hourly objects of a [`HourRange`], in order,
/// returning the lines that pass its [`Validators`].
pub struct SingleHourScanner {
    /// `None` once closed
    store: Option<Arc<dyn ObjectStore>>,
    bucket: String,
    validators: Arc<Validators>,
    range: HourRange,
    /// scan only the first hour of `range`
    single_hour: bool,
    /// once cancelled, end cleanly at the next line
    early_stop: Option<CancelToken>,
    /// hour of the current (or last) object
    cur_hour: Option<DateTimeU>,
    lines: LineScanner<ObjectReader>,
    state: ScannerState,
    err: Option<Error>,
    rejected: Count,
    returned: Count,
}

impl fmt::Debug for SingleHourScanner {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("SingleHourScanner")
            .field("bucket", &self.bucket)
            .field("range", &self.range)
            .field("single_hour", &self.single_hour)
            .field("early_stop", &self.early_stop.is_some())
            .field("cur_hour", &self.cur_hour)
            .field("state", &self.state)
            .field("err", &self.err)
            .finish()
    }
}

impl SingleHourScanner {
    /// Create a scanner over the hours of `[start, end)`. If `single_hour`
    /// then only the hour of `start` is scanned. No object is opened and no
    /// window storage is allocated until the first [`scan`].
    ///
    /// [`scan`]: SingleHourScanner::scan
    pub fn new(
        store: Arc<dyn ObjectStore>,
        bucket: &str,
        validators: Arc<Validators>,
        start: DateTimeU,
        end: DateTimeU,
        single_hour: bool,
    ) -> SingleHourScanner {
        defñ!("({}, {}, single_hour {})", start, end, single_hour);
        SingleHourScanner {
            store: Some(store),
            bucket: bucket.to_string(),
            validators,
            range: HourRange::new(start, end),
            single_hour,
            early_stop: None,
            cur_hour: None,
            lines: LineScanner::new(ObjectReader::new()),
            state: ScannerState::NoObject,
            err: None,
            rejected: 0,
            returned: 0,
        }
    }

    /// Once `early_stop` is cancelled the scanner ends without error at its
    /// next line; lines already returned stand. For validators that know no
    /// later line can pass.
    pub fn with_early_stop(mut self, early_stop: Option<CancelToken>) -> SingleHourScanner {
        self.early_stop = early_stop;

        self
    }

    /// Scan with `buffer` as the window storage instead of allocating one.
    /// Call before the first [`scan`].
    ///
    /// [`scan`]: SingleHourScanner::scan
    pub fn give_buffer(&mut self, buffer: Vec<u8>) {
        _ = self.lines.replace_storage(buffer);
    }

    /// Take the window storage, e.g. for the next hour's scanner. Ends
    /// the current line; call once done scanning.
    pub fn take_buffer(&mut self) -> Vec<u8> {
        self.lines.replace_storage(Vec::new())
    }

    /// Capacity of the window storage.
    pub fn buffer_capacity(&self) -> usize {
        self.lines.window().capacity()
    }

    /// Advance to the next line that passes the validators.
    ///
    /// Returns `false` when there are no more lines; [`err`] tells if that
    /// was a clean end.
    ///
    /// [`err`]: SingleHourScanner::err
    pub fn scan(&mut self, cancel: &CancelToken) -> bool {
        loop {
            match self.state {
                ScannerState::Exhausted
                | ScannerState::Errored
                | ScannerState::Closed => return false,
                ScannerState::NoObject | ScannerState::ObjectOpen => {}
            }
            if cancel.is_cancelled() {
                self.fail(Error::Cancelled);
                return false;
            }
            if self.early_stop.as_ref().map_or(false, |stop| stop.is_cancelled()) {
                defo!("early stop at {:?}", self.cur_hour);
                self.state = ScannerState::Exhausted;
                return false;
            }
            if self.state == ScannerState::ObjectOpen {
                if self.lines.scan() {
                    if self.validators.validate(self.lines.bytes()) {
                        self.returned += 1;
                        return true;
                    }
                    self.rejected += 1;
                    continue;
                }
                if let Some(err) = self.lines.error() {
                    let err = Error::from_read(self.lines.get_ref().key(), err);
                    self.fail(err);
                    return false;
                }
                defo!("object {:?} ended", self.lines.get_ref().key());
                if self.single_hour {
                    self.state = ScannerState::Exhausted;
                    return false;
                }
                self.state = ScannerState::NoObject;
            }
            if let Err(err) = self.open_next_hour() {
                self.fail(err);
                return false;
            }
        }
    }

    /// Advance the hour cursor and open the object of the new hour.
    /// Sets state `Exhausted` if the new hour is past the range.
    fn open_next_hour(&mut self) -> Result<()> {
        let hour: DateTimeU = match self.cur_hour {
            None => self.range.start(),
            Some(hour) => hour_next(&hour),
        };
        self.cur_hour = Some(hour);
        let first: bool = hour == self.range.start();
        if !self.range.contains(&hour) && !(self.single_hour && first) {
            defñ!("hour {} past {}", hour, self.range);
            self.state = ScannerState::Exhausted;
            return Ok(());
        }
        let store: Arc<dyn ObjectStore> = match self.store.as_ref() {
            Some(store) => Arc::clone(store),
            None => return Err(Error::Config(String::from("scanner is closed"))),
        };
        let key: String = hour_key(&hour);
        defn!("open {:?}", key);
        self.lines
            .get_mut()
            .open(store.as_ref(), &self.bucket, &key)?;
        self.lines.reset();
        self.state = ScannerState::ObjectOpen;
        defx!();

        Ok(())
    }

    fn fail(&mut self, err: Error) {
        defñ!("{}", err);
        self.err = Some(err);
        self.state = ScannerState::Errored;
    }

    /// The current line, including its newline if it has one.
    /// Valid until the next [`scan`].
    ///
    /// [`scan`]: SingleHourScanner::scan
    #[inline(always)]
    pub fn bytes(&self) -> &[u8] {
        self.lines.bytes()
    }

    /// The error that ended scanning, `None` for a clean end or while lines
    /// remain.
    pub fn err(&self) -> Option<&Error> {
        self.err.as_ref()
    }

    /// Release the object store and the window storage, and close the
    /// current object. Safe to call more than once.
    pub fn close(&mut self) -> Result<()> {
        if self.state == ScannerState::Closed {
            return Ok(());
        }
        defñ!("{:?}", self.cur_hour);
        self.state = ScannerState::Closed;
        self.store = None;
        _ = self.take_buffer();

        self.lines.get_mut().close()
    }

    pub const fn state(&self) -> ScannerState {
        self.state
    }

    /// Hour of the current (or last) object.
    pub const fn hour(&self) -> Option<DateTimeU> {
        self.cur_hour
    }

    pub const fn range(&self) -> &HourRange {
        &self.range
    }

    pub fn summary(&self) -> SummaryScanner {
        SummaryScanner {
            ObjectReader_opened: self.lines.get_ref().opened,
            SlidingWindow_bytes: self.lines.window().bytes_read,
            SlidingWindow_grows: self.lines.window().grows,
            SlidingWindow_compacts: self.lines.window().compacts,
            LineScanner_lines: self.lines.lines,
            Scanner_rejected: self.rejected,
            Scanner_returned: self.returned,
        }
    }
}
