// src/readers/concurrentscanner.rs

//! Implements a [`ConcurrentScanner`], the fan-out of one
//! [`SingleHourScanner`] per hour over a bounded pool of worker threads,
//! and the fan-in of their lines into one pull-based stream.
//!
//! ## Threads
//!
//! * Each worker thread takes the index of the next hour from a job
//!   channel, scans that hour to its end, and copies every line into a
//!   [`LineBytes`] sent over the bounded _lines_ channel. A full lines
//!   channel blocks the worker.
//! * A waiter thread joins the workers then fires the _done_
//!   [`OnceSignal`].
//! * The caller thread pulls lines with [`ConcurrentScanner::scan`].
//!
//! Within an hour lines keep their order. Lines of different hours are
//! interleaved unless there is only one worker.
//!
//! Consumed `LineBytes` are sent back to the workers over a _recycle_
//! channel so steady-state scanning does not allocate per line.
//!
//! A worker hands its window storage from each hour's scanner to the
//! next, and a finished hour's scanner holds no storage, so memory follows
//! the count of workers, not the count of hours.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, TryLockError};
use std::thread;

use ::crossbeam_channel::{select, Receiver, Sender};
#[allow(unused_imports)]
use ::si_trace_print::{defn, defo, defx, defñ};

use crate::common::{Error, LineBytes, Result, ResultS3};
use crate::data::datetime::{hour_key, Duration, DateTimeU, HourRange};
#[allow(unused_imports)]
use crate::debug::printers::{de_err, de_wrn};
use crate::readers::scanner::ScannerConfig;
use crate::readers::signal::{CancelToken, OnceSignal};
use crate::readers::singlescanner::SingleHourScanner;
use crate::readers::summary::SummaryScanner;

/// Initial capacity of a newly allocated [`LineBytes`]. Most archive lines
/// are a few kilobytes.
pub const LINE_BUFSZ: usize = 8192;

/// Count of consumed [`LineBytes`] kept for reuse, per worker.
pub const RECYCLE_PER_WORKER: usize = 16;

/// Name prefix of the worker threads.
const WORKER_THREAD_NAME: &str = "gharchive-worker";

/// Name of the thread that joins the workers.
const WAITER_THREAD_NAME: &str = "gharchive-waiter";

/// A per-hour scanner shared between the workers and the
/// `ConcurrentScanner`. The worker running the hour holds the lock.
type Slot = Mutex<SingleHourScanner>;

/// Outcome of one hour, indexed by the hour's position in the range.
#[derive(Clone, Debug, Default)]
struct SlotResult {
    /// the worker finished with this hour
    finished: bool,
    /// terminal scanning error; `None` for a clean end of the object
    scan: Option<Error>,
    /// error closing the hour's scanner
    close: Option<Error>,
}

type SlotResults = Arc<Mutex<Vec<SlotResult>>>;

/// Why a blocked [`ConcurrentScanner::scan`] woke.
enum Wake {
    Line(LineBytes),
    Finished,
    Cancelled,
}

/// Everything a worker thread needs.
struct WorkerData {
    jobs: Receiver<usize>,
    slots: Arc<Vec<Slot>>,
    results: SlotResults,
    lines: Sender<LineBytes>,
    recycle: Receiver<LineBytes>,
    cancel: CancelToken,
}

/// Scans the hours of a range concurrently, see the module documentation.
pub struct ConcurrentScanner {
    /// one scanner per hour, in chronological order
    slots: Arc<Vec<Slot>>,
    results: SlotResults,
    /// hours of `slots`
    hours: Vec<DateTimeU>,
    lines_rx: Receiver<LineBytes>,
    recycle_tx: Sender<LineBytes>,
    /// cancels the workers; a child of the token passed to `new`
    cancel: CancelToken,
    /// fired once every worker has exited
    done: Arc<OnceSignal>,
    waiter: Option<thread::JoinHandle<()>>,
    /// the current line
    line: LineBytes,
    /// merged error, set once finished
    err: Option<Error>,
    finished: bool,
    closed: bool,
    concurrency: usize,
}

impl fmt::Debug for ConcurrentScanner {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ConcurrentScanner")
            .field("hours", &self.hours.len())
            .field("concurrency", &self.concurrency)
            .field("queued", &self.lines_rx.len())
            .field("finished", &self.finished)
            .field("closed", &self.closed)
            .field("err", &self.err)
            .finish()
    }
}

impl ConcurrentScanner {
    /// Create a scanner over every hour of `[floor(start), end)` where `end`
    /// is `config.end_time` or one hour after the hour of `start`.
    ///
    /// Starts `min(config.concurrency, hours)` worker threads immediately.
    /// Cancelling `cancel` stops them.
    pub fn new(
        cancel: &CancelToken,
        start: DateTimeU,
        config: &ScannerConfig,
    ) -> Result<ConcurrentScanner> {
        let range: HourRange = HourRange::new(start, config.end_for(&start));
        defn!("range {}, concurrency {}", range, config.concurrency);
        let hours: Vec<DateTimeU> = range.iter().collect();
        let slots: Vec<Slot> = hours
            .iter()
            .map(|hour| {
                Mutex::new(
                    SingleHourScanner::new(
                        Arc::clone(&config.store),
                        &config.bucket,
                        Arc::clone(&config.validators),
                        *hour,
                        *hour + Duration::hours(1),
                        true,
                    )
                    .with_early_stop(config.early_stop.clone()),
                )
            })
            .collect();
        let slots: Arc<Vec<Slot>> = Arc::new(slots);
        let results: SlotResults = Arc::new(Mutex::new(vec![SlotResult::default(); hours.len()]));
        let concurrency: usize = std::cmp::max(config.concurrency, 1);
        let workers: usize = std::cmp::min(concurrency, hours.len());
        let queue_cap: usize = std::cmp::max(concurrency * config.queue_lines_per_worker, 1);
        defo!("workers {}, queue_cap {}", workers, queue_cap);

        let (lines_tx, lines_rx) = ::crossbeam_channel::bounded::<LineBytes>(queue_cap);
        let (recycle_tx, recycle_rx) =
            ::crossbeam_channel::bounded::<LineBytes>(concurrency * RECYCLE_PER_WORKER);
        let (jobs_tx, jobs_rx) = ::crossbeam_channel::bounded::<usize>(std::cmp::max(hours.len(), 1));
        for index in 0..hours.len() {
            // cannot fail; the channel has room for every index and the
            // receiver is held here
            _ = jobs_tx.send(index);
        }
        drop(jobs_tx);

        let cancel: CancelToken = cancel.child();
        let done: Arc<OnceSignal> = Arc::new(OnceSignal::new());
        let mut handles: Vec<thread::JoinHandle<()>> = Vec::with_capacity(workers);
        for worker in 0..workers {
            let data = WorkerData {
                jobs: jobs_rx.clone(),
                slots: Arc::clone(&slots),
                results: Arc::clone(&results),
                lines: lines_tx.clone(),
                recycle: recycle_rx.clone(),
                cancel: cancel.clone(),
            };
            let name = format!("{}-{}", WORKER_THREAD_NAME, worker);
            match thread::Builder::new()
                .name(name.clone())
                .spawn(move || exec_worker_thread(data))
            {
                Ok(handle) => handles.push(handle),
                Err(err) => {
                    de_err!("thread.name({:?}).spawn() failed {}", name, err);
                    cancel.cancel();
                    defx!("spawn failed");
                    return Err(Error::Thread(format!("spawn {}: {}", name, err)));
                }
            }
        }
        // workers hold the only senders; the channel disconnects when the
        // last worker exits
        drop(lines_tx);

        let done_waiter = Arc::clone(&done);
        let waiter = match thread::Builder::new()
            .name(WAITER_THREAD_NAME.to_string())
            .spawn(move || {
                for handle in handles.into_iter() {
                    if let Err(_err) = handle.join() {
                        de_err!("worker thread panicked {:?}", _err);
                    }
                }
                done_waiter.fire();
            }) {
            Ok(handle) => handle,
            Err(err) => {
                de_err!("thread.name({:?}).spawn() failed {}", WAITER_THREAD_NAME, err);
                cancel.cancel();
                defx!("spawn failed");
                return Err(Error::Thread(format!("spawn {}: {}", WAITER_THREAD_NAME, err)));
            }
        };
        defx!();

        Ok(ConcurrentScanner {
            slots,
            results,
            hours,
            lines_rx,
            recycle_tx,
            cancel,
            done,
            waiter: Some(waiter),
            line: LineBytes::new(),
            err: None,
            finished: false,
            closed: false,
            concurrency: workers,
        })
    }

    /// Advance to the next line from any hour.
    ///
    /// Returns `false` once every hour has ended or `cancel` is cancelled;
    /// [`err`] is then the first error in hour order, if any.
    ///
    /// [`err`]: ConcurrentScanner::err
    pub fn scan(&mut self, cancel: &CancelToken) -> bool {
        match self.next_line(cancel) {
            ResultS3::Found(line) => {
                let old: LineBytes = std::mem::replace(&mut self.line, line);
                // a full recycle channel drops `old`
                _ = self.recycle_tx.try_send(old);
                true
            }
            ResultS3::Done => {
                self.line.clear();
                false
            }
            ResultS3::Err(err) => {
                self.line.clear();
                self.err = Some(err);
                false
            }
        }
    }

    fn next_line(&mut self, cancel: &CancelToken) -> ResultS3<LineBytes, Error> {
        if self.finished {
            return ResultS3::Done;
        }
        if cancel.is_cancelled() {
            return self.cancelled();
        }
        if let Ok(line) = self.lines_rx.try_recv() {
            return ResultS3::Found(line);
        }
        let wake: Wake = select! {
            recv(self.lines_rx) -> line => match line {
                Ok(line) => Wake::Line(line),
                // every worker exited and the queue is empty
                Err(_) => Wake::Finished,
            },
            recv(self.done.receiver()) -> _ => match self.lines_rx.try_recv() {
                Ok(line) => Wake::Line(line),
                Err(_) => Wake::Finished,
            },
            recv(cancel.receiver()) -> _ => Wake::Cancelled,
        };
        match wake {
            Wake::Line(line) => ResultS3::Found(line),
            Wake::Finished => self.finish(),
            Wake::Cancelled => self.cancelled(),
        }
    }

    /// The caller cancelled while waiting.
    fn cancelled(&mut self) -> ResultS3<LineBytes, Error> {
        defñ!();
        self.cancel.cancel();
        self.finished = true;

        ResultS3::Err(Error::Cancelled)
    }

    /// Every worker exited; merge their errors.
    fn finish(&mut self) -> ResultS3<LineBytes, Error> {
        self.finished = true;
        match self.merged_error() {
            Some(err) => {
                defñ!("{}", err);
                ResultS3::Err(err)
            }
            None => {
                defñ!("done");
                ResultS3::Done
            }
        }
    }

    /// The first scanning error in hour order. An hour whose worker never
    /// finished with it (the worker panicked) is an error.
    fn merged_error(&self) -> Option<Error> {
        let results = self
            .results
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for (hour, result) in self.hours.iter().zip(results.iter()) {
            if let Some(err) = result.scan.as_ref() {
                return Some(err.clone());
            }
            if !result.finished {
                return Some(Error::Thread(format!(
                    "worker for {} did not finish",
                    hour_key(hour)
                )));
            }
        }

        None
    }

    /// The current line, including its newline if it has one.
    /// Valid until the next [`scan`].
    ///
    /// [`scan`]: ConcurrentScanner::scan
    #[inline(always)]
    pub fn bytes(&self) -> &[u8] {
        self.line.as_slice()
    }

    pub fn err(&self) -> Option<&Error> {
        self.err.as_ref()
    }

    /// Cancel the workers, wait for them to exit, and close every hour's
    /// scanner. Returns the first close error in hour order.
    /// Safe to call more than once.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        defn!();
        self.closed = true;
        self.cancel.cancel();
        if let Some(waiter) = self.waiter.take() {
            if let Err(_err) = waiter.join() {
                de_err!("waiter thread panicked {:?}", _err);
            }
        }
        self.done.fire();
        if !self.finished {
            if let ResultS3::Err(err) = self.finish() {
                self.err = Some(err);
            }
        }
        self.line.clear();
        // release lines queued for no one
        while self.lines_rx.try_recv().is_ok() {}

        let mut close_err: Option<Error> = None;
        let results = self
            .results
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for (slot, result) in self.slots.iter().zip(results.iter()) {
            let result_close: Result<()> = slot
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .close();
            if close_err.is_none() {
                close_err = result.close.clone().or(result_close.err());
            }
        }
        defx!("{:?}", close_err);

        match close_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Count of worker threads started.
    pub const fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Hours of the range, in order.
    pub fn hours(&self) -> &[DateTimeU] {
        self.hours.as_slice()
    }

    /// Sum of the window storage capacities held by the hours' scanners.
    /// Hours being scanned right now are skipped.
    pub fn buffer_capacity(&self) -> usize {
        self.slots
            .iter()
            .map(|slot| match slot.try_lock() {
                Ok(scanner) => scanner.buffer_capacity(),
                Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner().buffer_capacity(),
                Err(TryLockError::WouldBlock) => 0,
            })
            .sum()
    }

    /// Sum of the statistics of every hour's scanner. Hours being scanned
    /// right now are skipped.
    pub fn summary(&self) -> SummaryScanner {
        let mut summary = SummaryScanner::default();
        for slot in self.slots.iter() {
            match slot.try_lock() {
                Ok(scanner) => summary += scanner.summary(),
                Err(TryLockError::Poisoned(poisoned)) => summary += poisoned.into_inner().summary(),
                Err(TryLockError::WouldBlock) => {}
            }
        }

        summary
    }
}

impl Drop for ConcurrentScanner {
    fn drop(&mut self) {
        _ = self.close();
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// worker thread
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Thread entry of a worker: scan hours until the job channel is empty.
fn exec_worker_thread(data: WorkerData) {
    defn!("{:?}", thread::current().name());
    // window storage handed from one hour's scanner to the next
    let mut buffer: Vec<u8> = Vec::new();
    for index in data.jobs.iter() {
        let mut scanner = data.slots[index]
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let scan: Option<Error> = if data.cancel.is_cancelled() {
            Some(Error::Cancelled)
        } else {
            scanner.give_buffer(std::mem::take(&mut buffer));
            let scan = scan_hour(&mut scanner, &data.lines, &data.recycle, &data.cancel);
            buffer = scanner.take_buffer();
            scan
        };
        let close: Option<Error> = scanner.close().err();
        drop(scanner);
        defo!("hour {} scan {:?} close {:?}", index, scan, close);
        let mut results = data
            .results
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        results[index] = SlotResult {
            finished: true,
            scan,
            close,
        };
    }
    defx!();
}

/// Send a copy of every line of `scanner` over `lines`.
/// Returns the terminal error, `None` for a clean end.
fn scan_hour(
    scanner: &mut SingleHourScanner,
    lines: &Sender<LineBytes>,
    recycle: &Receiver<LineBytes>,
    cancel: &CancelToken,
) -> Option<Error> {
    while scanner.scan(cancel) {
        let mut line: LineBytes = match recycle.try_recv() {
            Ok(line) => line,
            Err(_) => LineBytes::with_capacity(LINE_BUFSZ),
        };
        line.clear();
        line.extend_from_slice(scanner.bytes());
        select! {
            send(lines, line) -> result => {
                if result.is_err() {
                    // the `ConcurrentScanner` was dropped
                    return Some(Error::Cancelled);
                }
            },
            recv(cancel.receiver()) -> _ => return Some(Error::Cancelled),
        }
    }

    scanner.err().cloned()
}
