// src/bin/gharchive.rs

//! Driver program _gharchive_.
//!
//! Processes user-passed command-line arguments. Then writes the lines of
//! the hourly objects of the requested range to stdout, unmodified.
//!
//! Lines are filtered by the passed options, e.g. `--type` or
//! `--strict-created-at`. With `--preserve-order` the lines are in archive
//! order; otherwise hours are fetched concurrently and lines of different
//! hours interleave.
//!
//! A user interrupt (ctrl+c) cancels scanning; every open object is closed
//! before exiting.

#![allow(non_camel_case_types)]

cfg_if::cfg_if! {
    if #[cfg(feature = "jemalloc")] {
        use ::tikv_jemallocator::Jemalloc;
        #[global_allocator]
        static GLOBAL: Jemalloc = Jemalloc;
        const CLI_HELP_AFTER_ALLOCATOR: &str = "jemalloc";
    }
    else if #[cfg(feature = "mimalloc")] {
        use ::mimalloc::MiMalloc;
        #[global_allocator]
        static GLOBAL: MiMalloc = MiMalloc;
        const CLI_HELP_AFTER_ALLOCATOR: &str = "mimalloc";
    }
    else {
        const CLI_HELP_AFTER_ALLOCATOR: &str = "system";
    }
}

use std::io::{BufWriter, ErrorKind, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};

use ::anyhow::Context;
use ::clap::Parser;
use ::const_format::concatcp;
#[allow(unused_imports)]
use ::si_trace_print::{defn, defo, defx, defñ};

use ::gharchivelib::common::Error;
use ::gharchivelib::data::datetime::{datetime_parse_arg, DateTimeU};
use ::gharchivelib::debug::printers::{e_dbg, e_err, e_wrn};
use ::gharchivelib::readers::objectstore::{
    DirObjectStore,
    ObjectStore,
    BUCKET_DEFAULT,
    ENDPOINT_DEFAULT,
};
use ::gharchivelib::readers::scanner::{
    concurrency_default,
    new_scanner,
    LineScan,
    ScannerOptions,
};
use ::gharchivelib::readers::signal::CancelToken;
use ::gharchivelib::readers::validators::{
    validate_created_at_window,
    validate_event_type_in,
    validate_event_type_not_in,
    validate_is_json_object,
    validate_json,
    validate_json_fields,
    validate_not_empty,
    JsonFieldValidator,
    Validators,
};

/// Capacity of the stdout writer.
const STDOUT_BUFSZ: usize = 1 << 16;

const CLI_HELP_AFTER: &str = concatcp!(
    "START and END are RFC 3339 datetimes, e.g. \"2020-01-02T15:00:00Z\",
or dates \"YYYY-MM-DD\" taken as midnight UTC.
END defaults to one day after START.

Event types for --type and --not-type may omit the \"Event\" suffix and
are case-insensitive, e.g. \"push\" matches \"PushEvent\".

Objects are fetched from ", ENDPOINT_DEFAULT, "/", BUCKET_DEFAULT, " unless
--mirror names a local directory holding files named like
\"2020-01-02-15.json.gz\".
"
);

// --------------------
// command-line parsing

#[derive(Parser, Debug)]
#[clap(
    about = env!("CARGO_PKG_DESCRIPTION"),
    author = env!("CARGO_PKG_AUTHORS"),
    name = "gharchive",
    // write expanded information for the `--version` output
    version = concatcp!(
        "\n",
        "Version: ",
        env!("CARGO_PKG_VERSION_MAJOR"), ".",
        env!("CARGO_PKG_VERSION_MINOR"), ".",
        env!("CARGO_PKG_VERSION_PATCH"), "\n",
        "MSRV: ", env!("CARGO_PKG_RUST_VERSION"), "\n",
        "Allocator: ", CLI_HELP_AFTER_ALLOCATOR, "\n",
        "License: ", env!("CARGO_PKG_LICENSE"), "\n",
        "Repository: ", env!("CARGO_PKG_REPOSITORY"), "\n",
    ),
    after_help = CLI_HELP_AFTER,
    verbatim_doc_comment,
)]
struct CLI_Args {
    /// Start of the range.
    #[clap(
        required = true,
        value_parser = cli_parse_datetime,
    )]
    start: DateTimeU,

    /// End of the range, exclusive.
    #[clap(
        value_parser = cli_parse_datetime,
    )]
    end: Option<DateTimeU>,

    /// Include only events of this type. May be passed more than once.
    #[clap(
        long = "type",
        value_name = "TYPE",
    )]
    include_type: Vec<String>,

    /// Exclude events of this type. May be passed more than once.
    #[clap(
        long = "not-type",
        value_name = "TYPE",
    )]
    exclude_type: Vec<String>,

    /// Only output events with a "created_at" within START and END.
    #[clap(long)]
    strict_created_at: bool,

    /// Skip lines that are only whitespace.
    #[clap(long)]
    no_empty_lines: bool,

    /// Skip lines that are not valid JSON objects.
    #[clap(long)]
    only_valid_json: bool,

    /// Output events in the same order they are in the archive.
    /// Fetches one hour at a time.
    #[clap(
        long,
        verbatim_doc_comment,
    )]
    preserve_order: bool,

    /// Maximum count of hours fetched at once. Ignored with
    /// --preserve-order. Default is the count of available CPUs.
    #[clap(
        long,
        verbatim_doc_comment,
        default_value_t = 0,
    )]
    concurrency: usize,

    /// Bucket holding the hourly objects.
    #[clap(
        long,
        default_value_t = String::from(BUCKET_DEFAULT),
    )]
    bucket: String,

    /// HTTP(S) endpoint serving the bucket.
    #[clap(
        long,
        default_value_t = String::from(ENDPOINT_DEFAULT),
    )]
    endpoint: String,

    /// Read the hourly objects from this local directory instead of
    /// fetching them.
    #[clap(
        long,
        value_name = "DIR",
        verbatim_doc_comment,
    )]
    mirror: Option<PathBuf>,

    /// Timeout in seconds of fetching one hourly object.
    #[clap(
        long,
        value_name = "SECONDS",
        default_value_t = 300,
    )]
    timeout: u64,

    /// Print progress information to stderr.
    #[clap(long)]
    debug: bool,
}

/// `clap` argument value parser for `START` and `END`.
fn cli_parse_datetime(value: &str) -> std::result::Result<DateTimeU, String> {
    match datetime_parse_arg(value) {
        Some(dt) => Ok(dt),
        None => Err(format!(
            "invalid datetime {:?}; must be either 'YYYY-MM-DD' or 'YYYY-MM-DDThh:mm:ssZ' (RFC 3339)",
            value
        )),
    }
}

/// Build the line validators from the command-line options.
///
/// `early_stop` is cancelled by the `--strict-created-at` validator when it
/// sees an event after `end`.
fn cli_validators(
    args: &CLI_Args,
    start: DateTimeU,
    end: DateTimeU,
    early_stop: Option<CancelToken>,
) -> Validators {
    let mut validators = Validators::new();
    if args.no_empty_lines {
        validators.push(validate_not_empty());
    }
    if args.only_valid_json {
        validators.push(validate_is_json_object());
        validators.push(validate_json());
    }
    let mut field_validators: Vec<JsonFieldValidator> = Vec::new();
    if args.strict_created_at {
        field_validators.push(validate_created_at_window(start, end, early_stop));
    }
    if !args.include_type.is_empty() {
        field_validators.push(validate_event_type_in(&args.include_type));
    }
    if !args.exclude_type.is_empty() {
        field_validators.push(validate_event_type_not_in(&args.exclude_type));
    }
    if !field_validators.is_empty() {
        validators.push(validate_json_fields(field_validators));
    }

    validators
}

/// Set the process signal handler; an interrupt cancels `cancel`.
fn set_signal_handler(cancel: CancelToken) -> std::result::Result<(), ctrlc::Error> {
    defñ!();
    ctrlc::set_handler(move || {
        defñ!("interrupt");
        cancel.cancel();
    })
}

/// Scan and write lines to stdout. Returns the count of lines written.
fn processing_loop(
    scanner: &mut dyn LineScan,
    cancel: &CancelToken,
) -> anyhow::Result<u64> {
    defn!();
    let stdout = std::io::stdout();
    let mut writer = BufWriter::with_capacity(STDOUT_BUFSZ, stdout.lock());
    let mut count: u64 = 0;
    while scanner.scan(cancel) {
        if let Err(err) = writer.write_all(scanner.bytes()) {
            if err.kind() == ErrorKind::BrokenPipe {
                defx!("BrokenPipe");
                cancel.cancel();
                return Ok(count);
            }
            return Err(err).context("writing to stdout");
        }
        count += 1;
    }
    match writer.flush() {
        Ok(_) => {}
        Err(err) if err.kind() == ErrorKind::BrokenPipe => {}
        Err(err) => return Err(err).context("flushing stdout"),
    }
    defx!("{} lines", count);

    Ok(count)
}

fn run(args: CLI_Args) -> anyhow::Result<ExitCode> {
    let start: DateTimeU = args.start;
    let end: DateTimeU = args
        .end
        .unwrap_or(start + ::chrono::Duration::days(1));
    let concurrency: usize = match (args.preserve_order, args.concurrency) {
        (true, _) => 1,
        (false, 0) => concurrency_default(),
        (false, count) => count,
    };

    let cancel = CancelToken::new();
    if let Err(err) = set_signal_handler(cancel.clone()) {
        e_wrn!("failed to set the interrupt handler: {}", err);
    }
    // an event after `end` ends the scan only when hours are scanned in order;
    // with more than one worker an earlier hour may still be in flight
    let early_stop: Option<CancelToken> = match concurrency {
        1 => Some(CancelToken::new()),
        _ => None,
    };
    let validators = cli_validators(&args, start, end, early_stop.clone());

    let store: Option<Arc<dyn ObjectStore>> = args
        .mirror
        .as_ref()
        .map(|dir| Arc::new(DirObjectStore::new(dir)) as Arc<dyn ObjectStore>);
    let options = ScannerOptions {
        store,
        bucket: Some(args.bucket.clone()),
        validators,
        end_time: Some(end),
        single_hour: false,
        concurrency: Some(concurrency),
        preserve_order: args.preserve_order,
        queue_lines_per_worker: None,
        early_stop,
        endpoint: Some(args.endpoint.clone()),
        http_timeout: Some(Duration::from_secs(args.timeout)),
    };
    if args.debug {
        e_dbg!("concurrency={}", concurrency);
        e_dbg!("start={}", start.to_rfc3339());
        e_dbg!("end={}", end.to_rfc3339());
    }

    let mut scanner = new_scanner(&cancel, start, options).context("error creating scanner")?;
    let scan_start = Instant::now();
    let result = processing_loop(scanner.as_mut(), &cancel);
    let elapsed = scan_start.elapsed();
    let err: Option<Error> = scanner.err();
    let summary = scanner.summary();
    if let Err(err) = scanner.close() {
        e_wrn!("closing scanner: {}", err);
    }
    let count: u64 = result?;

    if args.debug {
        let secs: f64 = elapsed.as_secs_f64();
        let per_sec: u64 = if secs > 0.0 { (count as f64 / secs) as u64 } else { count };
        e_dbg!("done");
        e_dbg!("output {} lines", count);
        e_dbg!("took {:0.2} seconds", secs);
        e_dbg!("output {} lines per second", per_sec);
        e_dbg!("{}", summary);
    }

    match err {
        None | Some(Error::Cancelled) => Ok(ExitCode::SUCCESS),
        Some(err) => {
            e_err!("error streaming from gharchive: {}", err);
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Process the user-passed command-line arguments.
/// Run function `processing_loop`.
/// Determine a process return code.
pub fn main() -> ExitCode {
    let args = CLI_Args::parse();
    defo!("{:?}", args);
    let exitcode = match run(args) {
        Ok(exitcode) => exitcode,
        Err(err) => {
            e_err!("{:#}", err);
            ExitCode::FAILURE
        }
    };
    defx!("exitcode {:?}", exitcode);

    exitcode
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
