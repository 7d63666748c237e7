// src/debug/helpers.rs

//! Miscellaneous helper functions for testing: gzip compression and local
//! bucket mirrors in temporary directories.

use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

use ::flate2::write::GzEncoder;
use ::flate2::Compression;
use ::lazy_static::lazy_static;
use ::si_trace_print::{dpfo, dpfñ};

#[doc(hidden)]
pub use ::tempfile::TempDir;

use crate::data::datetime::{hour_key, DateTimeU};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// temporary directory helper functions
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Temporary directories default to this name prefix.
///
/// Eases deleting temporary directories remaining after an aborted test
/// run.
pub const STR_TEMPFILE_PREFIX: &str = "tmp-gharchive-test-";

lazy_static! {
    pub static ref STRING_TEMPFILE_PREFIX: String = String::from(STR_TEMPFILE_PREFIX);
}

/// Create a temporary directory
pub fn create_temp_dir() -> TempDir {
    dpfñ!();
    match ::tempfile::Builder::new()
        .prefix::<str>(&STRING_TEMPFILE_PREFIX)
        .tempdir()
    {
        Ok(val) => val,
        Err(err) => {
            panic!("tempfile::Builder::new()..tempdir() return Err {}", err);
        }
    }
}

/// Testing helper function to write `data` to file `name` in `tempdir`.
pub fn create_file_bytes_name_in_tmpdir(
    data: &[u8],
    name: &str,
    tempdir: &TempDir,
) -> PathBuf {
    let path = tempdir.path().join(name);
    dpfo!("File::create({:?})", path);
    let mut file_ = match File::create(&path) {
        Ok(f) => f,
        Err(err) => panic!("File::create({:?}) Error {:?}", path, err),
    };
    match file_.write_all(data) {
        Ok(_) => {}
        Err(err) => panic!("File::write_all() Error {:?}", err),
    }

    path
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// gzip helper functions
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Compress `data` as one gzip member.
pub fn gz_compress(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::<u8>::new(), Compression::default());
    match encoder.write_all(data) {
        Ok(_) => {}
        Err(err) => panic!("GzEncoder::write_all() Error {:?}", err),
    }
    match encoder.finish() {
        Ok(val) => val,
        Err(err) => panic!("GzEncoder::finish() Error {:?}", err),
    }
}

/// Compress each of `parts` as its own gzip member, concatenated.
pub fn gz_compress_members(parts: &[&[u8]]) -> Vec<u8> {
    let mut out: Vec<u8> = Vec::new();
    for part in parts.iter() {
        out.extend_from_slice(&gz_compress(part));
    }

    out
}

/// Create a temporary directory mirroring a bucket: for each
/// `(hour, data)` a file named by the hour's key holding `data`
/// compressed.
pub fn create_mirror_in_tmpdir(hours: &[(DateTimeU, Vec<u8>)]) -> TempDir {
    let tmpdir = create_temp_dir();
    for (hour, data) in hours.iter() {
        let key = hour_key(hour);
        create_file_bytes_name_in_tmpdir(&gz_compress(data), &key, &tmpdir);
    }

    tmpdir
}
