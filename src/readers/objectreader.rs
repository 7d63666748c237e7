// src/readers/objectreader.rs

//! Implements an [`ObjectReader`], a gzip decompressing [`Read`] over the
//! [`ObjectStream`] of the current hourly object.
//!
//! One `ObjectReader` is kept for all the hours of a scanner;
//! [`reset`] points it at the next object's stream.
//!
//! [`reset`]: ObjectReader::reset

use std::fmt;
use std::io::Read;

use ::flate2::read::MultiGzDecoder;
#[allow(unused_imports)]
use ::si_trace_print::{defn, defo, defx, defñ};

use crate::common::{Count, Error, Result};
use crate::readers::objectstore::{ObjectStore, ObjectStream};

/// The decompressor type over an object stream.
///
/// An hourly object may be several concatenated gzip members; each member
/// is decoded in turn.
pub type ObjectDecoder = MultiGzDecoder<Box<dyn ObjectStream>>;

/// Decompressing reader of the current object.
///
/// Reads return end-of-stream while no object is open.
///
/// `flate2` decoders cannot be pointed at a new inner reader, so [`reset`]
/// builds a new `MultiGzDecoder` per object; what is kept across objects is
/// this `ObjectReader` and, one level up, the window storage of the
/// [`LineScanner`] reading it.
///
/// [`reset`]: ObjectReader::reset
/// [`LineScanner`]: crate::readers::linescanner::LineScanner
#[derive(Default)]
pub struct ObjectReader {
    decoder: Option<ObjectDecoder>,
    /// key of the current object
    key: String,
    /// count of objects opened
    pub(crate) opened: Count,
}

impl fmt::Debug for ObjectReader {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ObjectReader")
            .field("key", &self.key)
            .field("open", &self.decoder.is_some())
            .field("opened", &self.opened)
            .finish()
    }
}

impl ObjectReader {
    pub fn new() -> ObjectReader {
        ObjectReader::default()
    }

    /// Close the current object, if any, then decompress from `stream`.
    ///
    /// `stream` is installed even if closing the previous object failed;
    /// the close error is returned.
    pub fn reset(&mut self, key: &str, stream: Box<dyn ObjectStream>) -> Result<()> {
        defn!("({:?})", key);
        let result = self.close();
        self.key = key.to_string();
        // `flate2` decoders cannot be re-pointed at a new reader
        self.decoder = Some(MultiGzDecoder::new(stream));
        self.opened += 1;
        defx!("{:?}", result);

        result
    }

    /// Open object `key` of `bucket` from `store` and [`reset`] onto it.
    ///
    /// [`reset`]: ObjectReader::reset
    pub fn open(&mut self, store: &dyn ObjectStore, bucket: &str, key: &str) -> Result<()> {
        defn!("({:?}, {:?})", bucket, key);
        let stream = match store.open_object(bucket, key) {
            Ok(stream) => stream,
            Err(err) => {
                defx!("open_object failed {}", err);
                return Err(err);
            }
        };
        defx!();

        self.reset(key, stream)
    }

    /// Close the current object's stream. Safe to call more than once.
    pub fn close(&mut self) -> Result<()> {
        match self.decoder.take() {
            Some(decoder) => {
                defñ!("close {:?}", self.key);
                let mut stream: Box<dyn ObjectStream> = decoder.into_inner();
                match stream.close() {
                    Ok(_) => Ok(()),
                    Err(err) => Err(Error::Transport {
                        key: self.key.clone(),
                        message: format!("close: {}", err),
                    }),
                }
            }
            None => Ok(()),
        }
    }

    /// Is an object open?
    pub fn is_open(&self) -> bool {
        self.decoder.is_some()
    }

    /// Key of the current (or last) object.
    pub fn key(&self) -> &str {
        self.key.as_str()
    }
}

impl Read for ObjectReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self.decoder.as_mut() {
            Some(decoder) => decoder.read(buf),
            None => Ok(0),
        }
    }
}
