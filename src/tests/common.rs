// src/tests/common.rs

//! Common fixtures for the tests: readers that misbehave on purpose, an
//! in-memory [`ObjectStore`] that counts opens and closes, and JSON event
//! lines.

use std::collections::HashMap;
use std::io::{Cursor, ErrorKind, Read};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use ::rand::rngs::StdRng;
use ::rand::{Rng, SeedableRng};

use crate::common::{Error, Result};
use crate::data::datetime::{hour_key, DateTime, DateTimeU, Duration, Utc};
use crate::debug::helpers::gz_compress;
use crate::readers::objectstore::{ObjectStore, ObjectStream};

/// Seed of every `StdRng` in the tests; failures are reproducible.
pub const RNG_SEED: u64 = 0x5EED_CAFE;

/// Parse an RFC 3339 datetime; test input is known good.
pub fn dt(value: &str) -> DateTimeU {
    DateTime::parse_from_rfc3339(value)
        .unwrap()
        .with_timezone(&Utc)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// readers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Returns at most a random `1..=max` bytes per `read`, and sometimes an
/// `Interrupted` error first.
pub struct ChunkedReader {
    inner: Cursor<Vec<u8>>,
    max: usize,
    rng: StdRng,
    interrupt: bool,
}

impl ChunkedReader {
    pub fn new(data: Vec<u8>, max: usize, seed: u64) -> ChunkedReader {
        ChunkedReader {
            inner: Cursor::new(data),
            max,
            rng: StdRng::seed_from_u64(seed),
            interrupt: false,
        }
    }
}

impl Read for ChunkedReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.interrupt = !self.interrupt && self.rng.random_range(0..8) == 0;
        if self.interrupt {
            return Err(std::io::Error::new(ErrorKind::Interrupted, "interrupted"));
        }
        let n: usize = self.rng.random_range(1..=self.max).min(buf.len());
        self.inner.read(&mut buf[..n])
    }
}

/// Returns `data` then fails with an error of `kind`.
pub struct FailingReader {
    inner: Cursor<Vec<u8>>,
    kind: ErrorKind,
}

impl FailingReader {
    pub fn new(data: Vec<u8>, kind: ErrorKind) -> FailingReader {
        FailingReader {
            inner: Cursor::new(data),
            kind,
        }
    }
}

impl Read for FailingReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self.inner.read(buf)? {
            0 => Err(std::io::Error::new(self.kind, "FailingReader failed")),
            n => Ok(n),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// MemObjectStore
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// An object of a [`MemObjectStore`].
#[derive(Clone, Debug)]
pub enum MemObject {
    /// gzip compressed bytes
    Gz(Vec<u8>),
    /// `open_object` fails with this error
    FailOpen(Error),
    /// gzip compressed bytes of which only the first `usize` are returned,
    /// then the stream fails with `ConnectionReset`
    FailRead(Vec<u8>, usize),
    /// `close` of the stream fails
    FailClose(Vec<u8>),
}

/// Open and close counters shared by a [`MemObjectStore`] and its
/// streams.
#[derive(Debug, Default)]
pub struct Counters {
    pub opens: AtomicU64,
    pub closes: AtomicU64,
}

impl Counters {
    pub fn opens(&self) -> u64 {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> u64 {
        self.closes.load(Ordering::SeqCst)
    }
}

/// In-memory [`ObjectStore`] keyed by object key. Missing keys are
/// [`Error::NotFound`].
#[derive(Debug, Default)]
pub struct MemObjectStore {
    objects: Mutex<HashMap<String, MemObject>>,
    pub counters: Arc<Counters>,
}

impl MemObjectStore {
    pub fn new() -> MemObjectStore {
        MemObjectStore::default()
    }

    pub fn insert(&self, key: &str, object: MemObject) {
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), object);
    }

    /// Store `data` compressed under the key of `hour`.
    pub fn insert_hour(&self, hour: &DateTimeU, data: &[u8]) {
        self.insert(&hour_key(hour), MemObject::Gz(gz_compress(data)));
    }
}

struct MemStream {
    inner: Cursor<Vec<u8>>,
    /// fail reads after this many bytes
    fail_after: Option<usize>,
    fail_close: bool,
    counters: Arc<Counters>,
}

impl Read for MemStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if let Some(limit) = self.fail_after {
            let at = self.inner.position() as usize;
            if at >= limit {
                return Err(std::io::Error::new(ErrorKind::ConnectionReset, "MemStream reset"));
            }
            let n = std::cmp::min(buf.len(), limit - at);
            return self.inner.read(&mut buf[..n]);
        }
        self.inner.read(buf)
    }
}

impl ObjectStream for MemStream {
    fn close(&mut self) -> std::io::Result<()> {
        self.counters.closes.fetch_add(1, Ordering::SeqCst);
        if self.fail_close {
            return Err(std::io::Error::new(ErrorKind::Other, "MemStream close failed"));
        }
        Ok(())
    }
}

impl ObjectStore for MemObjectStore {
    fn open_object(&self, bucket: &str, key: &str) -> Result<Box<dyn ObjectStream>> {
        let object: MemObject = match self.objects.lock().unwrap().get(key) {
            Some(object) => object.clone(),
            None => {
                return Err(Error::NotFound {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                })
            }
        };
        let (data, fail_after, fail_close) = match object {
            MemObject::Gz(data) => (data, None, false),
            MemObject::FailOpen(err) => return Err(err),
            MemObject::FailRead(data, at) => (data, Some(at), false),
            MemObject::FailClose(data) => (data, None, true),
        };
        self.counters.opens.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(MemStream {
            inner: Cursor::new(data),
            fail_after,
            fail_close,
            counters: Arc::clone(&self.counters),
        }))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// event lines
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Event types of the fixture lines, in rotation.
pub const EVENT_TYPES: [&str; 3] = ["PushEvent", "WatchEvent", "IssuesEvent"];

/// One archive-like event line, with newline.
pub fn event_line(id: usize, event_type: &str, created_at: &DateTimeU) -> String {
    format!(
        "{{\"id\":\"{}\",\"type\":\"{}\",\"actor\":{{\"id\":{},\"login\":\"user{}\"}},\"payload\":{{\"size\":1,\"commits\":[{{\"sha\":\"{:040x}\"}}]}},\"public\":true,\"created_at\":\"{}\"}}\n",
        id,
        event_type,
        id,
        id,
        id,
        created_at.format("%Y-%m-%dT%H:%M:%SZ"),
    )
}

/// `count` event lines of `hour`, one second apart, ids starting from
/// `hour`'s timestamp so lines of different hours differ.
pub fn hour_lines(hour: &DateTimeU, count: usize) -> Vec<String> {
    (0..count)
        .map(|i| {
            let created_at = *hour + Duration::seconds(i as i64);
            let id = hour.timestamp() as usize + i;
            event_line(id, EVENT_TYPES[i % EVENT_TYPES.len()], &created_at)
        })
        .collect()
}

/// Fill `store` with `count` lines for each of `hours` consecutive hours
/// from `start`. Returns the lines of each hour.
pub fn fill_store_hours(
    store: &MemObjectStore,
    start: &DateTimeU,
    hours: usize,
    count: usize,
) -> Vec<Vec<String>> {
    (0..hours)
        .map(|h| {
            let hour = *start + Duration::hours(h as i64);
            let lines = hour_lines(&hour, count);
            store.insert_hour(&hour, lines.concat().as_bytes());
            lines
        })
        .collect()
}
