// src/tests/singlescanner_tests.rs

#![allow(non_snake_case)]

use std::sync::Arc;

use ::more_asserts::{assert_ge, assert_gt};
use ::test_case::test_case;

use crate::common::Error;
use crate::data::datetime::{hour_key, DateTimeU, Duration};
use crate::debug::helpers::gz_compress;
use crate::readers::objectstore::{ObjectStore, BUCKET_DEFAULT};
use crate::readers::signal::CancelToken;
use crate::readers::singlescanner::{ScannerState, SingleHourScanner};
use crate::readers::validators::{validate_event_type_in, validate_json_fields, Validators};
use crate::tests::common::{dt, fill_store_hours, MemObject, MemObjectStore};

fn h0() -> DateTimeU {
    dt("2020-01-02T08:00:00Z")
}

fn new_scanner(
    store: &Arc<MemObjectStore>,
    validators: Validators,
    start: DateTimeU,
    end: DateTimeU,
    single_hour: bool,
) -> SingleHourScanner {
    let store: Arc<dyn ObjectStore> = Arc::clone(store) as Arc<dyn ObjectStore>;
    SingleHourScanner::new(store, BUCKET_DEFAULT, Arc::new(validators), start, end, single_hour)
}

fn scan_all(scanner: &mut SingleHourScanner, cancel: &CancelToken) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    while scanner.scan(cancel) {
        lines.push(String::from_utf8_lossy(scanner.bytes()).into_owned());
    }

    lines
}

#[test_case(1; "one hour")]
#[test_case(3; "three hours")]
fn test_SingleHourScanner_hours(hours: usize) {
    let store = Arc::new(MemObjectStore::new());
    let expect: Vec<String> = fill_store_hours(&store, &h0(), hours, 5).concat();
    let end = h0() + Duration::hours(hours as i64);
    let mut scanner = new_scanner(&store, Validators::new(), h0(), end, false);
    assert_eq!(scanner.state(), ScannerState::NoObject);
    // nothing opened before the first scan
    assert_eq!(store.counters.opens(), 0);

    let cancel = CancelToken::new();
    let lines = scan_all(&mut scanner, &cancel);
    assert_eq!(lines, expect);
    assert!(scanner.err().is_none(), "{:?}", scanner.err());
    assert_eq!(scanner.state(), ScannerState::Exhausted);
    assert_eq!(scanner.hour(), Some(end));
    assert!(!scanner.scan(&cancel));

    let summary = scanner.summary();
    assert_eq!(summary.ObjectReader_opened, hours as u64);
    assert_eq!(summary.LineScanner_lines, (hours * 5) as u64);
    assert_eq!(summary.Scanner_returned, (hours * 5) as u64);
    assert_eq!(summary.Scanner_rejected, 0);
    assert_eq!(summary.SlidingWindow_bytes, expect.concat().len() as u64);

    scanner.close().unwrap();
    assert_eq!(store.counters.opens(), hours as u64);
    assert_eq!(store.counters.closes(), hours as u64);
}

#[test]
fn test_SingleHourScanner_start_mid_hour() {
    let store = Arc::new(MemObjectStore::new());
    let expect = fill_store_hours(&store, &h0(), 2, 3);
    let mut scanner = new_scanner(
        &store,
        Validators::new(),
        h0() + Duration::minutes(30),
        h0() + Duration::minutes(90),
        false,
    );
    let lines = scan_all(&mut scanner, &CancelToken::new());
    assert_eq!(lines, expect.concat());
    assert_eq!(scanner.range().start(), h0());
}

#[test]
fn test_SingleHourScanner_single_hour() {
    let store = Arc::new(MemObjectStore::new());
    let expect = fill_store_hours(&store, &h0(), 3, 4);
    let mut scanner = new_scanner(&store, Validators::new(), h0(), h0() + Duration::hours(3), true);
    let lines = scan_all(&mut scanner, &CancelToken::new());
    assert_eq!(lines, expect[0]);
    assert_eq!(scanner.state(), ScannerState::Exhausted);
    assert_eq!(store.counters.opens(), 1);
}

#[test]
fn test_SingleHourScanner_single_hour_empty_range() {
    // the hour of the start is scanned even if the end is not after it
    let store = Arc::new(MemObjectStore::new());
    let expect = fill_store_hours(&store, &h0(), 1, 2);
    let mut scanner = new_scanner(&store, Validators::new(), h0(), h0(), true);
    assert_eq!(scan_all(&mut scanner, &CancelToken::new()), expect[0]);
}

#[test]
fn test_SingleHourScanner_empty_range() {
    let store = Arc::new(MemObjectStore::new());
    fill_store_hours(&store, &h0(), 1, 2);
    let mut scanner = new_scanner(&store, Validators::new(), h0(), h0(), false);
    assert!(!scanner.scan(&CancelToken::new()));
    assert!(scanner.err().is_none());
    assert_eq!(scanner.state(), ScannerState::Exhausted);
    assert_eq!(store.counters.opens(), 0);
}

#[test]
fn test_SingleHourScanner_validators() {
    let store = Arc::new(MemObjectStore::new());
    fill_store_hours(&store, &h0(), 1, 9);
    let validators = Validators::from(vec![validate_json_fields(vec![validate_event_type_in(&[
        String::from("Watch"),
    ])])]);
    let mut scanner = new_scanner(&store, validators, h0(), h0() + Duration::hours(1), false);
    let lines = scan_all(&mut scanner, &CancelToken::new());
    assert_eq!(lines.len(), 3);
    for line in lines.iter() {
        assert!(line.contains("\"type\":\"WatchEvent\""), "{}", line);
    }
    let summary = scanner.summary();
    assert_eq!(summary.LineScanner_lines, 9);
    assert_eq!(summary.Scanner_rejected, 6);
    assert_eq!(summary.Scanner_returned, 3);
}

#[test]
fn test_SingleHourScanner_final_line_without_newline() {
    let store = Arc::new(MemObjectStore::new());
    store.insert_hour(&h0(), b"{\"a\":1}\n{\"a\":2}");
    let mut scanner = new_scanner(&store, Validators::new(), h0(), h0() + Duration::hours(1), false);
    assert_eq!(
        scan_all(&mut scanner, &CancelToken::new()),
        vec!["{\"a\":1}\n", "{\"a\":2}"]
    );
}

#[test]
fn test_SingleHourScanner_not_found() {
    let store = Arc::new(MemObjectStore::new());
    let expect = fill_store_hours(&store, &h0(), 2, 2);
    let missing = h0() + Duration::hours(2);
    let mut scanner = new_scanner(&store, Validators::new(), h0(), h0() + Duration::hours(4), false);
    let cancel = CancelToken::new();
    assert_eq!(scan_all(&mut scanner, &cancel), expect.concat());
    assert_eq!(
        scanner.err(),
        Some(&Error::NotFound {
            bucket: BUCKET_DEFAULT.to_string(),
            key: hour_key(&missing),
        })
    );
    assert_eq!(scanner.state(), ScannerState::Errored);
    // terminal
    assert!(!scanner.scan(&cancel));
    scanner.close().unwrap();
    assert_eq!(store.counters.opens(), store.counters.closes());
}

#[test]
fn test_SingleHourScanner_read_error() {
    let store = Arc::new(MemObjectStore::new());
    let data = gz_compress(crate::tests::common::hour_lines(&h0(), 2000).concat().as_bytes());
    let at = data.len() / 2;
    store.insert(&hour_key(&h0()), MemObject::FailRead(data, at));
    let mut scanner = new_scanner(&store, Validators::new(), h0(), h0() + Duration::hours(1), false);
    let lines = scan_all(&mut scanner, &CancelToken::new());
    assert!(lines.len() < 2000);
    // no partial line
    for line in lines.iter() {
        assert!(line.ends_with("}\n"), "{:?}", line);
    }
    match scanner.err() {
        Some(Error::Transport { key, .. }) => assert_eq!(key, &hour_key(&h0())),
        other => panic!("expected Transport, got {:?}", other),
    }
}

#[test]
fn test_SingleHourScanner_decode_error() {
    let store = Arc::new(MemObjectStore::new());
    store.insert(&hour_key(&h0()), MemObject::Gz(b"not gzip\n".to_vec()));
    let mut scanner = new_scanner(&store, Validators::new(), h0(), h0() + Duration::hours(1), false);
    assert!(!scanner.scan(&CancelToken::new()));
    assert!(matches!(scanner.err(), Some(Error::Decode { .. })), "{:?}", scanner.err());
}

#[test]
fn test_SingleHourScanner_open_error() {
    let store = Arc::new(MemObjectStore::new());
    let err = Error::Transport {
        key: hour_key(&h0()),
        message: String::from("503"),
    };
    store.insert(&hour_key(&h0()), MemObject::FailOpen(err.clone()));
    let mut scanner = new_scanner(&store, Validators::new(), h0(), h0() + Duration::hours(1), false);
    assert!(!scanner.scan(&CancelToken::new()));
    assert_eq!(scanner.err(), Some(&err));
}

#[test]
fn test_SingleHourScanner_cancel() {
    let store = Arc::new(MemObjectStore::new());
    fill_store_hours(&store, &h0(), 2, 10);
    let mut scanner = new_scanner(&store, Validators::new(), h0(), h0() + Duration::hours(2), false);
    let cancel = CancelToken::new();
    for _ in 0..3 {
        assert!(scanner.scan(&cancel));
    }
    cancel.cancel();
    assert!(!scanner.scan(&cancel));
    assert_eq!(scanner.err(), Some(&Error::Cancelled));
    assert_eq!(scanner.state(), ScannerState::Errored);
    scanner.close().unwrap();
    assert_eq!(store.counters.opens(), 1);
    assert_eq!(store.counters.closes(), 1);
}

#[test]
fn test_SingleHourScanner_cancelled_before_scan() {
    let store = Arc::new(MemObjectStore::new());
    fill_store_hours(&store, &h0(), 1, 1);
    let mut scanner = new_scanner(&store, Validators::new(), h0(), h0() + Duration::hours(1), false);
    let cancel = CancelToken::new();
    cancel.cancel();
    assert!(!scanner.scan(&cancel));
    assert_eq!(scanner.err(), Some(&Error::Cancelled));
    assert_eq!(store.counters.opens(), 0);
}

#[test]
fn test_SingleHourScanner_close_mid_object() {
    let store = Arc::new(MemObjectStore::new());
    fill_store_hours(&store, &h0(), 2, 10);
    let mut scanner = new_scanner(&store, Validators::new(), h0(), h0() + Duration::hours(2), false);
    let cancel = CancelToken::new();
    assert!(scanner.scan(&cancel));
    scanner.close().unwrap();
    assert_eq!(scanner.state(), ScannerState::Closed);
    assert_eq!(store.counters.closes(), 1);
    // idempotent
    scanner.close().unwrap();
    assert_eq!(store.counters.closes(), 1);
    assert!(!scanner.scan(&cancel));
    assert!(scanner.err().is_none());
}

#[test]
fn test_SingleHourScanner_close_error() {
    let store = Arc::new(MemObjectStore::new());
    store.insert(&hour_key(&h0()), MemObject::FailClose(gz_compress(b"{}\n")));
    let mut scanner = new_scanner(&store, Validators::new(), h0(), h0() + Duration::hours(1), false);
    let cancel = CancelToken::new();
    assert_eq!(scan_all(&mut scanner, &cancel), vec!["{}\n"]);
    assert!(matches!(scanner.close(), Err(Error::Transport { .. })));
    // the error is reported once
    assert!(scanner.close().is_ok());
}

#[test]
fn test_SingleHourScanner_buffer_lazy_and_released() {
    let store = Arc::new(MemObjectStore::new());
    fill_store_hours(&store, &h0(), 2, 5);
    let mut scanner = new_scanner(&store, Validators::new(), h0(), h0() + Duration::hours(2), false);
    assert_eq!(scanner.buffer_capacity(), 0);
    let cancel = CancelToken::new();
    assert!(scanner.scan(&cancel));
    assert_gt!(scanner.buffer_capacity(), 0);
    scanner.close().unwrap();
    assert_eq!(scanner.buffer_capacity(), 0);
    assert!(scanner.bytes().is_empty());
}

#[test]
fn test_SingleHourScanner_give_take_buffer() {
    const CAP: usize = 1 << 16;
    let store = Arc::new(MemObjectStore::new());
    let expect = fill_store_hours(&store, &h0(), 1, 5);
    let mut scanner = new_scanner(&store, Validators::new(), h0(), h0() + Duration::hours(1), false);
    scanner.give_buffer(Vec::with_capacity(CAP));
    assert_ge!(scanner.buffer_capacity(), CAP);
    assert_eq!(scan_all(&mut scanner, &CancelToken::new()), expect[0]);
    // lines are short; the given storage was never replaced
    assert_eq!(scanner.summary().SlidingWindow_grows, 0);
    let buffer = scanner.take_buffer();
    assert_ge!(buffer.capacity(), CAP);
    assert_eq!(scanner.buffer_capacity(), 0);
    scanner.close().unwrap();
}

#[test]
fn test_SingleHourScanner_window_compacts() {
    let store = Arc::new(MemObjectStore::new());
    // many short lines through one small window
    let expect = fill_store_hours(&store, &h0(), 2, 500);
    let mut scanner = new_scanner(&store, Validators::new(), h0(), h0() + Duration::hours(2), false);
    assert_eq!(scan_all(&mut scanner, &CancelToken::new()), expect.concat());
    let summary = scanner.summary();
    assert_eq!(summary.SlidingWindow_grows, 1);
    assert_gt!(summary.SlidingWindow_compacts, 0);
}
