//! Integration tests for following a single W3C log file.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use serde_json::json;
use tempfile::TempDir;
use w3c_tail::position::PositionStore;
use w3c_tail::w3c::Record;
use w3c_tail::watcher::{CycleOutcome, FileFollower, FollowerOptions};

const SIMPLE_DIRECTIVE: &str = "#Fields: date time ip method";

fn simple_entry(time: &str, method: &str) -> String {
    format!("2017-03-05 {time} 127.0.0.1 {method}")
}

fn append(path: &Path, lines: &[&str]) {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .unwrap();
    for line in lines {
        writeln!(file, "{line}").unwrap();
    }
}

fn follower(path: &Path, store: &Arc<PositionStore>, options: FollowerOptions) -> FileFollower {
    FileFollower::new(store.get(path), Arc::clone(store), options)
}

async fn read(follower: &mut FileFollower) -> Vec<Record> {
    match follower.read_cycle().await.unwrap() {
        CycleOutcome::Read(records) => records,
        other => panic!("Expected records, got {other:?}"),
    }
}

fn seconds(record: &Record) -> i64 {
    record.timestamp().expect("record has a timestamp").seconds
}

#[tokio::test]
async fn message_records_without_expansion() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("u_ex170305.log");
    append(&path, &[SIMPLE_DIRECTIVE, &simple_entry("17:18:49", "GET")]);
    let log_path = path.to_string_lossy().to_string();

    let store = Arc::new(PositionStore::in_memory());
    let records = read(&mut follower(&path, &store, FollowerOptions::default())).await;

    let values: Vec<serde_json::Value> = records
        .iter()
        .map(|r| serde_json::to_value(r).unwrap())
        .collect();
    assert_eq!(
        values,
        vec![
            json!({ "message": SIMPLE_DIRECTIVE, "log-path": log_path }),
            json!({
                "message": "2017-03-05 17:18:49 127.0.0.1 GET",
                "log-path": log_path,
                "timestamp": { "seconds": 1_488_734_329_i64, "nanos": 0 },
            }),
        ]
    );
}

#[tokio::test]
async fn expanded_records_carry_fields() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("u_ex170305.log");
    append(&path, &[SIMPLE_DIRECTIVE, &simple_entry("17:18:49", "GET")]);
    let log_path = path.to_string_lossy().to_string();

    let store = Arc::new(PositionStore::in_memory());
    let options = FollowerOptions {
        expand_fields: true,
        ..FollowerOptions::default()
    };
    let records = read(&mut follower(&path, &store, options)).await;

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].message(), Some(SIMPLE_DIRECTIVE));
    assert_eq!(
        serde_json::to_value(&records[1]).unwrap(),
        json!({
            "date": "2017-03-05",
            "time": "17:18:49",
            "ip": "127.0.0.1",
            "method": "GET",
            "log-path": log_path,
            "timestamp": { "seconds": 1_488_734_329_i64, "nanos": 0 },
        })
    );
}

#[tokio::test]
async fn row_time_combines_with_directive_date() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("u_ex170305.log");
    append(
        &path,
        &[
            "#Date: 2017-03-05 17:18:49",
            "#Fields: time ip method",
            "17:19:49 127.0.0.1 GET",
        ],
    );

    let store = Arc::new(PositionStore::in_memory());
    let records = read(&mut follower(&path, &store, FollowerOptions::default())).await;

    assert_eq!(records.len(), 3);
    assert_eq!(seconds(&records[2]), 1_488_734_389);

    // Directive lines are mapped against `#Fields:` too. Their `time` token
    // is the directive name, which never parses, so no timestamp is derived.
    assert_eq!(records[0].message(), Some("#Date: 2017-03-05 17:18:49"));
    assert!(records[0].timestamp().is_none());
    assert_eq!(records[1].message(), Some("#Fields: time ip method"));
    assert!(records[1].timestamp().is_none());
}

#[tokio::test]
async fn schema_switch_survives_restart() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("u_ex170305.log");
    let pos_file = dir.path().join("iis.pos");
    append(
        &path,
        &[
            SIMPLE_DIRECTIVE,
            &simple_entry("17:18:49", "GET"),
            &simple_entry("17:19:49", "POST"),
            "#Fields: ip time method date",
            "127.0.0.1 17:20:49 GET 2017-03-05",
        ],
    );

    {
        let store = Arc::new(PositionStore::open(&pos_file).unwrap());
        let records = read(&mut follower(&path, &store, FollowerOptions::default())).await;

        assert_eq!(records.len(), 5);
        assert_eq!(records[0].message(), Some(SIMPLE_DIRECTIVE));
        assert_eq!(seconds(&records[1]), 1_488_734_329);
        assert_eq!(seconds(&records[2]), 1_488_734_389);
        assert_eq!(records[3].message(), Some("#Fields: ip time method date"));
        assert_eq!(seconds(&records[4]), 1_488_734_449);
        store.flush().unwrap();
    }

    append(
        &path,
        &[
            "127.0.0.1 17:21:49 GET 2017-03-05",
            "#Fields: ip method time date",
            "127.0.0.1 GET 17:22:49 2017-03-05",
            "127.0.0.1 POST 17:23:49 2017-03-05",
        ],
    );

    let store = Arc::new(PositionStore::open(&pos_file).unwrap());
    let records = read(&mut follower(&path, &store, FollowerOptions::default())).await;

    assert_eq!(records.len(), 4);
    assert_eq!(seconds(&records[0]), 1_488_734_509);
    assert_eq!(records[1].message(), Some("#Fields: ip method time date"));
    assert_eq!(seconds(&records[2]), 1_488_734_569);
    assert_eq!(seconds(&records[3]), 1_488_734_629);
}

#[tokio::test]
async fn batches_are_bounded_and_resume() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("u_ex170305.log");
    append(
        &path,
        &[
            SIMPLE_DIRECTIVE,
            &simple_entry("17:18:49", "GET"),
            &simple_entry("17:18:50", "GET"),
            &simple_entry("17:18:51", "GET"),
            &simple_entry("17:18:52", "GET"),
            &simple_entry("17:18:53", "GET"),
        ],
    );

    let store = Arc::new(PositionStore::in_memory());
    let options = FollowerOptions {
        read_line_limit: 4,
        ..FollowerOptions::default()
    };
    let mut follower = follower(&path, &store, options);

    let first = read(&mut follower).await;
    assert_eq!(first.len(), 4);
    assert!(follower.state().has_unread_lines);

    let second = read(&mut follower).await;
    assert_eq!(second.len(), 2);
    assert_eq!(seconds(&second[0]), 1_488_734_332);
    assert_eq!(seconds(&second[1]), 1_488_734_333);
    assert!(!follower.state().has_unread_lines);

    let pos = store.peek(&path).unwrap();
    assert_eq!(pos.last_read_offset, Some(fs::metadata(&path).unwrap().len()));
    assert_eq!(pos.last_directive_block_offset, Some(0));

    assert_eq!(follower.read_cycle().await.unwrap(), CycleOutcome::Unchanged);
}

#[tokio::test]
async fn malformed_position_file_fails_to_open() {
    let dir = TempDir::new().unwrap();
    let pos_file = dir.path().join("iis.pos");
    fs::write(&pos_file, "/logs/a.log 0 12\n/logs/b.log twelve\n").unwrap();

    assert!(PositionStore::open(&pos_file).is_err());
}
