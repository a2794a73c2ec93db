use serde_json::Value;
use shopfloor_store::{
    JsonLineLogger, LogLevel, LogRotationPolicy, LogSink, LogTarget, ObservationStore, PointId,
    PointSpec, RotatingFile, StoreConfig,
};
use std::fs;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

/// Writer that lets the test read back what the logger emitted.
#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    fn lines(&self) -> Vec<String> {
        let bytes = self.0.lock().unwrap().clone();
        String::from_utf8(bytes)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn vars_config(log_level: LogLevel) -> StoreConfig {
    StoreConfig {
        log_level,
        points: vec![PointSpec::table("vars")],
        ..StoreConfig::default()
    }
}

#[test]
fn json_logger_writes_entries_to_its_sink() {
    let buffer = SharedBuffer::default();
    let mut logger = JsonLineLogger::new(LogSink::writer(buffer.clone()));
    logger
        .log("2026-03-01T08:00:00Z", LogLevel::Info, "store", "vars", 1, "first entry")
        .unwrap();
    let lines = buffer.lines();
    assert_eq!(lines.len(), 1);
    let parsed: Value = serde_json::from_str(&lines[0]).unwrap();
    assert_eq!(parsed["ts"], "2026-03-01T08:00:00Z");
    assert_eq!(parsed["level"], "INFO");
    assert_eq!(parsed["module"], "store");
    assert_eq!(parsed["point_id"], "vars");
    assert_eq!(parsed["sequence"], 1);
    assert_eq!(logger.recent().count(), 1);
}

#[test]
fn loglevel_override_filters_entries() {
    let buffer = SharedBuffer::default();
    let mut logger = JsonLineLogger::new(LogSink::writer(buffer.clone()));
    logger.set_level(LogLevel::Warn);
    logger
        .log("t", LogLevel::Info, "store", "vars", 1, "info suppressed")
        .unwrap();
    logger
        .log("t", LogLevel::Warn, "store", "vars", 2, "warn visible")
        .unwrap();
    let lines = buffer.lines();
    assert_eq!(lines.len(), 1);
    let parsed: Value = serde_json::from_str(&lines[0]).unwrap();
    assert_eq!(parsed["level"], "WARN");
    assert_eq!(parsed["message"], "warn visible");
}

#[test]
fn tail_is_bounded() {
    let mut logger = JsonLineLogger::default().with_tail(3);
    for idx in 0..10 {
        logger
            .log("t", LogLevel::Info, "store", "vars", idx, "payload")
            .unwrap();
    }
    let sequences: Vec<u64> = logger
        .recent()
        .map(|line| serde_json::from_str::<Value>(line).unwrap()["sequence"].as_u64().unwrap())
        .collect();
    assert_eq!(sequences, vec![7, 8, 9]);

    let mut silent = JsonLineLogger::default().with_tail(0);
    silent.log("t", LogLevel::Error, "store", "vars", 1, "x").unwrap();
    assert_eq!(silent.recent().count(), 0);
}

#[test]
fn file_sink_rotates_and_keeps_bounded_segments() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.log");
    let policy = LogRotationPolicy {
        max_bytes: 200,
        max_files: 2,
    };
    let file = RotatingFile::open(&path, policy).unwrap();
    let first_segment = file.segment_path(1);
    let second_segment = file.segment_path(2);
    let third_segment = file.segment_path(3);
    let mut logger = JsonLineLogger::new(LogSink::File(file)).with_tail(0);
    for idx in 0..40 {
        logger
            .log("t", LogLevel::Info, "store", "vars", idx, "payload")
            .unwrap();
    }
    assert!(first_segment.exists());
    assert!(second_segment.exists());
    assert!(!third_segment.exists());
    for segment in [&path, &first_segment, &second_segment] {
        let contents = fs::read_to_string(segment).unwrap();
        assert!(contents.len() as u64 <= policy.max_bytes);
        for line in contents.lines() {
            serde_json::from_str::<Value>(line).unwrap();
        }
    }
    let active = fs::read_to_string(&path).unwrap();
    let last: Value = serde_json::from_str(active.lines().last().unwrap()).unwrap();
    assert_eq!(last["sequence"], 39);
}

#[test]
fn level_names_parse_case_insensitively() {
    assert_eq!("warn".parse::<LogLevel>().unwrap(), LogLevel::Warn);
    assert_eq!("TRACE".parse::<LogLevel>().unwrap(), LogLevel::Trace);
    assert!("loud".parse::<LogLevel>().is_err());
}

#[test]
fn store_logs_resets_at_info() {
    let buffer = SharedBuffer::default();
    let store =
        ObservationStore::open_with_log_sink(vars_config(LogLevel::Info), LogSink::writer(buffer.clone()))
            .unwrap();
    let id = PointId::from("vars");
    store.ingest(&id, "t1", "a=1").unwrap();
    store.ingest(&id, "t2", ":WEEK a=2").unwrap();
    let lines = buffer.lines();
    assert_eq!(lines, store.log_lines());
    assert_eq!(lines.len(), 1);
    let parsed: Value = serde_json::from_str(&lines[0]).unwrap();
    assert_eq!(parsed["level"], "INFO");
    assert_eq!(parsed["point_id"], "vars");
    assert_eq!(parsed["sequence"], 2);
    assert_eq!(parsed["ts"], "t2");
    assert_eq!(parsed["message"], "reset triggered by WEEK");
}

#[test]
fn store_logs_duplicates_at_trace() {
    let store = ObservationStore::open(StoreConfig {
        log_target: LogTarget::Discard,
        ..vars_config(LogLevel::Trace)
    })
    .unwrap();
    let id = PointId::from("vars");
    store.ingest(&id, "t1", "a=1").unwrap();
    store.ingest(&id, "t2", "a=1").unwrap();
    let lines = store.log_lines();
    let last: Value = serde_json::from_str(lines.last().unwrap()).unwrap();
    assert_eq!(last["level"], "TRACE");
    assert_eq!(last["message"], "duplicate suppressed");
    assert_eq!(last["sequence"], 1);
}

#[test]
fn store_opens_file_target_from_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shopfloor.log");
    let store = ObservationStore::open(StoreConfig {
        log_target: LogTarget::File(path.clone()),
        ..vars_config(LogLevel::Debug)
    })
    .unwrap();
    store.ingest(&PointId::from("vars"), "t1", "a=1").unwrap();
    let contents = fs::read_to_string(&path).unwrap();
    let parsed: Value = serde_json::from_str(contents.lines().next().unwrap()).unwrap();
    assert_eq!(parsed["message"], "record appended");

    let missing_dir = dir.path().join("missing").join("shopfloor.log");
    assert!(ObservationStore::open(StoreConfig {
        log_target: LogTarget::File(missing_dir),
        ..StoreConfig::default()
    })
    .is_err());
}

#[test]
fn log_target_parses_from_config() {
    let config = StoreConfig::from_json(r#"{"log_target": {"file": "/var/log/shopfloor.log"}}"#)
        .unwrap();
    assert_eq!(
        config.log_target,
        LogTarget::File("/var/log/shopfloor.log".into())
    );
    let config = StoreConfig::from_json(r#"{"log_target": "discard"}"#).unwrap();
    assert_eq!(config.log_target, LogTarget::Discard);
    assert_eq!(StoreConfig::default().log_target, LogTarget::Stderr);
}
