use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use sostdio_harness::structured_log::{
    LogEmitter, LogEntry, LogLevel, Outcome, validate_log_file, validate_log_line,
};

static TEST_SEQ: AtomicU64 = AtomicU64::new(0);

fn temp_path(prefix: &str) -> PathBuf {
    let seq = TEST_SEQ.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!(
        "sostdio-harness-{prefix}-{}-{seq}.jsonl",
        std::process::id()
    ))
}

#[test]
fn emitted_file_validates() {
    let path = temp_path("emit");
    {
        let mut emitter = LogEmitter::to_file(&path, "ci-7").unwrap();
        emitter.emit(LogLevel::Info, "run_start").unwrap();
        emitter
            .emit_entry(
                LogEntry::new(String::new(), LogLevel::Error, "scenario_result")
                    .with_scenario("eof_precision")
                    .with_symbol("end_of_stream")
                    .with_outcome(Outcome::Fail)
                    .with_errno(5),
            )
            .unwrap();
        emitter.flush().unwrap();
    }

    let (lines, errors) = validate_log_file(&path).unwrap();
    assert_eq!(lines, 2);
    assert!(errors.is_empty(), "unexpected errors: {errors:?}");

    let content = std::fs::read_to_string(&path).unwrap();
    let second = content.lines().nth(1).unwrap();
    let entry = validate_log_line(second, 2).unwrap();
    assert_eq!(entry.trace_id, "ci-7::002");
    assert_eq!(entry.outcome, Some(Outcome::Fail));
    let _ = std::fs::remove_file(&path);
}

#[test]
fn invalid_lines_are_reported_with_line_numbers() {
    let path = temp_path("bad");
    std::fs::write(
        &path,
        concat!(
            r#"{"timestamp":"t","trace_id":"r::1","level":"info","event":"ok"}"#,
            "\n\n",
            r#"{"timestamp":"t","trace_id":"r::2","level":"loud","event":"bad"}"#,
            "\n",
            "garbage\n",
        ),
    )
    .unwrap();

    let (lines, errors) = validate_log_file(&path).unwrap();
    assert_eq!(lines, 3);
    assert_eq!(errors.len(), 2);
    assert_eq!(errors[0].line_number, 3);
    assert_eq!(errors[0].field, "level");
    assert_eq!(errors[1].line_number, 4);
    assert_eq!(errors[1].field, "<json>");
    let _ = std::fs::remove_file(&path);
}

#[test]
fn missing_log_file_is_an_io_error() {
    let path = temp_path("absent");
    assert!(validate_log_file(&path).is_err());
}
