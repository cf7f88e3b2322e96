//! End-to-end stream scenarios.
//!
//! Each scenario drives real file or subprocess streams through one
//! externally observable property and reports pass/fail. Files are created
//! under a caller-supplied work directory and removed afterwards.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::Serialize;
use sostdio_abi::{open, spawn};
use sostdio_core::StdioError;
use sostdio_core::metrics::{MetricsSnapshot, global_metrics};
use sostdio_core::process::WaitStatus;
use sostdio_core::stdio::{BUFSIZE, Whence};
use thiserror::Error;

use crate::structured_log::{LogEmitter, LogEntry, LogLevel, Outcome};

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error(transparent)]
    Stdio(#[from] StdioError),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("{what}: expected {expected}, got {actual}")]
    Mismatch {
        what: &'static str,
        expected: String,
        actual: String,
    },
}

impl ScenarioError {
    /// errno carried by the failure, if it came from a stream or the OS.
    pub fn errno(&self) -> Option<i32> {
        match self {
            Self::Stdio(e) => Some(e.errno()),
            Self::Io(e) => e.raw_os_error(),
            Self::Mismatch { .. } => None,
        }
    }
}

type ScenarioFn = fn(&Workdir) -> Result<(), ScenarioError>;

/// A named check.
#[derive(Clone, Copy)]
pub struct Scenario {
    pub name: &'static str,
    /// Operation under test.
    pub symbol: &'static str,
    run: ScenarioFn,
}

/// Outcome of one scenario.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioResult {
    pub name: &'static str,
    pub symbol: &'static str,
    pub passed: bool,
    pub message: Option<String>,
    pub errno: Option<i32>,
    pub duration_us: u64,
}

/// Scratch file allocator for one scenario.
pub struct Workdir {
    root: PathBuf,
    scenario: &'static str,
}

impl Workdir {
    fn file(&self, tag: &str) -> PathBuf {
        self.root.join(format!(
            "sostdio-{}-{}-{tag}.bin",
            self.scenario,
            std::process::id()
        ))
    }
}

fn expect_eq<T: PartialEq + std::fmt::Debug>(
    what: &'static str,
    expected: T,
    actual: T,
) -> Result<(), ScenarioError> {
    if expected == actual {
        Ok(())
    } else {
        Err(ScenarioError::Mismatch {
            what,
            expected: format!("{expected:?}"),
            actual: format!("{actual:?}"),
        })
    }
}

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 % 256) as u8).collect()
}

fn delta(before: MetricsSnapshot, after: MetricsSnapshot) -> MetricsSnapshot {
    MetricsSnapshot {
        opens: after.opens - before.opens,
        closes: after.closes - before.closes,
        os_reads: after.os_reads - before.os_reads,
        os_writes: after.os_writes - before.os_writes,
        short_writes: after.short_writes - before.short_writes,
        os_seeks: after.os_seeks - before.os_seeks,
        refills: after.refills - before.refills,
        flushes: after.flushes - before.flushes,
        errors: after.errors - before.errors,
        spawns: after.spawns - before.spawns,
        reaps: after.reaps - before.reaps,
    }
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

fn roundtrip(dir: &Workdir) -> Result<(), ScenarioError> {
    for len in [0, 1, BUFSIZE - 1, BUFSIZE, BUFSIZE + 1, 3 * BUFSIZE] {
        let path = dir.file(&format!("n{len}"));
        let data = pattern(len);

        let mut w = open(&path, "w")?;
        expect_eq("elements written", len, w.write_block(&data, 1))?;
        w.close()?;

        let mut r = open(&path, "r")?;
        let mut back = vec![0u8; len];
        expect_eq("elements read", len, r.read_block(&mut back, 1))?;
        expect_eq("content matches", true, back == data)?;
        expect_eq("byte after end", None, r.get_byte()?)?;
        r.close()?;
        fs::remove_file(&path)?;
    }
    Ok(())
}

fn flush_idempotent(dir: &Workdir) -> Result<(), ScenarioError> {
    let path = dir.file("data");
    let mut s = open(&path, "w")?;
    s.write_block(b"twice", 1);

    let before = global_metrics().snapshot();
    s.flush()?;
    let pos = s.tell();
    s.flush()?;
    let d = delta(before, global_metrics().snapshot());

    expect_eq("os writes across two flushes", 1, d.os_writes)?;
    expect_eq("position after second flush", pos, s.tell())?;
    s.close()?;
    fs::remove_file(&path)?;
    Ok(())
}

fn mode_switch_flush(dir: &Workdir) -> Result<(), ScenarioError> {
    let path = dir.file("data");
    fs::write(&path, b"..........")?;

    let mut s = open(&path, "r+")?;
    s.seek(3, Whence::Set)?;
    s.write_block(b"XYZ", 1);
    expect_eq("byte after pending write", Some(b'.'), s.get_byte()?)?;
    expect_eq("position", 7, s.tell())?;
    s.seek(3, Whence::Set)?;
    let mut got = [0u8; 3];
    s.read_block(&mut got, 1);
    expect_eq("written bytes", *b"XYZ", got)?;
    s.close()?;

    expect_eq("file content", b"...XYZ....".to_vec(), fs::read(&path)?)?;
    fs::remove_file(&path)?;
    Ok(())
}

fn pipe_bulk_write(dir: &Workdir) -> Result<(), ScenarioError> {
    let path = dir.file("sink");
    let data = pattern(256 * 1024);
    let mut p = spawn(&format!("cat > '{}'", path.display()), "w")?;
    expect_eq("elements written", data.len(), p.write_block(&data, 1))?;
    expect_eq("child status", WaitStatus::Exited(0), p.close()?)?;
    expect_eq("child received everything", true, fs::read(&path)? == data)?;
    fs::remove_file(&path)?;
    Ok(())
}

fn write_failure_is_sticky(dir: &Workdir) -> Result<(), ScenarioError> {
    let path = dir.file("data");
    fs::write(&path, b"read only")?;
    let mut s = open(&path, "r")?;
    s.put_byte(b'x')?;
    let err = match s.flush() {
        Ok(()) => {
            return Err(ScenarioError::Mismatch {
                what: "flush on read-only descriptor",
                expected: "error".into(),
                actual: "ok".into(),
            });
        }
        Err(e) => e,
    };
    expect_eq("flush errno", sostdio_core::errno::EBADF, err.errno())?;
    expect_eq("error flag", true, s.is_error())?;
    // The descriptor is released even though the final flush fails again.
    expect_eq("close reports flush failure", true, s.close().is_err())?;
    fs::remove_file(&path)?;
    Ok(())
}

fn eof_precision(dir: &Workdir) -> Result<(), ScenarioError> {
    let path = dir.file("data");
    let data = pattern(BUFSIZE + 3);
    fs::write(&path, &data)?;

    let mut s = open(&path, "r")?;
    for (i, &b) in data.iter().enumerate() {
        if s.get_byte()? != Some(b) {
            return Err(ScenarioError::Mismatch {
                what: "byte value",
                expected: format!("{b} at {i}"),
                actual: "different byte".into(),
            });
        }
    }
    expect_eq("end of stream after last byte", false, s.end_of_stream())?;
    expect_eq("read past end", None, s.get_byte()?)?;
    expect_eq("end of stream after sentinel", true, s.end_of_stream())?;
    s.close()?;
    fs::remove_file(&path)?;
    Ok(())
}

fn append_position(dir: &Workdir) -> Result<(), ScenarioError> {
    for mode in ["a", "a+"] {
        let path = dir.file(mode);
        fs::write(&path, b"seventeen bytes!!")?;
        let s = open(&path, mode)?;
        expect_eq("initial position", 17, s.tell())?;
        s.close()?;
        fs::remove_file(&path)?;
    }
    Ok(())
}

fn subprocess_roundtrip(_dir: &Workdir) -> Result<(), ScenarioError> {
    let before = global_metrics().snapshot();
    let mut p = spawn("printf hi", "r")?;
    expect_eq("first byte", Some(b'h'), p.get_byte()?)?;
    expect_eq("second byte", Some(b'i'), p.get_byte()?)?;
    expect_eq("third byte", None, p.get_byte()?)?;
    expect_eq("child status", WaitStatus::Exited(0), p.close()?)?;
    let d = delta(before, global_metrics().snapshot());
    expect_eq("children reaped", d.spawns, d.reaps)?;
    Ok(())
}

fn seek_invalidates_read_ahead(dir: &Workdir) -> Result<(), ScenarioError> {
    let path = dir.file("data");
    fs::write(&path, pattern(2 * BUFSIZE))?;

    let mut s = open(&path, "r+")?;
    s.get_byte()?;
    s.seek(10, Whence::Set)?;
    s.write_block(b"fresh", 1);
    s.seek(10, Whence::Set)?;
    let mut got = [0u8; 5];
    s.read_block(&mut got, 1);
    expect_eq("bytes after seek", *b"fresh", got)?;
    s.close()?;
    fs::remove_file(&path)?;
    Ok(())
}

/// Every scenario, in run order.
pub const SCENARIOS: &[Scenario] = &[
    Scenario {
        name: "roundtrip",
        symbol: "write_block",
        run: roundtrip,
    },
    Scenario {
        name: "flush_idempotent",
        symbol: "flush",
        run: flush_idempotent,
    },
    Scenario {
        name: "mode_switch_flush",
        symbol: "get_byte",
        run: mode_switch_flush,
    },
    Scenario {
        name: "pipe_bulk_write",
        symbol: "flush",
        run: pipe_bulk_write,
    },
    Scenario {
        name: "write_failure_is_sticky",
        symbol: "flush",
        run: write_failure_is_sticky,
    },
    Scenario {
        name: "eof_precision",
        symbol: "end_of_stream",
        run: eof_precision,
    },
    Scenario {
        name: "append_position",
        symbol: "open",
        run: append_position,
    },
    Scenario {
        name: "subprocess_roundtrip",
        symbol: "spawn",
        run: subprocess_roundtrip,
    },
    Scenario {
        name: "seek_invalidates_read_ahead",
        symbol: "seek",
        run: seek_invalidates_read_ahead,
    },
];

impl Scenario {
    /// Run this scenario with scratch files under `root`.
    pub fn run(&self, root: &Path) -> ScenarioResult {
        let dir = Workdir {
            root: root.to_path_buf(),
            scenario: self.name,
        };
        let started = Instant::now();
        let outcome = (self.run)(&dir);
        let duration_us = started.elapsed().as_micros() as u64;
        match outcome {
            Ok(()) => ScenarioResult {
                name: self.name,
                symbol: self.symbol,
                passed: true,
                message: None,
                errno: None,
                duration_us,
            },
            Err(e) => ScenarioResult {
                name: self.name,
                symbol: self.symbol,
                passed: false,
                message: Some(e.to_string()),
                errno: e.errno(),
                duration_us,
            },
        }
    }
}

/// Run every scenario in order.
pub fn run_all(root: &Path) -> Vec<ScenarioResult> {
    SCENARIOS.iter().map(|s| s.run(root)).collect()
}

impl ScenarioResult {
    /// Structured log record for this result.
    pub fn to_log_entry(&self) -> LogEntry {
        let (level, outcome) = if self.passed {
            (LogLevel::Info, Outcome::Pass)
        } else {
            (LogLevel::Error, Outcome::Fail)
        };
        let mut entry = LogEntry::new(String::new(), level, "scenario_result")
            .with_scenario(self.name)
            .with_symbol(self.symbol)
            .with_outcome(outcome)
            .with_duration_us(self.duration_us);
        if let Some(errno) = self.errno {
            entry = entry.with_errno(errno);
        }
        if let Some(message) = &self.message {
            entry = entry.with_details(serde_json::json!({ "message": message }));
        }
        entry
    }
}

/// Run every scenario and log one record per result plus a summary.
///
/// Returns the results so the caller can decide the exit status.
pub fn run_and_log(root: &Path, emitter: &mut LogEmitter) -> std::io::Result<Vec<ScenarioResult>> {
    emitter.emit(LogLevel::Info, "run_start")?;
    let results = run_all(root);
    for result in &results {
        emitter.emit_entry(result.to_log_entry())?;
    }
    let failed = results.iter().filter(|r| !r.passed).count();
    let metrics = global_metrics().snapshot();
    let summary = LogEntry::new(
        String::new(),
        if failed == 0 { LogLevel::Info } else { LogLevel::Error },
        "run_summary",
    )
    .with_details(serde_json::json!({
        "total": results.len(),
        "failed": failed,
        "os_reads": metrics.os_reads,
        "os_writes": metrics.os_writes,
        "spawns": metrics.spawns,
        "reaps": metrics.reaps,
    }));
    emitter.emit_entry(summary)?;
    emitter.flush()?;
    Ok(results)
}
