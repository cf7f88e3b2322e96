//! Per-call observations for the C-shaped entry points.
//!
//! Each `so_*` call reports one [`StdioEvent`]. Whether it is written, and
//! where, is decided by [`sostdio_core::config`]: nothing by default, one
//! JSON object per line when tracing is on.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::Serialize;
use sostdio_core::config::{trace_file, trace_level};

static NEXT_SEQ: AtomicU64 = AtomicU64::new(1);

/// One entry-point call.
#[derive(Debug, Clone, Serialize)]
pub struct StdioEvent {
    pub seq: u64,
    pub op: &'static str,
    /// Opaque handle value, 0 when the call had none.
    pub handle: usize,
    /// The call failed or reached end-of-stream.
    pub adverse: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errno: Option<i32>,
    /// Logical position after the call, when a stream was involved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pos: Option<i64>,
}

impl StdioEvent {
    pub fn new(op: &'static str, handle: usize) -> Self {
        Self {
            seq: 0,
            op,
            handle,
            adverse: false,
            errno: None,
            pos: None,
        }
    }

    #[must_use]
    pub fn failed(mut self, errno: i32) -> Self {
        self.adverse = true;
        self.errno = Some(errno);
        self
    }

    #[must_use]
    pub fn adverse(mut self, adverse: bool) -> Self {
        self.adverse = adverse;
        self
    }

    #[must_use]
    pub fn at(mut self, pos: i64) -> Self {
        self.pos = Some(pos);
        self
    }

    /// Serialize as a single JSON line (no trailing newline).
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

fn sink() -> Option<&'static Mutex<File>> {
    static SINK: OnceLock<Option<Mutex<File>>> = OnceLock::new();
    SINK.get_or_init(|| {
        let path = trace_file()?;
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .ok()
            .map(Mutex::new)
    })
    .as_ref()
}

/// Publish an event according to the configured trace level.
pub fn observe(mut event: StdioEvent) {
    if !trace_level().emits(event.adverse) {
        return;
    }
    event.seq = NEXT_SEQ.fetch_add(1, Ordering::Relaxed);
    let line = event.to_json();
    match sink() {
        Some(file) => {
            let _ = writeln!(file.lock(), "{line}");
        }
        None => eprintln!("{line}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_serializes_compactly() {
        let json = StdioEvent::new("so_fgetc", 0x1000_0010).at(3).to_json();
        let v: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(v["op"], "so_fgetc");
        assert_eq!(v["handle"], 0x1000_0010);
        assert_eq!(v["adverse"], false);
        assert_eq!(v["pos"], 3);
        assert!(v.get("errno").is_none());
    }

    #[test]
    fn failure_marks_adverse() {
        let e = StdioEvent::new("so_fopen", 0).failed(2);
        assert!(e.adverse);
        assert_eq!(e.errno, Some(2));
        assert!(e.to_json().contains("\"errno\":2"));
    }
}
