//! Runtime trace configuration.
//!
//! Stream event tracing is controlled by environment variables read once on
//! first use:
//! - `SOSTDIO_TRACE`: `off` (default), `errors` (adverse events only) or
//!   `all` (every entry-point call).
//! - `SOSTDIO_TRACE_FILE`: path of the JSONL sink. Events go to stderr when
//!   unset.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Which stream events are emitted as structured log lines.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TraceLevel {
    /// Nothing is emitted.
    #[default]
    Off,
    /// Only calls that failed or hit end-of-stream.
    Errors,
    /// Every call.
    All,
}

impl TraceLevel {
    /// Parse from string (case-insensitive).
    #[must_use]
    pub fn from_str_loose(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "errors" | "error" | "adverse" | "warn" => Self::Errors,
            "all" | "full" | "debug" | "trace" => Self::All,
            _ => Self::Off,
        }
    }

    /// Returns true if an event with the given outcome should be emitted.
    #[must_use]
    pub const fn emits(self, adverse: bool) -> bool {
        match self {
            Self::Off => false,
            Self::Errors => adverse,
            Self::All => true,
        }
    }
}

static GLOBAL_LEVEL: OnceLock<TraceLevel> = OnceLock::new();
static GLOBAL_SINK: OnceLock<Option<PathBuf>> = OnceLock::new();

/// Get the configured trace level (reads env var on first call, caches thereafter).
#[must_use]
pub fn trace_level() -> TraceLevel {
    *GLOBAL_LEVEL.get_or_init(|| {
        std::env::var("SOSTDIO_TRACE")
            .map(|v| TraceLevel::from_str_loose(&v))
            .unwrap_or_default()
    })
}

/// Configured JSONL sink path, if any.
#[must_use]
pub fn trace_file() -> Option<&'static Path> {
    GLOBAL_SINK
        .get_or_init(|| {
            std::env::var_os("SOSTDIO_TRACE_FILE")
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
        })
        .as_deref()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_trace_levels() {
        assert_eq!(TraceLevel::from_str_loose("off"), TraceLevel::Off);
        assert_eq!(TraceLevel::from_str_loose("ERRORS"), TraceLevel::Errors);
        assert_eq!(TraceLevel::from_str_loose("adverse"), TraceLevel::Errors);
        assert_eq!(TraceLevel::from_str_loose(" all "), TraceLevel::All);
        assert_eq!(TraceLevel::from_str_loose("debug"), TraceLevel::All);
        assert_eq!(TraceLevel::from_str_loose("bogus"), TraceLevel::Off);
    }

    #[test]
    fn default_is_off() {
        assert_eq!(TraceLevel::default(), TraceLevel::Off);
    }

    #[test]
    fn emission_filter() {
        assert!(!TraceLevel::Off.emits(true));
        assert!(TraceLevel::Errors.emits(true));
        assert!(!TraceLevel::Errors.emits(false));
        assert!(TraceLevel::All.emits(false));
    }
}
