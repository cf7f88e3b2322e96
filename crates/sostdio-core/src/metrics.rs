//! Atomic counters for stream observability.
//!
//! All counters use relaxed ordering. They are diagnostic only,
//! not synchronization primitives.

use std::sync::atomic::{AtomicU64, Ordering};

/// Global stream operation counters.
pub struct StdioMetrics {
    /// Streams opened on files.
    pub opens: AtomicU64,
    /// Streams released (files and pipes).
    pub closes: AtomicU64,
    /// Underlying `read` calls issued by refills.
    pub os_reads: AtomicU64,
    /// Underlying `write` calls issued by flushes.
    pub os_writes: AtomicU64,
    /// Write calls that transferred less than requested.
    pub short_writes: AtomicU64,
    /// Underlying `lseek` calls.
    pub os_seeks: AtomicU64,
    /// Buffer refills started.
    pub refills: AtomicU64,
    /// Flushes that had pending bytes.
    pub flushes: AtomicU64,
    /// Operations that set the sticky error flag.
    pub errors: AtomicU64,
    /// Child processes spawned.
    pub spawns: AtomicU64,
    /// Child processes reaped.
    pub reaps: AtomicU64,
}

impl StdioMetrics {
    /// Create a new zeroed metrics instance.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            opens: AtomicU64::new(0),
            closes: AtomicU64::new(0),
            os_reads: AtomicU64::new(0),
            os_writes: AtomicU64::new(0),
            short_writes: AtomicU64::new(0),
            os_seeks: AtomicU64::new(0),
            refills: AtomicU64::new(0),
            flushes: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            spawns: AtomicU64::new(0),
            reaps: AtomicU64::new(0),
        }
    }

    /// Increment a counter by 1.
    pub fn inc(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Read a counter value.
    pub fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }

    /// Snapshot all counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            opens: Self::get(&self.opens),
            closes: Self::get(&self.closes),
            os_reads: Self::get(&self.os_reads),
            os_writes: Self::get(&self.os_writes),
            short_writes: Self::get(&self.short_writes),
            os_seeks: Self::get(&self.os_seeks),
            refills: Self::get(&self.refills),
            flushes: Self::get(&self.flushes),
            errors: Self::get(&self.errors),
            spawns: Self::get(&self.spawns),
            reaps: Self::get(&self.reaps),
        }
    }
}

impl Default for StdioMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time snapshot of all stream counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub opens: u64,
    pub closes: u64,
    pub os_reads: u64,
    pub os_writes: u64,
    pub short_writes: u64,
    pub os_seeks: u64,
    pub refills: u64,
    pub flushes: u64,
    pub errors: u64,
    pub spawns: u64,
    pub reaps: u64,
}

/// Global metrics instance.
static GLOBAL_METRICS: StdioMetrics = StdioMetrics::new();

/// Access the global metrics singleton.
#[must_use]
pub fn global_metrics() -> &'static StdioMetrics {
    &GLOBAL_METRICS
}
