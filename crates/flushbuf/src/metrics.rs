// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Buffer counters, shared between the facade and the worker.

use std::sync::atomic::{AtomicU64, Ordering};

/// Why the worker flushed a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushTrigger {
    /// Batch reached capacity.
    Capacity,
    /// Flush interval elapsed since the last flush.
    Interval,
    /// `Buffer::flush` was called.
    Manual,
    /// Final flush on close (or on drop of the buffer).
    Close,
}

impl FlushTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Capacity => "capacity",
            Self::Interval => "interval",
            Self::Manual => "manual",
            Self::Close => "close",
        }
    }
}

/// Buffer metrics
#[derive(Debug)]
pub struct BufferMetrics {
    /// Items accepted by the worker
    pub items_pushed: AtomicU64,
    /// Items handed to the sink
    pub items_flushed: AtomicU64,
    /// Sink invocations
    pub batches_flushed: AtomicU64,
    pub capacity_flushes: AtomicU64,
    pub interval_flushes: AtomicU64,
    pub manual_flushes: AtomicU64,
    pub close_flushes: AtomicU64,
    /// Push calls that gave up waiting
    pub push_timeouts: AtomicU64,
    pub flush_timeouts: AtomicU64,
    pub close_timeouts: AtomicU64,
}

impl BufferMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self {
            items_pushed: AtomicU64::new(0),
            items_flushed: AtomicU64::new(0),
            batches_flushed: AtomicU64::new(0),
            capacity_flushes: AtomicU64::new(0),
            interval_flushes: AtomicU64::new(0),
            manual_flushes: AtomicU64::new(0),
            close_flushes: AtomicU64::new(0),
            push_timeouts: AtomicU64::new(0),
            flush_timeouts: AtomicU64::new(0),
            close_timeouts: AtomicU64::new(0),
        }
    }

    pub(crate) fn record_flush(&self, trigger: FlushTrigger, items: usize) {
        self.batches_flushed.fetch_add(1, Ordering::Relaxed);
        self.items_flushed.fetch_add(items as u64, Ordering::Relaxed);
        let counter = match trigger {
            FlushTrigger::Capacity => &self.capacity_flushes,
            FlushTrigger::Interval => &self.interval_flushes,
            FlushTrigger::Manual => &self.manual_flushes,
            FlushTrigger::Close => &self.close_flushes,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            items_pushed: self.items_pushed.load(Ordering::Relaxed),
            items_flushed: self.items_flushed.load(Ordering::Relaxed),
            batches_flushed: self.batches_flushed.load(Ordering::Relaxed),
            capacity_flushes: self.capacity_flushes.load(Ordering::Relaxed),
            interval_flushes: self.interval_flushes.load(Ordering::Relaxed),
            manual_flushes: self.manual_flushes.load(Ordering::Relaxed),
            close_flushes: self.close_flushes.load(Ordering::Relaxed),
            push_timeouts: self.push_timeouts.load(Ordering::Relaxed),
            flush_timeouts: self.flush_timeouts.load(Ordering::Relaxed),
            close_timeouts: self.close_timeouts.load(Ordering::Relaxed),
        }
    }
}

impl Default for BufferMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Metrics snapshot (for logging/monitoring)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub items_pushed: u64,
    pub items_flushed: u64,
    pub batches_flushed: u64,
    pub capacity_flushes: u64,
    pub interval_flushes: u64,
    pub manual_flushes: u64,
    pub close_flushes: u64,
    pub push_timeouts: u64,
    pub flush_timeouts: u64,
    pub close_timeouts: u64,
}

impl MetricsSnapshot {
    /// Items accepted by the worker but not yet delivered to the sink.
    pub fn items_pending(&self) -> u64 {
        self.items_pushed.saturating_sub(self.items_flushed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_snapshot() {
        let metrics = BufferMetrics::new();
        metrics.items_pushed.fetch_add(7, Ordering::Relaxed);
        metrics.record_flush(FlushTrigger::Capacity, 5);
        metrics.push_timeouts.fetch_add(1, Ordering::Relaxed);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.items_pushed, 7);
        assert_eq!(snapshot.items_flushed, 5);
        assert_eq!(snapshot.batches_flushed, 1);
        assert_eq!(snapshot.capacity_flushes, 1);
        assert_eq!(snapshot.interval_flushes, 0);
        assert_eq!(snapshot.push_timeouts, 1);
        assert_eq!(snapshot.items_pending(), 2);
    }

    #[test]
    fn test_record_flush_per_trigger() {
        let metrics = BufferMetrics::new();
        metrics.record_flush(FlushTrigger::Interval, 1);
        metrics.record_flush(FlushTrigger::Manual, 2);
        metrics.record_flush(FlushTrigger::Close, 3);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.interval_flushes, 1);
        assert_eq!(snapshot.manual_flushes, 1);
        assert_eq!(snapshot.close_flushes, 1);
        assert_eq!(snapshot.batches_flushed, 3);
        assert_eq!(snapshot.items_flushed, 6);
    }
}
