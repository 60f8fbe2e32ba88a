//! Paint path metrics.
//!
//! Two kinds of counters live side by side:
//! * request counters (what producers asked for): `flush_requests` counts
//!   every repaint request, `coalesced_requests` those absorbed by an already
//!   pending wake-up;
//! * execution counters (what the engine actually did): paints per mode,
//!   skipped delta passes, lines erased/emitted, bytes handed to the writer.
//!
//! Keeping them separate makes the coalescing ratio directly observable.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

#[derive(Debug, Default)]
pub struct PaintMetrics {
    /// Full repaints executed (explicit flushes, discards, full mode passes).
    pub full_paints: AtomicU64,
    /// Delta repaints that wrote to the output.
    pub delta_paints: AtomicU64,
    /// Delta passes that found no dirty block and skipped terminal I/O.
    pub skipped_paints: AtomicU64,
    /// Terminal lines erased before repainting.
    pub lines_erased: AtomicU64,
    /// Terminal lines emitted by blocks (including final emits of discarded blocks).
    pub lines_emitted: AtomicU64,
    /// Bytes handed to the output writer.
    pub bytes_written: AtomicU64,
    /// Closed blocks removed from the head of the sequence.
    pub discarded_blocks: AtomicU64,
    /// Paint passes whose output write failed.
    pub paint_errors: AtomicU64,
    /// Repaint requests issued by producers.
    pub flush_requests: AtomicU64,
    /// Requests absorbed by an already pending wake-up.
    pub coalesced_requests: AtomicU64,
    /// Duration (ns) of the most recent paint pass that wrote output.
    pub last_paint_ns: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PaintMetricsSnapshot {
    pub full_paints: u64,
    pub delta_paints: u64,
    pub skipped_paints: u64,
    pub lines_erased: u64,
    pub lines_emitted: u64,
    pub bytes_written: u64,
    pub discarded_blocks: u64,
    pub paint_errors: u64,
    pub flush_requests: u64,
    pub coalesced_requests: u64,
    pub last_paint_ns: u64,
}

impl PaintMetricsSnapshot {
    /// Paint passes that reached the writer.
    pub fn paints(&self) -> u64 {
        self.full_paints + self.delta_paints
    }
}

impl PaintMetrics {
    pub fn snapshot(&self) -> PaintMetricsSnapshot {
        PaintMetricsSnapshot {
            full_paints: self.full_paints.load(Ordering::Relaxed),
            delta_paints: self.delta_paints.load(Ordering::Relaxed),
            skipped_paints: self.skipped_paints.load(Ordering::Relaxed),
            lines_erased: self.lines_erased.load(Ordering::Relaxed),
            lines_emitted: self.lines_emitted.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            discarded_blocks: self.discarded_blocks.load(Ordering::Relaxed),
            paint_errors: self.paint_errors.load(Ordering::Relaxed),
            flush_requests: self.flush_requests.load(Ordering::Relaxed),
            coalesced_requests: self.coalesced_requests.load(Ordering::Relaxed),
            last_paint_ns: self.last_paint_ns.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn add(counter: &AtomicU64, n: usize) {
        counter.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_duration(&self, elapsed: Duration) {
        let ns = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
        self.last_paint_ns.store(ns, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_counters() {
        let m = PaintMetrics::default();
        PaintMetrics::incr(&m.full_paints);
        PaintMetrics::incr(&m.delta_paints);
        PaintMetrics::add(&m.lines_erased, 3);
        m.record_duration(Duration::from_nanos(1234));
        let s = m.snapshot();
        assert_eq!(s.paints(), 2);
        assert_eq!(s.lines_erased, 3);
        assert_eq!(s.last_paint_ns, 1234);
    }
}
