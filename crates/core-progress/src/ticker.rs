//! Periodic tick driver.
//!
//! Collaborators that animate (spinners, elapsed timers) implement `Ticker`
//! and are registered explicitly with a `TickDriver`. The driver owns one
//! tokio task: every interval it ticks each registered collaborator and, when
//! at least one reports changed output, asks the region's repaint scheduler
//! for a pass. The terminal write happens on the scheduler's worker, coalesced
//! and paced like any other update. The driver stops once the region manager
//! is done.

use core_blocks::Blocks;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// A collaborator advanced by the tick driver.
pub trait Ticker: Send + Sync {
    /// Advance one step. Returns true when the painted output changed.
    fn tick(&self) -> bool;
}

pub struct TickDriver {
    blocks: Blocks,
    interval: Duration,
    tickers: Vec<Arc<dyn Ticker>>,
}

/// Totals reported when the driver stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickStats {
    pub ticks: u64,
    /// Repaint requests handed to the scheduler.
    pub flushes: u64,
}

impl TickDriver {
    pub fn new(blocks: Blocks, interval: Duration) -> Self {
        Self {
            blocks,
            interval: interval.max(Duration::from_millis(1)),
            tickers: Vec::new(),
        }
    }

    pub fn register(&mut self, ticker: Arc<dyn Ticker>) {
        self.tickers.push(ticker);
    }

    pub fn len(&self) -> usize {
        self.tickers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickers.is_empty()
    }

    /// Tick every registered collaborator once. Returns whether any changed.
    pub fn tick_all(&self) -> bool {
        // No short-circuit: every ticker advances on every tick.
        self.tickers.iter().fold(false, |changed, t| t.tick() | changed)
    }

    /// Drive the registered tickers until the region manager is done.
    pub async fn run(self) -> TickStats {
        let mut stats = TickStats::default();
        let mut interval = tokio::time::interval(self.interval);
        debug!(
            target: "progress.tick",
            tickers = self.tickers.len(),
            interval_ms = self.interval.as_millis() as u64,
            "tick_driver_start"
        );
        loop {
            interval.tick().await;
            if self.blocks.is_done() {
                break;
            }
            stats.ticks += 1;
            if !self.tick_all() {
                continue;
            }
            self.blocks.request_flush();
            stats.flushes += 1;
            trace!(target: "progress.tick", tick = stats.ticks, "tick_changed");
        }
        debug!(
            target: "progress.tick",
            ticks = stats.ticks,
            flushes = stats.flushes,
            "tick_driver_exit"
        );
        stats
    }

    /// Spawn `run` on the current tokio runtime.
    pub fn spawn(self) -> JoinHandle<TickStats> {
        tokio::spawn(self.run())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counter {
        ticks: AtomicUsize,
        changes: bool,
    }

    impl Ticker for Counter {
        fn tick(&self) -> bool {
            self.ticks.fetch_add(1, Ordering::SeqCst);
            self.changes
        }
    }

    fn counter(changes: bool) -> Arc<Counter> {
        Arc::new(Counter {
            ticks: AtomicUsize::new(0),
            changes,
        })
    }

    fn sink_blocks() -> Blocks {
        Blocks::new(std::io::sink()).unwrap()
    }

    #[test]
    fn tick_all_advances_every_ticker() {
        let mut driver = TickDriver::new(sink_blocks(), Duration::from_millis(10));
        let changed = counter(true);
        let idle = counter(false);
        driver.register(changed.clone());
        driver.register(idle.clone());
        assert!(driver.tick_all());
        assert_eq!(changed.ticks.load(Ordering::SeqCst), 1);
        assert_eq!(idle.ticks.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn driver_stops_when_blocks_done() {
        let blocks = sink_blocks();
        let mut driver = TickDriver::new(blocks.clone(), Duration::from_millis(5));
        let c = counter(true);
        driver.register(c.clone());
        let handle = driver.spawn();

        tokio::time::sleep(Duration::from_millis(40)).await;
        blocks.close().unwrap();
        let stats = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("driver should observe done")
            .unwrap();
        assert!(stats.ticks >= 1);
        assert_eq!(stats.flushes, stats.ticks);
        assert_eq!(blocks.metrics().flush_requests, stats.flushes);
        // Painting stays with the scheduler.
        assert_eq!(blocks.metrics().full_paints, 0);
        assert!(c.ticks.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn unchanged_ticks_do_not_flush() {
        let blocks = sink_blocks();
        let mut driver = TickDriver::new(blocks.clone(), Duration::from_millis(5));
        driver.register(counter(false));
        let handle = driver.spawn();
        tokio::time::sleep(Duration::from_millis(30)).await;
        blocks.close().unwrap();
        let stats = handle.await.unwrap();
        assert_eq!(stats.flushes, 0);
        assert_eq!(blocks.metrics().flush_requests, 0);
    }
}
