//! Repaint scheduler: a coalescing gate plus one dedicated worker thread.
//!
//! Producers call `RepaintScheduler::request` from any thread. The first
//! request after a wake-up was consumed sets the pending flag and puts a token
//! into a single-slot channel; every further request before the worker picks
//! the token up is absorbed by the flag (at most one pending wake-up).
//!
//! The worker blocks on that slot, runs one paint pass per token and then
//! pauses for the minimum inter-paint interval before accepting the next
//! token. Repaint frequency is therefore bounded by the interval no matter
//! how fast producers write, and the worker is the only writer to the output
//! during scheduled paints.
//!
//! Worker exit conditions:
//! * the request side was dropped (gate disconnected),
//! * the manager's `done` signal fired,
//! * the manager's context was canceled or hit its deadline; in that case the
//!   worker fires `done` itself before exiting,
//! * the paint callback reports that its manager is gone.

use crate::signal::{Context, Signal};
use crossbeam_channel::{Receiver, Sender, TrySendError, bounded, select};
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, trace};

/// Minimum pause between two scheduled paint passes.
pub const MIN_UPDATE_INTERVAL: Duration = Duration::from_millis(50);

/// Request side of the scheduler, owned by the region manager.
#[derive(Debug)]
pub struct RepaintScheduler {
    pending: Arc<AtomicBool>,
    gate: Sender<()>,
    interval: Duration,
}

/// Worker side; consumed by `spawn`.
#[derive(Debug)]
pub struct RepaintWorker {
    pending: Arc<AtomicBool>,
    gate: Receiver<()>,
    interval: Duration,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ExitReason {
    GateClosed,
    Done,
    Canceled,
    OwnerGone,
}

impl ExitReason {
    fn as_str(&self) -> &'static str {
        match self {
            ExitReason::GateClosed => "gate_closed",
            ExitReason::Done => "done",
            ExitReason::Canceled => "canceled",
            ExitReason::OwnerGone => "owner_gone",
        }
    }
}

impl RepaintScheduler {
    pub fn new(interval: Duration) -> (Self, RepaintWorker) {
        let pending = Arc::new(AtomicBool::new(false));
        let (tx, rx) = bounded(1);
        (
            Self {
                pending: pending.clone(),
                gate: tx,
                interval,
            },
            RepaintWorker {
                pending,
                gate: rx,
                interval,
            },
        )
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Ask for a paint pass soon. Never blocks. Returns true only when this
    /// call released the gate; false when a wake-up was already pending.
    pub fn request(&self) -> bool {
        if self.pending.swap(true, Ordering::AcqRel) {
            return false;
        }
        match self.gate.try_send(()) {
            Ok(()) => true,
            // Slot still occupied: the queued token already covers this request.
            Err(TrySendError::Full(())) => false,
            Err(TrySendError::Disconnected(())) => {
                trace!(target: "blocks.scheduler", "request_after_worker_exit");
                false
            }
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }
}

impl RepaintWorker {
    /// Start the worker thread. `paint` runs once per consumed wake-up and
    /// returns false when there is nothing left to paint for (owner dropped).
    pub fn spawn<P>(self, done: Signal, ctx: Context, paint: P) -> io::Result<JoinHandle<()>>
    where
        P: FnMut() -> bool + Send + 'static,
    {
        thread::Builder::new()
            .name("blocks-repaint".into())
            .spawn(move || self.run(done, ctx, paint))
    }

    fn run<P>(self, done: Signal, ctx: Context, mut paint: P)
    where
        P: FnMut() -> bool,
    {
        let done_rx = done.receiver();
        let cancel_rx = ctx.cancel_receiver();
        let timer = ctx.deadline_receiver();
        debug!(target: "blocks.scheduler", interval_ms = self.interval.as_millis() as u64, "repaint_worker_start");

        let reason = loop {
            let woke = select! {
                recv(self.gate) -> msg => match msg {
                    Ok(()) => None,
                    Err(_) => Some(ExitReason::GateClosed),
                },
                recv(done_rx) -> _ => Some(ExitReason::Done),
                recv(cancel_rx) -> _ => Some(ExitReason::Canceled),
                recv(timer) -> _ => Some(ExitReason::Canceled),
            };
            if let Some(reason) = woke {
                break reason;
            }

            // Requests from here on need a fresh wake-up.
            self.pending.store(false, Ordering::Release);
            if !paint() {
                break ExitReason::OwnerGone;
            }

            let interrupted = select! {
                recv(done_rx) -> _ => Some(ExitReason::Done),
                recv(cancel_rx) -> _ => Some(ExitReason::Canceled),
                recv(timer) -> _ => Some(ExitReason::Canceled),
                default(self.interval) => None,
            };
            if let Some(reason) = interrupted {
                break reason;
            }
        };

        if reason == ExitReason::Canceled {
            done.fire();
        }
        debug!(target: "blocks.scheduler", reason = reason.as_str(), "repaint_worker_exit");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counting_worker(
        worker: RepaintWorker,
        done: Signal,
        ctx: Context,
    ) -> (Arc<AtomicUsize>, JoinHandle<()>) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let handle = worker
            .spawn(done, ctx, move || {
                c.fetch_add(1, Ordering::SeqCst);
                true
            })
            .unwrap();
        (count, handle)
    }

    #[test]
    fn burst_of_requests_releases_gate_once() {
        let (sched, worker) = RepaintScheduler::new(Duration::from_millis(10));
        assert!(sched.request());
        for _ in 0..99 {
            assert!(!sched.request());
        }
        assert!(sched.is_pending());

        let done = Signal::new();
        let (count, handle) = counting_worker(worker, done.clone(), Context::background());
        thread::sleep(Duration::from_millis(60));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!sched.is_pending());

        done.fire();
        handle.join().unwrap();
    }

    #[test]
    fn request_after_consumption_wakes_again() {
        let (sched, worker) = RepaintScheduler::new(Duration::from_millis(5));
        let done = Signal::new();
        let (count, handle) = counting_worker(worker, done.clone(), Context::background());
        sched.request();
        thread::sleep(Duration::from_millis(40));
        sched.request();
        thread::sleep(Duration::from_millis(40));
        assert_eq!(count.load(Ordering::SeqCst), 2);
        done.fire();
        handle.join().unwrap();
    }

    #[test]
    fn cancellation_fires_done_and_exits() {
        let (_sched, worker) = RepaintScheduler::new(MIN_UPDATE_INTERVAL);
        let done = Signal::new();
        let ctx = Context::background();
        let (_count, handle) = counting_worker(worker, done.clone(), ctx.clone());
        ctx.cancel();
        handle.join().unwrap();
        assert!(done.is_fired());
    }

    #[test]
    fn dropping_request_side_stops_worker() {
        let (sched, worker) = RepaintScheduler::new(MIN_UPDATE_INTERVAL);
        let done = Signal::new();
        let (count, handle) = counting_worker(worker, done.clone(), Context::background());
        drop(sched);
        handle.join().unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert!(!done.is_fired());
    }

    #[test]
    fn paint_reporting_owner_gone_stops_worker() {
        let (sched, worker) = RepaintScheduler::new(MIN_UPDATE_INTERVAL);
        let handle = worker
            .spawn(Signal::new(), Context::background(), || false)
            .unwrap();
        sched.request();
        handle.join().unwrap();
    }
}
