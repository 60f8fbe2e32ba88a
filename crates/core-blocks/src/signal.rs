//! One-shot completion signals and cancellation contexts.
//!
//! A `Signal` is the broadcast "closed channel" idiom: nothing is ever sent on
//! the underlying channel; firing drops the only sender so every receiver
//! (current and future) observes disconnection. That makes it usable inside
//! `crossbeam_channel::select!` next to other wake-up sources, which is how
//! the repaint worker and `wait_with` multiplex completion, cancellation and
//! deadlines.

use crate::error::{BlocksError, Result};
use crossbeam_channel::{Receiver, Sender, at, bounded, never, select};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

#[derive(Clone)]
pub struct Signal {
    tx: Arc<Mutex<Option<Sender<()>>>>,
    rx: Receiver<()>,
}

impl Default for Signal {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("fired", &self.is_fired())
            .finish()
    }
}

impl Signal {
    pub fn new() -> Self {
        let (tx, rx) = bounded(0);
        Self {
            tx: Arc::new(Mutex::new(Some(tx))),
            rx,
        }
    }

    /// Fire the signal. Returns true only for the call that actually fired it.
    pub fn fire(&self) -> bool {
        self.tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some()
    }

    pub fn is_fired(&self) -> bool {
        self.tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// Receiver that becomes ready (disconnected) once the signal fired.
    pub fn receiver(&self) -> Receiver<()> {
        self.rx.clone()
    }

    /// Block until the signal fired.
    pub fn wait(&self) {
        // Nothing is ever sent; recv only returns on disconnect.
        let _ = self.rx.recv();
    }

    /// Block until the signal fired or `timeout` elapsed. Returns whether it fired.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        if self.is_fired() {
            return true;
        }
        let _ = self.rx.recv_timeout(timeout);
        self.is_fired()
    }
}

/// Cancellation token with an optional deadline, passed to `wait_with` and to
/// a region manager to bound its lifetime.
#[derive(Clone, Debug)]
pub struct Context {
    cancel: Signal,
    deadline: Option<Instant>,
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}

impl Context {
    /// Context that is never done unless explicitly canceled.
    pub fn background() -> Self {
        Self {
            cancel: Signal::new(),
            deadline: None,
        }
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            cancel: Signal::new(),
            deadline: Some(deadline),
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => Self::with_deadline(deadline),
            None => Self::background(),
        }
    }

    /// Cancel the context; all clones observe it.
    pub fn cancel(&self) {
        self.cancel.fire();
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Why the context is done, if it is. Cancellation wins over the deadline.
    pub fn err(&self) -> Option<BlocksError> {
        if self.cancel.is_fired() {
            return Some(BlocksError::Canceled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(BlocksError::DeadlineExceeded),
            _ => None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    pub(crate) fn cancel_receiver(&self) -> Receiver<()> {
        self.cancel.receiver()
    }

    pub(crate) fn deadline_receiver(&self) -> Receiver<Instant> {
        match self.deadline {
            Some(deadline) => at(deadline),
            None => never(),
        }
    }

    /// Block until `done` fires or this context is done.
    pub fn wait_for(&self, done: &Signal) -> Result<()> {
        if done.is_fired() {
            return Ok(());
        }
        if let Some(err) = self.err() {
            return Err(err);
        }
        let done_rx = done.receiver();
        let cancel_rx = self.cancel_receiver();
        let timer = self.deadline_receiver();
        select! {
            recv(done_rx) -> _ => Ok(()),
            recv(cancel_rx) -> _ => Err(BlocksError::Canceled),
            recv(timer) -> _ => Err(BlocksError::DeadlineExceeded),
        }
    }
}
