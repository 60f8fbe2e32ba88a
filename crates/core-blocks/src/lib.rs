//! Terminal block rendering engine.
//!
//! A [`Blocks`] region manager owns an ordered sequence of [`Block`]s painted
//! at the bottom of an output stream. Producers write to blocks from any
//! thread; a single repaint worker per manager coalesces their change
//! notifications and rewrites only the part of the region that changed.
//! Closed blocks leave the region in FIFO order, printing their final text.

pub mod block;
pub mod blocks;
pub mod error;
pub mod escape;
mod lines;
pub mod metrics;
pub mod scheduler;
pub mod signal;

pub use block::{Block, DEFAULT_VIEW};
pub use blocks::{Blocks, BlocksBuilder, PaintOutcome, RepaintMode};
pub use core_terminal::TerminalInfo;
pub use error::{BlocksError, Result};
pub use metrics::{PaintMetrics, PaintMetricsSnapshot};
pub use scheduler::MIN_UPDATE_INTERVAL;
pub use signal::{Context, Signal};
