//! Progress collaborators for the block engine.
//!
//! Indicators render one line into a block; animated ones are advanced by a
//! `TickDriver` they are registered with explicitly.

pub mod bar;
pub mod indicator;
pub mod spinner;
pub mod ticker;

pub use bar::Bar;
pub use indicator::{Indicator, Visualizer};
pub use spinner::Spinner;
pub use ticker::{TickDriver, TickStats, Ticker};
