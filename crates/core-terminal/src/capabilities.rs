//! Output terminal detection.
//!
//! Runs once when a region manager is constructed for process standard
//! output. Two facts matter to the block engine:
//! * whether the output is a terminal at all (selects the clear strategy and
//!   enables the console path on Windows),
//! * the column count, used for implicit wrap accounting. A width of `0`
//!   disables overflow handling entirely (plain pipe fallback).
//!
//! Resizes are not tracked; the width is sampled at detection time only.

use anyhow::{Context, Result};
use crossterm::tty::IsTty;
use std::io::stdout;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[non_exhaustive]
pub struct TerminalInfo {
    /// Column count, `0` when unknown or not a terminal.
    pub width: u16,
    /// True when the output stream is attached to a terminal/console.
    pub is_tty: bool,
}

impl TerminalInfo {
    /// Plain (non terminal) output: no wrapping, ANSI clearing.
    pub const fn plain() -> Self {
        Self {
            width: 0,
            is_tty: false,
        }
    }

    /// Terminal of a known width, used by tests and explicit overrides.
    pub const fn with_width(width: u16) -> Self {
        Self {
            width,
            is_tty: true,
        }
    }

    /// Probe process standard output.
    pub fn detect_stdout() -> Self {
        if !stdout().is_tty() {
            debug!(target: "terminal", "stdout_not_a_tty");
            return Self::plain();
        }
        let width = match query_width() {
            Ok(w) => w,
            Err(err) => {
                debug!(target: "terminal", ?err, "terminal_width_unknown");
                0
            }
        };
        debug!(target: "terminal", width, "terminal_detected");
        Self {
            width,
            is_tty: true,
        }
    }

    /// True when implicit (width driven) line wraps have to be accounted for.
    pub fn overflow_handled(&self) -> bool {
        self.width > 0
    }
}

fn query_width() -> Result<u16> {
    let (cols, _rows) = crossterm::terminal::size().context("query terminal size")?;
    Ok(cols)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_disables_overflow() {
        let info = TerminalInfo::plain();
        assert!(!info.is_tty);
        assert!(!info.overflow_handled());
    }

    #[test]
    fn explicit_width_enables_overflow() {
        let info = TerminalInfo::with_width(80);
        assert_eq!(info.width, 80);
        assert!(info.overflow_handled());
    }
}
