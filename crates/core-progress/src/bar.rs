//! Current/total progress bar.
//!
//! Two policies for values at or past the total:
//! * clamped (default): `current` never exceeds `total`;
//! * auto-extend: a `set_current` that reaches or passes `total` moves the
//!   total to `current + step` exactly once for that call, so the bar never
//!   shows a completed state until `finish`.

use crate::indicator::Visualizer;

pub const DEFAULT_WIDTH: usize = 10;

#[derive(Debug, Clone)]
pub struct Bar {
    current: u64,
    total: u64,
    width: usize,
    step: u64,
    auto_extend: bool,
    changed: bool,
}

impl Bar {
    /// A total of `0` is treated as `1`.
    pub fn new(total: u64) -> Self {
        Self {
            current: 0,
            total: total.max(1),
            width: DEFAULT_WIDTH,
            step: 1,
            auto_extend: false,
            changed: true,
        }
    }

    pub fn with_width(mut self, width: usize) -> Self {
        self.width = width.max(1);
        self
    }

    /// Extend the total by `step` instead of clamping (see module docs).
    pub fn auto_extend(mut self, step: u64) -> Self {
        self.auto_extend = true;
        self.step = step.max(1);
        self
    }

    pub fn current(&self) -> u64 {
        self.current
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn set_total(&mut self, total: u64) {
        self.total = total.max(1);
        self.current = self.current.min(self.total);
        self.changed = true;
    }

    pub fn set_current(&mut self, current: u64) {
        if current >= self.total {
            if self.auto_extend {
                self.total = current.saturating_add(self.step);
            }
            self.current = current.min(self.total);
        } else {
            self.current = current;
        }
        self.changed = true;
    }

    pub fn incr(&mut self, n: u64) {
        self.set_current(self.current.saturating_add(n));
    }

    /// Move to the total without extending it.
    pub fn finish(&mut self) {
        self.current = self.total;
        self.changed = true;
    }

    pub fn is_complete(&self) -> bool {
        self.current >= self.total
    }

    pub fn percent(&self) -> f64 {
        self.current as f64 * 100.0 / self.total as f64
    }

    fn filled(&self) -> usize {
        let cells = self.current as u128 * self.width as u128 / self.total as u128;
        usize::try_from(cells).unwrap_or(self.width).min(self.width)
    }
}

impl Visualizer for Bar {
    /// Reports (and consumes) changes made since the last update.
    fn update(&mut self) -> bool {
        std::mem::take(&mut self.changed)
    }

    fn visualize(&self) -> String {
        let filled = self.filled();
        let mut line = String::with_capacity(self.width + 24);
        line.push('[');
        line.extend(std::iter::repeat_n('=', filled));
        if filled < self.width {
            line.push('>');
            line.extend(std::iter::repeat_n('-', self.width - filled - 1));
        }
        line.push(']');
        line.push_str(&format!(" {}/{}", self.current, self.total));
        line
    }
}
