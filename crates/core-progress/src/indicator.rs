//! Single-line indicators backed by one block.
//!
//! An indicator pairs a `Visualizer` (what to draw) with a view-1 block (where
//! to draw it). Each redraw replaces the block content, so the block always
//! shows exactly the current rendering.

use crate::ticker::Ticker;
use core_blocks::{Block, Blocks, BlocksError, Result};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// The two extension points of an indicator.
pub trait Visualizer: Send {
    /// Advance internal state; true when the rendering changed.
    fn update(&mut self) -> bool;
    /// Current rendering, one line without the trailing newline.
    fn visualize(&self) -> String;
}

pub struct Indicator<V> {
    block: Block,
    visualizer: Mutex<V>,
}

impl<V: Visualizer> Indicator<V> {
    /// Create the indicator on a new block at the tail of `blocks`.
    pub fn new(blocks: &Blocks, visualizer: V) -> Result<Self> {
        let block = blocks.new_block(1).ok_or(BlocksError::Closed)?;
        Self::with_block(block, visualizer)
    }

    /// Draw into an existing block (registered or not).
    pub fn with_block(block: Block, visualizer: V) -> Result<Self> {
        let indicator = Self {
            block,
            visualizer: Mutex::new(visualizer),
        };
        indicator.redraw()?;
        Ok(indicator)
    }

    fn visualizer(&self) -> MutexGuard<'_, V> {
        self.visualizer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn block(&self) -> &Block {
        &self.block
    }

    /// Replace the block content with the current rendering.
    pub fn redraw(&self) -> Result<()> {
        let text = self.visualizer().visualize();
        self.draw(&text)
    }

    fn draw(&self, text: &str) -> Result<()> {
        self.block.reset();
        self.block.append(text.as_bytes())?;
        Ok(())
    }

    /// Mutate the visualizer and redraw.
    pub fn update_with<R>(&self, f: impl FnOnce(&mut V) -> R) -> Result<R> {
        let (out, text) = {
            let mut v = self.visualizer();
            let out = f(&mut v);
            (out, v.visualize())
        };
        self.draw(&text)?;
        Ok(out)
    }

    /// Render once more and close the block, optionally replacing the
    /// content with `final_text`.
    pub fn close(&self, final_text: Option<&str>) -> Result<()> {
        if let Some(text) = final_text {
            self.block.set_final(text);
        } else if !self.block.is_closed() {
            self.redraw()?;
        }
        self.block.close()
    }
}

impl<V: Visualizer> Ticker for Indicator<V> {
    fn tick(&self) -> bool {
        if self.block.is_closed() {
            return false;
        }
        let text = {
            let mut v = self.visualizer();
            if !v.update() {
                return false;
            }
            v.visualize()
        };
        // Closed concurrently: nothing left to show.
        self.draw(&text).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Write};
    use std::sync::{Arc, Mutex};

    struct Steps {
        n: u32,
        limit: u32,
    }

    impl Visualizer for Steps {
        fn update(&mut self) -> bool {
            if self.n == self.limit {
                return false;
            }
            self.n += 1;
            true
        }

        fn visualize(&self) -> String {
            format!("step {}/{}", self.n, self.limit)
        }
    }

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Capture {
        fn take(&self) -> String {
            String::from_utf8(std::mem::take(&mut *self.0.lock().unwrap())).unwrap()
        }
    }

    #[test]
    fn tick_redraws_only_on_change() {
        let out = Capture::default();
        let blocks = Blocks::new(out.clone()).unwrap();
        let ind = Indicator::new(&blocks, Steps { n: 0, limit: 2 }).unwrap();
        blocks.flush().unwrap();
        assert_eq!(out.take(), "step 0/2\n");

        assert!(ind.tick());
        assert!(ind.tick());
        assert!(!ind.tick());
        blocks.flush().unwrap();
        assert!(out.take().ends_with("step 2/2\n"));
    }

    #[test]
    fn update_with_redraws_immediately() {
        let out = Capture::default();
        let blocks = Blocks::new(out.clone()).unwrap();
        let ind = Indicator::new(&blocks, Steps { n: 0, limit: 5 }).unwrap();
        let n = ind.update_with(|s| {
            s.n = 4;
            s.n
        });
        assert_eq!(n.unwrap(), 4);
        blocks.flush().unwrap();
        assert_eq!(out.take(), "step 4/5\n");
    }

    #[test]
    fn closed_indicator_stops_ticking() {
        let out = Capture::default();
        let blocks = Blocks::new(out.clone()).unwrap();
        let ind = Indicator::new(&blocks, Steps { n: 0, limit: 10 }).unwrap();
        ind.close(Some("done")).unwrap();
        assert!(ind.block().is_closed());
        // A scheduled pass may have painted the live line first.
        assert!(out.take().ends_with("done\n"));
        assert!(blocks.is_empty());
        assert!(!ind.tick());
        assert!(matches!(ind.close(None), Err(BlocksError::Closed)));
    }

    #[test]
    fn indicator_on_closed_manager_fails() {
        let blocks = Blocks::new(io::sink()).unwrap();
        blocks.close().unwrap();
        assert!(matches!(
            Indicator::new(&blocks, Steps { n: 0, limit: 1 }),
            Err(BlocksError::Closed)
        ));
    }
}
