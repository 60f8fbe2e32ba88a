#![allow(dead_code)] // Shared across integration tests; each test binary uses a subset of helpers.

use core_blocks::{Blocks, RepaintMode};
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Clonable in-memory output capturing everything a manager paints.
#[derive(Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }

    pub fn take(&self) -> String {
        let bytes = std::mem::take(&mut *self.0.lock().unwrap());
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Manager writing into a capture buffer with a short paint interval.
pub fn capture_blocks(mode: RepaintMode) -> (Blocks, SharedBuffer) {
    let out = SharedBuffer::default();
    let blocks = Blocks::builder()
        .output(out.clone())
        .interval(Duration::from_millis(10))
        .mode(mode)
        .build()
        .unwrap();
    (blocks, out)
}

/// Erase sequence for `n` lines.
pub fn erased(n: usize) -> String {
    core_terminal::erase_line_sequence().repeat(n)
}
