//! Terminal line clearing strategies and output detection.
//!
//! A region manager erases the lines it painted last time before writing the
//! new content. How those lines are erased depends on the platform:
//! * `AnsiClear`: one "cursor up + erase line" pair per line, appended to the
//!   frame buffer so the whole paint reaches the writer in a single write.
//! * `ConsoleClear` (Windows only): walks the console screen buffer through the
//!   console API. Only valid when the output is a real console; redirected
//!   output falls back to `AnsiClear`.

use crossterm::{
    Command,
    cursor::MoveUp,
    terminal::{Clear, ClearType},
};
use std::io;
use std::sync::LazyLock;

pub mod capabilities;
pub use capabilities::TerminalInfo;

/// Erase the last `lines` printed lines, leaving the cursor at column 0 of the
/// topmost erased line.
pub trait ClearLines: Send + Sync {
    /// Either append the erase sequence to `frame` or perform it directly.
    /// Implementations that act directly must not leave output buffered.
    fn erase(&self, frame: &mut Vec<u8>, lines: usize) -> io::Result<()>;

    /// Stable identifier for logging.
    fn name(&self) -> &'static str;
}

static ERASE_ONE: LazyLock<String> = LazyLock::new(|| {
    let mut seq = String::new();
    // Writing into a String cannot fail.
    let _ = MoveUp(1).write_ansi(&mut seq);
    let _ = Clear(ClearType::CurrentLine).write_ansi(&mut seq);
    seq
});

/// Byte sequence erasing a single line above the cursor (`ESC[1A ESC[2K`).
pub fn erase_line_sequence() -> &'static str {
    ERASE_ONE.as_str()
}

#[derive(Debug, Default, Clone, Copy)]
pub struct AnsiClear;

impl ClearLines for AnsiClear {
    fn erase(&self, frame: &mut Vec<u8>, lines: usize) -> io::Result<()> {
        let seq = erase_line_sequence().as_bytes();
        frame.reserve(seq.len() * lines);
        for _ in 0..lines {
            frame.extend_from_slice(seq);
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "ansi"
    }
}

#[cfg(windows)]
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleClear;

#[cfg(windows)]
impl ClearLines for ConsoleClear {
    fn erase(&self, _frame: &mut Vec<u8>, lines: usize) -> io::Result<()> {
        // The frame is still empty here: erasing always starts a paint pass.
        for _ in 0..lines {
            MoveUp(1).execute_winapi()?;
            Clear(ClearType::CurrentLine).execute_winapi()?;
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "console"
    }
}

/// Pick the clear strategy for an output stream. `is_console` must only be
/// true when the output is the process console itself.
#[cfg(windows)]
pub fn select_clear(is_console: bool) -> Box<dyn ClearLines> {
    if is_console {
        Box::new(ConsoleClear)
    } else {
        Box::new(AnsiClear)
    }
}

/// Pick the clear strategy for an output stream. Outside Windows every
/// terminal is driven through ANSI sequences.
#[cfg(not(windows))]
pub fn select_clear(_is_console: bool) -> Box<dyn ClearLines> {
    Box::new(AnsiClear)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn erase_sequence_is_cursor_up_and_erase_line() {
        assert_eq!(erase_line_sequence(), "\x1b[1A\x1b[2K");
    }

    #[test]
    fn ansi_clear_repeats_per_line() {
        let mut frame = Vec::new();
        AnsiClear.erase(&mut frame, 3).unwrap();
        assert_eq!(frame, "\x1b[1A\x1b[2K".repeat(3).into_bytes());
    }

    #[test]
    fn ansi_clear_zero_lines_is_empty() {
        let mut frame = b"keep".to_vec();
        AnsiClear.erase(&mut frame, 0).unwrap();
        assert_eq!(frame, b"keep");
    }

    #[test]
    fn redirected_output_uses_ansi() {
        assert_eq!(select_clear(false).name(), "ansi");
    }
}
