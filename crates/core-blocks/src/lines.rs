//! Terminal line accounting for block content.
//!
//! `LineLayout::scan` walks a block's bytes once and reports how many
//! terminal lines they occupy:
//! * explicit lines end at `\n`;
//! * implicit lines are wraps caused by the terminal width (only when a width
//!   is known);
//! * color escape sequences (see `escape`) occupy no columns and never end a
//!   line.
//!
//! For windowed display the scan also keeps a ring of at most `view` slots
//! holding the start offset of each of the most recent explicit lines together
//! with the number of implicit wraps that happened before that line started.
//! The ring grows with the content, so a huge `view` costs nothing up front.
//!
//! Invariants:
//! * `lines >= 1` whenever the data is non-empty (an unterminated tail counts
//!   as a line; the caller appends the missing `\n` when painting).
//! * For every slot, `slot.implicit <= implicit`.

use crate::escape::color_len;
use unicode_width::UnicodeWidthChar;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct LineStart {
    /// Byte offset where the line starts.
    pub start: usize,
    /// Implicit wraps counted before the line started.
    pub implicit: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LineLayout {
    /// Explicit lines, including a trailing unterminated one.
    pub lines: usize,
    /// Implicit wraps over the whole data.
    pub implicit: usize,
    /// False when the data does not end with a line break.
    pub ends_on_boundary: bool,
    view: usize,
    slots: Vec<LineStart>,
}

struct Cursor {
    width: usize,
    col: usize,
    implicit: usize,
    boundary: bool,
}

impl Cursor {
    fn advance(&mut self, cells: usize) {
        if self.width > 0 && cells > 0 && self.col > 0 && self.col + cells > self.width {
            self.implicit += 1;
            self.col = 0;
        }
        self.col += cells;
        self.boundary = false;
    }
}

fn record(slots: &mut Vec<LineStart>, view: usize, index: usize, line: LineStart) {
    let i = index % view;
    if i == slots.len() {
        slots.push(line);
    } else {
        slots[i] = line;
    }
}

impl LineLayout {
    /// Scan `data` for a window of `view` lines on a terminal `width` columns
    /// wide (`0` disables wrap accounting).
    pub fn scan(data: &[u8], view: usize, width: usize) -> Self {
        let view = view.max(1);
        let mut slots = Vec::new();
        let mut cursor = Cursor {
            width,
            col: 0,
            implicit: 0,
            boundary: false,
        };
        let mut lines = 0usize;
        let mut line = LineStart::default();
        let mut skip = 0usize;
        let mut base = 0usize;

        for chunk in data.utf8_chunks() {
            let valid = chunk.valid();
            for (i, ch) in valid.char_indices() {
                let offset = base + i;
                if skip > 0 {
                    skip = skip.saturating_sub(ch.len_utf8());
                    continue;
                }
                if ch == '\x1b' {
                    let len = color_len(&data[offset..]);
                    if len > 0 {
                        skip = len - 1;
                        continue;
                    }
                }
                if ch == '\n' {
                    record(&mut slots, view, lines, line);
                    lines += 1;
                    line = LineStart {
                        start: offset + 1,
                        implicit: cursor.implicit,
                    };
                    cursor.col = 0;
                    cursor.boundary = true;
                    continue;
                }
                cursor.advance(ch.width().unwrap_or(0));
            }
            base += valid.len();
            for _ in chunk.invalid() {
                cursor.advance(1);
                base += 1;
            }
        }

        let ends_on_boundary = cursor.boundary;
        if !ends_on_boundary {
            record(&mut slots, view, lines, line);
            lines += 1;
        }

        Self {
            lines,
            implicit: cursor.implicit,
            ends_on_boundary,
            view,
            slots,
        }
    }

    /// Slot of the oldest line that is still visible in a window of the
    /// scanned size.
    pub fn window_start(&self) -> LineStart {
        if self.lines <= self.view {
            return self.slots.first().copied().unwrap_or_default();
        }
        self.slots[self.lines % self.view]
    }

    /// Terminal lines taken by the last `view` lines (explicit + their wraps).
    pub fn window_lines(&self) -> usize {
        self.lines.min(self.view) + self.implicit - self.window_start().implicit
    }

    /// Terminal lines taken by the complete data.
    pub fn total_lines(&self) -> usize {
        self.lines + self.implicit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_explicit_lines() {
        let l = LineLayout::scan(b"a\nb\nc\n", 10, 0);
        assert_eq!(l.lines, 3);
        assert_eq!(l.implicit, 0);
        assert!(l.ends_on_boundary);
    }

    #[test]
    fn unterminated_tail_counts_as_line() {
        let l = LineLayout::scan(b"a\nb", 10, 0);
        assert_eq!(l.lines, 2);
        assert!(!l.ends_on_boundary);
    }

    #[test]
    fn wraps_at_width() {
        // 10 columns on a 4 column terminal: rows of 4, 4, 2.
        let l = LineLayout::scan(b"0123456789\n", 10, 4);
        assert_eq!(l.lines, 1);
        assert_eq!(l.implicit, 2);
        assert_eq!(l.total_lines(), 3);
    }

    #[test]
    fn exact_width_line_does_not_wrap() {
        let l = LineLayout::scan(b"abcd\n", 10, 4);
        assert_eq!(l.implicit, 0);
        assert_eq!(l.total_lines(), 1);
    }

    #[test]
    fn escapes_take_no_columns() {
        let plain = LineLayout::scan(b"abcd\n", 10, 4);
        let colored = LineLayout::scan(b"\x1b[31mab\x1b[0mcd\x1b[1;33m\n", 10, 4);
        assert_eq!(plain.total_lines(), colored.total_lines());
        assert_eq!(colored.implicit, 0);
    }

    #[test]
    fn trailing_escape_keeps_boundary() {
        let l = LineLayout::scan(b"done\n\x1b[0m", 10, 0);
        assert!(l.ends_on_boundary);
        assert_eq!(l.lines, 1);
    }

    #[test]
    fn wide_chars_wrap_early() {
        // Three double-width chars on a 5 column terminal: 2 fit, third wraps.
        let l = LineLayout::scan("日本語\n".as_bytes(), 10, 5);
        assert_eq!(l.implicit, 1);
    }

    #[test]
    fn invalid_utf8_counts_one_column_each() {
        let l = LineLayout::scan(b"\xff\xfe\xfd\n", 10, 2);
        assert_eq!(l.implicit, 1);
    }

    #[test]
    fn window_start_points_at_oldest_visible_line() {
        let data = b"a\nb\nc\nd\ne\n";
        let l = LineLayout::scan(data, 3, 0);
        let start = l.window_start().start;
        assert_eq!(&data[start..], b"c\nd\ne\n");
        assert_eq!(l.window_lines(), 3);
    }

    #[test]
    fn window_includes_wraps_inside_oldest_visible_line() {
        // Width 2: "xxxx" wraps once. Window of 2 shows "xxxx" and "y".
        let data = b"a\nxxxx\ny\n";
        let l = LineLayout::scan(data, 2, 2);
        assert_eq!(&data[l.window_start().start..], b"xxxx\ny\n");
        assert_eq!(l.window_lines(), 3);
    }

    #[test]
    fn huge_view_keeps_ring_sized_to_content() {
        let l = LineLayout::scan(b"a
b
", usize::MAX, 0);
        assert_eq!(l.slots.len(), 2);
        assert_eq!(l.window_start().start, 0);
        assert_eq!(l.window_lines(), 2);
    }

    #[test]
    fn ring_stops_growing_at_view() {
        let data = b"a
b
c
d
";
        let l = LineLayout::scan(data, 2, 0);
        assert_eq!(l.slots.len(), 2);
        assert_eq!(&data[l.window_start().start..], b"c
d
");
    }
}
