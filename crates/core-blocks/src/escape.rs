//! Color/format escape sequence detection.
//!
//! Only SGR sequences are recognized: `ESC [ <digits and ';'> m`. Anything else
//! (cursor movement, OSC, malformed prefixes) reports `0` and is treated as
//! printable text by the line accounting in `block`.

/// ASCII escape.
pub const ESC: u8 = 0x1b;

/// Byte length of the SGR sequence anchored at the start of `data`, or `0`.
pub fn color_len(data: &[u8]) -> usize {
    if data.len() < 3 || data[0] != ESC || data[1] != b'[' {
        return 0;
    }
    for (i, &c) in data[2..].iter().enumerate() {
        if c.is_ascii_digit() || c == b';' {
            continue;
        }
        return if c == b'm' { i + 3 } else { 0 };
    }
    // Unterminated run.
    0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bold_yellow_prefix() {
        // What a typical color library emits for bold + yellow foreground.
        let s = b"\x1b[33;1mtest\x1b[0m";
        assert_eq!(color_len(s), 7);
    }

    #[test]
    fn reset_sequence() {
        assert_eq!(color_len(b"\x1b[0m"), 4);
        assert_eq!(color_len(b"\x1b[m rest"), 3);
    }

    #[test]
    fn not_anchored_at_offset_zero() {
        assert_eq!(color_len(b"a\x1b[0m"), 0);
    }

    #[test]
    fn other_csi_commands_are_not_colors() {
        assert_eq!(color_len(b"\x1b[1A"), 0);
        assert_eq!(color_len(b"\x1b[2K"), 0);
    }

    #[test]
    fn unterminated_or_short() {
        assert_eq!(color_len(b"\x1b[31"), 0);
        assert_eq!(color_len(b"\x1b["), 0);
        assert_eq!(color_len(b""), 0);
    }
}
