mod common;

use common::{SharedBuffer, capture_blocks, erased};
use core_blocks::{Block, Blocks, RepaintMode};
use proptest::prelude::*;
use std::io::Write;
use std::thread;
use std::time::{Duration, Instant};

fn quiet_blocks(mode: RepaintMode) -> (Blocks, SharedBuffer) {
    // Long interval: only the first scheduled request would ever paint, and
    // these tests issue none.
    let out = SharedBuffer::default();
    let blocks = Blocks::builder()
        .output(out.clone())
        .interval(Duration::from_secs(60))
        .mode(mode)
        .build()
        .unwrap();
    (blocks, out)
}

#[test]
fn delta_and_full_agree_on_the_changed_suffix() {
    let (blocks, out) = quiet_blocks(RepaintMode::Delta);
    let head = Block::new(2);
    head.append(b"h1\nh2\n").unwrap();
    let mid = Block::new(1);
    mid.append(b"m\n").unwrap();
    let last = Block::new(3);
    last.append(b"x\n").unwrap();
    for b in [&head, &mid, &last] {
        blocks.add_block(b).unwrap();
    }
    blocks.flush().unwrap();
    out.take();

    last.append(b"y\n").unwrap();
    let delta = blocks.repaint(RepaintMode::Delta).unwrap().unwrap();
    let delta_out = out.take();
    assert_eq!(delta.erased, 1);
    assert_eq!(delta_out, format!("{}x\ny\n", erased(1)));

    last.append(b"z\n").unwrap();
    let full = blocks.repaint(RepaintMode::Full).unwrap().unwrap();
    let full_out = out.take();
    assert_eq!(full.erased, 5);
    assert_eq!(full_out, format!("{}h1\nh2\nm\nx\ny\nz\n", erased(5)));
    // The same region is emitted byte for byte by both passes.
    assert!(full_out.ends_with("x\ny\nz\n"));
    assert_eq!(blocks.painted_lines(), 6);
}

#[test]
fn delta_without_changes_skips_io() {
    let (blocks, out) = quiet_blocks(RepaintMode::Delta);
    let b = blocks.new_block(1).unwrap();
    b.append(b"idle\n").unwrap();
    blocks.flush().unwrap();
    out.take();
    assert!(blocks.repaint(RepaintMode::Delta).unwrap().is_none());
    assert_eq!(out.contents(), "");
}

#[test]
fn concurrent_producers_are_coalesced() {
    let (blocks, out) = capture_blocks(RepaintMode::Delta);
    let producers: Vec<_> = (0..8)
        .map(|i| {
            let block = blocks.new_block(1).unwrap();
            block.set_auto(true);
            thread::spawn(move || {
                for n in 0..200 {
                    block.reset();
                    write!(&block, "producer {i}: {n}").unwrap();
                }
                block
            })
        })
        .collect();
    let started = Instant::now();
    let finished: Vec<Block> = producers.into_iter().map(|h| h.join().unwrap()).collect();
    let elapsed = started.elapsed();

    blocks.flush().unwrap();
    let m = blocks.metrics();
    assert!(m.flush_requests >= 8 * 200);
    let bound = elapsed.as_millis() as u64 / blocks.interval().as_millis() as u64 + 4;
    assert!(
        m.delta_paints + m.skipped_paints <= bound,
        "scheduled paints {} exceed bound {bound}",
        m.delta_paints + m.skipped_paints
    );
    assert!(m.coalesced_requests > 0);

    let last_frame = out.contents();
    for (i, _) in finished.iter().enumerate() {
        assert!(last_frame.ends_with('\n'));
        assert!(last_frame.contains(&format!("producer {i}: 199")));
    }
}

fn lines_strategy() -> impl Strategy<Value = Vec<String>> {
    proptest::collection::vec("[a-z]{0,20}", 1..25)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn final_pass_prints_every_line(lines in lines_strategy(), view in 1usize..6) {
        let (blocks, out) = quiet_blocks(RepaintMode::Delta);
        let block = Block::new(view);
        for l in &lines {
            writeln!(&block, "{l}").unwrap();
        }
        blocks.add_block(&block).unwrap();
        blocks.flush().unwrap();
        prop_assert_eq!(blocks.painted_lines(), lines.len().min(view));
        out.take();

        block.close().unwrap();
        let expected: String = lines.iter().map(|l| format!("{l}\n")).collect();
        prop_assert_eq!(out.take(), format!("{}{expected}", erased(lines.len().min(view))));
    }

    #[test]
    fn wrap_accounting_is_escape_transparent(lines in lines_strategy(), width in 3u16..16) {
        let paint = |colored: bool| {
            let out = SharedBuffer::default();
            let blocks = Blocks::builder()
                .output(out)
                .term_width(width)
                .interval(Duration::from_secs(60))
                .build()
                .unwrap();
            let block = blocks.new_block(4).unwrap();
            for l in &lines {
                if colored {
                    let (a, b) = l.split_at(l.len() / 2);
                    writeln!(&block, "\x1b[1;31m{a}\x1b[0m{b}\x1b[m").unwrap();
                } else {
                    writeln!(&block, "{l}").unwrap();
                }
            }
            blocks.flush().unwrap();
            blocks.painted_lines()
        };
        prop_assert_eq!(paint(false), paint(true));
    }

    #[test]
    fn painted_lines_match_sum_of_blocks(counts in proptest::collection::vec(0usize..6, 1..6)) {
        let (blocks, _out) = quiet_blocks(RepaintMode::Delta);
        let mut all = Vec::new();
        for (i, n) in counts.iter().enumerate() {
            let b = blocks.new_block(3).unwrap();
            for k in 0..*n {
                writeln!(&b, "{i}:{k}").unwrap();
            }
            all.push(b);
        }
        blocks.flush().unwrap();
        let sum: usize = all.iter().map(Block::last_painted_lines).sum();
        prop_assert_eq!(blocks.painted_lines(), sum);
        let expected: usize = counts.iter().map(|n| (*n).min(3)).sum();
        prop_assert_eq!(sum, expected);
    }
}
