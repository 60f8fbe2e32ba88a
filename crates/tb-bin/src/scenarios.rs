//! Demo scenarios driving the block engine.
//!
//! Producers here are plain threads (the engine never needs an async
//! producer); the async side only hosts the tick driver and joins the
//! blocking work.

use anyhow::{Context as _, Result};
use clap::ValueEnum;
use core_blocks::{Block, Blocks};
use core_progress::spinner::{BLOCKS, DOTS};
use core_progress::{Bar, Indicator, Spinner, TickDriver};
use crossterm::style::Stylize;
use std::io::Write;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Scenario {
    /// One line redrawn per update, replaced by a final text.
    Simple,
    /// Windowed scrolling log with a title line.
    Scroll,
    /// Blocks closed out of order; hidden ones vanish, others stay in place.
    Hide,
    /// Concurrent producers on threads.
    Multi,
    /// Spinners and a bar advanced by the tick driver.
    Spinners,
}

impl Scenario {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scenario::Simple => "simple",
            Scenario::Scroll => "scroll",
            Scenario::Hide => "hide",
            Scenario::Multi => "multi",
            Scenario::Spinners => "spinners",
        }
    }
}

/// Timing knobs shared by all scenarios.
#[derive(Debug, Clone, Copy)]
pub struct Pace {
    /// Pause between two producer updates.
    pub step: Duration,
    /// Tick driver interval.
    pub tick: Duration,
}

pub async fn run(scenario: Scenario, blocks: Blocks, pace: Pace) -> Result<()> {
    info!(target: "runtime", scenario = scenario.as_str(), "scenario_start");
    match scenario {
        Scenario::Spinners => spinners(&blocks, pace).await?,
        other => {
            let b = blocks.clone();
            tokio::task::spawn_blocking(move || match other {
                Scenario::Simple => simple(&b, pace),
                Scenario::Scroll => scroll(&b, pace),
                Scenario::Hide => hide(&b, pace),
                _ => multi(&b, pace),
            })
            .await
            .context("scenario task panicked")??;
        }
    }
    blocks.close()?;
    let done = blocks.clone();
    tokio::task::spawn_blocking(move || done.wait())
        .await
        .context("wait task panicked")?;
    info!(
        target: "runtime",
        scenario = scenario.as_str(),
        metrics = ?blocks.metrics(),
        "scenario_done"
    );
    Ok(())
}

fn simple(blocks: &Blocks, pace: Pace) -> Result<()> {
    let block = Block::new(1);
    block.set_final(format!("{} download complete", "✔".green()));
    blocks.add_block(&block)?;
    for pct in (0..=100).step_by(10) {
        block.reset();
        write!(&block, "downloading... {pct:>3}%")?;
        block.flush()?;
        thread::sleep(pace.step);
    }
    block.close()?;
    Ok(())
}

fn scroll(blocks: &Blocks, pace: Pace) -> Result<()> {
    let log = Block::new(3);
    log.set_title_line("Build log:")
        .set_gap("  ")
        .set_content_gap("| ")
        .set_auto(true);
    blocks.add_block(&log)?;
    let mut warnings = 0;
    for unit in 1..=12 {
        let status = if unit % 4 == 0 {
            warnings += 1;
            "warn".yellow()
        } else {
            "ok".green()
        };
        writeln!(&log, "compiling unit {unit:02} [{status}]")?;
        thread::sleep(pace.step);
    }
    log.set_final(format!("Build finished: 12 units, {warnings} warnings"));
    log.close()?;
    Ok(())
}

fn hide(blocks: &Blocks, pace: Pace) -> Result<()> {
    let tasks: Vec<Block> = ["alpha", "beta", "gamma"]
        .iter()
        .enumerate()
        .map(|(i, name)| -> Result<Block> {
            let block = Block::new(1);
            block.set_auto(true).hide_on_close(i % 2 == 1);
            block.set_final(format!("task {name} done"));
            (&block).write_all(format!("task {name} running").as_bytes())?;
            blocks.add_block(&block)?;
            Ok(block)
        })
        .collect::<Result<_>>()?;

    // Last first: nothing leaves the region until the head closes.
    for block in tasks.iter().rev() {
        thread::sleep(pace.step * 5);
        block.close()?;
        debug!(target: "runtime", remaining = blocks.len(), "hide_step");
    }
    Ok(())
}

fn multi(blocks: &Blocks, pace: Pace) -> Result<()> {
    let handles: Vec<_> = (1..=4)
        .map(|worker| -> Result<thread::JoinHandle<Result<()>>> {
            let block = blocks
                .new_block(2)
                .context("region closed before producers started")?;
            block
                .set_title_line(format!("worker {worker}"))
                .set_gap("  ")
                .set_auto(true);
            block.set_final(format!("worker {worker} finished"));
            let step = pace.step;
            Ok(thread::spawn(move || -> Result<()> {
                for item in 1..=(3 * worker) {
                    writeln!(&block, "item {item}")?;
                    thread::sleep(step);
                }
                block.close()?;
                Ok(())
            }))
        })
        .collect::<Result<_>>()?;

    for handle in handles {
        handle
            .join()
            .map_err(|_| anyhow::anyhow!("producer thread panicked"))??;
    }
    Ok(())
}

async fn spinners(blocks: &Blocks, pace: Pace) -> Result<()> {
    let fetch = Arc::new(Indicator::new(
        blocks,
        Spinner::new(DOTS).with_message("fetching index"),
    )?);
    let resolve = Arc::new(Indicator::new(
        blocks,
        Spinner::new(BLOCKS).with_message("resolving"),
    )?);
    let bar = Arc::new(Indicator::new(blocks, Bar::new(20).with_width(30).auto_extend(1))?);

    let mut driver = TickDriver::new(blocks.clone(), pace.tick);
    driver.register(fetch.clone());
    driver.register(resolve.clone());
    driver.register(bar.clone());
    let ticking = driver.spawn();
    // Done fires once every indicator block has left the region.
    blocks.close_on_done();

    let producer = {
        let (fetch, resolve, bar) = (fetch.clone(), resolve.clone(), bar.clone());
        let step = pace.step;
        tokio::task::spawn_blocking(move || -> Result<()> {
            for n in 1..=24 {
                bar.update_with(|b| b.set_current(n))?;
                if n == 8 {
                    fetch.close(Some("index fetched"))?;
                }
                thread::sleep(step);
            }
            resolve.close(Some("dependencies resolved"))?;
            bar.update_with(Bar::finish)?;
            bar.close(None)?;
            Ok(())
        })
    };
    producer.await.context("producer task panicked")??;

    let stats = ticking.await.context("tick driver panicked")?;
    debug!(target: "runtime", ticks = stats.ticks, flushes = stats.flushes, "tick_driver_stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::Mutex;

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

    fn fast() -> Pace {
        Pace {
            step: Duration::from_millis(1),
            tick: Duration::from_millis(5),
        }
    }

    async fn run_captured(scenario: Scenario) -> (Blocks, String) {
        let out = Capture::default();
        let blocks = Blocks::builder()
            .output(out.clone())
            .interval(Duration::from_millis(5))
            .build()
            .unwrap();
        run(scenario, blocks.clone(), fast()).await.unwrap();
        let text = String::from_utf8_lossy(&out.0.lock().unwrap()).into_owned();
        (blocks, text)
    }

    #[tokio::test]
    async fn simple_ends_with_final_text() {
        let (blocks, out) = run_captured(Scenario::Simple).await;
        assert!(out.ends_with("download complete\n"));
        assert!(blocks.is_done());
        assert!(blocks.is_empty());
    }

    #[tokio::test]
    async fn scroll_prints_final_summary() {
        let (_blocks, out) = run_captured(Scenario::Scroll).await;
        assert!(out.ends_with("Build finished: 12 units, 3 warnings\n"));
    }

    #[tokio::test]
    async fn hide_keeps_only_visible_finals() {
        let (blocks, out) = run_captured(Scenario::Hide).await;
        assert!(out.contains("task alpha done"));
        assert!(out.contains("task gamma done"));
        assert!(!out.contains("task beta done"));
        assert!(blocks.metrics().discarded_blocks >= 3);
    }

    #[tokio::test]
    async fn multi_finishes_every_worker() {
        let (blocks, out) = run_captured(Scenario::Multi).await;
        for worker in 1..=4 {
            assert!(out.contains(&format!("worker {worker} finished")));
        }
        assert!(blocks.is_done());
    }

    #[tokio::test]
    async fn spinners_close_cleanly() {
        let (blocks, out) = run_captured(Scenario::Spinners).await;
        assert!(out.contains("index fetched"));
        assert!(out.contains("dependencies resolved"));
        assert!(blocks.is_done());
    }
}
