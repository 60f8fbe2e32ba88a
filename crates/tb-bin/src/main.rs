//! `ttyblocks`: demo driver for the terminal block engine.

mod scenarios;

use anyhow::Result;
use clap::Parser;
use core_blocks::{Blocks, RepaintMode};
use core_config::RepaintModeConfig;
use scenarios::{Pace, Scenario};
use std::path::{Path, PathBuf};
use std::sync::Once;
use std::time::Duration;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;

const LOG_FILE_NAME: &str = "ttyblocks.log";

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "ttyblocks", version, about = "Live terminal block regions")]
struct Args {
    /// Scenario to run.
    #[arg(value_enum)]
    scenario: Scenario,
    /// Optional configuration file path (overrides discovery of `ttyblocks.toml`).
    #[arg(long = "config")]
    config: Option<PathBuf>,
    /// Directory receiving `ttyblocks.log`.
    #[arg(long = "log-dir", default_value = ".")]
    log_dir: PathBuf,
    /// Pause between producer updates, in milliseconds.
    #[arg(long = "pace-ms", default_value_t = 80)]
    pace_ms: u64,
}

/// Log to a file: the terminal belongs to the painted region.
fn configure_logging(log_dir: &Path) -> Result<Option<WorkerGuard>> {
    let log_path = log_dir.join(LOG_FILE_NAME);
    if log_path.exists() {
        let _ = std::fs::remove_file(&log_path);
    }

    let file_appender = tracing_appender::rolling::never(log_dir, LOG_FILE_NAME);
    let (nb_writer, guard) = tracing_appender::non_blocking(file_appender);
    match tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(nb_writer)
        .with_ansi(false)
        .try_init()
    {
        Ok(()) => Ok(Some(guard)),
        // Global subscriber already installed; dropping the guard shuts the writer down.
        Err(_err) => Ok(None),
    }
}

fn install_panic_hook() {
    static HOOK: Once = Once::new();
    HOOK.call_once(|| {
        let default_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            tracing::error!(target: "runtime.panic", ?info, "panic");
            default_panic(info);
        }));
    });
}

fn repaint_mode(mode: RepaintModeConfig) -> RepaintMode {
    match mode {
        RepaintModeConfig::Full => RepaintMode::Full,
        RepaintModeConfig::Delta => RepaintMode::Delta,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let _log_guard = configure_logging(&args.log_dir)?;
    install_panic_hook();

    let config = core_config::load_from(args.config.clone())?;
    let effective = config.effective();
    let config_path = config.path.as_ref().map(|p| p.display().to_string());
    info!(
        target: "runtime",
        scenario = args.scenario.as_str(),
        config_path = config_path.as_deref(),
        paint_interval_ms = effective.paint_interval.as_millis() as u64,
        tick_interval_ms = effective.tick_interval.as_millis() as u64,
        default_view = effective.default_view,
        "startup"
    );

    let blocks = Blocks::builder()
        .stdout()
        .interval(effective.paint_interval)
        .mode(repaint_mode(effective.mode))
        .default_view(effective.default_view)
        .build()?;
    let pace = Pace {
        step: Duration::from_millis(args.pace_ms),
        tick: effective.tick_interval,
    };

    scenarios::run(args.scenario, blocks, pace).await?;
    info!(target: "runtime", "shutdown");
    Ok(())
}
