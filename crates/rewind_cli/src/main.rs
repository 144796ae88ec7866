//! Rewind CLI
//!
//! Drives a Game of Life grid through the playback controller and prints
//! the resulting statistics as JSON.
//!
//! Usage:
//!   # Two seconds forward, one second of rewind, then jump to 0.5s
//!   rewind play --forward-ms 2000 --rewind-ms 1000 --seek-ms 500
//!
//!   # Deterministic stepping without the clock thread
//!   rewind --history delta-pair step 900 --seek-ms 3000
//!
//!   # Save, run on, restore
//!   rewind --saves ./savestates snapshot --frames 300

mod life;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use life::LifeCore;
use rewind_player::{
    CoreError, DirectoryStore, HistoryKind, PlaybackConfig, PlaybackController, PlaybackStats,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing_subscriber::{fmt, EnvFilter};

/// Rewindable playback of a Game of Life simulation
#[derive(Parser, Debug)]
#[command(name = "rewind")]
#[command(about = "Play, rewind, seek and snapshot a demo simulation")]
#[command(version)]
struct Cli {
    /// Playback config file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Ticks per second at speed 1.0
    #[arg(long, global = true)]
    rate: Option<f64>,

    /// Seconds of history to keep
    #[arg(long, global = true)]
    window: Option<u32>,

    /// Disable the rewind history
    #[arg(long, global = true)]
    no_rewind: bool,

    /// History storage strategy
    #[arg(long, value_enum, global = true)]
    history: Option<HistoryArg>,

    /// Savestate directory
    #[arg(long, default_value = "savestates", global = true)]
    saves: PathBuf,

    /// Grid width in cells
    #[arg(long, default_value_t = 64, global = true)]
    width: usize,

    /// Grid height in cells
    #[arg(long, default_value_t = 48, global = true)]
    height: usize,

    /// Seed for the initial grid
    #[arg(long, default_value_t = 1, global = true)]
    seed: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Play forward on the clock thread, rewind, then optionally seek
    Play {
        /// Forward speed factor
        #[arg(long, default_value_t = 1.0)]
        speed: f64,
        /// Time spent playing forward
        #[arg(long, default_value_t = 2000)]
        forward_ms: u64,
        /// Time spent rewinding at the same requested speed
        #[arg(long, default_value_t = 1000)]
        rewind_ms: u64,
        /// Seek target after playback, in milliseconds of history
        #[arg(long)]
        seek_ms: Option<u64>,
    },
    /// Step frames by hand, then optionally seek
    Step {
        /// Frames to advance
        frames: usize,
        /// Seek target after stepping, in milliseconds of history
        #[arg(long)]
        seek_ms: Option<u64>,
    },
    /// Create a savestate, keep running, then restore it
    Snapshot {
        /// Frames to run before saving and again before restoring
        #[arg(long, default_value_t = 300)]
        frames: usize,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum HistoryArg {
    Raw,
    DeltaPair,
}

impl From<HistoryArg> for HistoryKind {
    fn from(arg: HistoryArg) -> Self {
        match arg {
            HistoryArg::Raw => HistoryKind::Raw,
            HistoryArg::DeltaPair => HistoryKind::DeltaPair,
        }
    }
}

#[derive(Debug, Serialize)]
struct Report {
    generation: Option<u64>,
    population: usize,
    total_frames: u64,
    speed: f64,
    stats: PlaybackStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    savestate: Option<PathBuf>,
}

fn load_config(cli: &Cli) -> Result<PlaybackConfig> {
    let mut config = match &cli.config {
        Some(path) => PlaybackConfig::load(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => PlaybackConfig::default(),
    };

    if let Some(rate) = cli.rate {
        config.rate = rate;
    }
    if let Some(window) = cli.window {
        config.rewind_window_secs = window;
    }
    if cli.no_rewind {
        config.rewind_enabled = false;
    }
    if let Some(history) = cli.history {
        config.history = history.into();
    }
    Ok(config)
}

fn core_state(controller: &PlaybackController) -> Result<Vec<u8>, CoreError> {
    controller.with_core(|core| {
        let mut state = vec![0; core.serialize_size()];
        core.serialize(&mut state)?;
        Ok(state)
    })
}

fn report(controller: &PlaybackController, savestate: Option<PathBuf>) -> Result<Report> {
    let state = core_state(controller)?;
    Ok(Report {
        generation: LifeCore::generation_of(&state),
        population: LifeCore::population_of(&state),
        total_frames: controller.total_frames(),
        speed: controller.speed(),
        stats: controller.stats(),
        savestate,
    })
}

fn play(
    controller: &PlaybackController,
    speed: f64,
    forward: Duration,
    rewind: Duration,
    seek_ms: Option<u64>,
) -> Result<()> {
    controller.start()?;

    tracing::info!(speed, ?forward, "playing forward");
    controller.set_speed(speed);
    thread::sleep(forward);

    tracing::info!(speed = -speed, ?rewind, "rewinding");
    controller.set_speed(-speed);
    thread::sleep(rewind);

    controller.pause_async();
    if let Some(target) = seek_ms {
        controller.seek_time_ms(target);
    }
    controller.stop();
    Ok(())
}

fn step(controller: &PlaybackController, frames: usize, seek_ms: Option<u64>) {
    for _ in 0..frames {
        controller.frame_advance();
    }
    if let Some(target) = seek_ms {
        controller.seek_time_ms(target);
    }
}

fn snapshot(controller: &PlaybackController, frames: usize) -> Result<PathBuf> {
    step(controller, frames, None);
    let saved = core_state(controller)?;
    let path = controller
        .create_savestate()
        .context("Failed to create savestate")?;

    step(controller, frames, None);
    controller
        .load_savestate(&path)
        .with_context(|| format!("Failed to load {}", path.display()))?;

    if core_state(controller)? != saved {
        bail!("Restored state differs from {}", path.display());
    }
    Ok(path)
}

fn main() -> Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    let core = LifeCore::seeded(cli.width, cli.height, cli.seed);
    let store = Arc::new(DirectoryStore::new(&cli.saves));
    let controller = PlaybackController::new(Box::new(core), store, &config);
    tracing::debug!(?config, "controller ready");

    let savestate = match cli.command {
        Command::Play {
            speed,
            forward_ms,
            rewind_ms,
            seek_ms,
        } => {
            play(
                &controller,
                speed,
                Duration::from_millis(forward_ms),
                Duration::from_millis(rewind_ms),
                seek_ms,
            )?;
            None
        }
        Command::Step { frames, seek_ms } => {
            step(&controller, frames, seek_ms);
            None
        }
        Command::Snapshot { frames } => Some(snapshot(&controller, frames)?),
    };

    let report = report(&controller, savestate)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller(config: &PlaybackConfig, saves: &std::path::Path) -> PlaybackController {
        PlaybackController::new(
            Box::new(LifeCore::seeded(24, 16, 9)),
            Arc::new(DirectoryStore::new(saves)),
            config,
        )
    }

    #[test]
    fn test_overrides_apply_on_top_of_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rewind.toml");
        std::fs::write(&path, "rate = 30.0\nrewind_window_secs = 40\n").unwrap();

        let cli = Cli::parse_from([
            "rewind",
            "--config",
            path.to_str().unwrap(),
            "--history",
            "delta-pair",
            "step",
            "10",
        ]);
        let config = load_config(&cli).unwrap();
        assert_eq!(config.rate, 30.0);
        assert_eq!(config.rewind_window_secs, 40);
        assert_eq!(config.history, HistoryKind::DeltaPair);
        assert!(config.rewind_enabled);
    }

    #[test]
    fn test_step_then_seek_reports_history() {
        let dir = tempfile::tempdir().unwrap();
        let controller = controller(&PlaybackConfig::default(), dir.path());

        step(&controller, 120, Some(1000));
        let report = report(&controller, None).unwrap();
        assert_eq!(report.generation, Some(61));
        assert_eq!(report.stats.played_time_ms, 1000);
        assert_eq!(report.total_frames, 61);
    }

    #[test]
    fn test_snapshot_restores_state() {
        let dir = tempfile::tempdir().unwrap();
        let config = PlaybackConfig::default().with_history(HistoryKind::DeltaPair);
        let controller = controller(&config, dir.path());

        let path = snapshot(&controller, 50).unwrap();
        assert!(path.starts_with(dir.path()));

        let report = report(&controller, Some(path)).unwrap();
        assert_eq!(report.generation, Some(50));
        assert_eq!(report.total_frames, 50);
    }
}
