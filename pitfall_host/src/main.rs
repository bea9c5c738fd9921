//! pitfall-headless - run the game without a window
//!
//! Drives the earth, the player and the music for a fixed amount of game
//! time, logging depth, stage and the playing track. Optionally bounces the
//! mix to a WAV file.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::Parser;
use pitfall_engine::export::{write_wav, ExportConfig};
use pitfall_engine::{AssetLoader, MemoryLoader, MusicEvent, WavLoader};
use pitfall_host::autopilot::Autopilot;
use pitfall_host::{Session, TICKS_PER_SECOND};
use pitfall_shared::GameConfig;

#[derive(Parser)]
#[command(name = "pitfall-headless")]
#[command(about = "Run a pitfall session without a window")]
#[command(version)]
struct Cli {
    /// Game time to simulate, in seconds
    #[arg(long, default_value_t = 60.0)]
    seconds: f64,

    /// Seed for terrain and music choices
    #[arg(long, default_value_t = 1)]
    seed: u64,

    /// Root directory of the WAV assets (synthetic tones when absent)
    #[arg(long)]
    assets: Option<PathBuf>,

    /// JSON game tables (built-in tables when absent)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Bounce the mix to this WAV file
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Print a JSON summary at the end
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => GameConfig::load_json(path)?,
        None => GameConfig::default(),
    };
    let sample_rate = config.transport.sample_rate;

    let loader: Box<dyn AssetLoader> = match &cli.assets {
        Some(dir) => Box::new(WavLoader::new(dir).with_format(config.format)),
        None => Box::new(MemoryLoader::tones(sample_rate)),
    };

    let mut session = Session::new(config, loader, cli.seed)?;
    if !session.wait_ready(Duration::from_secs(30)) {
        bail!("stage {} did not finish loading", session.stage());
    }
    if cli.out.is_some() {
        session.record();
    }
    session.start()?;

    let mut pilot = Autopilot::new(&session);
    let ticks = (cli.seconds.max(0.0) * TICKS_PER_SECOND).round() as u64;
    let mut deaths = 0;
    let mut last_depth = 0;

    for tick in 0..ticks {
        let report = session.tick()?;
        if pilot.step(&mut session) == Some(pitfall_earth::PlayerSignal::Died) {
            deaths += 1;
        }

        for event in &report.events {
            if let MusicEvent::MasterChanged { stage, key } = event {
                tracing::info!(stage, key = %key, depth = report.depth, "master track");
            }
        }
        if report.depth / 50 != last_depth / 50 {
            tracing::info!(
                depth = report.depth,
                stage = report.stage,
                shield = session.player.shield,
                master = session.engine.master_key().unwrap_or("-"),
                "progress"
            );
        }
        last_depth = report.depth;

        // Respawn after a few seconds of the game-over loop.
        if !session.player.is_alive() && tick % (5 * TICKS_PER_SECOND as u64) == 0 {
            session.restart()?;
        }
    }

    if let (Some(path), Some(mix)) = (&cli.out, session.take_recording()) {
        let export = ExportConfig { sample_rate, ..Default::default() };
        write_wav(path, &mix, &export)?;
        tracing::info!(path = %path.display(), seconds = cli.seconds, "bounced mix");
    }

    if cli.json {
        let summary = serde_json::json!({
            "seed": cli.seed,
            "seconds": cli.seconds,
            "depth": session.earth.depth(),
            "stage": session.stage(),
            "deaths": deaths,
            "master": session.engine.master_key(),
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }
    Ok(())
}
