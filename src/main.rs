use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::info;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use traffic_convoy::simulation::{Difficulty, GraphInput, SimWorld, SimulationLoop};

#[derive(Parser)]
#[command(name = "traffic_convoy")]
#[command(about = "Convoy traffic simulation, run headless")]
struct Cli {
    /// Number of simulation ticks to run
    #[arg(long, default_value = "3000")]
    ticks: u32,

    /// Wall time per tick in milliseconds
    #[arg(long, default_value = "16")]
    delta: f32,

    /// Difficulty preset
    #[arg(long, value_enum, default_value_t = DifficultyArg::Medium)]
    difficulty: DifficultyArg,

    /// Seed for reproducible runs
    #[arg(long)]
    seed: Option<u64>,

    /// JSON road map; the built-in grid is used when absent
    #[arg(long)]
    map: Option<PathBuf>,

    /// Resume a saved session instead of building a new world
    #[arg(long, conflicts_with = "map")]
    load: Option<PathBuf>,

    /// Save the session to this file when the run ends
    #[arg(long)]
    save: Option<PathBuf>,

    /// Run on the simulation thread in real time for this many seconds
    #[arg(long)]
    realtime: Option<f32>,

    /// Log a summary every this many ticks (0 for none)
    #[arg(long, default_value = "1000")]
    report_every: u32,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DifficultyArg {
    Noob,
    Easy,
    Medium,
    Hard,
    Hardcore,
}

impl From<DifficultyArg> for Difficulty {
    fn from(arg: DifficultyArg) -> Self {
        match arg {
            DifficultyArg::Noob => Difficulty::Noob,
            DifficultyArg::Easy => Difficulty::Easy,
            DifficultyArg::Medium => Difficulty::Medium,
            DifficultyArg::Hard => Difficulty::Hard,
            DifficultyArg::Hardcore => Difficulty::Hardcore,
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let world = build_world(&cli)?;
    info!("Initial state:");
    world.log_summary();

    let world = match cli.realtime {
        Some(secs) => run_realtime(world, secs)?,
        None => run_headless(world, cli.ticks, cli.delta, cli.report_every),
    };

    info!("=== SIMULATION COMPLETE ===");
    world.log_summary();

    if let Some(path) = &cli.save {
        world.save_to_file(path)?;
        info!("Session saved to {}", path.display());
    }
    Ok(())
}

fn build_world(cli: &Cli) -> Result<SimWorld> {
    if let Some(path) = &cli.load {
        return SimWorld::restore_from_file(path);
    }

    let difficulty = Difficulty::from(cli.difficulty);
    let input = match &cli.map {
        Some(path) => GraphInput::from_json_file(path)?,
        None => GraphInput::demo(),
    };
    info!("Difficulty: {}", difficulty);
    let world = match cli.seed {
        Some(seed) => SimWorld::new_with_seed(&input, difficulty.settings(), seed),
        None => SimWorld::new(&input, difficulty.settings()),
    };
    world.context("Failed to set up the simulation")
}

/// Run the simulation with a fixed time step, as fast as possible
fn run_headless(mut world: SimWorld, ticks: u32, delta: f32, report_every: u32) -> SimWorld {
    info!(
        "Running {} ticks of {}ms ({:.1}s of traffic)",
        ticks,
        delta,
        ticks as f32 * delta / 1000.0
    );
    for tick in 1..=ticks {
        world.tick(delta);
        if report_every > 0 && tick % report_every == 0 && tick < ticks {
            info!("--- After tick {} ---", tick);
            world.log_summary();
        }
    }
    world
}

/// Run the simulation on its own thread against the wall clock
fn run_realtime(world: SimWorld, secs: f32) -> Result<SimWorld> {
    info!("Running in real time for {:.1}s", secs);
    let handle = SimulationLoop::spawn(world)?;
    let deadline = Instant::now() + Duration::from_secs_f32(secs.max(0.0));
    while Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(500));
        let snapshot = handle.snapshot();
        info!(
            "tick {}: {} vehicles in {} convoys, {} arrived, {} crashed",
            snapshot.tick,
            snapshot.vehicles.len(),
            snapshot.convoys.len(),
            snapshot.stats.arrived,
            snapshot.stats.crashed
        );
    }
    handle.stop()
}
