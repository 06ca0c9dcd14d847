//! # engine_app
//!
//! Runs the kinematics simulation on the ECS runtime.
//!
//! ## Startup Sequence
//!
//! 1. Parse the command line and load the optional JSON tick config.
//! 2. Install the simulation plugin.
//! 3. Run the scheduler until every body settles or the tick limit is hit.

mod simulation;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use engine_system::{App, TickConfig};
use simulation::{SimulationPlugin, SimulationStats};

#[derive(Parser)]
#[command(name = "engine_app", about = "Kinematics demo on the archetype ECS")]
struct Args {
    /// Path to a JSON tick config, e.g. `{"tick_rate": 60.0, "max_ticks": 600}`
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Maximum number of updates; overrides the config file (0 = unlimited)
    #[arg(short, long)]
    ticks: Option<u64>,

    /// Number of bodies to spawn
    #[arg(short, long, default_value_t = 100)]
    entities: usize,
}

fn load_config(path: Option<&Path>) -> Result<TickConfig> {
    let Some(path) = path else {
        return Ok(TickConfig::default());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    TickConfig::from_json(&raw).with_context(|| format!("parsing config {}", path.display()))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("engine_app=info".parse()?))
        .init();

    let args = Args::parse();

    let mut config = load_config(args.config.as_deref())?;
    if let Some(ticks) = args.ticks {
        config.max_ticks = ticks;
    }
    info!(
        entities = args.entities,
        tick_rate = config.tick_rate,
        max_ticks = config.max_ticks,
        "engine starting"
    );

    let mut app = App::new(config);
    app.add_plugin(SimulationPlugin {
        entities: args.entities,
    });
    app.run()?;

    let stats = app.world().resource::<SimulationStats>()?;
    info!(
        ticks = stats.ticks,
        settled = stats.settled,
        entities = app.world().storage().entity_count(),
        "engine shut down"
    );
    Ok(())
}
