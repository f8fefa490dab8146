//! Headless driver: builds a simulation from command-line flags, advances it
//! at full speed, and reports leader positions or JSON snapshots.

use anyhow::Result;
use clap::{Parser, ValueEnum};
use moshpit_core::{BoundaryPolicy, MoshpitConfig, Simulation, Viewport};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum BoundaryArg {
    Periodic,
    Reflective,
}

impl From<BoundaryArg> for BoundaryPolicy {
    fn from(value: BoundaryArg) -> Self {
        match value {
            BoundaryArg::Periodic => Self::Periodic,
            BoundaryArg::Reflective => Self::Reflective,
        }
    }
}

impl std::fmt::Display for BoundaryArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Periodic => f.write_str("periodic"),
            Self::Reflective => f.write_str("reflective"),
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "moshpit", about = "Headless mosh pit simulation driver")]
struct Args {
    /// Number of moshers.
    #[arg(long, default_value_t = 300)]
    population: usize,

    /// Fraction of the arena area seeding the active set.
    #[arg(long, default_value_t = 0.15)]
    active_fraction: f64,

    /// Arena width in arena units.
    #[arg(long, default_value_t = 50.0)]
    width: f64,

    /// Arena height in arena units.
    #[arg(long, default_value_t = 50.0)]
    height: f64,

    /// Boundary policy applied to both axes.
    #[arg(long, value_enum, default_value_t = BoundaryArg::Periodic)]
    boundary: BoundaryArg,

    /// RNG seed; omit to draw one from entropy.
    #[arg(long)]
    seed: Option<u64>,

    /// Ticks to simulate.
    #[arg(long, default_value_t = 600)]
    ticks: u64,

    /// Ticks between reports; 0 disables reporting.
    #[arg(long, default_value_t = 30)]
    report_every: u64,

    /// Emit JSON snapshots instead of log lines.
    #[arg(long)]
    json: bool,

    /// Viewport width snapshots are scaled to.
    #[arg(long, default_value_t = 200.0)]
    viewport_width: f64,

    /// Viewport height snapshots are scaled to.
    #[arg(long, default_value_t = 200.0)]
    viewport_height: f64,
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let config = MoshpitConfig {
        population: args.population,
        active_fraction: args.active_fraction,
        arena_width: args.width,
        arena_height: args.height,
        boundary_x: args.boundary.into(),
        boundary_y: args.boundary.into(),
        rng_seed: args.seed,
        ..MoshpitConfig::default()
    };
    let mut sim = Simulation::new(config)?;
    info!(
        population = sim.population(),
        ticks = args.ticks,
        "starting mosh pit run"
    );

    let viewport = Viewport::new(args.viewport_width, args.viewport_height);
    for _ in 0..args.ticks {
        let events = sim.advance();
        if events.grid_dropped > 0 {
            warn!(
                tick = events.tick.0,
                dropped = events.grid_dropped,
                "grid cells overflowed; excess moshers skipped this tick"
            );
        }
        if args.report_every > 0 && events.tick.0.is_multiple_of(args.report_every) {
            let snapshot = sim.snapshot(viewport);
            if args.json {
                println!("{}", serde_json::to_string(&snapshot)?);
            } else {
                info!(
                    tick = snapshot.tick.0,
                    x = snapshot.leader.x,
                    y = snapshot.leader.y,
                    collision_pct = snapshot.leader.collision_pct,
                    "leader"
                );
            }
        }
    }
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}
