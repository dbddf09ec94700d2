use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use traffic_signal_sim::simulation::{
    ControlCommand, ControlMode, HeuristicInsightService, InsightRequester, InsightStatus,
    LocationConfig, SimConfig, SimWorld,
};

#[derive(Parser)]
#[command(name = "traffic_signal_sim")]
#[command(about = "Headless traffic signal grid simulation")]
struct Cli {
    /// Number of simulation ticks to run
    #[arg(long, default_value = "600")]
    ticks: u32,

    /// Seed for a reproducible run
    #[arg(long)]
    seed: Option<u64>,

    /// Signal control mode
    #[arg(long, value_enum)]
    mode: Option<ControlMode>,

    /// Index into the built-in location list
    #[arg(long, default_value = "0")]
    location: usize,

    /// Intersections per grid row and column
    #[arg(long)]
    grid_size: Option<usize>,

    /// JSON file overriding simulation constants
    #[arg(long)]
    config: Option<PathBuf>,

    /// Sleep one tick interval between ticks
    #[arg(long)]
    realtime: bool,

    /// Ticks between printed reports (0 disables them)
    #[arg(long, default_value = "100")]
    report_every: u32,

    /// Generate advisory insights at each report
    #[arg(long)]
    insights: bool,

    /// Write the final world state as JSON to this file
    #[arg(long)]
    snapshot: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => SimConfig::from_json_file(path)?,
        None => SimConfig::default(),
    };
    if let Some(grid_size) = cli.grid_size {
        config.grid_size = grid_size;
    }
    if let Some(mode) = cli.mode {
        config.initial_mode = mode;
    }

    let mut world = SimWorld::with_config(config, cli.seed)?;

    let locations = LocationConfig::presets();
    let location = locations
        .get(cli.location)
        .cloned()
        .with_context(|| format!("No location with index {}", cli.location))?;
    if location != *world.location() {
        world.submit(ControlCommand::SelectLocation(location));
    }

    run_headless(&mut world, &cli)
}

/// Run the simulation in headless mode (no graphics)
fn run_headless(world: &mut SimWorld, cli: &Cli) -> Result<()> {
    println!("Running traffic signal simulation in headless mode...");
    println!(
        "Ticks: {}, Tick interval: {}ms, Cycle: {}s",
        cli.ticks,
        world.config().tick_interval_ms,
        world.config().cycle_ms / 1000
    );
    println!();

    let service = Arc::new(HeuristicInsightService);
    let mut insights = InsightRequester::new();
    let tick_interval = Duration::from_millis(world.config().tick_interval_ms);

    let mut insight_shown = true;

    for tick in 1..=cli.ticks {
        world.tick();

        if !insight_shown {
            match insights.poll() {
                InsightStatus::Ready(insight) => {
                    println!("--- Insight ---\n{}\n", insight.text);
                    insight_shown = true;
                }
                InsightStatus::Unavailable => {
                    println!("--- Insight ---\nNo insight available\n");
                    insight_shown = true;
                }
                InsightStatus::Idle | InsightStatus::Pending => {}
            }
        }

        if cli.report_every > 0 && tick % cli.report_every == 0 {
            println!("--- After tick {} ---", tick);
            world.print_summary();
            world.draw_map();

            if cli.insights && insights.request(service.clone(), world.insight_snapshot()) {
                insight_shown = false;
            }
        }

        if cli.realtime {
            std::thread::sleep(tick_interval);
        }
    }

    let stats = &world.stats;
    info!("=== SIMULATION COMPLETE ===");
    info!("Elapsed time: {:.2}s", world.elapsed_ms() as f32 / 1000.0);
    info!("Total vehicles spawned: {}", stats.vehicles_spawned);
    info!("Total vehicles removed: {}", stats.vehicles_removed);
    info!("Active vehicles: {}", stats.active_vehicles);
    info!("Total intersections: {}", world.intersections.len());
    info!("Total throughput: {}", stats.total_throughput);
    info!("Congestion: {:.1}%", stats.congestion_level * 100.0);
    info!("Average wait: {:.2}s", stats.average_wait_time);

    if let Some(path) = &cli.snapshot {
        let json = serde_json::to_string_pretty(&world.render_snapshot())?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write snapshot to {}", path.display()))?;
        info!("Snapshot written to {}", path.display());
    }

    Ok(())
}
