//! Snapshot preparation CLI.
//!
//! Converts the orbital simulator's link-status telemetry into time-sliced
//! topology snapshots and traffic demands for the packet simulator.
//!
//! Usage:
//!   prepare-snapshots --input data/link_status.csv --output-dir ns3_input \
//!                     --slice-duration 300 --num-demands 20 --demand-type mixed

use anyhow::Result;
use clap::Parser;
use slice_topology::NodeIdMode;
use snapshot_pipeline::{run, SimulationConfig};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;
use traffic_synth::DemandType;

#[derive(Parser, Debug)]
#[command(
    name = "prepare-snapshots",
    about = "Convert link telemetry into packet-simulator topology snapshots"
)]
struct Args {
    /// Path to the link-status CSV produced by the orbital simulator
    #[arg(short, long, default_value = "data/link_status.csv")]
    input: PathBuf,

    /// Output directory for packet-simulator input artifacts
    #[arg(short, long, default_value = "ns3_input")]
    output_dir: PathBuf,

    /// Optional JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Slice duration in seconds
    #[arg(long)]
    slice_duration: Option<f64>,

    /// Polar-blackout distance threshold in km
    #[arg(long)]
    polar_threshold: Option<f64>,

    /// Number of traffic demands to synthesize
    #[arg(long)]
    num_demands: Option<usize>,

    /// Demand placement policy (random | intra_orbit | inter_orbit | mixed)
    #[arg(long)]
    demand_type: Option<DemandType>,

    /// Random seed for demand synthesis
    #[arg(long)]
    seed: Option<u64>,

    /// Assign node ids globally across the run instead of per slice
    #[arg(long)]
    global_node_ids: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = match &args.config {
        Some(path) => SimulationConfig::load_json(path)?,
        None => SimulationConfig::default(),
    };
    if let Some(duration) = args.slice_duration {
        config.slicing.slice_duration_sec = duration;
    }
    if let Some(threshold) = args.polar_threshold {
        config.slicing.polar_threshold_km = threshold;
    }
    if let Some(count) = args.num_demands {
        config.traffic.num_demands = count;
    }
    if let Some(demand_type) = args.demand_type {
        config.traffic.demand_type = demand_type;
    }
    if let Some(seed) = args.seed {
        config.traffic.random_seed = seed;
    }
    if args.global_node_ids {
        config.slicing.node_id_mode = NodeIdMode::Global;
    }

    info!("{}", "=".repeat(60));
    info!("Link Telemetry Snapshot Pipeline");
    info!("{}", "=".repeat(60));

    let summary = run(&config, &args.input, &args.output_dir)?;

    info!("{}", "=".repeat(60));
    info!("SUMMARY");
    info!("{}", "=".repeat(60));
    info!(
        "Horizon: {:.1}s in {} slices ({} empty)",
        summary.total_duration_sec, summary.slice_count, summary.empty_slices
    );
    info!(
        "Snapshot 0: {} nodes, {} edges, {} component(s)",
        summary.snapshot0_nodes, summary.snapshot0_edges, summary.snapshot0_components
    );
    info!("Traffic demands: {}", summary.demand_count);
    if summary.skipped_rows > 0 {
        info!("Skipped malformed rows: {}", summary.skipped_rows);
    }

    Ok(())
}
