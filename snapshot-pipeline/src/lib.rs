//! Snapshot preparation pipeline.
//!
//! Wires the telemetry, slicing, traffic and export crates into one
//! synchronous batch run: ingest link telemetry, partition the horizon,
//! build one topology snapshot per slice, synthesize demands from snapshot
//! 0, and write the packet-simulator input artifacts.
//!
//! Slice construction runs sequentially in increasing slice-id order; the
//! computations are independent, but only snapshot 0 feeds a later stage,
//! so ordering carries no correctness weight.

use link_telemetry::ingest;
use serde::Serialize;
use sim_export::Exporter;
use slice_topology::{connected_components, SnapshotBuilder, TimeSliceIndex, TopologySnapshot};
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};
use traffic_synth::{DemandSynthesizer, SynthError, TrafficDemand};

pub mod config;

pub use config::SimulationConfig;

/// Pipeline errors
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Telemetry(#[from] link_telemetry::TelemetryError),
    #[error(transparent)]
    Slice(#[from] slice_topology::SliceError),
    #[error(transparent)]
    Export(#[from] sim_export::ExportError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Outcome counters for one completed run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub total_duration_sec: f64,
    pub slice_count: usize,
    pub empty_slices: usize,
    pub skipped_rows: usize,
    pub snapshot0_nodes: usize,
    pub snapshot0_edges: usize,
    pub snapshot0_components: usize,
    pub demand_count: usize,
}

/// Execute one full run: telemetry in, artifact directory out.
pub fn run(config: &SimulationConfig, input: &Path, output_dir: &Path) -> Result<RunSummary> {
    let telemetry = ingest::load_link_status(input, &config.derivation)?;

    let total = telemetry.total_duration_sec().unwrap_or(0.0);
    let mut slices = TimeSliceIndex::partition(total, config.slicing.slice_duration_sec);
    info!(
        "Partitioned {:.1}s horizon into {} slices of {:.0}s",
        total,
        slices.len(),
        slices.slice_duration_sec()
    );

    let builder = SnapshotBuilder::new(
        &telemetry,
        slices.slice_duration_sec(),
        config.slicing.polar_threshold_km,
        config.slicing.node_id_mode,
    )?;

    let mut snapshots: Vec<TopologySnapshot> = Vec::with_capacity(slices.len());
    let mut empty_slices = 0usize;
    for slice_id in 0..slices.len() {
        let snapshot = builder.build_into(&mut slices, slice_id)?;
        if snapshot.is_empty() {
            empty_slices += 1;
        }
        snapshots.push(snapshot);
    }
    if empty_slices > 0 {
        warn!("{} of {} slices matched no telemetry", empty_slices, slices.len());
    }

    let demands = synthesize_demands(config, &snapshots[0]);

    let exporter = Exporter::new(output_dir)?;
    exporter.export_run(slices.slices(), &snapshots, &demands)?;

    let first = &snapshots[0];
    Ok(RunSummary {
        total_duration_sec: total,
        slice_count: slices.len(),
        empty_slices,
        skipped_rows: telemetry.skipped_rows(),
        snapshot0_nodes: first.num_nodes,
        snapshot0_edges: first.num_edges,
        snapshot0_components: connected_components(first),
        demand_count: demands.len(),
    })
}

/// Demands come from snapshot 0 only; an undersized snapshot degrades to an
/// empty demand set instead of failing the run.
fn synthesize_demands(config: &SimulationConfig, snapshot: &TopologySnapshot) -> Vec<TrafficDemand> {
    let mut synthesizer = DemandSynthesizer::with_seed(
        config.traffic.synth_config(),
        config.traffic.random_seed,
    );
    match synthesizer.synthesize(snapshot) {
        Ok(demands) => demands,
        Err(SynthError::InsufficientNodes(have)) => {
            warn!(
                "Skipping demand synthesis: snapshot 0 has {} node(s), need 2",
                have
            );
            Vec::new()
        }
    }
}
