//! Run configuration.
//!
//! Every pipeline parameter lives in one serde aggregate with JSON
//! load/save; the CLI overrides individual fields on top.

use crate::Result;
use link_telemetry::DerivationConstants;
use serde::{Deserialize, Serialize};
use slice_topology::{NodeIdMode, DEFAULT_POLAR_THRESHOLD_KM};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::info;
use traffic_synth::{DemandType, SynthConfig};

/// Horizon partitioning and snapshot construction parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SlicingConfig {
    pub slice_duration_sec: f64,
    pub polar_threshold_km: f64,
    pub node_id_mode: NodeIdMode,
}

impl Default for SlicingConfig {
    fn default() -> Self {
        Self {
            slice_duration_sec: 300.0,
            polar_threshold_km: DEFAULT_POLAR_THRESHOLD_KM,
            node_id_mode: NodeIdMode::PerSlice,
        }
    }
}

/// Traffic-demand synthesis parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrafficConfig {
    pub num_demands: usize,
    pub demand_type: DemandType,
    pub rate_min_mbps: f64,
    pub rate_max_mbps: f64,
    pub start_offset_sec: f64,
    pub duration_sec: f64,
    pub random_seed: u64,
}

impl Default for TrafficConfig {
    fn default() -> Self {
        Self {
            num_demands: 20,
            demand_type: DemandType::Mixed,
            rate_min_mbps: 20.0,
            rate_max_mbps: 50.0,
            start_offset_sec: 1.0,
            duration_sec: 8.0,
            random_seed: 42,
        }
    }
}

impl TrafficConfig {
    pub fn synth_config(&self) -> SynthConfig {
        SynthConfig {
            num_demands: self.num_demands,
            demand_type: self.demand_type,
            rate_min_mbps: self.rate_min_mbps,
            rate_max_mbps: self.rate_max_mbps,
            start_offset_sec: self.start_offset_sec,
            duration_sec: self.duration_sec,
        }
    }
}

/// Aggregate of all run parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub derivation: DerivationConstants,
    pub slicing: SlicingConfig,
    pub traffic: TrafficConfig,
}

impl SimulationConfig {
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let config = serde_json::from_reader(BufReader::new(file))?;
        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = File::create(path.as_ref())?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)?;
        Ok(())
    }
}
