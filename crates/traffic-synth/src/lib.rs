//! Traffic Demand Synthesis
//!
//! Reproducible demand generation over the node set of one topology
//! snapshot. The demand source is snapshot 0 by contract: later slices'
//! node sets may differ through link churn, so they are never used. The
//! RNG is injected and seeded per run; identical inputs always produce
//! the identical ordered demand sequence.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use slice_topology::{SnapshotNode, TopologySnapshot};
use std::collections::BTreeMap;
use std::str::FromStr;
use thiserror::Error;
use tracing::info;

/// Synthesis errors
#[derive(Error, Debug)]
pub enum SynthError {
    #[error("Snapshot has {0} node(s); at least 2 are required for demand synthesis")]
    InsufficientNodes(usize),
}

pub type Result<T> = std::result::Result<T, SynthError>;

/// Demand placement policy.
///
/// Every selector except `Random` currently reduces to the same
/// cross-plane pairing; the distinct names are kept for configuration
/// compatibility with the upstream tooling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DemandType {
    Random,
    IntraOrbit,
    InterOrbit,
    #[default]
    Mixed,
}

impl FromStr for DemandType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "random" => Ok(DemandType::Random),
            "intra_orbit" => Ok(DemandType::IntraOrbit),
            "inter_orbit" => Ok(DemandType::InterOrbit),
            "mixed" => Ok(DemandType::Mixed),
            other => Err(format!("unknown demand type: {other}")),
        }
    }
}

/// Synthesis parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthConfig {
    pub num_demands: usize,
    pub demand_type: DemandType,
    pub rate_min_mbps: f64,
    pub rate_max_mbps: f64,
    /// Run-wide constants, not sampled per demand.
    pub start_offset_sec: f64,
    pub duration_sec: f64,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            num_demands: 20,
            demand_type: DemandType::Mixed,
            rate_min_mbps: 20.0,
            rate_max_mbps: 50.0,
            start_offset_sec: 1.0,
            duration_sec: 8.0,
        }
    }
}

/// One synthesized flow request. Immutable after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficDemand {
    pub demand_id: usize,
    pub src_id: usize,
    pub dst_id: usize,
    pub src_name: String,
    pub dst_name: String,
    pub rate_mbps: f64,
    pub start_offset_sec: f64,
    pub duration_sec: f64,
}

/// Demand generator with an injected seeded random source.
pub struct DemandSynthesizer {
    config: SynthConfig,
    rng: StdRng,
}

impl DemandSynthesizer {
    pub fn with_seed(config: SynthConfig, seed: u64) -> Self {
        Self {
            config,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Generate the demand set over `snapshot`'s nodes.
    pub fn synthesize(&mut self, snapshot: &TopologySnapshot) -> Result<Vec<TrafficDemand>> {
        let nodes = &snapshot.nodes;
        if nodes.len() < 2 {
            return Err(SynthError::InsufficientNodes(nodes.len()));
        }

        // Plane groups in deterministic key order; nodes with no parseable
        // plane form their own group.
        let mut groups: BTreeMap<Option<u32>, Vec<&SnapshotNode>> = BTreeMap::new();
        for node in nodes {
            groups.entry(node.plane_index).or_default().push(node);
        }
        let plane_keys: Vec<Option<u32>> = groups.keys().copied().collect();

        let cross_plane =
            self.config.demand_type != DemandType::Random && plane_keys.len() >= 2;

        let mut demands = Vec::with_capacity(self.config.num_demands);
        for demand_id in 0..self.config.num_demands {
            let (src, dst) = if cross_plane {
                let picked = rand::seq::index::sample(&mut self.rng, plane_keys.len(), 2);
                let src_group = &groups[&plane_keys[picked.index(0)]];
                let dst_group = &groups[&plane_keys[picked.index(1)]];
                (
                    src_group[self.rng.gen_range(0..src_group.len())],
                    dst_group[self.rng.gen_range(0..dst_group.len())],
                )
            } else {
                let picked = rand::seq::index::sample(&mut self.rng, nodes.len(), 2);
                (&nodes[picked.index(0)], &nodes[picked.index(1)])
            };

            demands.push(TrafficDemand {
                demand_id,
                src_id: src.id,
                dst_id: dst.id,
                src_name: src.name.clone(),
                dst_name: dst.name.clone(),
                rate_mbps: self
                    .rng
                    .gen_range(self.config.rate_min_mbps..=self.config.rate_max_mbps),
                start_offset_sec: self.config.start_offset_sec,
                duration_sec: self.config.duration_sec,
            });
        }

        info!(
            "Generated {} traffic demands ({:?} policy)",
            demands.len(),
            self.config.demand_type
        );
        Ok(demands)
    }
}
