//! Per-slice topology snapshot construction.
//!
//! One snapshot represents the network state for one time slice: the rows
//! matched to the slice's representative instant, minus polar-blacked-out
//! inter-plane links, with node ids assigned from the sorted name set.

use chrono::{DateTime, Duration, Utc};
use link_telemetry::{LinkRecord, TelemetrySet};
use petgraph::graph::UnGraph;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, warn};

use crate::{Result, SliceError};

/// Tolerance window around the representative instant, seconds.
const MATCH_TOLERANCE_SEC: f64 = 0.5;

/// Default polar-blackout distance threshold, km. An inter-plane link
/// closer than this is near the poles and must be de-pointed.
pub const DEFAULT_POLAR_THRESHOLD_KM: f64 = 2000.0;

/// How node ids are assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NodeIdMode {
    /// Number the snapshot's own sorted name set from 0. Ids are not stable
    /// across slices whose node sets differ.
    #[default]
    PerSlice,
    /// Number the sorted union of endpoint names across the whole telemetry
    /// set; ids are stable for the entire run.
    Global,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotNode {
    pub id: usize,
    pub name: String,
    pub plane_index: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEdge {
    pub src_id: usize,
    pub dst_id: usize,
    pub src_name: String,
    pub dst_name: String,
    pub latency_ms: f64,
    pub bandwidth_mbps: f64,
    pub packet_loss_rate: f64,
    pub bit_error_rate: f64,
    pub distance_km: f64,
}

/// The discrete network state assigned to one time slice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologySnapshot {
    pub slice_id: usize,
    pub representative_timestamp: DateTime<Utc>,
    pub num_nodes: usize,
    pub num_edges: usize,
    pub nodes: Vec<SnapshotNode>,
    pub edges: Vec<SnapshotEdge>,
}

impl TopologySnapshot {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Number of connected components in a snapshot's link graph.
pub fn connected_components(snapshot: &TopologySnapshot) -> usize {
    let mut graph: UnGraph<(), ()> = UnGraph::new_undirected();
    let mut index_of = HashMap::new();
    for node in &snapshot.nodes {
        index_of.insert(node.id, graph.add_node(()));
    }
    for edge in &snapshot.edges {
        if let (Some(&a), Some(&b)) = (index_of.get(&edge.src_id), index_of.get(&edge.dst_id)) {
            graph.add_edge(a, b, ());
        }
    }
    petgraph::algo::connected_components(&graph)
}

/// Builds snapshots against one telemetry set.
pub struct SnapshotBuilder<'a> {
    telemetry: &'a TelemetrySet,
    horizon_start: DateTime<Utc>,
    slice_duration_sec: f64,
    polar_threshold_km: f64,
    global_ids: Option<BTreeMap<String, usize>>,
}

impl<'a> SnapshotBuilder<'a> {
    /// Fails when the telemetry set never established a time index; no
    /// slice can be resolved without one.
    pub fn new(
        telemetry: &'a TelemetrySet,
        slice_duration_sec: f64,
        polar_threshold_km: f64,
        id_mode: NodeIdMode,
    ) -> Result<Self> {
        let horizon_start = telemetry
            .horizon_start()
            .ok_or(SliceError::MissingTimeIndex)?;
        let global_ids = match id_mode {
            NodeIdMode::Global => Some(
                telemetry
                    .node_names()
                    .into_iter()
                    .enumerate()
                    .map(|(id, name)| (name, id))
                    .collect(),
            ),
            NodeIdMode::PerSlice => None,
        };
        Ok(Self {
            telemetry,
            horizon_start,
            slice_duration_sec,
            polar_threshold_km,
            global_ids,
        })
    }

    fn representative_instant(&self, slice_id: usize) -> DateTime<Utc> {
        self.horizon_start
            + Duration::milliseconds((slice_id as f64 * self.slice_duration_sec * 1000.0).round() as i64)
    }

    /// Records matched to the representative instant, plus the instant the
    /// snapshot is labelled with (moved only when the fallback fires).
    fn select_records(&self, target: DateTime<Utc>) -> (Vec<&'a LinkRecord>, DateTime<Utc>) {
        let tolerance = Duration::milliseconds((MATCH_TOLERANCE_SEC * 1000.0) as i64);
        let matched: Vec<&LinkRecord> = self
            .telemetry
            .records()
            .iter()
            .filter(|r| {
                r.sample.timestamp >= target - tolerance && r.sample.timestamp <= target + tolerance
            })
            .collect();
        if !matched.is_empty() {
            return (matched, target);
        }

        // Tolerance miss: take every record stamped at the globally nearest
        // instant, accepted only within one slice duration of the target.
        let nearest = self
            .telemetry
            .records()
            .iter()
            .map(|r| r.sample.timestamp)
            .min_by_key(|t| (*t - target).num_milliseconds().abs());
        let nearest = match nearest {
            Some(t) => t,
            None => return (Vec::new(), target),
        };
        let skew_ms = (nearest - target).num_milliseconds().abs();
        if skew_ms > (self.slice_duration_sec * 1000.0) as i64 {
            return (Vec::new(), target);
        }

        let fallback: Vec<&LinkRecord> = self
            .telemetry
            .records()
            .iter()
            .filter(|r| r.sample.timestamp == nearest)
            .collect();
        (fallback, nearest)
    }

    /// Build the snapshot for one slice. An empty selection yields a
    /// zero-node snapshot; that is logged, not an error.
    pub fn build(&self, slice_id: usize) -> TopologySnapshot {
        let target = self.representative_instant(slice_id);
        let (records, representative) = self.select_records(target);

        let mut names: BTreeSet<&str> = BTreeSet::new();
        let mut planes: BTreeMap<&str, Option<u32>> = BTreeMap::new();
        let mut kept: Vec<&LinkRecord> = Vec::new();
        let mut polar_dropped = 0usize;

        for record in records {
            let sample = &record.sample;
            if sample.is_inter_plane() && sample.range_km < self.polar_threshold_km {
                // Polar blackout overrides any positive signal quality
                polar_dropped += 1;
                continue;
            }
            names.insert(&sample.src);
            names.insert(&sample.dst);
            planes.insert(&sample.src, sample.src_plane);
            planes.insert(&sample.dst, sample.dst_plane);
            kept.push(record);
        }

        // BTreeSet iteration is the lexicographic order the id scheme needs
        let local_ids: BTreeMap<&str, usize> = names
            .iter()
            .enumerate()
            .map(|(id, name)| (*name, id))
            .collect();
        let id_of = |name: &str| -> usize {
            match &self.global_ids {
                Some(map) => map[name],
                None => local_ids[name],
            }
        };

        let nodes: Vec<SnapshotNode> = names
            .iter()
            .map(|name| SnapshotNode {
                id: id_of(name),
                name: name.to_string(),
                plane_index: planes.get(name).copied().flatten(),
            })
            .collect();

        let edges: Vec<SnapshotEdge> = kept
            .iter()
            .map(|record| {
                let sample = &record.sample;
                let metrics = &record.metrics;
                SnapshotEdge {
                    src_id: id_of(&sample.src),
                    dst_id: id_of(&sample.dst),
                    src_name: sample.src.clone(),
                    dst_name: sample.dst.clone(),
                    latency_ms: metrics.latency_ms,
                    bandwidth_mbps: metrics.bandwidth_mbps,
                    packet_loss_rate: metrics.packet_loss_rate,
                    bit_error_rate: sample.bit_error_rate.unwrap_or(0.0),
                    distance_km: sample.range_km,
                }
            })
            .collect();

        if polar_dropped > 0 {
            debug!(
                "Slice {}: dropped {} polar-blacked-out inter-plane links",
                slice_id, polar_dropped
            );
        }
        if nodes.is_empty() {
            warn!(
                "Slice {}: no telemetry rows within reach of {}; emitting empty snapshot",
                slice_id, target
            );
        }

        TopologySnapshot {
            slice_id,
            representative_timestamp: representative,
            num_nodes: nodes.len(),
            num_edges: edges.len(),
            nodes,
            edges,
        }
    }

    /// Build a snapshot and record its statistics on the originating slice.
    pub fn build_into(
        &self,
        index: &mut crate::TimeSliceIndex,
        slice_id: usize,
    ) -> Result<TopologySnapshot> {
        let snapshot = self.build(slice_id);
        index.record_counts(slice_id, snapshot.num_nodes, snapshot.num_edges)?;
        Ok(snapshot)
    }
}
