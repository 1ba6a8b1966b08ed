//! Export formatting for the packet-level simulator.
//!
//! Writes one run's artifact set under a single output directory:
//!
//! - `time_slices.csv` - the slice table
//! - `link_params_slice_<id>.csv` / `topology_slice_<id>.json` - per slice
//! - `traffic_demands.csv` - the demand table
//! - `node_mapping.csv` - snapshot 0's id/name table, the de facto global
//!   naming reference for downstream consumers
//! - `ip_to_satellite.json` - synthetic per-link address map over snapshot
//!   0's edges (an addressing convenience, not a routable plan)
//!
//! Node ids referenced by edges and demands always exist in the node table
//! of the snapshot they were built from, and slice ids match across files.

use serde::Serialize;
use slice_topology::{TimeSlice, TopologySnapshot};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;
use traffic_synth::TrafficDemand;

/// Export errors
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ExportError>;

/// Row of `link_params_slice_<id>.csv`, matching the downstream reader's
/// expectations (integral bits-per-second, rounded delay and distance).
#[derive(Debug, Serialize)]
struct LinkParamRow<'a> {
    src_id: usize,
    dst_id: usize,
    src_name: &'a str,
    dst_name: &'a str,
    delay_ms: f64,
    data_rate_bps: u64,
    packet_loss_rate: f64,
    ber: f64,
    distance_km: f64,
    timestamp: &'a str,
}

/// Row of `node_mapping.csv`.
#[derive(Debug, Serialize)]
struct NodeRow<'a> {
    id: usize,
    name: &'a str,
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Writer for one run's artifact directory.
pub struct Exporter {
    output_dir: PathBuf,
}

impl Exporter {
    /// Creates the output directory if it does not exist yet.
    pub fn new(output_dir: impl Into<PathBuf>) -> Result<Self> {
        let output_dir = output_dir.into();
        fs::create_dir_all(&output_dir)?;
        Ok(Self { output_dir })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn path(&self, name: &str) -> PathBuf {
        self.output_dir.join(name)
    }

    pub fn write_time_slices(&self, slices: &[TimeSlice]) -> Result<PathBuf> {
        let path = self.path("time_slices.csv");
        let mut writer = csv::Writer::from_path(&path)?;
        for slice in slices {
            writer.serialize(slice)?;
        }
        writer.flush()?;
        Ok(path)
    }

    /// Write one slice's edge list (tabular) and full snapshot (structured).
    pub fn write_snapshot(&self, snapshot: &TopologySnapshot) -> Result<()> {
        let csv_path = self.path(&format!("link_params_slice_{}.csv", snapshot.slice_id));
        let mut writer = csv::Writer::from_path(&csv_path)?;
        let timestamp = snapshot
            .representative_timestamp
            .format("%Y-%m-%d %H:%M:%S")
            .to_string();
        for edge in &snapshot.edges {
            writer.serialize(LinkParamRow {
                src_id: edge.src_id,
                dst_id: edge.dst_id,
                src_name: &edge.src_name,
                dst_name: &edge.dst_name,
                delay_ms: round_to(edge.latency_ms, 4),
                data_rate_bps: (edge.bandwidth_mbps * 1e6) as u64,
                packet_loss_rate: edge.packet_loss_rate,
                ber: edge.bit_error_rate,
                distance_km: round_to(edge.distance_km, 2),
                timestamp: &timestamp,
            })?;
        }
        writer.flush()?;

        let json_path = self.path(&format!("topology_slice_{}.json", snapshot.slice_id));
        let file = File::create(&json_path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), snapshot)?;
        Ok(())
    }

    pub fn write_traffic_demands(&self, demands: &[TrafficDemand]) -> Result<PathBuf> {
        let path = self.path("traffic_demands.csv");
        let mut writer = csv::Writer::from_path(&path)?;
        for demand in demands {
            writer.serialize(demand)?;
        }
        writer.flush()?;
        Ok(path)
    }

    /// Snapshot 0's node table, used downstream as the run-wide reference.
    pub fn write_node_mapping(&self, snapshot: &TopologySnapshot) -> Result<PathBuf> {
        let path = self.path("node_mapping.csv");
        let mut writer = csv::Writer::from_path(&path)?;
        for node in &snapshot.nodes {
            writer.serialize(NodeRow {
                id: node.id,
                name: &node.name,
            })?;
        }
        writer.flush()?;
        Ok(path)
    }

    /// Sequential `10.0.<edge-index>.1/.2` addresses over snapshot 0's edges.
    pub fn write_ip_mapping(&self, snapshot: &TopologySnapshot) -> Result<PathBuf> {
        let mut mapping: BTreeMap<String, String> = BTreeMap::new();
        for (index, edge) in snapshot.edges.iter().enumerate() {
            mapping.insert(format!("10.0.{}.1", index), edge.src_name.clone());
            mapping.insert(format!("10.0.{}.2", index), edge.dst_name.clone());
        }

        let path = self.path("ip_to_satellite.json");
        let file = File::create(&path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), &mapping)?;
        Ok(path)
    }

    /// Write every artifact of one run.
    pub fn export_run(
        &self,
        slices: &[TimeSlice],
        snapshots: &[TopologySnapshot],
        demands: &[TrafficDemand],
    ) -> Result<()> {
        self.write_time_slices(slices)?;
        for snapshot in snapshots {
            self.write_snapshot(snapshot)?;
        }
        self.write_traffic_demands(demands)?;
        if let Some(first) = snapshots.first() {
            self.write_node_mapping(first)?;
            self.write_ip_mapping(first)?;
        }
        info!(
            "Exported {} slices and {} demands to {:?}",
            snapshots.len(),
            demands.len(),
            self.output_dir
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use slice_topology::{SnapshotEdge, SnapshotNode};

    fn test_snapshot() -> TopologySnapshot {
        TopologySnapshot {
            slice_id: 0,
            representative_timestamp: Utc.with_ymd_and_hms(2025, 11, 22, 4, 0, 0).unwrap(),
            num_nodes: 3,
            num_edges: 2,
            nodes: vec![
                SnapshotNode {
                    id: 0,
                    name: "Sat_0_0".to_string(),
                    plane_index: Some(0),
                },
                SnapshotNode {
                    id: 1,
                    name: "Sat_0_1".to_string(),
                    plane_index: Some(0),
                },
                SnapshotNode {
                    id: 2,
                    name: "Sat_1_0".to_string(),
                    plane_index: Some(1),
                },
            ],
            edges: vec![
                SnapshotEdge {
                    src_id: 0,
                    dst_id: 1,
                    src_name: "Sat_0_0".to_string(),
                    dst_name: "Sat_0_1".to_string(),
                    latency_ms: 3.335640952,
                    bandwidth_mbps: 50.0,
                    packet_loss_rate: 0.00813,
                    bit_error_rate: 1e-6,
                    distance_km: 1000.004,
                },
                SnapshotEdge {
                    src_id: 0,
                    dst_id: 2,
                    src_name: "Sat_0_0".to_string(),
                    dst_name: "Sat_1_0".to_string(),
                    latency_ms: 11.67,
                    bandwidth_mbps: 0.0,
                    packet_loss_rate: 1.0,
                    bit_error_rate: 0.0,
                    distance_km: 3500.0,
                },
            ],
        }
    }

    fn test_slices() -> Vec<TimeSlice> {
        vec![
            TimeSlice {
                slice_id: 0,
                start_offset_sec: 0.0,
                end_offset_sec: 300.0,
                duration_sec: 300.0,
                node_count: 3,
                edge_count: 2,
            },
            TimeSlice {
                slice_id: 1,
                start_offset_sec: 300.0,
                end_offset_sec: 400.0,
                duration_sec: 100.0,
                node_count: 0,
                edge_count: 0,
            },
        ]
    }

    fn test_demands() -> Vec<TrafficDemand> {
        vec![TrafficDemand {
            demand_id: 0,
            src_id: 0,
            dst_id: 2,
            src_name: "Sat_0_0".to_string(),
            dst_name: "Sat_1_0".to_string(),
            rate_mbps: 31.5,
            start_offset_sec: 1.0,
            duration_sec: 8.0,
        }]
    }

    #[test]
    fn test_time_slices_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = Exporter::new(dir.path()).unwrap();
        let path = exporter.write_time_slices(&test_slices()).unwrap();

        let mut reader = csv::Reader::from_path(path).unwrap();
        let rows: Vec<TimeSlice> = reader.deserialize().map(|r| r.unwrap()).collect();
        assert_eq!(rows, test_slices());
    }

    #[test]
    fn test_link_params_rounding_and_units() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = Exporter::new(dir.path()).unwrap();
        exporter.write_snapshot(&test_snapshot()).unwrap();

        let content =
            fs::read_to_string(dir.path().join("link_params_slice_0.csv")).unwrap();
        let mut lines = content.lines();
        assert_eq!(
            lines.next().unwrap(),
            "src_id,dst_id,src_name,dst_name,delay_ms,data_rate_bps,packet_loss_rate,ber,distance_km,timestamp"
        );
        let first = lines.next().unwrap();
        // delay to 4 decimals, rate in bps, distance to 2 decimals
        assert!(first.contains("3.3356"));
        assert!(first.contains("50000000"));
        assert!(first.contains("1000"));
        assert!(first.contains("2025-11-22 04:00:00"));
    }

    #[test]
    fn test_topology_json_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = Exporter::new(dir.path()).unwrap();
        exporter.write_snapshot(&test_snapshot()).unwrap();

        let content =
            fs::read_to_string(dir.path().join("topology_slice_0.json")).unwrap();
        let parsed: TopologySnapshot = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed.num_nodes, 3);
        assert_eq!(parsed.num_edges, 2);
        assert_eq!(parsed.nodes[2].name, "Sat_1_0");
    }

    #[test]
    fn test_ip_mapping_sequential() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = Exporter::new(dir.path()).unwrap();
        exporter.write_ip_mapping(&test_snapshot()).unwrap();

        let content =
            fs::read_to_string(dir.path().join("ip_to_satellite.json")).unwrap();
        let mapping: BTreeMap<String, String> = serde_json::from_str(&content).unwrap();
        assert_eq!(mapping["10.0.0.1"], "Sat_0_0");
        assert_eq!(mapping["10.0.0.2"], "Sat_0_1");
        assert_eq!(mapping["10.0.1.1"], "Sat_0_0");
        assert_eq!(mapping["10.0.1.2"], "Sat_1_0");
    }

    #[test]
    fn test_export_run_is_consistent() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = Exporter::new(dir.path()).unwrap();
        exporter
            .export_run(&test_slices(), &[test_snapshot()], &test_demands())
            .unwrap();

        for name in [
            "time_slices.csv",
            "link_params_slice_0.csv",
            "topology_slice_0.json",
            "traffic_demands.csv",
            "node_mapping.csv",
            "ip_to_satellite.json",
        ] {
            assert!(dir.path().join(name).exists(), "missing artifact {name}");
        }

        // Every id referenced by edges and demands exists in the node table
        let mut reader = csv::Reader::from_path(dir.path().join("node_mapping.csv")).unwrap();
        let node_ids: Vec<usize> = reader
            .records()
            .map(|r| r.unwrap()[0].parse().unwrap())
            .collect();
        let snapshot = test_snapshot();
        for edge in &snapshot.edges {
            assert!(node_ids.contains(&edge.src_id));
            assert!(node_ids.contains(&edge.dst_id));
        }
        for demand in &test_demands() {
            assert!(node_ids.contains(&demand.src_id));
            assert!(node_ids.contains(&demand.dst_id));
        }
    }
}
