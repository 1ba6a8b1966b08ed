//! Link Telemetry Library
//!
//! Ingestion and derivation for the per-ISL telemetry produced by the
//! orbital link simulator:
//!
//! - RawLinkSample / DerivedLinkMetrics data model
//! - Pure metric derivation (latency, admission-gated bandwidth, PLR)
//! - Time-grid alignment of interval-bounded visibility telemetry
//! - CSV ingestion with an explicit header schema map

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod derive;
pub mod grid;
pub mod ingest;
pub mod schema;

pub use derive::{DerivationConstants, DerivedLinkMetrics};
pub use grid::{GridSpec, LinkVisibility, VisibilityInterval};

/// Telemetry errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Missing required column {logical:?} (accepted spellings: {accepted:?})")]
    MissingColumn {
        logical: &'static str,
        accepted: &'static [&'static str],
    },
    #[error("No usable time column in the telemetry; a time index cannot be established")]
    MissingTimeIndex,
}

pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Parse the orbital-plane index out of a `<prefix>_<plane>_<index>` node name.
///
/// Returns None for names that do not follow the constellation convention
/// (ground stations, test fixtures).
pub fn plane_index(name: &str) -> Option<u32> {
    name.split('_').nth(1)?.parse().ok()
}

/// One telemetry row: a single (link, sampled instant) physical-layer sample.
/// Immutable once ingested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawLinkSample {
    pub timestamp: DateTime<Utc>,
    pub src: String,
    pub dst: String,
    /// Plane indices are resolved once here, at ingestion; downstream
    /// stages never re-parse them out of the display names.
    pub src_plane: Option<u32>,
    pub dst_plane: Option<u32>,
    pub range_km: f64,
    /// None when the simulator reported a non-numeric value.
    pub eb_no_db: Option<f64>,
    pub bit_error_rate: Option<f64>,
    pub nominal_data_rate_mbps: f64,
}

impl RawLinkSample {
    pub fn new(
        timestamp: DateTime<Utc>,
        src: impl Into<String>,
        dst: impl Into<String>,
        range_km: f64,
        eb_no_db: Option<f64>,
        bit_error_rate: Option<f64>,
        nominal_data_rate_mbps: f64,
    ) -> Self {
        let src = src.into();
        let dst = dst.into();
        let src_plane = plane_index(&src);
        let dst_plane = plane_index(&dst);
        Self {
            timestamp,
            src,
            dst,
            src_plane,
            dst_plane,
            range_km,
            eb_no_db,
            bit_error_rate,
            nominal_data_rate_mbps,
        }
    }

    /// True when both endpoints carry a plane index and the indices differ.
    pub fn is_inter_plane(&self) -> bool {
        matches!((self.src_plane, self.dst_plane), (Some(a), Some(b)) if a != b)
    }
}

/// A raw sample paired with its derived, never-mutated metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkRecord {
    pub sample: RawLinkSample,
    pub metrics: DerivedLinkMetrics,
}

/// The run-owned telemetry collection, immutable after construction.
#[derive(Debug, Clone)]
pub struct TelemetrySet {
    records: Vec<LinkRecord>,
    horizon_start: Option<DateTime<Utc>>,
    horizon_end: Option<DateTime<Utc>>,
    pub(crate) skipped_rows: usize,
}

impl TelemetrySet {
    /// Attach derived metrics to each sample and establish the time horizon
    /// from the min/max timestamps.
    pub fn from_samples(samples: Vec<RawLinkSample>, constants: &DerivationConstants) -> Self {
        let horizon_start = samples.iter().map(|s| s.timestamp).min();
        let horizon_end = samples.iter().map(|s| s.timestamp).max();
        let records = samples
            .into_iter()
            .map(|sample| {
                let metrics = derive::derive_metrics(&sample, constants);
                LinkRecord { sample, metrics }
            })
            .collect();
        Self {
            records,
            horizon_start,
            horizon_end,
            skipped_rows: 0,
        }
    }

    /// Build a telemetry set by probing a sampler on the alignment grid.
    ///
    /// This is the in-process seam to the orbital link simulator: the caller
    /// hands the per-link visibility intervals and a probe producing the raw
    /// sample for one link at one grid instant. Links with no intervals
    /// contribute nothing; a None from the probe drops that instant.
    pub fn from_sampler<F>(
        spec: &GridSpec,
        links: &[LinkVisibility],
        mut probe: F,
        constants: &DerivationConstants,
    ) -> Self
    where
        F: FnMut(&LinkVisibility, DateTime<Utc>) -> Option<RawLinkSample>,
    {
        let mut samples = Vec::new();
        for link in links {
            for interval in &link.intervals {
                for instant in spec.instants_within(interval) {
                    if let Some(sample) = probe(link, instant) {
                        samples.push(sample);
                    }
                }
            }
        }
        Self::from_samples(samples, constants)
    }

    pub fn records(&self) -> &[LinkRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn horizon_start(&self) -> Option<DateTime<Utc>> {
        self.horizon_start
    }

    pub fn horizon_end(&self) -> Option<DateTime<Utc>> {
        self.horizon_end
    }

    /// Horizon length in seconds; None before any timestamp was seen.
    pub fn total_duration_sec(&self) -> Option<f64> {
        match (self.horizon_start, self.horizon_end) {
            (Some(start), Some(end)) => {
                Some((end - start).num_milliseconds() as f64 / 1000.0)
            }
            _ => None,
        }
    }

    pub fn skipped_rows(&self) -> usize {
        self.skipped_rows
    }

    /// Sorted, deduplicated endpoint names across the whole set.
    pub fn node_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .records
            .iter()
            .flat_map(|r| [r.sample.src.clone(), r.sample.dst.clone()])
            .collect();
        names.sort();
        names.dedup();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_at(sec: i64, src: &str, dst: &str) -> RawLinkSample {
        let ts = Utc.with_ymd_and_hms(2025, 11, 22, 4, 0, 0).unwrap()
            + chrono::Duration::seconds(sec);
        RawLinkSample::new(ts, src, dst, 1000.0, Some(12.0), Some(1e-7), 50.0)
    }

    #[test]
    fn test_plane_index() {
        assert_eq!(plane_index("Sat_3_7"), Some(3));
        assert_eq!(plane_index("Sat_0_0"), Some(0));
        assert_eq!(plane_index("GroundStation"), None);
        assert_eq!(plane_index("Sat_x_1"), None);
    }

    #[test]
    fn test_inter_plane() {
        let sample = sample_at(0, "Sat_1_0", "Sat_2_0");
        assert!(sample.is_inter_plane());

        let sample = sample_at(0, "Sat_1_0", "Sat_1_1");
        assert!(!sample.is_inter_plane());

        // Unparsable endpoint never counts as inter-plane
        let sample = sample_at(0, "Sat_1_0", "Gateway");
        assert!(!sample.is_inter_plane());
    }

    #[test]
    fn test_horizon_from_samples() {
        let set = TelemetrySet::from_samples(
            vec![
                sample_at(300, "Sat_0_0", "Sat_0_1"),
                sample_at(0, "Sat_0_1", "Sat_0_2"),
                sample_at(600, "Sat_0_0", "Sat_1_0"),
            ],
            &DerivationConstants::default(),
        );
        assert_eq!(set.total_duration_sec(), Some(600.0));
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_empty_set_has_no_horizon() {
        let set = TelemetrySet::from_samples(vec![], &DerivationConstants::default());
        assert!(set.horizon_start().is_none());
        assert!(set.total_duration_sec().is_none());
    }

    #[test]
    fn test_from_sampler_grid_aligned() {
        let origin = Utc.with_ymd_and_hms(2025, 11, 22, 4, 0, 0).unwrap();
        let spec = GridSpec::new(origin, 300.0);
        let links = vec![
            LinkVisibility {
                src: "Sat_0_0".to_string(),
                dst: "Sat_0_1".to_string(),
                // Starts mid-step: snaps to 300s, 600s
                intervals: vec![VisibilityInterval {
                    start: origin + chrono::Duration::seconds(120),
                    stop: origin + chrono::Duration::seconds(700),
                }],
            },
            // Never visible: absent from the set entirely
            LinkVisibility {
                src: "Sat_0_1".to_string(),
                dst: "Sat_1_1".to_string(),
                intervals: vec![],
            },
        ];

        let set = TelemetrySet::from_sampler(
            &spec,
            &links,
            |link, instant| {
                Some(RawLinkSample::new(
                    instant,
                    link.src.clone(),
                    link.dst.clone(),
                    1000.0,
                    Some(12.0),
                    Some(1e-7),
                    50.0,
                ))
            },
            &DerivationConstants::default(),
        );

        assert_eq!(set.len(), 2);
        let offsets: Vec<i64> = set
            .records()
            .iter()
            .map(|r| (r.sample.timestamp - origin).num_seconds())
            .collect();
        assert_eq!(offsets, vec![300, 600]);
        assert!(!set.node_names().contains(&"Sat_1_1".to_string()));
    }

    #[test]
    fn test_node_names_sorted_unique() {
        let set = TelemetrySet::from_samples(
            vec![
                sample_at(0, "Sat_1_0", "Sat_0_0"),
                sample_at(0, "Sat_0_0", "Sat_0_1"),
            ],
            &DerivationConstants::default(),
        );
        assert_eq!(set.node_names(), vec!["Sat_0_0", "Sat_0_1", "Sat_1_0"]);
    }
}
