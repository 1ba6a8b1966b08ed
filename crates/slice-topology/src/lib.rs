//! Slice Topology - time-sliced constellation snapshots
//!
//! Partitions the simulation horizon into fixed-duration slices and builds
//! one discrete network-topology snapshot per slice from grid-aligned link
//! telemetry:
//!
//! - Contiguous slice partition with write-once per-slice statistics
//! - Tolerance-window row matching with a nearest-instant fallback
//! - Polar-blackout rule for inter-plane links
//! - Deterministic node-id assignment (per-slice or run-global)
//! - Connectivity analysis of built snapshots

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod snapshot;

pub use snapshot::{
    connected_components, NodeIdMode, SnapshotBuilder, SnapshotEdge, SnapshotNode,
    TopologySnapshot, DEFAULT_POLAR_THRESHOLD_KM,
};

/// Slice errors
#[derive(Error, Debug)]
pub enum SliceError {
    #[error("No time index established; the telemetry contained no usable timestamps")]
    MissingTimeIndex,
    #[error("Slice {0} is out of range (partition holds {1} slices)")]
    SliceOutOfRange(usize, usize),
}

pub type Result<T> = std::result::Result<T, SliceError>;

/// One fixed-duration window of the simulation horizon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSlice {
    pub slice_id: usize,
    pub start_offset_sec: f64,
    pub end_offset_sec: f64,
    pub duration_sec: f64,
    /// Write-once statistics filled after the snapshot is built. A slice
    /// that is never built keeps zeros; that is a valid state, not an error.
    pub node_count: usize,
    pub edge_count: usize,
}

/// Contiguous, non-overlapping partition of `[0, total_duration]`.
#[derive(Debug, Clone)]
pub struct TimeSliceIndex {
    slices: Vec<TimeSlice>,
    slice_duration_sec: f64,
}

impl TimeSliceIndex {
    /// Partition the horizon into `ceil(total/duration)` slices. At least
    /// one slice is always produced; the last one may be shorter than
    /// `slice_duration_sec`.
    pub fn partition(total_duration_sec: f64, slice_duration_sec: f64) -> Self {
        let total = total_duration_sec.max(0.0);
        // A non-positive step degenerates to a single full-horizon slice
        let count = if slice_duration_sec > 0.0 {
            ((total / slice_duration_sec).ceil() as usize).max(1)
        } else {
            1
        };
        let step = if slice_duration_sec > 0.0 {
            slice_duration_sec
        } else {
            total
        };

        let mut slices = Vec::with_capacity(count);
        for i in 0..count {
            let start = i as f64 * step;
            let end = ((i + 1) as f64 * step).min(total);
            slices.push(TimeSlice {
                slice_id: i,
                start_offset_sec: start,
                end_offset_sec: end,
                duration_sec: end - start,
                node_count: 0,
                edge_count: 0,
            });
        }
        Self {
            slices,
            slice_duration_sec: step,
        }
    }

    pub fn len(&self) -> usize {
        self.slices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }

    pub fn slice_duration_sec(&self) -> f64 {
        self.slice_duration_sec
    }

    pub fn slices(&self) -> &[TimeSlice] {
        &self.slices
    }

    pub fn get(&self, slice_id: usize) -> Option<&TimeSlice> {
        self.slices.get(slice_id)
    }

    /// The single permitted mutation: record a built snapshot's statistics
    /// on its originating slice.
    pub fn record_counts(
        &mut self,
        slice_id: usize,
        node_count: usize,
        edge_count: usize,
    ) -> Result<()> {
        let len = self.slices.len();
        let slice = self
            .slices
            .get_mut(slice_id)
            .ok_or(SliceError::SliceOutOfRange(slice_id, len))?;
        slice.node_count = node_count;
        slice.edge_count = edge_count;
        Ok(())
    }
}
