//! Time-grid alignment of interval-bounded visibility telemetry.
//!
//! The link simulator reports disjoint continuous-visibility intervals per
//! link, each starting at its own offset. Sampling instants must land on a
//! single grid anchored at the global horizon origin, so that rows from
//! different links are comparable within one time slice.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// One continuous-visibility interval of a link.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VisibilityInterval {
    pub start: DateTime<Utc>,
    pub stop: DateTime<Utc>,
}

/// A link together with its visibility intervals, as reported by the
/// orbital simulator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkVisibility {
    pub src: String,
    pub dst: String,
    pub intervals: Vec<VisibilityInterval>,
}

/// A uniform sampling grid anchored at a global origin.
#[derive(Debug, Clone, Copy)]
pub struct GridSpec {
    pub origin: DateTime<Utc>,
    pub step_sec: f64,
}

impl GridSpec {
    pub fn new(origin: DateTime<Utc>, step_sec: f64) -> Self {
        Self { origin, step_sec }
    }

    /// Grid instants falling inside `interval`.
    ///
    /// The first instant is the grid point at or after the interval start,
    /// `origin + ceil(delta/step)*step`; an interval beginning before the
    /// origin starts at the origin itself. Instants run while they stay
    /// within `[start, stop]`.
    pub fn instants_within(&self, interval: &VisibilityInterval) -> Vec<DateTime<Utc>> {
        let mut instants = Vec::new();
        if self.step_sec <= 0.0 {
            return instants;
        }

        let delta_sec = (interval.start - self.origin).num_milliseconds() as f64 / 1000.0;
        let mut offset_sec = if delta_sec <= 0.0 {
            0.0
        } else {
            (delta_sec / self.step_sec).ceil() * self.step_sec
        };

        loop {
            let instant = self.origin + Duration::milliseconds((offset_sec * 1000.0).round() as i64);
            if instant > interval.stop {
                break;
            }
            if instant >= interval.start {
                instants.push(instant);
            }
            offset_sec += self.step_sec;
        }
        instants
    }
}
