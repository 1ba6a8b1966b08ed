//! Link-metric derivation from raw physical samples.
//!
//! Pure transformations, no IO and no state. The admission gate is binary:
//! any negative link margin forces the sample's capacity to zero, however
//! small the deficit.

use crate::RawLinkSample;
use serde::{Deserialize, Serialize};

/// Speed of light in km/s.
pub const LIGHT_SPEED_KM_S: f64 = 299_792.458;

/// Substitute Eb/No for missing or non-numeric samples. Guarantees a
/// negative margin, so the admission gate closes the link.
pub const FAILSAFE_EB_NO_DB: f64 = -999.0;

/// Physical constants for the derivation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct DerivationConstants {
    /// Packet size in bits for the BER to packet-loss conversion.
    pub packet_size_bits: u32,
    /// Required Eb/No threshold in dB (QPSK at target BER 1e-6).
    pub required_eb_no_db: f64,
}

impl Default for DerivationConstants {
    fn default() -> Self {
        Self {
            packet_size_bits: 1024 * 8,
            required_eb_no_db: 10.6,
        }
    }
}

/// Simulation-ready metrics attached to one raw sample. Computed once,
/// never mutated afterward.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DerivedLinkMetrics {
    pub latency_ms: f64,
    pub link_margin_db: f64,
    pub bandwidth_mbps: f64,
    pub packet_loss_rate: f64,
}

/// Derive the full metric set for one sample.
pub fn derive_metrics(sample: &RawLinkSample, constants: &DerivationConstants) -> DerivedLinkMetrics {
    let latency_ms = sample.range_km / LIGHT_SPEED_KM_S * 1000.0;

    let eb_no_db = sample
        .eb_no_db
        .filter(|v| v.is_finite())
        .unwrap_or(FAILSAFE_EB_NO_DB);
    let link_margin_db = eb_no_db - constants.required_eb_no_db;

    let bandwidth_mbps = if link_margin_db >= 0.0 {
        sample.nominal_data_rate_mbps
    } else {
        0.0
    };

    DerivedLinkMetrics {
        latency_ms,
        link_margin_db,
        bandwidth_mbps,
        packet_loss_rate: packet_loss_rate(sample.bit_error_rate, constants.packet_size_bits),
    }
}

/// Convert a bit-error rate into a whole-packet loss probability:
/// `1 - (1 - BER)^P`, clamped into [0, 1].
///
/// A missing or invalid BER is treated as fully lossy, not unknown.
pub fn packet_loss_rate(ber: Option<f64>, packet_size_bits: u32) -> f64 {
    match ber {
        Some(b) if b.is_finite() && (0.0..=1.0).contains(&b) => {
            (1.0 - (1.0 - b).powi(packet_size_bits as i32)).clamp(0.0, 1.0)
        }
        _ => 1.0,
    }
}
