//! Header schema for the collaborator's link-status table.
//!
//! Column resolution is an explicit mapping from logical field to the
//! accepted raw header spellings, validated once against the header row.
//! Some export tools decorate headers with a parenthesised suffix
//! (`Range_km（距离）`), so a spelling also matches when the raw header
//! starts with it followed by an opening parenthesis.

use crate::{Result, TelemetryError};
use chrono::{DateTime, NaiveDateTime, Utc};
use csv::StringRecord;

/// Accepted spellings per logical field.
pub const TIME: &[&str] = &["TimeString"];
pub const SRC: &[&str] = &["Src"];
pub const DST: &[&str] = &["Dst"];
pub const RANGE_KM: &[&str] = &["Range_km", "Range"];
pub const EB_NO_DB: &[&str] = &["EbNo_dB", "Eb/No"];
pub const BER: &[&str] = &["BER"];
/// The nominal (pre-gate) data rate; older exports label the column with
/// the gated name.
pub const DATA_RATE_MBPS: &[&str] = &["DataRate_Mbps", "Bandwidth_Mbps"];

/// Resolved column indices for one input file.
#[derive(Debug, Clone, Copy)]
pub struct ColumnMap {
    pub time: usize,
    pub src: usize,
    pub dst: usize,
    pub range_km: usize,
    pub eb_no_db: usize,
    pub ber: usize,
    pub data_rate_mbps: usize,
}

/// Strip a UTF-8 BOM and any decorative parenthesised suffix.
fn normalize(header: &str) -> &str {
    let header = header.trim_start_matches('\u{feff}').trim();
    match header.find(|c: char| c == '（' || c == '(') {
        Some(pos) => header[..pos].trim_end(),
        None => header,
    }
}

fn locate(headers: &StringRecord, accepted: &'static [&'static str]) -> Option<usize> {
    headers.iter().position(|h| accepted.contains(&normalize(h)))
}

/// Resolve every required column or fail naming the first missing one.
/// A missing time column is the fatal missing-time-index condition.
pub fn resolve_columns(headers: &StringRecord) -> Result<ColumnMap> {
    let time = locate(headers, TIME).ok_or(TelemetryError::MissingTimeIndex)?;
    let src = locate(headers, SRC).ok_or(TelemetryError::MissingColumn {
        logical: "src",
        accepted: SRC,
    })?;
    let dst = locate(headers, DST).ok_or(TelemetryError::MissingColumn {
        logical: "dst",
        accepted: DST,
    })?;
    let range_km = locate(headers, RANGE_KM).ok_or(TelemetryError::MissingColumn {
        logical: "range_km",
        accepted: RANGE_KM,
    })?;
    let eb_no_db = locate(headers, EB_NO_DB).ok_or(TelemetryError::MissingColumn {
        logical: "eb_no_db",
        accepted: EB_NO_DB,
    })?;
    let ber = locate(headers, BER).ok_or(TelemetryError::MissingColumn {
        logical: "bit_error_rate",
        accepted: BER,
    })?;
    let data_rate_mbps = locate(headers, DATA_RATE_MBPS).ok_or(TelemetryError::MissingColumn {
        logical: "nominal_data_rate_mbps",
        accepted: DATA_RATE_MBPS,
    })?;

    Ok(ColumnMap {
        time,
        src,
        dst,
        range_km,
        eb_no_db,
        ber,
        data_rate_mbps,
    })
}

/// STK-style timestamp formats, most specific first.
const TIME_FORMATS: &[&str] = &[
    "%d %b %Y %H:%M:%S%.f",
    "%d %b %Y %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
];

/// Parse one timestamp field; None marks the row malformed.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| DateTime::from_naive_utc_and_offset(naive, Utc))
}
