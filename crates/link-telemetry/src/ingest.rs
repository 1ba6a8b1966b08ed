//! CSV ingestion of the link-status table.
//!
//! Rows missing an endpoint or carrying an unparsable timestamp are skipped
//! and counted, never fatal. Non-numeric physical readings are absorbed by
//! the fail-safe coercions in the deriver.

use crate::schema::{self, ColumnMap};
use crate::{DerivationConstants, RawLinkSample, Result, TelemetrySet};
use csv::StringRecord;
use std::path::Path;
use tracing::{info, warn};

/// Load the link-status CSV and derive metrics for every usable row.
pub fn load_link_status(
    path: impl AsRef<Path>,
    constants: &DerivationConstants,
) -> Result<TelemetrySet> {
    let path = path.as_ref();
    info!("Loading link telemetry from {:?}", path);

    let mut reader = csv::Reader::from_path(path)?;
    let columns = schema::resolve_columns(reader.headers()?)?;

    let mut samples = Vec::new();
    let mut skipped = 0usize;
    for record in reader.records() {
        let record = record?;
        match parse_row(&record, &columns) {
            Some(sample) => samples.push(sample),
            None => skipped += 1,
        }
    }
    if skipped > 0 {
        warn!("Skipped {} malformed telemetry rows", skipped);
    }

    let mut set = TelemetrySet::from_samples(samples, constants);
    set.skipped_rows = skipped;
    info!(
        "Ingested {} link records spanning {:.1}s",
        set.len(),
        set.total_duration_sec().unwrap_or(0.0)
    );
    Ok(set)
}

fn parse_f64(field: Option<&str>) -> Option<f64> {
    field.and_then(|v| v.trim().parse::<f64>().ok())
}

fn parse_row(record: &StringRecord, columns: &ColumnMap) -> Option<RawLinkSample> {
    let timestamp = schema::parse_timestamp(record.get(columns.time)?)?;
    let src = record.get(columns.src)?.trim();
    let dst = record.get(columns.dst)?.trim();
    if src.is_empty() || dst.is_empty() {
        return None;
    }

    // Physical readings degrade, they do not abort: the deriver treats a
    // missing Eb/No or BER as worst-case.
    let range_km = parse_f64(record.get(columns.range_km)).unwrap_or(1000.0);
    let eb_no_db = parse_f64(record.get(columns.eb_no_db));
    let bit_error_rate = parse_f64(record.get(columns.ber));
    let nominal_data_rate_mbps = parse_f64(record.get(columns.data_rate_mbps)).unwrap_or(0.0);

    Some(RawLinkSample::new(
        timestamp,
        src,
        dst,
        range_km,
        eb_no_db,
        bit_error_rate,
        nominal_data_rate_mbps,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const HEADER: &str =
        "TimeString,Src,Dst,Latency_ms,Bandwidth_Mbps,Packet_Loss_Rate,Real_LinkMargin_dB,EbNo_dB,Range_km,BER";

    fn write_csv(rows: &[&str]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{}", HEADER).unwrap();
        for row in rows {
            writeln!(file, "{}", row).unwrap();
        }
        file
    }

    #[test]
    fn test_load_and_derive() {
        let file = write_csv(&[
            "22 Nov 2025 04:00:00.000,Sat_0_0,Sat_0_1,3.34,50.0,0.0,1.4,12.0,1000.0,1e-7",
            "22 Nov 2025 04:05:00.000,Sat_0_0,Sat_0_1,3.34,0.0,1.0,-2.6,8.0,1000.0,1e-4",
        ]);

        let set = load_link_status(file.path(), &DerivationConstants::default()).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.skipped_rows(), 0);
        assert_eq!(set.total_duration_sec(), Some(300.0));

        // Gate open on the first row, closed on the second
        assert_eq!(set.records()[0].metrics.bandwidth_mbps, 50.0);
        assert_eq!(set.records()[1].metrics.bandwidth_mbps, 0.0);
    }

    #[test]
    fn test_malformed_rows_skipped_not_fatal() {
        let file = write_csv(&[
            "22 Nov 2025 04:00:00.000,Sat_0_0,Sat_0_1,3.34,50.0,0.0,1.4,12.0,1000.0,1e-7",
            "22 Nov 2025 04:00:00.000,,Sat_0_1,3.34,50.0,0.0,1.4,12.0,1000.0,1e-7",
            "garbage,Sat_0_0,Sat_0_1,3.34,50.0,0.0,1.4,12.0,1000.0,1e-7",
        ]);

        let set = load_link_status(file.path(), &DerivationConstants::default()).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.skipped_rows(), 2);
    }

    #[test]
    fn test_non_numeric_physicals_absorbed() {
        let file = write_csv(&[
            "22 Nov 2025 04:00:00.000,Sat_0_0,Sat_0_1,3.34,50.0,0.0,1.4,N/A,1000.0,N/A",
        ]);

        let set = load_link_status(file.path(), &DerivationConstants::default()).unwrap();
        assert_eq!(set.len(), 1);
        let record = &set.records()[0];
        assert!(record.sample.eb_no_db.is_none());
        // Fail-safe: closed gate, fully lossy
        assert_eq!(record.metrics.bandwidth_mbps, 0.0);
        assert_eq!(record.metrics.packet_loss_rate, 1.0);
    }

    #[test]
    fn test_missing_time_column_aborts() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "Src,Dst,Range_km,EbNo_dB,BER,DataRate_Mbps").unwrap();
        writeln!(file, "Sat_0_0,Sat_0_1,1000.0,12.0,1e-7,50.0").unwrap();

        let result = load_link_status(file.path(), &DerivationConstants::default());
        assert!(matches!(
            result,
            Err(crate::TelemetryError::MissingTimeIndex)
        ));
    }

    #[test]
    fn test_plane_attribute_populated_at_ingestion() {
        let file = write_csv(&[
            "22 Nov 2025 04:00:00.000,Sat_2_5,Sat_3_5,3.34,50.0,0.0,1.4,12.0,1500.0,1e-7",
        ]);

        let set = load_link_status(file.path(), &DerivationConstants::default()).unwrap();
        let sample = &set.records()[0].sample;
        assert_eq!(sample.src_plane, Some(2));
        assert_eq!(sample.dst_plane, Some(3));
        assert!(sample.is_inter_plane());
    }
}
