// 🔄 Transformer - drop the aggregate row, sort, timestamp, join regions

use crate::db::GdpRecord;
use crate::error::EtlResult;
use crate::extract::ExtractedRow;
use crate::region::RegionMap;
use chrono::NaiveDateTime;
use std::path::Path;

/// Format of `Extracion_Date`, e.g. `2024-Jul-01 14:00`
pub const EXTRACTION_TIMESTAMP_FORMAT: &str = "%Y-%b-%d %H:%M";

/// Aggregate row of the source table, not a country
pub const AGGREGATE_ROW: &str = "World";

/// Load the region file and enrich the extracted rows with it
pub fn transform(
    rows: Vec<ExtractedRow>,
    region_file: &Path,
    extracted_at: NaiveDateTime,
) -> EtlResult<Vec<GdpRecord>> {
    tracing::info!("Data transformation started");

    let regions = RegionMap::from_file(region_file)?;
    let records = enrich(rows, &regions, extracted_at);

    tracing::info!("Data transformation completed");
    Ok(records)
}

/// Pure part of the transform.
///
/// Output is sorted by GDP descending (stable, so ties keep source order),
/// every record carries the same timestamp, and unmapped countries get
/// region `"Other"`.
pub fn enrich(rows: Vec<ExtractedRow>, regions: &RegionMap, extracted_at: NaiveDateTime) -> Vec<GdpRecord> {
    let timestamp = extracted_at.format(EXTRACTION_TIMESTAMP_FORMAT).to_string();

    let mut rows: Vec<ExtractedRow> = rows
        .into_iter()
        .filter(|row| row.country.trim() != AGGREGATE_ROW)
        .collect();
    rows.sort_by(|a, b| b.gdp_usd_billion.total_cmp(&a.gdp_usd_billion));

    rows.into_iter()
        .map(|row| {
            let region = regions.region_for(&row.country).to_string();
            GdpRecord {
                country: row.country,
                gdp_usd_billion: row.gdp_usd_billion,
                extraction_timestamp: timestamp.clone(),
                region,
            }
        })
        .collect()
}
