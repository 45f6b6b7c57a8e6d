// 📊 Query Layer - the two aggregate reports over the history table
//
// Failures here never abort a cycle: they come back as an empty
// `QueryOutcome` carrying the error.

use crate::db::{record_from_row, Database, GdpRecord, GDP_TABLE};
use crate::error::{EtlError, EtlResult};
use rusqlite::{params, Connection};
use std::fmt;

/// Threshold used by the cycle report, in billions of US$
pub const GDP_THRESHOLD_BILLION: f64 = 100.0;

/// Countries per region that feed the regional average
pub const TOP_N_PER_REGION: usize = 5;

// ============================================================================
// RESULT TYPES
// ============================================================================

/// Rows of a query, or no rows plus the error that was swallowed
#[derive(Debug)]
pub struct QueryOutcome<T> {
    pub rows: Vec<T>,
    pub error: Option<EtlError>,
}

impl<T> QueryOutcome<T> {
    fn from_result(name: &str, result: EtlResult<Vec<T>>) -> Self {
        match result {
            Ok(rows) => QueryOutcome { rows, error: None },
            Err(e) => {
                tracing::error!("{} query failed: {}", name, e);
                QueryOutcome {
                    rows: Vec::new(),
                    error: Some(e),
                }
            }
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegionAverage {
    pub region: String,
    pub average_gdp_usd_billion: f64,
}

impl fmt::Display for RegionAverage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {})",
            crate::db::quote_str(&self.region),
            crate::db::format_number(self.average_gdp_usd_billion)
        )
    }
}

// ============================================================================
// QUERIES
// ============================================================================

/// Every stored row (all runs, duplicates included) with GDP >= `threshold`
pub fn records_over(db: &Database, threshold: f64) -> QueryOutcome<GdpRecord> {
    let result = db
        .open_read_only()
        .and_then(|conn| query_records_over(&conn, threshold))
        .map_err(EtlError::Query);

    QueryOutcome::from_result("threshold", result)
}

/// Average GDP of the top `n` ranked rows per region.
///
/// Ranking uses `RANK()`, so tied values share a rank and a region can
/// contribute more than `n` rows.
pub fn top_average_by_region(db: &Database, n: usize) -> QueryOutcome<RegionAverage> {
    let result = db
        .open_read_only()
        .and_then(|conn| query_top_average(&conn, n))
        .map_err(EtlError::Query);

    QueryOutcome::from_result("regional average", result)
}

pub fn query_records_over(conn: &Connection, threshold: f64) -> rusqlite::Result<Vec<GdpRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT Country, GDP_USD_billion, Extracion_Date, Region
         FROM {}
         WHERE GDP_USD_billion >= ?1",
        GDP_TABLE
    ))?;

    let rows = stmt
        .query_map(params![threshold], record_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(rows)
}

pub fn query_top_average(conn: &Connection, n: usize) -> rusqlite::Result<Vec<RegionAverage>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT Region, ROUND(AVG(GDP_USD_billion), 2)
         FROM (
             SELECT Region, GDP_USD_billion,
                    RANK() OVER (PARTITION BY Region ORDER BY GDP_USD_billion DESC) AS RANKING
             FROM {}
         )
         WHERE RANKING <= ?1 AND Region IS NOT NULL
         GROUP BY Region
         ORDER BY Region",
        GDP_TABLE
    ))?;

    let rows = stmt
        .query_map(params![n as i64], |row| {
            Ok(RegionAverage {
                region: row.get(0)?,
                average_gdp_usd_billion: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(rows)
}

// ============================================================================
// TESTS
// ============================================================================
