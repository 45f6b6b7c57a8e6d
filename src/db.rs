use crate::error::EtlResult;
use crate::region::UNMAPPED_REGION;
use rusqlite::{params, Connection, OpenFlags};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Historical table; every pipeline run appends to it
pub const GDP_TABLE: &str = "Total_Countries_by_GDP";

/// One country's GDP as captured by one pipeline run.
///
/// Field names on the wire (JSON snapshot and SQL columns) are kept as the
/// historical data has them, `Extracion_Date` included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GdpRecord {
    #[serde(rename = "Country")]
    pub country: String,

    #[serde(rename = "GDP_USD_billion")]
    pub gdp_usd_billion: f64,

    /// Shared by every record of the same run
    #[serde(rename = "Extracion_Date")]
    pub extraction_timestamp: String,

    #[serde(rename = "Region")]
    pub region: String,
}

impl GdpRecord {
    pub fn new(country: &str, gdp_usd_billion: f64, extraction_timestamp: &str, region: &str) -> Self {
        GdpRecord {
            country: country.to_string(),
            gdp_usd_billion,
            extraction_timestamp: extraction_timestamp.to_string(),
            region: region.to_string(),
        }
    }
}

/// Tuple-style rendering used in the cycle report:
/// `('United States', 28781.08, '2024-Jul-01 14:00', 'North America')`
impl fmt::Display for GdpRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {}, {})",
            quote_str(&self.country),
            format_number(self.gdp_usd_billion),
            quote_str(&self.extraction_timestamp),
            quote_str(&self.region)
        )
    }
}

/// Quote a string the way Python's `repr` does: single quotes, unless the
/// text holds a `'` and no `"` (`"Côte d'Ivoire"`)
pub(crate) fn quote_str(value: &str) -> String {
    let quote = if value.contains('\'') && !value.contains('"') {
        '"'
    } else {
        '\''
    };

    let mut out = String::with_capacity(value.len() + 2);
    out.push(quote);
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

/// Always show a fractional part: `30.0`, `2.5`, `28781.08`
pub(crate) fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{:.1}", value)
    } else {
        format!("{}", value)
    }
}

// ============================================================================
// DATABASE HANDLE
// ============================================================================

/// Path to the SQLite file. Every operation opens its own short-lived
/// connection through [`Database::open`] (writers) or
/// [`Database::open_read_only`] (reports).
#[derive(Debug, Clone)]
pub struct Database {
    path: PathBuf,
}

impl Database {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Database { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open a connection, creating the file, its directory and the table if absent
    pub fn open(&self) -> EtlResult<Connection> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(&self.path)?;
        setup_database(&conn)?;
        Ok(conn)
    }

    /// Open an existing file for reading only. No file, directory or table is
    /// created, so a missing store is an error.
    pub fn open_read_only(&self) -> rusqlite::Result<Connection> {
        Connection::open_with_flags(&self.path, OpenFlags::SQLITE_OPEN_READ_ONLY)
    }
}

pub fn setup_database(conn: &Connection) -> EtlResult<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    // No keys or unique constraints: the same country shows up once per run
    conn.execute(
        &format!(
            "CREATE TABLE IF NOT EXISTS {} (
                Country TEXT NOT NULL,
                GDP_USD_billion REAL NOT NULL,
                Extracion_Date TEXT NOT NULL,
                Region TEXT
            )",
            GDP_TABLE
        ),
        [],
    )?;

    Ok(())
}

/// Append a batch inside one transaction. Existing rows are never touched.
pub fn insert_records(conn: &mut Connection, records: &[GdpRecord]) -> EtlResult<usize> {
    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare(&format!(
            "INSERT INTO {} (Country, GDP_USD_billion, Extracion_Date, Region)
             VALUES (?1, ?2, ?3, ?4)",
            GDP_TABLE
        ))?;

        for record in records {
            stmt.execute(params![
                record.country,
                record.gdp_usd_billion,
                record.extraction_timestamp,
                record.region,
            ])?;
        }
    }
    tx.commit()?;

    Ok(records.len())
}

pub fn verify_count(conn: &Connection) -> EtlResult<i64> {
    let count: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {}", GDP_TABLE), [], |row| {
        row.get(0)
    })?;

    Ok(count)
}

/// Map a `(Country, GDP_USD_billion, Extracion_Date, Region)` row
pub(crate) fn record_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<GdpRecord> {
    let region: Option<String> = row.get(3)?;

    Ok(GdpRecord {
        country: row.get(0)?,
        gdp_usd_billion: row.get(1)?,
        extraction_timestamp: row.get(2)?,
        region: region.unwrap_or_else(|| UNMAPPED_REGION.to_string()),
    })
}

/// Every stored record in insertion order
pub fn get_all_records(conn: &Connection) -> EtlResult<Vec<GdpRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT Country, GDP_USD_billion, Extracion_Date, Region
         FROM {}
         ORDER BY rowid",
        GDP_TABLE
    ))?;

    let records = stmt
        .query_map([], record_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(records)
}
