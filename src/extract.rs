// 🕸️ Extractor - source page → (country, GDP in billions) rows
//
// The source is the Wikipedia "List of countries by GDP (nominal)" page. The
// table we want has a two-level header:
//
//   | Country/Territory | IMF[1][13]      | World Bank[14]  | United Nations[15] |
//   |                   | Forecast | Year | Estimate | Year | Estimate | Year    |
//
// Values are in millions of US$.

use crate::error::{EtlError, EtlResult};
use scraper::{ElementRef, Html, Selector};

/// Text that identifies the forecast table on the page
pub const FORECAST_MARKER: &str = "Forecast";

/// Top-level header of the country column (compared as a prefix)
pub const COUNTRY_HEADER: &str = "Country";

/// Top-level header of the forecasting agency group
pub const FORECAST_SOURCE_HEADER: &str = "IMF";

/// Sub-header of the value column inside the agency group
pub const FORECAST_VALUE_HEADER: &str = "Forecast";

// Guard against absurd span attributes
const MAX_SPAN: usize = 64;

// ============================================================================
// PAGE SOURCE
// ============================================================================

/// Anything that can hand back the markup behind a URL
pub trait PageSource {
    fn fetch(&self, url: &str) -> EtlResult<String>;
}

/// Blocking HTTP source
pub struct HttpSource {
    client: reqwest::blocking::Client,
}

impl HttpSource {
    pub fn new(user_agent: &str) -> EtlResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|e| EtlError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(HttpSource { client })
    }
}

impl PageSource for HttpSource {
    fn fetch(&self, url: &str) -> EtlResult<String> {
        let fetch_error = |reason: String| EtlError::Fetch {
            url: url.to_string(),
            reason,
        };

        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| fetch_error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(fetch_error(format!("HTTP status {}", status)));
        }

        response.text().map_err(|e| fetch_error(e.to_string()))
    }
}

// ============================================================================
// EXTRACTED ROW
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedRow {
    pub country: String,
    pub gdp_usd_billion: f64,
}

impl ExtractedRow {
    pub fn new(country: &str, gdp_usd_billion: f64) -> Self {
        ExtractedRow {
            country: country.to_string(),
            gdp_usd_billion,
        }
    }
}

// ============================================================================
// EXTRACTION
// ============================================================================

/// Fetch the page and pull the country / IMF forecast columns out of it
pub fn extract<S: PageSource + ?Sized>(source: &S, url: &str) -> EtlResult<Vec<ExtractedRow>> {
    tracing::info!("Data extraction started");

    let html = source.fetch(url)?;
    let rows = parse_gdp_table(&html)?;

    tracing::info!("Data extraction completed");
    Ok(rows)
}

/// Locate the forecast table in `html` and normalize its rows.
///
/// Rows whose forecast cell is not a non-negative number (footnote rows,
/// "—" placeholders) are dropped.
pub fn parse_gdp_table(html: &str) -> EtlResult<Vec<ExtractedRow>> {
    let document = Html::parse_document(html);
    let table_selector = Selector::parse("table")
        .map_err(|e| EtlError::Parse(format!("invalid table selector: {:?}", e)))?;

    let table = document
        .select(&table_selector)
        .find(|table| table.text().collect::<String>().contains(FORECAST_MARKER))
        .ok_or_else(|| EtlError::Parse(format!("no table matching {:?}", FORECAST_MARKER)))?;

    let rows: Vec<Vec<Cell>> = table_rows(table)
        .into_iter()
        .map(row_cells)
        .filter(|cells| !cells.is_empty())
        .collect();

    let header_depth = rows
        .iter()
        .take_while(|cells| cells.iter().all(|cell| cell.is_header))
        .count();
    if header_depth == 0 {
        return Err(EtlError::Parse("forecast table has no header row".to_string()));
    }

    let (header_rows, body_rows) = rows.split_at(header_depth);
    let columns = header_columns(header_rows);

    let country_col = columns
        .iter()
        .position(|levels| levels.first().is_some_and(|top| top.starts_with(COUNTRY_HEADER)))
        .ok_or_else(|| EtlError::Parse("country column not found".to_string()))?;

    let gdp_col = columns
        .iter()
        .position(|levels| {
            levels.first().is_some_and(|top| top == FORECAST_SOURCE_HEADER)
                && levels.iter().skip(1).any(|label| label == FORECAST_VALUE_HEADER)
        })
        .ok_or_else(|| {
            EtlError::Parse(format!(
                "{} {} column not found",
                FORECAST_SOURCE_HEADER, FORECAST_VALUE_HEADER
            ))
        })?;

    let mut extracted = Vec::new();
    for cells in body_rows {
        let (Some(country_cell), Some(gdp_cell)) = (cells.get(country_col), cells.get(gdp_col))
        else {
            continue;
        };

        let country = clean_text(&country_cell.text);
        if country.is_empty() {
            continue;
        }

        if let Some(millions) = parse_millions(&gdp_cell.text) {
            extracted.push(ExtractedRow {
                country,
                gdp_usd_billion: millions_to_billions(millions),
            });
        }
    }

    Ok(extracted)
}

// ============================================================================
// TABLE HELPERS
// ============================================================================

#[derive(Debug, Clone)]
struct Cell {
    text: String,
    is_header: bool,
    colspan: usize,
    rowspan: usize,
}

fn child_elements<'a>(element: ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> {
    element.children().filter_map(ElementRef::wrap)
}

/// Rows belonging to this table only (nested tables are left alone)
fn table_rows(table: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    let mut rows = Vec::new();
    for child in child_elements(table) {
        match child.value().name() {
            "tr" => rows.push(child),
            "thead" | "tbody" | "tfoot" => {
                rows.extend(child_elements(child).filter(|el| el.value().name() == "tr"))
            }
            _ => {}
        }
    }
    rows
}

fn row_cells(row: ElementRef<'_>) -> Vec<Cell> {
    child_elements(row)
        .filter(|el| matches!(el.value().name(), "td" | "th"))
        .map(|el| Cell {
            text: el.text().collect(),
            is_header: el.value().name() == "th",
            colspan: span_attr(el, "colspan"),
            rowspan: span_attr(el, "rowspan"),
        })
        .collect()
}

fn span_attr(el: ElementRef<'_>, name: &str) -> usize {
    el.value()
        .attr(name)
        .and_then(|v| v.trim().parse::<usize>().ok())
        .filter(|n| *n > 0)
        .unwrap_or(1)
        .min(MAX_SPAN)
}

/// Expand header rows into per-column label stacks, honoring colspan/rowspan.
///
/// `columns[c][level]` is the label covering column `c` at header row `level`.
fn header_columns(header_rows: &[Vec<Cell>]) -> Vec<Vec<String>> {
    let depth = header_rows.len();
    let mut grid: Vec<Vec<Option<String>>> = vec![Vec::new(); depth];

    for (r, cells) in header_rows.iter().enumerate() {
        let mut col = 0;
        for cell in cells {
            // Skip slots already claimed by a rowspan from above
            while grid[r].get(col).is_some_and(Option::is_some) {
                col += 1;
            }

            let label = clean_text(&cell.text);
            let end = col + cell.colspan;
            for line in grid.iter_mut().skip(r).take(cell.rowspan) {
                if line.len() < end {
                    line.resize(end, None);
                }
                for slot in &mut line[col..end] {
                    *slot = Some(label.clone());
                }
            }
            col = end;
        }
    }

    let width = grid.iter().map(Vec::len).max().unwrap_or(0);
    (0..width)
        .map(|c| {
            grid.iter()
                .map(|line| line.get(c).cloned().flatten().unwrap_or_default())
                .collect()
        })
        .collect()
}

/// Drop `[..]` footnote markers and collapse whitespace
fn clean_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut depth = 0usize;
    for ch in raw.chars() {
        match ch {
            '[' => depth += 1,
            ']' if depth > 0 => depth -= 1,
            _ if depth == 0 => out.push(ch),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// `"28,781,083"` → `28781083.0`; anything non-numeric, non-finite or negative → `None`
fn parse_millions(raw: &str) -> Option<f64> {
    let cleaned: String = clean_text(raw).chars().filter(|c| *c != ',').collect();
    let value = cleaned.parse::<f64>().ok()?;
    (value.is_finite() && value >= 0.0).then_some(value)
}

fn millions_to_billions(millions: f64) -> f64 {
    round2(millions / 1000.0)
}

/// Round to 2 fractional digits, exact halves to the even neighbour (2.125 → 2.12)
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

// ============================================================================
// TESTS
// ============================================================================


#[cfg(test)]
mod tests {
    use super::fixtures::GDP_PAGE;
    use super::*;
    use crate::logging::test_support::capture_log;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    struct StaticPage(&'static str);

    impl PageSource for StaticPage {
        fn fetch(&self, _url: &str) -> EtlResult<String> {
            Ok(self.0.to_string())
        }
    }

    struct Unreachable;

    impl PageSource for Unreachable {
        fn fetch(&self, url: &str) -> EtlResult<String> {
            Err(EtlError::Fetch {
                url: url.to_string(),
                reason: "connection refused".to_string(),
            })
        }
    }

    #[test]
    fn test_parse_wikipedia_layout() {
        let rows = parse_gdp_table(GDP_PAGE).unwrap();

        assert_eq!(
            rows,
            vec![
                ExtractedRow::new("World", 105568.78),
                ExtractedRow::new("United States", 28781.08),
                ExtractedRow::new("China", 18532.63),
                ExtractedRow::new("Samplestan", 2.5),
            ]
        );
    }

    #[test]
    fn test_non_numeric_rows_dropped() {
        let rows = parse_gdp_table(GDP_PAGE).unwrap();

        // Russia has "—" in the IMF column
        assert!(rows.iter().all(|row| row.country != "Russia"));
        assert!(rows.iter().all(|row| row.gdp_usd_billion.is_finite() && row.gdp_usd_billion >= 0.0));
    }

    #[test]
    fn test_parse_millions_rejects_garbage() {
        assert_eq!(parse_millions("1,234"), Some(1234.0));
        assert_eq!(parse_millions(" 42[a] "), Some(42.0));
        assert_eq!(parse_millions("—"), None);
        assert_eq!(parse_millions(""), None);
        assert_eq!(parse_millions("-17"), None);
        assert_eq!(parse_millions("NaN"), None);
        assert_eq!(parse_millions("inf"), None);
        assert_eq!(parse_millions("n/a"), None);
    }

    #[test]
    fn test_millions_to_billions_rounds() {
        assert_eq!(millions_to_billions(2500.0), 2.5);
        assert_eq!(millions_to_billions(1234.5678), 1.23);
        assert_eq!(millions_to_billions(999.0), 1.0);
        assert_eq!(round2(30.004), 30.0);
    }

    #[test]
    fn test_exact_halves_round_to_even() {
        assert_eq!(millions_to_billions(625.0), 0.62);
        assert_eq!(millions_to_billions(2125.0), 2.12);
        assert_eq!(millions_to_billions(375.0), 0.38);
        assert_eq!(round2(0.5), 0.5);
    }

    #[test]
    fn test_no_forecast_table_is_parse_error() {
        let html = "<table><tr><th>Country/Territory</th><th>GDP</th></tr></table>";
        let err = parse_gdp_table(html).unwrap_err();

        assert!(matches!(err, EtlError::Parse(_)));
    }

    #[test]
    fn test_missing_imf_column_is_parse_error() {
        let html = r#"<table>
            <tr><th rowspan="2">Country/Territory</th><th colspan="2">World Bank</th></tr>
            <tr><th>Forecast</th><th>Year</th></tr>
            <tr><td>Japan</td><td>4,000,000</td><td>2024</td></tr>
        </table>"#;
        let err = parse_gdp_table(html).unwrap_err();

        assert!(err.to_string().contains("IMF Forecast"));
    }

    #[test]
    fn test_header_grid_handles_spans() {
        let rows: Vec<Vec<Cell>> = vec![
            vec![
                Cell { text: "Country/Territory".into(), is_header: true, colspan: 1, rowspan: 2 },
                Cell { text: "IMF[1]".into(), is_header: true, colspan: 2, rowspan: 1 },
            ],
            vec![
                Cell { text: "Forecast".into(), is_header: true, colspan: 1, rowspan: 1 },
                Cell { text: "Year".into(), is_header: true, colspan: 1, rowspan: 1 },
            ],
        ];

        let columns = header_columns(&rows);
        assert_eq!(
            columns,
            vec![
                vec!["Country/Territory".to_string(), "Country/Territory".to_string()],
                vec!["IMF".to_string(), "Forecast".to_string()],
                vec!["IMF".to_string(), "Year".to_string()],
            ]
        );
    }

    #[test]
    fn test_extract_logs_start_and_completion() {
        let (rows, log) = capture_log(|| extract(&StaticPage(GDP_PAGE), "http://example.test"));

        assert_eq!(rows.unwrap().len(), 4);
        let lines = log.lines();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(", Data extraction started"));
        assert!(lines[1].ends_with(", Data extraction completed"));
    }

    // Skips any proxy configured in the environment so requests hit the local socket
    fn local_http_source() -> HttpSource {
        HttpSource {
            client: reqwest::blocking::Client::builder().no_proxy().build().unwrap(),
        }
    }

    #[test]
    fn test_http_error_status_is_fetch_error() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = stream.read(&mut buf).unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            stream
                .write_all(b"HTTP/1.1 503 Service Unavailable\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
                .unwrap();
        });

        let url = format!("http://{}/gdp", addr);
        let err = local_http_source().fetch(&url).unwrap_err();
        server.join().unwrap();

        match err {
            EtlError::Fetch { url: failed, reason } => {
                assert_eq!(failed, url);
                assert!(reason.contains("503"), "unexpected reason: {}", reason);
            }
            other => panic!("expected Fetch error, got {:?}", other),
        }
    }

    #[test]
    fn test_refused_connection_is_fetch_error() {
        // Bind then drop to get a port nothing listens on
        let port = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
        let url = format!("http://127.0.0.1:{}/gdp", port);

        let err = local_http_source().fetch(&url).unwrap_err();

        assert!(matches!(err, EtlError::Fetch { .. }));
        assert!(err.to_string().contains(&url));
    }

    #[test]
    fn test_fetch_error_propagates() {
        let err = extract(&Unreachable, "http://example.invalid/gdp").unwrap_err();

        assert!(matches!(err, EtlError::Fetch { .. }));
        assert!(err.to_string().contains("example.invalid"));
    }
}
