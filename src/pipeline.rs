// 🚰 ETL Pipeline - one cycle = extract → transform → load → query → print

use crate::config::{FetchFailurePolicy, Settings};
use crate::db::{Database, GdpRecord};
use crate::error::EtlResult;
use crate::extract::{extract, PageSource};
use crate::load::load;
use crate::query::{
    records_over, top_average_by_region, QueryOutcome, RegionAverage, GDP_THRESHOLD_BILLION,
    TOP_N_PER_REGION,
};
use crate::scheduler::{Clock, SystemClock};
use crate::transform::transform;
use std::fmt::Display;
use std::io::Write;

/// What happened to one scheduled cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Batch loaded and reports printed
    Completed { loaded: usize },
    /// Source unavailable; nothing loaded, waiting for the next boundary
    Skipped,
}

pub struct EtlPipeline<S, C = SystemClock> {
    settings: Settings,
    source: S,
    clock: C,
    db: Database,
}

impl<S: PageSource> EtlPipeline<S> {
    pub fn new(settings: Settings, source: S) -> Self {
        EtlPipeline::with_clock(settings, source, SystemClock)
    }
}

impl<S: PageSource, C: Clock> EtlPipeline<S, C> {
    /// `clock` supplies the extraction timestamp of each batch
    pub fn with_clock(settings: Settings, source: S, clock: C) -> Self {
        let db = Database::new(settings.files.db_file.clone());
        EtlPipeline {
            settings,
            source,
            clock,
            db,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Extract, transform and load one batch.
    ///
    /// The batch is stamped with the clock reading taken once the page has
    /// been fetched, right before the transform step.
    pub fn run_etl(&self) -> EtlResult<Vec<GdpRecord>> {
        tracing::info!("ETL process started");

        let rows = extract(&self.source, &self.settings.urls.gdp_source_url)?;
        let extracted_at = self.clock.now();
        let records = transform(rows, &self.settings.files.region_data_json_file, extracted_at)?;
        load(&records, &self.settings.files.gdp_json_file, &self.db)?;

        tracing::info!("ETL process completed");
        Ok(records)
    }

    /// Full cycle: ETL, then both reports written to `out`.
    ///
    /// Fetch/parse failures follow the configured [`FetchFailurePolicy`];
    /// everything else propagates.
    pub fn run_cycle<W: Write>(&self, out: &mut W) -> EtlResult<CycleOutcome> {
        let records = match self.run_etl() {
            Ok(records) => records,
            Err(e)
                if e.is_source_failure()
                    && self.settings.schedule.on_fetch_failure == FetchFailurePolicy::SkipCycle =>
            {
                tracing::error!("ETL process skipped: {}", e);
                return Ok(CycleOutcome::Skipped);
            }
            Err(e) => {
                tracing::error!("ETL process failed: {}", e);
                return Err(e);
            }
        };

        let over = records_over(&self.db, GDP_THRESHOLD_BILLION);
        let averages = top_average_by_region(&self.db, TOP_N_PER_REGION);
        print_report(out, &over, &averages)?;

        Ok(CycleOutcome::Completed {
            loaded: records.len(),
        })
    }
}

/// Print both query results.
///
/// ```text
/// Countries with GDP over 100B:
/// ('United States', 28781.08, '2024-Jul-01 14:00', 'North America')
///
///
/// Average GDP by region for top 5 countries:
/// ('North America', 28781.08)
///
/// ```
pub fn print_report<W: Write>(
    out: &mut W,
    over: &QueryOutcome<GdpRecord>,
    averages: &QueryOutcome<RegionAverage>,
) -> EtlResult<()> {
    writeln!(out, "Countries with GDP over 100B:")?;
    print_rows(out, over)?;
    writeln!(out)?;

    writeln!(out, "\nAverage GDP by region for top 5 countries:")?;
    print_rows(out, averages)?;
    writeln!(out)?;

    out.flush()?;
    Ok(())
}

fn print_rows<W: Write, T: Display>(out: &mut W, outcome: &QueryOutcome<T>) -> EtlResult<()> {
    if let Some(e) = &outcome.error {
        writeln!(out, "{}", e)?;
    }
    for row in &outcome.rows {
        writeln!(out, "{}", row)?;
    }
    Ok(())
}
