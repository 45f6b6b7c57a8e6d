// GDP ETL - Core Library
// Exposes the pipeline stages for the hourly runner and tests

pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod load;
pub mod logging;
pub mod pipeline;
pub mod query;
pub mod region;
pub mod scheduler;
pub mod transform;

// Re-export commonly used types
pub use config::{FetchFailurePolicy, Settings};
pub use db::{
    Database, GdpRecord, GDP_TABLE,
    setup_database, insert_records, verify_count, get_all_records,
};
pub use error::{EtlError, EtlResult};
pub use extract::{extract, parse_gdp_table, ExtractedRow, HttpSource, PageSource};
pub use load::{load, write_snapshot};
pub use logging::init_logging;
pub use pipeline::{CycleOutcome, EtlPipeline};
pub use query::{records_over, top_average_by_region, QueryOutcome, RegionAverage};
pub use region::{RegionMap, UNMAPPED_REGION};
pub use scheduler::{Clock, Scheduler, SchedulerState, SystemClock};
pub use transform::{enrich, transform};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
