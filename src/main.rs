use anyhow::{Context, Result};
use std::io;

use gdp_etl::{init_logging, EtlPipeline, HttpSource, Scheduler, Settings, SystemClock};

fn main() -> Result<()> {
    let settings_path = Settings::resolve_path();
    let settings = Settings::from_file(&settings_path)
        .with_context(|| format!("Failed to load settings from {}", settings_path.display()))?;

    // Flushes the log file on exit
    let _log_guard = init_logging(&settings.files.log_file).context("Failed to initialise logging")?;

    let source = HttpSource::new(&settings.http.user_agent)?;
    let pipeline = EtlPipeline::new(settings, source);

    // First cycle right away, then one per hour boundary until killed.
    // Batches are stamped by the pipeline's own clock, not the cycle start.
    let mut scheduler = Scheduler::new(SystemClock);
    let stdout = io::stdout();
    scheduler
        .run(|_started_at| {
            let mut out = stdout.lock();
            pipeline.run_cycle(&mut out).map(|_| ())
        })
        .context("ETL cycle failed")?;

    Ok(())
}
