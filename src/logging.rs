// 📝 Process log
//
// Every line in the log file reads `<timestamp>, <message>`, for example
// `2024-Jul-01 14:00:03, Data extraction started`.

use crate::error::{EtlError, EtlResult};
use chrono::Local;
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::{Event, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields, MakeWriter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// `YYYY-Mon-DD HH:MM:SS`
pub const LOG_TIMESTAMP_FORMAT: &str = "%Y-%b-%d %H:%M:%S";

/// Event formatter producing `<local timestamp>, <message>` lines
#[derive(Debug, Clone, Copy, Default)]
pub struct EtlLogFormat;

impl<S, N> FormatEvent<S, N> for EtlLogFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        write!(writer, "{}, ", Local::now().format(LOG_TIMESTAMP_FORMAT))?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Build the log-file layer over any writer (a file appender in production,
/// an in-memory buffer in tests)
pub fn log_file_layer<S, W>(make_writer: W) -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .event_format(EtlLogFormat)
        .with_writer(make_writer)
        .with_filter(tracing_subscriber::filter::LevelFilter::INFO)
}

/// Install the global subscriber: the append-only log file plus warnings on
/// stderr (`RUST_LOG` overrides the stderr filter).
///
/// The returned guard flushes the file writer on drop, so keep it alive for
/// the life of the process.
pub fn init_logging(log_file: &Path) -> EtlResult<WorkerGuard> {
    let dir = match log_file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => Path::new(".").to_path_buf(),
    };
    fs::create_dir_all(&dir)?;

    let file_name = log_file
        .file_name()
        .ok_or_else(|| EtlError::Config(format!("log_file has no file name: {}", log_file.display())))?;

    let file_appender = tracing_appender::rolling::never(&dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let stderr_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(stderr_filter);

    tracing_subscriber::registry()
        .with(log_file_layer(non_blocking))
        .with(stderr_layer)
        .try_init()
        .map_err(|e| EtlError::Config(format!("logging already initialised: {}", e)))?;

    Ok(guard)
}

// ============================================================================
// TESTS
// ============================================================================
