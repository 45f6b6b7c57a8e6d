// 💾 Loader - JSON snapshot (latest run only) + SQLite history (append)

use crate::db::{insert_records, Database, GdpRecord};
use crate::error::EtlResult;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Write records as newline-delimited JSON, one object per line
pub fn write_snapshot<W: Write>(mut writer: W, records: &[GdpRecord]) -> EtlResult<()> {
    for record in records {
        serde_json::to_writer(&mut writer, record)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

/// Replace the snapshot file with this batch
pub fn write_snapshot_file(path: &Path, records: &[GdpRecord]) -> EtlResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let file = File::create(path)?;
    write_snapshot(BufWriter::new(file), records)
}

/// Persist one batch: overwrite the snapshot, append to the history table.
///
/// Returns the number of rows appended.
pub fn load(records: &[GdpRecord], snapshot_path: &Path, db: &Database) -> EtlResult<usize> {
    tracing::info!("Data load started");

    write_snapshot_file(snapshot_path, records)?;

    let mut conn = db.open()?;
    let inserted = insert_records(&mut conn, records)?;
    drop(conn);

    tracing::info!("Data load completed");
    Ok(inserted)
}
