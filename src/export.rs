//! Flat JSONL dataset of structured reports, one record per line.
//!
//! A record holds the labelled patient fields plus `{metric: {value, color}}`,
//! with keys in sorted order.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use rusqlite::Connection;
use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::db::repository::list_reports_by_status;
use crate::db::DatabaseError;
use crate::models::{ReportStatus, StructuredReport};

pub const EXPORT_FILE_NAME: &str = "structured_reports.jsonl";

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

/// Build the flat record for one report. `serde_json::Map` keeps keys sorted.
pub fn export_record(report: &StructuredReport) -> Value {
    let mut record = Map::new();
    for (label, value) in report.patient_info.labelled_fields() {
        record.insert(label.to_string(), value.map_or(Value::Null, |v| Value::String(v.into())));
    }
    for (name, reading) in report.metrics.iter() {
        record.insert(
            name.clone(),
            json!({ "value": reading.value, "color": reading.flag.color() }),
        );
    }
    Value::Object(record)
}

/// Append one record, creating the file and its directory if needed.
pub fn append_jsonl(path: &Path, report: &StructuredReport) -> Result<(), ExportError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    let line = serde_json::to_string(&export_record(report))?;
    writeln!(file, "{line}")?;
    Ok(())
}

/// Rewrite the dataset from every report that has a structured payload.
/// Returns the number of records written.
pub fn export_reports(conn: &Connection, path: &Path) -> Result<usize, ExportError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(File::create(path)?);
    let mut written = 0;

    for status in [ReportStatus::Extracted, ReportStatus::PendingManualAssignment] {
        for report in list_reports_by_status(conn, status)? {
            let Some(structured) = report.structured else { continue };
            serde_json::to_writer(&mut writer, &export_record(&structured))?;
            writer.write_all(b"\n")?;
            written += 1;
        }
    }
    writer.flush()?;

    tracing::info!(records = written, path = %path.display(), "Structured dataset exported");
    Ok(written)
}
