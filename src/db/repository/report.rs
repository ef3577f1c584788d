use std::str::FromStr;

use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::{parse_db_timestamp, parse_db_uuid, to_db_timestamp, DatabaseError};
use crate::models::*;

const REPORT_COLUMNS: &str = "id, patient_id, uploaded_by, category, file_kind, file_name, file_path,
     uploaded_at, raw_text, extracted_data_json, status, assigned_specialist_id";

pub fn insert_report(conn: &Connection, report: &Report) -> Result<(), DatabaseError> {
    let structured = report
        .structured
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    conn.execute(
        "INSERT INTO reports (id, patient_id, uploaded_by, category, file_kind, file_name,
         file_path, uploaded_at, raw_text, extracted_data_json, status, assigned_specialist_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            report.id.to_string(),
            report.patient_id,
            report.uploaded_by,
            report.category,
            report.file_kind.as_str(),
            report.file_name,
            report.file_path,
            to_db_timestamp(&report.uploaded_at),
            report.raw_text,
            structured,
            report.status.as_str(),
            report.assigned_specialist_id.map(|id| id.to_string()),
        ],
    )?;
    Ok(())
}

pub fn get_report(conn: &Connection, id: &Uuid) -> Result<Option<Report>, DatabaseError> {
    let sql = format!("SELECT {REPORT_COLUMNS} FROM reports WHERE id = ?1");
    let result = conn.query_row(&sql, params![id.to_string()], report_row_from_rusqlite);

    match result {
        Ok(row) => Ok(Some(report_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Like [`get_report`] but a missing row is an error.
pub fn require_report(conn: &Connection, id: &Uuid) -> Result<Report, DatabaseError> {
    get_report(conn, id)?.ok_or_else(|| not_found(id))
}

pub fn update_report_status(
    conn: &Connection,
    id: &Uuid,
    status: ReportStatus,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE reports SET status = ?1 WHERE id = ?2",
        params![status.as_str(), id.to_string()],
    )?;
    if changed == 0 {
        return Err(not_found(id));
    }
    Ok(())
}

/// Cache the raw text alongside a status, without touching the structured payload.
pub fn store_raw_text(
    conn: &Connection,
    id: &Uuid,
    raw_text: &str,
    status: ReportStatus,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE reports SET raw_text = ?1, status = ?2 WHERE id = ?3",
        params![raw_text, status.as_str(), id.to_string()],
    )?;
    if changed == 0 {
        return Err(not_found(id));
    }
    Ok(())
}

/// Persist the extraction outcome and move the report to `extracted`.
pub fn store_extraction(
    conn: &Connection,
    id: &Uuid,
    raw_text: &str,
    structured: &StructuredReport,
) -> Result<(), DatabaseError> {
    let json = serde_json::to_string(structured)?;
    let changed = conn.execute(
        "UPDATE reports SET raw_text = ?1, extracted_data_json = ?2, status = ?3 WHERE id = ?4",
        params![
            raw_text,
            json,
            ReportStatus::Extracted.as_str(),
            id.to_string()
        ],
    )?;
    if changed == 0 {
        return Err(not_found(id));
    }
    Ok(())
}

/// Record the routed specialist. Only fills an empty slot; never reassigns.
/// Returns whether the row was updated.
pub fn set_report_assignment(
    conn: &Connection,
    id: &Uuid,
    specialist_id: &Uuid,
    status: ReportStatus,
) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "UPDATE reports SET assigned_specialist_id = ?1, status = ?2
         WHERE id = ?3 AND assigned_specialist_id IS NULL",
        params![specialist_id.to_string(), status.as_str(), id.to_string()],
    )?;
    Ok(changed == 1)
}

pub fn list_reports_by_status(
    conn: &Connection,
    status: ReportStatus,
) -> Result<Vec<Report>, DatabaseError> {
    let sql = format!(
        "SELECT {REPORT_COLUMNS} FROM reports WHERE status = ?1 ORDER BY uploaded_at ASC"
    );
    query_reports(conn, &sql, params![status.as_str()])
}

pub fn list_reports_for_specialist(
    conn: &Connection,
    specialist_id: &Uuid,
) -> Result<Vec<Report>, DatabaseError> {
    let sql = format!(
        "SELECT {REPORT_COLUMNS} FROM reports WHERE assigned_specialist_id = ?1
         ORDER BY uploaded_at DESC"
    );
    query_reports(conn, &sql, params![specialist_id.to_string()])
}

pub fn list_reports_for_patient(
    conn: &Connection,
    patient_id: &str,
) -> Result<Vec<Report>, DatabaseError> {
    let sql = format!(
        "SELECT {REPORT_COLUMNS} FROM reports WHERE patient_id = ?1 ORDER BY uploaded_at DESC"
    );
    query_reports(conn, &sql, params![patient_id])
}

fn query_reports(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<Report>, DatabaseError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, |row| Ok(report_row_from_rusqlite(row)))?;

    let mut reports = Vec::new();
    for row in rows {
        reports.push(report_from_row(row??)?);
    }
    Ok(reports)
}

fn not_found(id: &Uuid) -> DatabaseError {
    DatabaseError::NotFound {
        entity_type: "Report".into(),
        id: id.to_string(),
    }
}

// Internal row type for Report mapping
struct ReportRow {
    id: String,
    patient_id: String,
    uploaded_by: String,
    category: String,
    file_kind: String,
    file_name: String,
    file_path: String,
    uploaded_at: String,
    raw_text: Option<String>,
    extracted_data_json: Option<String>,
    status: String,
    assigned_specialist_id: Option<String>,
}

fn report_row_from_rusqlite(row: &rusqlite::Row<'_>) -> Result<ReportRow, rusqlite::Error> {
    Ok(ReportRow {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        uploaded_by: row.get(2)?,
        category: row.get(3)?,
        file_kind: row.get(4)?,
        file_name: row.get(5)?,
        file_path: row.get(6)?,
        uploaded_at: row.get(7)?,
        raw_text: row.get(8)?,
        extracted_data_json: row.get(9)?,
        status: row.get(10)?,
        assigned_specialist_id: row.get(11)?,
    })
}

fn report_from_row(row: ReportRow) -> Result<Report, DatabaseError> {
    let structured = row
        .extracted_data_json
        .as_deref()
        .map(serde_json::from_str::<StructuredReport>)
        .transpose()?;

    Ok(Report {
        id: parse_db_uuid("reports.id", &row.id)?,
        patient_id: row.patient_id,
        uploaded_by: row.uploaded_by,
        category: row.category,
        file_kind: FileKind::from_str(&row.file_kind)?,
        file_name: row.file_name,
        file_path: row.file_path,
        uploaded_at: parse_db_timestamp("reports.uploaded_at", &row.uploaded_at)?,
        raw_text: row.raw_text,
        structured,
        status: ReportStatus::from_str(&row.status)?,
        assigned_specialist_id: row
            .assigned_specialist_id
            .as_deref()
            .map(|s| parse_db_uuid("reports.assigned_specialist_id", s))
            .transpose()?,
    })
}
