use std::str::FromStr;

use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::{parse_db_timestamp, parse_db_uuid, to_db_timestamp, DatabaseError};
use crate::models::*;

const RECOMMENDATION_COLUMNS: &str = "id, report_id, patient_id, ai_treatment, ai_lifestyle,
     ai_priority, reviewer_id, reviewer_notes, status, reviewed_at, approved_treatment,
     approved_lifestyle, created_at, updated_at";

pub fn insert_recommendation(conn: &Connection, rec: &Recommendation) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO recommendations (id, report_id, patient_id, ai_treatment, ai_lifestyle,
         ai_priority, reviewer_id, reviewer_notes, status, reviewed_at, approved_treatment,
         approved_lifestyle, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            rec.id.to_string(),
            rec.report_id.to_string(),
            rec.patient_id,
            rec.ai_treatment,
            rec.ai_lifestyle,
            rec.ai_priority.as_str(),
            rec.reviewer_id.map(|id| id.to_string()),
            rec.reviewer_notes,
            rec.status.as_str(),
            rec.reviewed_at.as_ref().map(to_db_timestamp),
            rec.approved_treatment,
            rec.approved_lifestyle,
            to_db_timestamp(&rec.created_at),
            to_db_timestamp(&rec.updated_at),
        ],
    )?;
    Ok(())
}

/// The 0-or-1 recommendation attached to a report.
pub fn find_recommendation_by_report(
    conn: &Connection,
    report_id: &Uuid,
) -> Result<Option<Recommendation>, DatabaseError> {
    let sql = format!("SELECT {RECOMMENDATION_COLUMNS} FROM recommendations WHERE report_id = ?1");
    let result = conn.query_row(&sql, params![report_id.to_string()], rec_row_from_rusqlite);

    match result {
        Ok(row) => Ok(Some(rec_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Write back the review fields of a recommendation, but only if its stored
/// status still equals `expected`. Returns `false` when another writer moved it first.
pub fn update_recommendation_review(
    conn: &Connection,
    rec: &Recommendation,
    expected: RecommendationStatus,
) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "UPDATE recommendations SET reviewer_id = ?1, reviewer_notes = ?2, status = ?3,
         reviewed_at = ?4, approved_treatment = ?5, approved_lifestyle = ?6, updated_at = ?7
         WHERE id = ?8 AND status = ?9",
        params![
            rec.reviewer_id.map(|id| id.to_string()),
            rec.reviewer_notes,
            rec.status.as_str(),
            rec.reviewed_at.as_ref().map(to_db_timestamp),
            rec.approved_treatment,
            rec.approved_lifestyle,
            to_db_timestamp(&rec.updated_at),
            rec.id.to_string(),
            expected.as_str(),
        ],
    )?;
    Ok(changed == 1)
}

/// Review queue for a specialist.
pub fn pending_for_reviewer(
    conn: &Connection,
    reviewer_id: &Uuid,
) -> Result<Vec<Recommendation>, DatabaseError> {
    let sql = format!(
        "SELECT {RECOMMENDATION_COLUMNS} FROM recommendations
         WHERE reviewer_id = ?1 AND status = ?2 ORDER BY created_at ASC"
    );
    query_recommendations(
        conn,
        &sql,
        params![
            reviewer_id.to_string(),
            RecommendationStatus::PendingDoctorReview.as_str()
        ],
    )
}

/// Recommendations the specialist has already signed off or rejected.
pub fn reviewed_by_reviewer(
    conn: &Connection,
    reviewer_id: &Uuid,
) -> Result<Vec<Recommendation>, DatabaseError> {
    let sql = format!(
        "SELECT {RECOMMENDATION_COLUMNS} FROM recommendations
         WHERE reviewer_id = ?1 AND status IN (?2, ?3, ?4) ORDER BY reviewed_at DESC"
    );
    query_recommendations(
        conn,
        &sql,
        params![
            reviewer_id.to_string(),
            RecommendationStatus::ApprovedByDoctor.as_str(),
            RecommendationStatus::ModifiedAndApprovedByDoctor.as_str(),
            RecommendationStatus::ConsultationRequired.as_str(),
        ],
    )
}

/// Only approved plans are ever shown to a patient, as their approved text.
pub fn approved_for_patient(
    conn: &Connection,
    patient_id: &str,
) -> Result<Vec<ApprovedPlan>, DatabaseError> {
    let sql = format!(
        "SELECT {RECOMMENDATION_COLUMNS} FROM recommendations
         WHERE patient_id = ?1 AND status IN (?2, ?3) ORDER BY reviewed_at DESC"
    );
    query_recommendations(
        conn,
        &sql,
        params![
            patient_id,
            RecommendationStatus::ApprovedByDoctor.as_str(),
            RecommendationStatus::ModifiedAndApprovedByDoctor.as_str(),
        ],
    )
    .map(|recs| recs.into_iter().map(ApprovedPlan::from).collect())
}

fn query_recommendations(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<Recommendation>, DatabaseError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, |row| Ok(rec_row_from_rusqlite(row)))?;

    let mut recs = Vec::new();
    for row in rows {
        recs.push(rec_from_row(row??)?);
    }
    Ok(recs)
}

struct RecommendationRow {
    id: String,
    report_id: String,
    patient_id: String,
    ai_treatment: String,
    ai_lifestyle: String,
    ai_priority: String,
    reviewer_id: Option<String>,
    reviewer_notes: Option<String>,
    status: String,
    reviewed_at: Option<String>,
    approved_treatment: Option<String>,
    approved_lifestyle: Option<String>,
    created_at: String,
    updated_at: String,
}

fn rec_row_from_rusqlite(row: &rusqlite::Row<'_>) -> Result<RecommendationRow, rusqlite::Error> {
    Ok(RecommendationRow {
        id: row.get(0)?,
        report_id: row.get(1)?,
        patient_id: row.get(2)?,
        ai_treatment: row.get(3)?,
        ai_lifestyle: row.get(4)?,
        ai_priority: row.get(5)?,
        reviewer_id: row.get(6)?,
        reviewer_notes: row.get(7)?,
        status: row.get(8)?,
        reviewed_at: row.get(9)?,
        approved_treatment: row.get(10)?,
        approved_lifestyle: row.get(11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

fn rec_from_row(row: RecommendationRow) -> Result<Recommendation, DatabaseError> {
    Ok(Recommendation {
        id: parse_db_uuid("recommendations.id", &row.id)?,
        report_id: parse_db_uuid("recommendations.report_id", &row.report_id)?,
        patient_id: row.patient_id,
        ai_treatment: row.ai_treatment,
        ai_lifestyle: row.ai_lifestyle,
        ai_priority: Priority::from_str(&row.ai_priority)?,
        reviewer_id: row
            .reviewer_id
            .as_deref()
            .map(|s| parse_db_uuid("recommendations.reviewer_id", s))
            .transpose()?,
        reviewer_notes: row.reviewer_notes,
        status: RecommendationStatus::from_str(&row.status)?,
        reviewed_at: row
            .reviewed_at
            .as_deref()
            .map(|s| parse_db_timestamp("recommendations.reviewed_at", s))
            .transpose()?,
        approved_treatment: row.approved_treatment,
        approved_lifestyle: row.approved_lifestyle,
        created_at: parse_db_timestamp("recommendations.created_at", &row.created_at)?,
        updated_at: parse_db_timestamp("recommendations.updated_at", &row.updated_at)?,
    })
}
