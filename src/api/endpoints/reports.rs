//! Report endpoints.
//!
//! - `POST /api/reports` — upload (base64 body) and run intake
//! - `GET /api/reports/:id` — stored report
//! - `POST /api/reports/:id/process` — operator retry
//! - `GET /api/reports/:id/recommendation` — recommendation, any status

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use base64::Engine;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::parse_id;
use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::db::repository::{get_report, require_report};
use crate::models::{Recommendation, RecommendationStatus, Report, ReportStatus};
use crate::pipeline::extraction::MAX_FILE_SIZE;
use crate::pipeline::SubmitReport;
use crate::workflow;

#[derive(Deserialize)]
pub struct UploadRequest {
    pub patient_id: String,
    pub uploader_id: String,
    pub file_name: String,
    pub category: String,
    /// Base64 file content, optionally as a data URL (`data:...;base64,...`).
    pub data: String,
}

#[derive(Debug, Serialize)]
pub struct IntakeResponse {
    pub report_id: Uuid,
    pub status: ReportStatus,
    pub assigned_specialist_id: Option<Uuid>,
    pub recommendation_status: Option<RecommendationStatus>,
}

/// `POST /api/reports` — store the upload and run intake once.
pub async fn upload(
    State(ctx): State<ApiContext>,
    Json(payload): Json<UploadRequest>,
) -> Result<(StatusCode, Json<IntakeResponse>), ApiError> {
    for (field, value) in [
        ("patient_id", &payload.patient_id),
        ("uploader_id", &payload.uploader_id),
        ("file_name", &payload.file_name),
        ("category", &payload.category),
    ] {
        if value.trim().is_empty() {
            return Err(ApiError::BadRequest(format!("{field} is required")));
        }
    }

    let bytes = decode_base64(&payload.data)
        .map_err(|e| ApiError::BadRequest(format!("Invalid file data: {e}")))?;
    if bytes.is_empty() {
        return Err(ApiError::BadRequest("File is empty".into()));
    }
    if bytes.len() > MAX_FILE_SIZE {
        return Err(ApiError::BadRequest(format!(
            "File exceeds {} MB limit",
            MAX_FILE_SIZE / (1024 * 1024)
        )));
    }

    let upload = SubmitReport {
        patient_id: payload.patient_id.trim().to_string(),
        uploader_id: payload.uploader_id.trim().to_string(),
        file_name: payload.file_name,
        category: payload.category.trim().to_string(),
        bytes,
    };

    let response = ctx
        .blocking(move |conn, pipeline| {
            let report_id = pipeline.submit_report(conn, upload)?;
            intake_response(conn, &report_id)
        })
        .await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// `GET /api/reports/:id`
pub async fn detail(
    State(ctx): State<ApiContext>,
    Path(report_id): Path<String>,
) -> Result<Json<Report>, ApiError> {
    let report_id = parse_id("report", &report_id)?;
    let report = ctx
        .blocking(move |conn, _| {
            get_report(conn, &report_id)?
                .ok_or_else(|| ApiError::NotFound(format!("Report {report_id}")))
        })
        .await?;
    Ok(Json(report))
}

#[derive(Debug, Serialize)]
pub struct ProcessResponse {
    pub completed: bool,
    #[serde(flatten)]
    pub intake: IntakeResponse,
}

/// `POST /api/reports/:id/process` — resume the pipeline from its last stage.
pub async fn process(
    State(ctx): State<ApiContext>,
    Path(report_id): Path<String>,
) -> Result<Json<ProcessResponse>, ApiError> {
    let report_id = parse_id("report", &report_id)?;
    let response = ctx
        .blocking(move |conn, pipeline| {
            let completed = pipeline.process(conn, &report_id)?;
            Ok(ProcessResponse {
                completed,
                intake: intake_response(conn, &report_id)?,
            })
        })
        .await?;
    Ok(Json(response))
}

/// `GET /api/reports/:id/recommendation`
pub async fn recommendation(
    State(ctx): State<ApiContext>,
    Path(report_id): Path<String>,
) -> Result<Json<Recommendation>, ApiError> {
    let report_id = parse_id("report", &report_id)?;
    let rec = ctx
        .blocking(move |conn, _| {
            workflow::find_by_report(conn, &report_id)?.ok_or_else(|| {
                ApiError::NotFound(format!("Recommendation for report {report_id}"))
            })
        })
        .await?;
    Ok(Json(rec))
}

fn intake_response(conn: &rusqlite::Connection, report_id: &Uuid) -> Result<IntakeResponse, ApiError> {
    let report = require_report(conn, report_id)?;
    let recommendation = workflow::find_by_report(conn, report_id)?;
    Ok(IntakeResponse {
        report_id: report.id,
        status: report.status,
        assigned_specialist_id: report.assigned_specialist_id,
        recommendation_status: recommendation.map(|r| r.status),
    })
}

/// Accepts plain base64 or a data URL.
fn decode_base64(data: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let payload = match data.split_once(";base64,") {
        Some((_, encoded)) => encoded,
        None => data,
    };
    base64::engine::general_purpose::STANDARD.decode(payload.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_url_prefix_is_stripped() {
        assert_eq!(decode_base64("data:text/plain;base64,aGk=").unwrap(), b"hi");
        assert_eq!(decode_base64("aGk=").unwrap(), b"hi");
        assert!(decode_base64("not base64!").is_err());
    }
}
