//! `POST /api/export` — rebuild the structured JSONL dataset from the database.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::export::{export_reports, ExportError};

#[derive(Serialize)]
pub struct ExportResponse {
    pub records: usize,
    pub path: String,
}

pub async fn rebuild(State(ctx): State<ApiContext>) -> Result<Json<ExportResponse>, ApiError> {
    let response = ctx
        .blocking(|conn, pipeline| {
            let path = pipeline
                .export_path()
                .ok_or_else(|| ApiError::Conflict("Structured export is not configured".into()))?;
            let records = export_reports(conn, path).map_err(|e| match e {
                ExportError::Database(e) => ApiError::from(e),
                other => ApiError::Internal(other.to_string()),
            })?;
            Ok(ExportResponse {
                records,
                path: path.display().to_string(),
            })
        })
        .await?;
    Ok(Json(response))
}
