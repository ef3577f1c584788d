//! Review endpoints: the three reviewer actions and the queues around them.

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use super::parse_id;
use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::db::repository::{approved_for_patient, pending_for_reviewer, reviewed_by_reviewer};
use crate::models::{ApprovedPlan, Recommendation};

#[derive(Deserialize)]
pub struct ReviewRequest {
    pub reviewer_id: Uuid,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Deserialize)]
pub struct ModifyRequest {
    pub reviewer_id: Uuid,
    pub treatment: String,
    pub lifestyle: String,
    #[serde(default)]
    pub notes: Option<String>,
}

/// `POST /api/reports/:id/approve`
pub async fn approve(
    State(ctx): State<ApiContext>,
    Path(report_id): Path<String>,
    Json(body): Json<ReviewRequest>,
) -> Result<Json<Recommendation>, ApiError> {
    let report_id = parse_id("report", &report_id)?;
    let rec = ctx
        .blocking(move |conn, pipeline| {
            Ok(pipeline.approve(conn, &report_id, &body.reviewer_id, body.notes.as_deref())?)
        })
        .await?;
    Ok(Json(rec))
}

/// `POST /api/reports/:id/modify`
pub async fn modify(
    State(ctx): State<ApiContext>,
    Path(report_id): Path<String>,
    Json(body): Json<ModifyRequest>,
) -> Result<Json<Recommendation>, ApiError> {
    let report_id = parse_id("report", &report_id)?;
    let rec = ctx
        .blocking(move |conn, pipeline| {
            Ok(pipeline.modify_and_approve(
                conn,
                &report_id,
                &body.reviewer_id,
                &body.treatment,
                &body.lifestyle,
                body.notes.as_deref(),
            )?)
        })
        .await?;
    Ok(Json(rec))
}

/// `POST /api/reports/:id/reject` — the patient needs a consultation instead.
pub async fn reject(
    State(ctx): State<ApiContext>,
    Path(report_id): Path<String>,
    Json(body): Json<ReviewRequest>,
) -> Result<Json<Recommendation>, ApiError> {
    let report_id = parse_id("report", &report_id)?;
    let rec = ctx
        .blocking(move |conn, pipeline| {
            Ok(pipeline.reject(conn, &report_id, &body.reviewer_id, body.notes.as_deref())?)
        })
        .await?;
    Ok(Json(rec))
}

/// `GET /api/specialists/:id/pending`
pub async fn pending(
    State(ctx): State<ApiContext>,
    Path(specialist_id): Path<String>,
) -> Result<Json<Vec<Recommendation>>, ApiError> {
    let specialist_id = parse_id("specialist", &specialist_id)?;
    let recs = ctx
        .blocking(move |conn, _| Ok(pending_for_reviewer(conn, &specialist_id)?))
        .await?;
    Ok(Json(recs))
}

/// `GET /api/specialists/:id/reviewed`
pub async fn reviewed(
    State(ctx): State<ApiContext>,
    Path(specialist_id): Path<String>,
) -> Result<Json<Vec<Recommendation>>, ApiError> {
    let specialist_id = parse_id("specialist", &specialist_id)?;
    let recs = ctx
        .blocking(move |conn, _| Ok(reviewed_by_reviewer(conn, &specialist_id)?))
        .await?;
    Ok(Json(recs))
}

/// `GET /api/patients/:id/recommendations` — approved plans only.
pub async fn for_patient(
    State(ctx): State<ApiContext>,
    Path(patient_id): Path<String>,
) -> Result<Json<Vec<ApprovedPlan>>, ApiError> {
    let recs = ctx
        .blocking(move |conn, _| Ok(approved_for_patient(conn, &patient_id)?))
        .await?;
    Ok(Json(recs))
}
