//! Practitioner registry endpoints.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use super::parse_id;
use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::db::repository::{
    get_specialist, list_reports_for_specialist, list_specialists_by_specialization,
    patients_for_specialist, register_specialist, set_availability,
};
use crate::models::{NewSpecialist, Report, Specialist};

#[derive(Deserialize)]
pub struct ListQuery {
    pub specialization: String,
}

#[derive(Deserialize)]
pub struct AvailabilityRequest {
    pub available: bool,
}

/// `POST /api/specialists` — duplicate license numbers are rejected.
pub async fn register(
    State(ctx): State<ApiContext>,
    Json(body): Json<NewSpecialist>,
) -> Result<(StatusCode, Json<Specialist>), ApiError> {
    let specialist = ctx
        .blocking(move |conn, _| Ok(register_specialist(conn, &body)?))
        .await?;
    Ok((StatusCode::CREATED, Json(specialist)))
}

/// `GET /api/specialists?specialization=...`
pub async fn list(
    State(ctx): State<ApiContext>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Specialist>>, ApiError> {
    let specialists = ctx
        .blocking(move |conn, _| {
            Ok(list_specialists_by_specialization(conn, &query.specialization)?)
        })
        .await?;
    Ok(Json(specialists))
}

/// `PUT /api/specialists/:id/availability`
pub async fn availability(
    State(ctx): State<ApiContext>,
    Path(specialist_id): Path<String>,
    Json(body): Json<AvailabilityRequest>,
) -> Result<Json<Specialist>, ApiError> {
    let specialist_id = parse_id("specialist", &specialist_id)?;
    let specialist = ctx
        .blocking(move |conn, _| {
            set_availability(conn, &specialist_id, body.available)?;
            get_specialist(conn, &specialist_id)?
                .ok_or_else(|| ApiError::NotFound(format!("Specialist {specialist_id}")))
        })
        .await?;

    tracing::info!(
        specialist_id = %specialist.id,
        available = specialist.available,
        "Specialist availability changed"
    );
    Ok(Json(specialist))
}

/// `GET /api/specialists/:id/reports` — everything routed to the practitioner.
pub async fn reports(
    State(ctx): State<ApiContext>,
    Path(specialist_id): Path<String>,
) -> Result<Json<Vec<Report>>, ApiError> {
    let specialist_id = parse_id("specialist", &specialist_id)?;
    let reports = ctx
        .blocking(move |conn, _| Ok(list_reports_for_specialist(conn, &specialist_id)?))
        .await?;
    Ok(Json(reports))
}

/// `GET /api/specialists/:id/patients`
pub async fn patients(
    State(ctx): State<ApiContext>,
    Path(specialist_id): Path<String>,
) -> Result<Json<Vec<String>>, ApiError> {
    let specialist_id = parse_id("specialist", &specialist_id)?;
    let patients = ctx
        .blocking(move |conn, _| Ok(patients_for_specialist(conn, &specialist_id)?))
        .await?;
    Ok(Json(patients))
}
