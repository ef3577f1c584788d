//! Patient-centred lookups: uploaded reports and linked practitioners.

use axum::extract::{Path, State};
use axum::Json;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::db::repository::{list_reports_for_patient, specialists_for_patient};
use crate::models::{Report, Specialist};

/// `GET /api/patients/:id/reports` — newest first.
pub async fn reports(
    State(ctx): State<ApiContext>,
    Path(patient_id): Path<String>,
) -> Result<Json<Vec<Report>>, ApiError> {
    let reports = ctx
        .blocking(move |conn, _| Ok(list_reports_for_patient(conn, &patient_id)?))
        .await?;
    Ok(Json(reports))
}

/// `GET /api/patients/:id/specialists`
pub async fn specialists(
    State(ctx): State<ApiContext>,
    Path(patient_id): Path<String>,
) -> Result<Json<Vec<Specialist>>, ApiError> {
    let specialists = ctx
        .blocking(move |conn, _| Ok(specialists_for_patient(conn, &patient_id)?))
        .await?;
    Ok(Json(specialists))
}
