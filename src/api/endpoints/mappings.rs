//! Category → specialization mapping endpoints.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::db::repository::{add_category_mapping, list_category_mappings, upsert_category_mapping};
use crate::models::CategoryMapping;

/// `GET /api/mappings`
pub async fn list(State(ctx): State<ApiContext>) -> Result<Json<Vec<CategoryMapping>>, ApiError> {
    let mappings = ctx
        .blocking(|conn, _| Ok(list_category_mappings(conn)?))
        .await?;
    Ok(Json(mappings))
}

/// `POST /api/mappings` — a category that is already mapped is a conflict.
pub async fn add(
    State(ctx): State<ApiContext>,
    Json(body): Json<CategoryMapping>,
) -> Result<(StatusCode, Json<CategoryMapping>), ApiError> {
    let mapping = ctx
        .blocking(move |conn, _| {
            add_category_mapping(conn, &body)?;
            Ok(body)
        })
        .await?;
    tracing::info!(category = %mapping.category, specialization = %mapping.specialization, "Category mapped");
    Ok((StatusCode::CREATED, Json(mapping)))
}

/// `PUT /api/mappings` — administrative override of an existing mapping.
pub async fn replace(
    State(ctx): State<ApiContext>,
    Json(body): Json<CategoryMapping>,
) -> Result<Json<CategoryMapping>, ApiError> {
    if body.category.trim().is_empty() || body.specialization.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "category and specialization are required".into(),
        ));
    }
    let mapping = ctx
        .blocking(move |conn, _| {
            upsert_category_mapping(conn, &body)?;
            Ok(body)
        })
        .await?;
    tracing::info!(category = %mapping.category, specialization = %mapping.specialization, "Category mapping replaced");
    Ok(Json(mapping))
}
