//! API error types with structured JSON responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::db::DatabaseError;
use crate::pipeline::PipelineError;
use crate::workflow::WorkflowError;

/// Structured error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::NotFound(detail) => (StatusCode::NOT_FOUND, "NOT_FOUND", detail),
            ApiError::BadRequest(detail) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", detail),
            ApiError::Conflict(detail) => (StatusCode::CONFLICT, "CONFLICT", detail),
            ApiError::Forbidden(detail) => (StatusCode::FORBIDDEN, "FORBIDDEN", detail),
            ApiError::Internal(detail) => {
                tracing::error!(detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = ErrorBody {
            error: ErrorDetail { code, message },
        };
        (status, Json(body)).into_response()
    }
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound { entity_type, id } => {
                ApiError::NotFound(format!("{entity_type} {id}"))
            }
            DatabaseError::ConstraintViolation(detail) => ApiError::Conflict(detail),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::ReportNotFound(id) => ApiError::NotFound(format!("Report {id}")),
            PipelineError::AlreadyRunning(id) => {
                ApiError::Conflict(format!("Report {id} is already being processed"))
            }
            PipelineError::Database(e) => e.into(),
            PipelineError::Workflow(e) => e.into(),
            PipelineError::Storage(e) => ApiError::Internal(format!("Upload storage: {e}")),
        }
    }
}

impl From<WorkflowError> for ApiError {
    fn from(err: WorkflowError) -> Self {
        match err {
            WorkflowError::RecommendationNotFound(id) => {
                ApiError::NotFound(format!("Recommendation for report {id}"))
            }
            e @ WorkflowError::InvalidTransition { .. } => ApiError::Conflict(e.to_string()),
            e @ WorkflowError::ReviewerMismatch { .. } => ApiError::Forbidden(e.to_string()),
            e @ WorkflowError::EmptyPlan { .. } => ApiError::BadRequest(e.to_string()),
            WorkflowError::Database(e) => e.into(),
        }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        ApiError::Internal(format!("Blocking task failed: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use uuid::Uuid;

    use crate::models::RecommendationStatus;

    async fn json_of(response: Response) -> serde_json::Value {
        let body = to_bytes(response.into_body(), 1024).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn not_found_returns_404() {
        let response = ApiError::NotFound("Report x".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_of(response).await["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn internal_hides_detail() {
        let response = ApiError::Internal("disk on fire".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = json_of(response).await;
        assert_eq!(json["error"]["message"], "An internal error occurred");
    }

    #[tokio::test]
    async fn terminal_transition_is_conflict() {
        let err: ApiError = WorkflowError::InvalidTransition {
            from: RecommendationStatus::ConsultationRequired,
            to: RecommendationStatus::ApprovedByDoctor,
        }
        .into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn wrong_reviewer_is_forbidden() {
        let err: ApiError = WorkflowError::ReviewerMismatch {
            actual: Uuid::new_v4(),
        }
        .into();
        assert_eq!(err.into_response().status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn duplicate_license_is_conflict() {
        let err: ApiError = DatabaseError::ConstraintViolation("license".into()).into();
        assert!(matches!(err, ApiError::Conflict(_)));
    }

    #[test]
    fn already_running_is_conflict() {
        let err: ApiError = PipelineError::AlreadyRunning(Uuid::new_v4()).into();
        assert!(matches!(err, ApiError::Conflict(_)));
    }
}
