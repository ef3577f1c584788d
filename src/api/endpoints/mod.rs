pub mod export;
pub mod health;
pub mod mappings;
pub mod patients;
pub mod reports;
pub mod review;
pub mod specialists;

use uuid::Uuid;

use crate::api::error::ApiError;

/// Parse a path segment as a UUID, reporting which id was malformed.
pub(crate) fn parse_id(kind: &str, raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::BadRequest(format!("Invalid {kind} ID")))
}
