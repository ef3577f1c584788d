use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{FileKind, ReportStatus};
use super::structured::StructuredReport;

/// An uploaded lab report and everything the intake stages have stored for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub id: Uuid,
    pub patient_id: String,
    pub uploaded_by: String,
    /// Declared category, e.g. "Blood Test". Drives specialist routing.
    pub category: String,
    pub file_kind: FileKind,
    pub file_name: String,
    pub file_path: String,
    pub uploaded_at: DateTime<Utc>,
    pub raw_text: Option<String>,
    pub structured: Option<StructuredReport>,
    pub status: ReportStatus,
    pub assigned_specialist_id: Option<Uuid>,
}

impl Report {
    /// Fresh report row, as created on upload.
    pub fn new(
        patient_id: &str,
        uploaded_by: &str,
        category: &str,
        file_kind: FileKind,
        file_name: &str,
        file_path: &str,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            patient_id: patient_id.to_string(),
            uploaded_by: uploaded_by.to_string(),
            category: category.to_string(),
            file_kind,
            file_name: file_name.to_string(),
            file_path: file_path.to_string(),
            uploaded_at: Utc::now(),
            raw_text: None,
            structured: None,
            status: ReportStatus::PendingExtraction,
            assigned_specialist_id: None,
        }
    }
}
