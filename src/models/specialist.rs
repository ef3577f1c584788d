use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Specialist {
    pub id: Uuid,
    pub name: String,
    pub specialization: String,
    pub license_number: String,
    pub contact_number: Option<String>,
    pub hospital_affiliation: Option<String>,
    pub available: bool,
    /// Bumped on every routed report; `None` sorts first when balancing.
    pub last_assigned_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Registration payload for a practitioner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSpecialist {
    pub name: String,
    pub specialization: String,
    pub license_number: String,
    #[serde(default)]
    pub contact_number: Option<String>,
    #[serde(default)]
    pub hospital_affiliation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryMapping {
    pub category: String,
    pub specialization: String,
}

/// Patient–specialist relation. At most one active row per pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientSpecialistLink {
    pub id: Uuid,
    pub patient_id: String,
    pub specialist_id: Uuid,
    pub assigned_at: DateTime<Utc>,
    pub active: bool,
}
