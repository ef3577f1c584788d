use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{Priority, RecommendationStatus};

/// Output of the suggestion generator, before any human review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub treatment: String,
    pub lifestyle: String,
    pub priority: Priority,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: Uuid,
    pub report_id: Uuid,
    pub patient_id: String,
    pub ai_treatment: String,
    pub ai_lifestyle: String,
    pub ai_priority: Priority,
    pub reviewer_id: Option<Uuid>,
    pub reviewer_notes: Option<String>,
    pub status: RecommendationStatus,
    pub reviewed_at: Option<DateTime<Utc>>,
    /// Populated only once a reviewer approves; cleared on rejection.
    pub approved_treatment: Option<String>,
    pub approved_lifestyle: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Recommendation {
    pub fn from_suggestion(report_id: Uuid, patient_id: &str, suggestion: &Suggestion) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            report_id,
            patient_id: patient_id.to_string(),
            ai_treatment: suggestion.treatment.clone(),
            ai_lifestyle: suggestion.lifestyle.clone(),
            ai_priority: suggestion.priority,
            reviewer_id: None,
            reviewer_notes: None,
            status: RecommendationStatus::AiGenerated,
            reviewed_at: None,
            approved_treatment: None,
            approved_lifestyle: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Patient-facing view of a reviewed plan. Carries the reviewer's approved
/// text only, never the automated draft it was based on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovedPlan {
    pub recommendation_id: Uuid,
    pub report_id: Uuid,
    pub patient_id: String,
    pub status: RecommendationStatus,
    pub treatment: String,
    pub lifestyle: String,
    pub reviewer_id: Option<Uuid>,
    pub reviewer_notes: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

impl From<Recommendation> for ApprovedPlan {
    fn from(rec: Recommendation) -> Self {
        Self {
            recommendation_id: rec.id,
            report_id: rec.report_id,
            patient_id: rec.patient_id,
            status: rec.status,
            treatment: rec.approved_treatment.unwrap_or_default(),
            lifestyle: rec.approved_lifestyle.unwrap_or_default(),
            reviewer_id: rec.reviewer_id,
            reviewer_notes: rec.reviewer_notes,
            reviewed_at: rec.reviewed_at,
        }
    }
}
