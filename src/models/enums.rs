use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $s)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(ReportStatus {
    PendingExtraction => "pending_extraction",
    Extracted => "extracted",
    FailedExtraction => "failed_extraction",
    PendingManualAssignment => "pending_manual_assignment",
});

str_enum!(RecommendationStatus {
    AiGenerated => "AI_generated",
    PendingDoctorReview => "pending_doctor_review",
    ApprovedByDoctor => "approved_by_doctor",
    ModifiedAndApprovedByDoctor => "modified_and_approved_by_doctor",
    ConsultationRequired => "consultation_required",
});

impl RecommendationStatus {
    /// No core-defined transition leaves a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::ApprovedByDoctor | Self::ModifiedAndApprovedByDoctor | Self::ConsultationRequired
        )
    }

    /// Transition table for the review workflow.
    pub fn can_transition_to(&self, next: RecommendationStatus) -> bool {
        use RecommendationStatus::*;
        matches!(
            (self, next),
            (AiGenerated, PendingDoctorReview)
                | (PendingDoctorReview, ApprovedByDoctor)
                | (PendingDoctorReview, ModifiedAndApprovedByDoctor)
                | (PendingDoctorReview, ConsultationRequired)
        )
    }
}

str_enum!(Priority {
    High => "High",
    Medium => "Medium",
    Low => "Low",
});

impl Priority {
    /// Lenient parse used on model output ("high", " Medium ", "LOW").
    pub fn parse_loose(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            _ => None,
        }
    }
}

str_enum!(MetricFlag {
    Normal => "normal",
    Abnormal => "abnormal",
    UnknownRange => "unknown-range",
    Missing => "missing",
});

impl MetricFlag {
    /// Display colour used by the dashboards and the structured export.
    pub fn color(&self) -> &'static str {
        match self {
            Self::Normal => "green",
            Self::Abnormal => "orange",
            Self::UnknownRange => "gray",
            Self::Missing => "red",
        }
    }
}

str_enum!(FileKind {
    Pdf => "pdf",
    Docx => "docx",
    Csv => "csv",
    Json => "json",
    Image => "image",
    Text => "text",
    Unsupported => "unsupported",
});
