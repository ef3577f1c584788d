//! Category → specialization → least-recently-assigned available specialist.

use chrono::Utc;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use thiserror::Error;
use uuid::Uuid;

use crate::db::repository::{
    available_specialists_by_workload, ensure_active_link, get_report,
    get_specialization_for_category, insert_category_mapping_if_absent, set_report_assignment,
    touch_last_assigned, update_report_status, LinkOutcome,
};
use crate::db::DatabaseError;
use crate::models::{CategoryMapping, ReportStatus};

#[derive(Error, Debug)]
pub enum RoutingError {
    #[error("Report not found: {0}")]
    ReportNotFound(Uuid),

    #[error("No specialization is mapped for category '{category}'")]
    NoMappingConfigured { category: String },

    #[error("No available specialist for '{specialization}'")]
    NoSpecialistAvailable { specialization: String },

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

impl From<rusqlite::Error> for RoutingError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(DatabaseError::Sqlite(err))
    }
}

impl RoutingError {
    /// Recoverable by an operator: add a mapping or free up a specialist, then retry.
    pub fn needs_manual_assignment(&self) -> bool {
        matches!(
            self,
            Self::NoMappingConfigured { .. } | Self::NoSpecialistAvailable { .. }
        )
    }
}

/// Built-in category table, seeded on first start.
pub const DEFAULT_CATEGORY_MAPPINGS: &[(&str, &str)] = &[
    ("Blood Test", "General Physician"),
    ("X-Ray", "Radiologist"),
    ("MRI Scan", "Radiologist"),
    ("Cardiology Report", "Cardiologist"),
    ("Neurology Report", "Neurologist"),
    ("General Checkup", "General Physician"),
    ("Diabetes Report", "Endocrinologist"),
    ("Liver Function Test", "Hepatologist"),
    ("Kidney Function Test", "Nephrologist"),
    ("lipid_profile", "General Physician"),
    ("thyroid_function_test", "Endocrinologist"),
    ("eye_test", "Ophthalmologist"),
    ("hearing_test", "ENT Specialist"),
    ("others test", "General Physician"),
    ("urine_test", "Nephrologist"),
    ("stool_test", "Gastroenterologist"),
];

/// Insert any default mapping whose category is not mapped yet.
/// Existing (possibly admin-edited) mappings are left alone.
pub fn seed_default_mappings(conn: &Connection) -> Result<usize, DatabaseError> {
    let mut added = 0;
    for (category, specialization) in DEFAULT_CATEGORY_MAPPINGS {
        let mapping = CategoryMapping {
            category: category.to_string(),
            specialization: specialization.to_string(),
        };
        if insert_category_mapping_if_absent(conn, &mapping)? {
            added += 1;
        }
    }
    if added > 0 {
        tracing::info!(added, "Seeded default category mappings");
    }
    Ok(added)
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SpecialistRouter;

impl SpecialistRouter {
    /// Assign the report to a specialist and return their id.
    ///
    /// Selection, the timestamp bump, the report update and the patient link
    /// commit in one `BEGIN IMMEDIATE` transaction, so two concurrent routers
    /// cannot both pick the same least-recently-assigned specialist. An
    /// already-assigned report is returned unchanged.
    pub fn route(&self, conn: &Connection, report_id: &Uuid) -> Result<Uuid, RoutingError> {
        let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;

        let report = get_report(&tx, report_id)?.ok_or(RoutingError::ReportNotFound(*report_id))?;
        if let Some(existing) = report.assigned_specialist_id {
            tracing::debug!(report_id = %report_id, specialist_id = %existing, "Report already assigned");
            return Ok(existing);
        }

        let Some(specialization) = get_specialization_for_category(&tx, &report.category)? else {
            update_report_status(&tx, report_id, ReportStatus::PendingManualAssignment)?;
            tx.commit()?;
            tracing::warn!(report_id = %report_id, category = %report.category, "No category mapping");
            return Err(RoutingError::NoMappingConfigured {
                category: report.category,
            });
        };

        let candidates = available_specialists_by_workload(&tx, &specialization)?;
        let Some(chosen) = candidates.first() else {
            update_report_status(&tx, report_id, ReportStatus::PendingManualAssignment)?;
            tx.commit()?;
            tracing::warn!(
                report_id = %report_id,
                specialization = %specialization,
                "No available specialist"
            );
            return Err(RoutingError::NoSpecialistAvailable { specialization });
        };

        let now = Utc::now();
        if !set_report_assignment(&tx, report_id, &chosen.id, ReportStatus::Extracted)? {
            // Lost a race that slipped past the lock; keep whoever won
            let winner = get_report(&tx, report_id)?
                .and_then(|r| r.assigned_specialist_id)
                .ok_or(RoutingError::ReportNotFound(*report_id))?;
            return Ok(winner);
        }
        touch_last_assigned(&tx, &chosen.id, &now)?;
        let link = ensure_active_link(&tx, &report.patient_id, &chosen.id, &now)?;
        tx.commit()?;

        tracing::info!(
            report_id = %report_id,
            specialist_id = %chosen.id,
            specialization = %specialization,
            new_link = link == LinkOutcome::Created,
            candidates = candidates.len(),
            "Report routed"
        );
        Ok(chosen.id)
    }
}
