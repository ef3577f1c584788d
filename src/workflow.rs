//! Recommendation review workflow.
//!
//! ```text
//! AI_generated ──► pending_doctor_review ──┬─► approved_by_doctor
//!                                          ├─► modified_and_approved_by_doctor
//!                                          └─► consultation_required
//! ```
//!
//! Every write is guarded on the status it was read in, so a concurrent
//! review cannot be overwritten and a terminal status is never left.

use chrono::Utc;
use rusqlite::Connection;
use thiserror::Error;
use uuid::Uuid;

use crate::db::repository::{
    find_recommendation_by_report, insert_recommendation, update_recommendation_review,
};
use crate::db::DatabaseError;
use crate::models::{Recommendation, RecommendationStatus, Report, Suggestion};

#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("No recommendation for report {0}")]
    RecommendationNotFound(Uuid),

    #[error("Cannot move recommendation from {from} to {to}")]
    InvalidTransition {
        from: RecommendationStatus,
        to: RecommendationStatus,
    },

    #[error("Reviewer {actual} is not the assigned reviewer")]
    ReviewerMismatch { actual: Uuid },

    #[error("Modified {field} text must not be empty")]
    EmptyPlan { field: &'static str },

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

/// Persist a fresh suggestion directly in `pending_doctor_review`.
pub fn create_pending(
    conn: &Connection,
    report: &Report,
    reviewer_id: &Uuid,
    suggestion: &Suggestion,
) -> Result<Recommendation, WorkflowError> {
    let mut rec = Recommendation::from_suggestion(report.id, &report.patient_id, suggestion);
    rec.status = RecommendationStatus::PendingDoctorReview;
    rec.reviewer_id = Some(*reviewer_id);
    insert_recommendation(conn, &rec)?;

    tracing::info!(
        report_id = %report.id,
        recommendation_id = %rec.id,
        reviewer_id = %reviewer_id,
        priority = %rec.ai_priority,
        "Recommendation created for review"
    );
    Ok(rec)
}

/// `AI_generated → pending_doctor_review`, naming the reviewer.
pub fn assign_reviewer(
    conn: &Connection,
    report_id: &Uuid,
    reviewer_id: &Uuid,
) -> Result<Recommendation, WorkflowError> {
    let mut rec = load(conn, report_id)?;
    let from = rec.status;
    let to = RecommendationStatus::PendingDoctorReview;
    if !from.can_transition_to(to) {
        return Err(WorkflowError::InvalidTransition { from, to });
    }
    rec.reviewer_id = Some(*reviewer_id);
    commit(conn, rec, from, to)
}

/// Accept the automated suggestion verbatim.
pub fn approve(
    conn: &Connection,
    report_id: &Uuid,
    reviewer_id: &Uuid,
    notes: Option<&str>,
) -> Result<Recommendation, WorkflowError> {
    review(
        conn,
        report_id,
        reviewer_id,
        RecommendationStatus::ApprovedByDoctor,
        notes,
        |rec| {
            rec.approved_treatment = Some(rec.ai_treatment.clone());
            rec.approved_lifestyle = Some(rec.ai_lifestyle.clone());
        },
    )
}

/// Approve with the reviewer's own treatment and lifestyle text. Both must
/// be non-blank.
pub fn modify_and_approve(
    conn: &Connection,
    report_id: &Uuid,
    reviewer_id: &Uuid,
    treatment: &str,
    lifestyle: &str,
    notes: Option<&str>,
) -> Result<Recommendation, WorkflowError> {
    let treatment = treatment.trim();
    let lifestyle = lifestyle.trim();
    if treatment.is_empty() {
        return Err(WorkflowError::EmptyPlan { field: "treatment" });
    }
    if lifestyle.is_empty() {
        return Err(WorkflowError::EmptyPlan { field: "lifestyle" });
    }

    review(
        conn,
        report_id,
        reviewer_id,
        RecommendationStatus::ModifiedAndApprovedByDoctor,
        notes,
        |rec| {
            rec.approved_treatment = Some(treatment.to_string());
            rec.approved_lifestyle = Some(lifestyle.to_string());
        },
    )
}

/// Reject: nothing AI-derived may reach the patient, so approved fields are cleared.
pub fn reject(
    conn: &Connection,
    report_id: &Uuid,
    reviewer_id: &Uuid,
    notes: Option<&str>,
) -> Result<Recommendation, WorkflowError> {
    review(
        conn,
        report_id,
        reviewer_id,
        RecommendationStatus::ConsultationRequired,
        notes,
        |rec| {
            rec.approved_treatment = None;
            rec.approved_lifestyle = None;
        },
    )
}

pub fn find_by_report(
    conn: &Connection,
    report_id: &Uuid,
) -> Result<Option<Recommendation>, WorkflowError> {
    Ok(find_recommendation_by_report(conn, report_id)?)
}

fn load(conn: &Connection, report_id: &Uuid) -> Result<Recommendation, WorkflowError> {
    find_recommendation_by_report(conn, report_id)?
        .ok_or(WorkflowError::RecommendationNotFound(*report_id))
}

fn review(
    conn: &Connection,
    report_id: &Uuid,
    reviewer_id: &Uuid,
    to: RecommendationStatus,
    notes: Option<&str>,
    apply: impl FnOnce(&mut Recommendation),
) -> Result<Recommendation, WorkflowError> {
    let mut rec = load(conn, report_id)?;
    let from = rec.status;
    if !from.can_transition_to(to) {
        return Err(WorkflowError::InvalidTransition { from, to });
    }
    if rec.reviewer_id != Some(*reviewer_id) {
        tracing::warn!(report_id = %report_id, reviewer_id = %reviewer_id, "Review by non-assigned reviewer");
        return Err(WorkflowError::ReviewerMismatch {
            actual: *reviewer_id,
        });
    }

    apply(&mut rec);
    rec.reviewer_notes = notes.map(str::to_string);
    commit(conn, rec, from, to)
}

/// Stamp and write, guarded on `from`. Losing the guard means someone else
/// moved the recommendation first.
fn commit(
    conn: &Connection,
    mut rec: Recommendation,
    from: RecommendationStatus,
    to: RecommendationStatus,
) -> Result<Recommendation, WorkflowError> {
    let now = Utc::now();
    rec.status = to;
    rec.reviewed_at = Some(now);
    rec.updated_at = now;

    if !update_recommendation_review(conn, &rec, from)? {
        let current = load(conn, &rec.report_id)?.status;
        return Err(WorkflowError::InvalidTransition { from: current, to });
    }

    tracing::info!(
        report_id = %rec.report_id,
        from = %from,
        to = %to,
        "Recommendation status changed"
    );
    Ok(rec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::{insert_report, register_specialist};
    use crate::db::sqlite::open_memory_database;
    use crate::models::{FileKind, NewSpecialist, Priority};

    struct Fixture {
        conn: Connection,
        report: Report,
        reviewer: Uuid,
    }

    fn fixture() -> Fixture {
        let conn = open_memory_database().unwrap();
        let reviewer = register_specialist(
            &conn,
            &NewSpecialist {
                name: "Dr. Menon".into(),
                specialization: "General Physician".into(),
                license_number: "GP-77".into(),
                contact_number: None,
                hospital_affiliation: None,
            },
        )
        .unwrap()
        .id;
        let report = Report::new("p-9", "u-1", "Blood Test", FileKind::Pdf, "cbc.pdf", "/tmp/cbc.pdf");
        insert_report(&conn, &report).unwrap();
        Fixture { conn, report, reviewer }
    }

    fn suggestion() -> Suggestion {
        Suggestion {
            treatment: "Iron supplementation".into(),
            lifestyle: "Leafy greens, red meat twice a week".into(),
            priority: Priority::Medium,
        }
    }

    fn pending(f: &Fixture) -> Recommendation {
        create_pending(&f.conn, &f.report, &f.reviewer, &suggestion()).unwrap()
    }

    #[test]
    fn approve_copies_ai_fields() {
        let f = fixture();
        pending(&f);
        let rec = approve(&f.conn, &f.report.id, &f.reviewer, Some("Agree")).unwrap();
        assert_eq!(rec.status, RecommendationStatus::ApprovedByDoctor);
        assert_eq!(rec.approved_treatment.as_deref(), Some("Iron supplementation"));
        assert_eq!(rec.reviewer_notes.as_deref(), Some("Agree"));
        assert!(rec.reviewed_at.is_some());

        let stored = find_by_report(&f.conn, &f.report.id).unwrap().unwrap();
        assert_eq!(stored.status, RecommendationStatus::ApprovedByDoctor);
        assert_eq!(stored.approved_lifestyle, rec.approved_lifestyle);
    }

    #[test]
    fn modify_uses_reviewer_text() {
        let f = fixture();
        pending(&f);
        let rec = modify_and_approve(&f.conn, &f.report.id, &f.reviewer, "Recheck in 4 weeks", "Hydrate", None)
            .unwrap();
        assert_eq!(rec.status, RecommendationStatus::ModifiedAndApprovedByDoctor);
        assert_eq!(rec.approved_treatment.as_deref(), Some("Recheck in 4 weeks"));
        assert_eq!(rec.approved_lifestyle.as_deref(), Some("Hydrate"));
        assert_eq!(rec.ai_treatment, "Iron supplementation");
    }

    #[test]
    fn modify_with_blank_text_is_refused() {
        let f = fixture();
        pending(&f);
        assert!(matches!(
            modify_and_approve(&f.conn, &f.report.id, &f.reviewer, "Recheck in 4 weeks", "  ", None),
            Err(WorkflowError::EmptyPlan { field: "lifestyle" })
        ));
        assert!(matches!(
            modify_and_approve(&f.conn, &f.report.id, &f.reviewer, "", "Hydrate", None),
            Err(WorkflowError::EmptyPlan { field: "treatment" })
        ));
        assert_eq!(
            find_by_report(&f.conn, &f.report.id).unwrap().unwrap().status,
            RecommendationStatus::PendingDoctorReview
        );
    }

    #[test]
    fn reject_clears_approved_fields() {
        let f = fixture();
        pending(&f);
        let rec = reject(&f.conn, &f.report.id, &f.reviewer, Some("Needs consultation")).unwrap();
        assert_eq!(rec.status, RecommendationStatus::ConsultationRequired);
        assert!(rec.approved_treatment.is_none());
        assert!(rec.approved_lifestyle.is_none());

        let stored = find_by_report(&f.conn, &f.report.id).unwrap().unwrap();
        assert!(stored.approved_treatment.is_none());
        assert_eq!(stored.reviewer_notes.as_deref(), Some("Needs consultation"));
    }

    #[test]
    fn terminal_status_is_final() {
        let f = fixture();
        pending(&f);
        reject(&f.conn, &f.report.id, &f.reviewer, None).unwrap();

        let err = approve(&f.conn, &f.report.id, &f.reviewer, None).unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::InvalidTransition {
                from: RecommendationStatus::ConsultationRequired,
                to: RecommendationStatus::ApprovedByDoctor
            }
        ));
        assert!(assign_reviewer(&f.conn, &f.report.id, &f.reviewer).is_err());
        assert!(modify_and_approve(&f.conn, &f.report.id, &f.reviewer, "a", "b", None).is_err());
        assert_eq!(
            find_by_report(&f.conn, &f.report.id).unwrap().unwrap().status,
            RecommendationStatus::ConsultationRequired
        );
    }

    #[test]
    fn other_reviewer_is_rejected() {
        let f = fixture();
        pending(&f);
        let err = approve(&f.conn, &f.report.id, &Uuid::new_v4(), None).unwrap_err();
        assert!(matches!(err, WorkflowError::ReviewerMismatch { .. }));
    }

    #[test]
    fn ai_generated_moves_to_pending_on_assignment() {
        let f = fixture();
        let rec = Recommendation::from_suggestion(f.report.id, &f.report.patient_id, &suggestion());
        insert_recommendation(&f.conn, &rec).unwrap();

        // Cannot review before a reviewer is assigned
        assert!(matches!(
            approve(&f.conn, &f.report.id, &f.reviewer, None),
            Err(WorkflowError::InvalidTransition { .. })
        ));

        let moved = assign_reviewer(&f.conn, &f.report.id, &f.reviewer).unwrap();
        assert_eq!(moved.status, RecommendationStatus::PendingDoctorReview);
        assert_eq!(moved.reviewer_id, Some(f.reviewer));
        approve(&f.conn, &f.report.id, &f.reviewer, None).unwrap();
    }

    #[test]
    fn missing_recommendation_is_not_found() {
        let f = fixture();
        assert!(matches!(
            approve(&f.conn, &f.report.id, &f.reviewer, None),
            Err(WorkflowError::RecommendationNotFound(_))
        ));
    }
}
