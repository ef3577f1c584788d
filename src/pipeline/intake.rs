//! Intake orchestrator.
//!
//! Drives one report through extract → structure → route → suggest →
//! recommendation, persisting after every stage. Each stage checks what is
//! already stored, so calling [`IntakePipeline::process`] again resumes from
//! the first stage that has not completed.
//!
//! Contained failures (unreadable file, no specialist, generator down) end the
//! run with `Ok(false)` and leave the report in an inspectable status. Only
//! storage failures and misuse surface as `Err`.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use rusqlite::Connection;
use thiserror::Error;
use uuid::Uuid;

use crate::db::repository::{get_report, insert_report, store_extraction, store_raw_text};
use crate::db::DatabaseError;
use crate::export::append_jsonl;
use crate::models::{Recommendation, RecommendationStatus, Report, ReportStatus, StructuredReport};
use crate::pipeline::extraction::{detect_file_kind, TextExtractor};
use crate::pipeline::recognition::{structure_text, MetricRecognizer, PatientInfoExtractor};
use crate::pipeline::routing::{RoutingError, SpecialistRouter};
use crate::pipeline::suggestion::SuggestionGenerator;
use crate::workflow::{self, WorkflowError};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Report not found: {0}")]
    ReportNotFound(Uuid),

    #[error("Upload storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    #[error("Report {0} is already being processed")]
    AlreadyRunning(Uuid),
}

/// An upload as received from the outer layer.
#[derive(Debug, Clone)]
pub struct SubmitReport {
    pub patient_id: String,
    pub uploader_id: String,
    pub file_name: String,
    pub category: String,
    pub bytes: Vec<u8>,
}

pub struct IntakePipeline {
    extractor: TextExtractor,
    recognizer: MetricRecognizer,
    patient_info: PatientInfoExtractor,
    router: SpecialistRouter,
    generator: Arc<dyn SuggestionGenerator + Send + Sync>,
    upload_dir: PathBuf,
    export_path: Option<PathBuf>,
    in_flight: Mutex<HashSet<Uuid>>,
}

impl IntakePipeline {
    pub fn new(
        extractor: TextExtractor,
        generator: Arc<dyn SuggestionGenerator + Send + Sync>,
        upload_dir: PathBuf,
    ) -> Self {
        Self {
            extractor,
            recognizer: MetricRecognizer::default(),
            patient_info: PatientInfoExtractor,
            router: SpecialistRouter,
            generator,
            upload_dir,
            export_path: None,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Append every newly structured report to this JSONL file.
    pub fn with_export(mut self, path: PathBuf) -> Self {
        self.export_path = Some(path);
        self
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    pub fn export_path(&self) -> Option<&Path> {
        self.export_path.as_deref()
    }

    /// Store the upload, create the report in `pending_extraction` and run
    /// the pipeline once. The report id is returned whatever the run's outcome.
    pub fn submit_report(
        &self,
        conn: &Connection,
        upload: SubmitReport,
    ) -> Result<Uuid, PipelineError> {
        let kind = detect_file_kind(&upload.file_name, &upload.bytes);
        let mut report = Report::new(
            &upload.patient_id,
            &upload.uploader_id,
            &upload.category,
            kind,
            &upload.file_name,
            "",
        );

        fs::create_dir_all(&self.upload_dir)?;
        let path = self
            .upload_dir
            .join(format!("{}_{}", report.id, sanitize_file_name(&upload.file_name)));
        fs::write(&path, &upload.bytes)?;
        report.file_path = path.to_string_lossy().into_owned();

        if let Err(e) = insert_report(conn, &report) {
            if let Err(cleanup) = fs::remove_file(&path) {
                tracing::warn!(path = %path.display(), error = %cleanup, "Orphaned upload left behind");
            }
            return Err(e.into());
        }
        tracing::info!(
            report_id = %report.id,
            patient_id = %report.patient_id,
            category = %report.category,
            file_kind = %kind,
            size = upload.bytes.len(),
            "Report submitted"
        );

        self.process(conn, &report.id)?;
        Ok(report.id)
    }

    /// Run (or resume) the pipeline for one report. Returns whether the report
    /// ended with a recommendation awaiting or past review.
    pub fn process(&self, conn: &Connection, report_id: &Uuid) -> Result<bool, PipelineError> {
        let _guard = InFlightGuard::acquire(&self.in_flight, *report_id)?;
        let span = tracing::info_span!("intake", report_id = %report_id);
        let _enter = span.enter();

        let report = get_report(conn, report_id)?.ok_or(PipelineError::ReportNotFound(*report_id))?;
        if report.status == ReportStatus::FailedExtraction {
            tracing::info!("Extraction previously failed, not retrying");
            return Ok(false);
        }

        // Stage 1-2: extract and structure, unless already stored
        let structured = match &report.structured {
            Some(existing) => {
                tracing::debug!("Reusing stored structured payload");
                existing.clone()
            }
            None => match self.extract_and_structure(conn, &report)? {
                Some(structured) => structured,
                None => return Ok(false),
            },
        };

        // Stage 3: route
        let specialist_id = match report.assigned_specialist_id {
            Some(id) => id,
            None => match self.router.route(conn, report_id) {
                Ok(id) => id,
                Err(RoutingError::Database(e)) => return Err(e.into()),
                Err(RoutingError::ReportNotFound(id)) => return Err(PipelineError::ReportNotFound(id)),
                Err(e) => {
                    tracing::warn!(error = %e, "Routing stopped, report awaits manual assignment");
                    return Ok(false);
                }
            },
        };

        // Stage 5 reached on an earlier run
        if let Some(existing) = workflow::find_by_report(conn, report_id)? {
            if existing.status == RecommendationStatus::AiGenerated {
                workflow::assign_reviewer(conn, report_id, &specialist_id)?;
            }
            tracing::info!(status = %existing.status, "Recommendation already exists");
            return Ok(true);
        }

        // Stage 4: suggestions
        let suggestion = match self.generator.generate(&structured.metrics) {
            Ok(suggestion) => suggestion,
            Err(e) => {
                tracing::warn!(error = %e, "Suggestion generation failed, report stays eligible for retry");
                return Ok(false);
            }
        };

        // Stage 5: recommendation straight into review
        workflow::create_pending(conn, &report, &specialist_id, &suggestion)?;
        tracing::info!(specialist_id = %specialist_id, "Intake complete");
        Ok(true)
    }

    pub fn approve(
        &self,
        conn: &Connection,
        report_id: &Uuid,
        reviewer_id: &Uuid,
        notes: Option<&str>,
    ) -> Result<Recommendation, WorkflowError> {
        workflow::approve(conn, report_id, reviewer_id, notes)
    }

    pub fn modify_and_approve(
        &self,
        conn: &Connection,
        report_id: &Uuid,
        reviewer_id: &Uuid,
        treatment: &str,
        lifestyle: &str,
        notes: Option<&str>,
    ) -> Result<Recommendation, WorkflowError> {
        workflow::modify_and_approve(conn, report_id, reviewer_id, treatment, lifestyle, notes)
    }

    pub fn reject(
        &self,
        conn: &Connection,
        report_id: &Uuid,
        reviewer_id: &Uuid,
        notes: Option<&str>,
    ) -> Result<Recommendation, WorkflowError> {
        workflow::reject(conn, report_id, reviewer_id, notes)
    }

    /// `None` means extraction produced nothing and the report is now
    /// `failed_extraction`.
    fn extract_and_structure(
        &self,
        conn: &Connection,
        report: &Report,
    ) -> Result<Option<StructuredReport>, PipelineError> {
        let bytes = match fs::read(&report.file_path) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(path = %report.file_path, error = %e, "Stored upload unreadable");
                store_raw_text(conn, &report.id, "", ReportStatus::FailedExtraction)?;
                return Ok(None);
            }
        };

        let extracted = match self.extractor.extract(&bytes, report.file_kind) {
            Ok(extracted) if !extracted.is_empty() => extracted,
            Ok(extracted) => {
                tracing::warn!(method = ?extracted.method, "Extraction yielded no text");
                store_raw_text(conn, &report.id, "", ReportStatus::FailedExtraction)?;
                return Ok(None);
            }
            Err(e) => {
                tracing::warn!(file_kind = %report.file_kind, error = %e, "Extraction failed");
                store_raw_text(conn, &report.id, "", ReportStatus::FailedExtraction)?;
                return Ok(None);
            }
        };

        let structured = structure_text(&self.recognizer, &self.patient_info, &extracted.text);
        store_extraction(conn, &report.id, &extracted.text, &structured)?;
        tracing::info!(
            method = ?extracted.method,
            chars = extracted.text.len(),
            observed = structured.metrics.observed().count(),
            "Report extracted"
        );

        if let Some(path) = &self.export_path {
            if let Err(e) = append_jsonl(path, &structured) {
                tracing::warn!(path = %path.display(), error = %e, "Structured export failed");
            }
        }
        Ok(Some(structured))
    }
}

/// Marks a report as being processed for as long as it lives.
struct InFlightGuard<'a> {
    in_flight: &'a Mutex<HashSet<Uuid>>,
    report_id: Uuid,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(in_flight: &'a Mutex<HashSet<Uuid>>, report_id: Uuid) -> Result<Self, PipelineError> {
        let mut ids = in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if !ids.insert(report_id) {
            return Err(PipelineError::AlreadyRunning(report_id));
        }
        Ok(Self {
            in_flight,
            report_id,
        })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.report_id);
    }
}

/// Base name only, restricted to `[A-Za-z0-9._-]`.
fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::{register_specialist, require_report, set_availability};
    use crate::db::sqlite::open_memory_database;
    use crate::models::{NewSpecialist, Priority, Suggestion};
    use crate::pipeline::extraction::pdfium::MockPdfBackend;
    use crate::pipeline::extraction::MockOcrEngine;
    use crate::pipeline::routing::seed_default_mappings;
    use crate::ollama::MockLlmClient;
    use crate::pipeline::suggestion::{MockSuggestionGenerator, OllamaSuggestionGenerator};

    const BLOOD_TEST: &str = "Patient Name: Asha Rao\nHemoglobin: 11.0\nWBC - 12000\n";

    fn suggestion() -> Suggestion {
        Suggestion {
            treatment: "Iron supplementation".into(),
            lifestyle: "Leafy greens".into(),
            priority: Priority::Medium,
        }
    }

    fn extractor() -> TextExtractor {
        TextExtractor::new(
            Box::new(MockOcrEngine::new("", 0.0)),
            Box::new(MockPdfBackend::scanned()),
            Box::new(MockPdfBackend::scanned()),
        )
    }

    fn pipeline(dir: &Path, generator: Arc<MockSuggestionGenerator>) -> IntakePipeline {
        IntakePipeline::new(extractor(), generator, dir.join("uploads"))
    }

    fn physician(conn: &Connection) -> Uuid {
        register_specialist(
            conn,
            &NewSpecialist {
                name: "Dr. Menon".into(),
                specialization: "General Physician".into(),
                license_number: "GP-77".into(),
                contact_number: None,
                hospital_affiliation: None,
            },
        )
        .unwrap()
        .id
    }

    fn upload(file_name: &str, bytes: &[u8]) -> SubmitReport {
        SubmitReport {
            patient_id: "p-1".into(),
            uploader_id: "u-1".into(),
            file_name: file_name.into(),
            category: "Blood Test".into(),
            bytes: bytes.to_vec(),
        }
    }

    fn setup() -> (Connection, tempfile::TempDir) {
        let conn = open_memory_database().unwrap();
        seed_default_mappings(&conn).unwrap();
        (conn, tempfile::tempdir().unwrap())
    }

    #[test]
    fn upload_reaches_pending_review() {
        let (conn, dir) = setup();
        let doctor = physician(&conn);
        let generator = Arc::new(MockSuggestionGenerator::ok(suggestion()));
        let pipeline = pipeline(dir.path(), generator.clone());

        let id = pipeline.submit_report(&conn, upload("cbc.txt", BLOOD_TEST.as_bytes())).unwrap();

        let report = require_report(&conn, &id).unwrap();
        assert_eq!(report.status, ReportStatus::Extracted);
        assert_eq!(report.assigned_specialist_id, Some(doctor));
        assert_eq!(report.file_name, "cbc.txt");
        assert!(Path::new(&report.file_path).starts_with(pipeline.upload_dir()));
        let structured = report.structured.unwrap();
        assert_eq!(structured.patient_info.name.as_deref(), Some("Asha Rao"));
        assert_eq!(structured.metrics.value("WBC"), Some(12000.0));

        let rec = workflow::find_by_report(&conn, &id).unwrap().unwrap();
        assert_eq!(rec.status, RecommendationStatus::PendingDoctorReview);
        assert_eq!(rec.reviewer_id, Some(doctor));
        assert_eq!(generator.calls(), 1);
    }

    #[test]
    fn reprocessing_does_not_duplicate_recommendation() {
        let (conn, dir) = setup();
        physician(&conn);
        let generator = Arc::new(MockSuggestionGenerator::ok(suggestion()));
        let pipeline = pipeline(dir.path(), generator.clone());

        let id = pipeline.submit_report(&conn, upload("cbc.txt", BLOOD_TEST.as_bytes())).unwrap();
        assert!(pipeline.process(&conn, &id).unwrap());
        assert!(pipeline.process(&conn, &id).unwrap());

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM recommendations WHERE report_id = ?1",
                [id.to_string()],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(generator.calls(), 1);
    }

    #[test]
    fn empty_or_unsupported_upload_fails_extraction() {
        let (conn, dir) = setup();
        physician(&conn);
        let generator = Arc::new(MockSuggestionGenerator::ok(suggestion()));
        let pipeline = pipeline(dir.path(), generator.clone());

        let blank = pipeline.submit_report(&conn, upload("blank.txt", b"   \n")).unwrap();
        let binary = pipeline.submit_report(&conn, upload("blob.bin", &[0, 1, 2, 3, 0xfe])).unwrap();

        for id in [blank, binary] {
            let report = require_report(&conn, &id).unwrap();
            assert_eq!(report.status, ReportStatus::FailedExtraction);
            assert!(report.assigned_specialist_id.is_none());
            // Hard stop: no retry
            assert!(!pipeline.process(&conn, &id).unwrap());
        }
        assert_eq!(generator.calls(), 0);
    }

    #[test]
    fn no_specialist_stops_before_generation_then_retries() {
        let (conn, dir) = setup();
        let doctor = physician(&conn);
        set_availability(&conn, &doctor, false).unwrap();
        let generator = Arc::new(MockSuggestionGenerator::ok(suggestion()));
        let pipeline = pipeline(dir.path(), generator.clone());

        let id = pipeline.submit_report(&conn, upload("cbc.txt", BLOOD_TEST.as_bytes())).unwrap();
        let report = require_report(&conn, &id).unwrap();
        assert_eq!(report.status, ReportStatus::PendingManualAssignment);
        assert!(report.structured.is_some());
        assert_eq!(generator.calls(), 0);

        set_availability(&conn, &doctor, true).unwrap();
        assert!(pipeline.process(&conn, &id).unwrap());
        let report = require_report(&conn, &id).unwrap();
        assert_eq!(report.status, ReportStatus::Extracted);
        assert_eq!(report.assigned_specialist_id, Some(doctor));
        assert_eq!(generator.calls(), 1);
    }

    #[test]
    fn generation_failure_is_retried_without_reextracting() {
        let (conn, dir) = setup();
        let doctor = physician(&conn);
        let failing = pipeline(dir.path(), Arc::new(MockSuggestionGenerator::failing("timeout")));

        let id = failing.submit_report(&conn, upload("cbc.txt", BLOOD_TEST.as_bytes())).unwrap();
        let report = require_report(&conn, &id).unwrap();
        assert_eq!(report.status, ReportStatus::Extracted);
        assert_eq!(report.assigned_specialist_id, Some(doctor));
        assert!(workflow::find_by_report(&conn, &id).unwrap().is_none());

        // The stored payload is reused, so the upload itself is no longer needed
        fs::remove_file(&report.file_path).unwrap();

        let working = pipeline(dir.path(), Arc::new(MockSuggestionGenerator::ok(suggestion())));
        assert!(working.process(&conn, &id).unwrap());
        let rec = workflow::find_by_report(&conn, &id).unwrap().unwrap();
        assert_eq!(rec.status, RecommendationStatus::PendingDoctorReview);
        assert_eq!(rec.ai_treatment, "Iron supplementation");
    }

    #[test]
    fn ai_generated_recommendation_is_moved_to_review() {
        let (conn, dir) = setup();
        let doctor = physician(&conn);
        let generator = Arc::new(MockSuggestionGenerator::failing("down"));
        let pipeline = pipeline(dir.path(), generator.clone());

        let id = pipeline.submit_report(&conn, upload("cbc.txt", BLOOD_TEST.as_bytes())).unwrap();
        let report = require_report(&conn, &id).unwrap();
        let rec = Recommendation::from_suggestion(id, &report.patient_id, &suggestion());
        crate::db::repository::insert_recommendation(&conn, &rec).unwrap();

        assert!(pipeline.process(&conn, &id).unwrap());
        let rec = workflow::find_by_report(&conn, &id).unwrap().unwrap();
        assert_eq!(rec.status, RecommendationStatus::PendingDoctorReview);
        assert_eq!(rec.reviewer_id, Some(doctor));
        assert_eq!(generator.calls(), 1);
    }

    #[test]
    fn imaging_report_without_lab_values_reaches_review() {
        let (conn, dir) = setup();
        let radiologist = register_specialist(
            &conn,
            &NewSpecialist {
                name: "Dr. Iyer".into(),
                specialization: "Radiologist".into(),
                license_number: "RAD-12".into(),
                contact_number: None,
                hospital_affiliation: None,
            },
        )
        .unwrap()
        .id;
        let client = Arc::new(MockLlmClient::new(
            r#"{"treatment_suggestions": "No treatment needed", "lifestyle_recommendations": "Stop smoking", "priority": "Low"}"#,
        ));
        let generator = Arc::new(OllamaSuggestionGenerator::new(client, "llama3.1:8b"));
        let pipeline = IntakePipeline::new(extractor(), generator, dir.path().join("uploads"));

        let mut xray = upload("chest.txt", b"Chest X-ray PA view\nImpression: lungs clear\n");
        xray.category = "X-Ray".into();
        let id = pipeline.submit_report(&conn, xray).unwrap();

        let report = require_report(&conn, &id).unwrap();
        assert_eq!(report.assigned_specialist_id, Some(radiologist));
        assert_eq!(report.structured.unwrap().metrics.observed().count(), 0);
        let rec = workflow::find_by_report(&conn, &id).unwrap().unwrap();
        assert_eq!(rec.status, RecommendationStatus::PendingDoctorReview);
        assert_eq!(rec.reviewer_id, Some(radiologist));
        assert_eq!(rec.ai_priority, Priority::Low);
    }

    #[test]
    fn concurrent_run_for_same_report_is_refused() {
        let (conn, dir) = setup();
        let pipeline = pipeline(dir.path(), Arc::new(MockSuggestionGenerator::ok(suggestion())));
        let id = Uuid::new_v4();

        let held = InFlightGuard::acquire(&pipeline.in_flight, id).unwrap();
        assert!(matches!(
            pipeline.process(&conn, &id),
            Err(PipelineError::AlreadyRunning(_))
        ));
        drop(held);
        assert!(matches!(
            pipeline.process(&conn, &id),
            Err(PipelineError::ReportNotFound(_))
        ));
    }

    #[test]
    fn export_gets_one_line_per_structured_report() {
        let (conn, dir) = setup();
        physician(&conn);
        let export = dir.path().join("structured").join("reports.jsonl");
        let pipeline = pipeline(dir.path(), Arc::new(MockSuggestionGenerator::ok(suggestion())))
            .with_export(export.clone());

        let id = pipeline.submit_report(&conn, upload("cbc.txt", BLOOD_TEST.as_bytes())).unwrap();
        pipeline.process(&conn, &id).unwrap();

        let content = fs::read_to_string(&export).unwrap();
        assert_eq!(content.lines().count(), 1);
        let record: serde_json::Value = serde_json::from_str(content.trim()).unwrap();
        assert_eq!(record["Hemoglobin"]["color"], "orange");
    }

    #[test]
    fn review_actions_pass_through() {
        let (conn, dir) = setup();
        let doctor = physician(&conn);
        let pipeline = pipeline(dir.path(), Arc::new(MockSuggestionGenerator::ok(suggestion())));

        let id = pipeline.submit_report(&conn, upload("cbc.txt", BLOOD_TEST.as_bytes())).unwrap();
        let rec = pipeline
            .reject(&conn, &id, &doctor, Some("needs in-person exam"))
            .unwrap();
        assert_eq!(rec.status, RecommendationStatus::ConsultationRequired);
        assert!(rec.approved_treatment.is_none());
        assert!(rec.approved_lifestyle.is_none());
        assert!(pipeline.approve(&conn, &id, &doctor, None).is_err());
    }

    #[test]
    fn failed_insert_removes_stored_upload() {
        let (conn, dir) = setup();
        let pipeline = pipeline(dir.path(), Arc::new(MockSuggestionGenerator::ok(suggestion())));
        conn.execute_batch("DROP TABLE recommendations; DROP TABLE reports;").unwrap();

        let err = pipeline
            .submit_report(&conn, upload("cbc.txt", BLOOD_TEST.as_bytes()))
            .unwrap_err();
        assert!(matches!(err, PipelineError::Database(_)));
        assert_eq!(fs::read_dir(pipeline.upload_dir()).unwrap().count(), 0);
    }

    #[test]
    fn file_names_are_sanitised() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\scans\\cbc report.pdf"), "cbcreport.pdf");
        assert_eq!(sanitize_file_name("..."), "upload");
        assert_eq!(sanitize_file_name(""), "upload");
    }
}
