//! Text → structured payload: flagged metrics plus patient header fields.

pub mod metrics;
pub mod patient_info;
pub mod tables;

pub use metrics::MetricRecognizer;
pub use patient_info::PatientInfoExtractor;
pub use tables::{Derivation, DerivationOp, MetricCatalog, MetricDefinition, ReferenceRange};

use crate::models::StructuredReport;

/// Run both recognizers over the same text. They share nothing, so neither
/// can hold the other back.
pub fn structure_text(
    recognizer: &MetricRecognizer,
    patient_info: &PatientInfoExtractor,
    text: &str,
) -> StructuredReport {
    StructuredReport {
        patient_info: patient_info.extract(text),
        metrics: recognizer.recognize(text),
    }
}
