use std::sync::LazyLock;

use regex::Regex;

use crate::models::PatientInfo;

/// Ordered patterns per field; the first one that matches wins.
struct FieldPatterns {
    name: Vec<Regex>,
    patient_id: Vec<Regex>,
    age: Vec<Regex>,
    sex: Vec<Regex>,
    report_date: Vec<Regex>,
    uhid: Vec<Regex>,
    lab_id: Vec<Regex>,
}

static PATTERNS: LazyLock<FieldPatterns> = LazyLock::new(|| {
    let compile = |patterns: &[&str]| -> Vec<Regex> {
        patterns
            .iter()
            .map(|p| Regex::new(&format!("(?i){p}")).unwrap())
            .collect()
    };

    FieldPatterns {
        name: compile(&[
            r"Name\s*[:\-]?\s*(Baby\.?|Master\.?)?\s*([A-Z][a-zA-Z .'-]+)",
            r"Patient Name\s*[:\-]?\s*([A-Z][a-zA-Z .'-]+)",
        ]),
        patient_id: compile(&[r"(?:Patient ID|PID|Reg\.?\s*No\.?)\s*[:\-]?\s*(\S+)"]),
        age: compile(&[
            r"Age\s*/\s*Sex\s*[:\-]?\s*(\d+\s*(?:YRS|Years|Months|Mon)?)",
            r"Age\s*[:\-]?\s*(\d+\s*(?:YRS|Years|Months|Mon)?)",
        ]),
        sex: compile(&[
            r"Age\s*/\s*Sex\s*[:\-]?\s*\d+\s*(?:YRS|Months|Mon)?\s*/\s*(M|F)",
            r"Sex\s*[:\-]?\s*(Male|Female|M|F|Other)",
        ]),
        report_date: compile(&[
            r"(?:Report(?:ed)? on|Date|Generated on|Registered on|Collected on)\s*[:\-]?\s*([0-3]?\d[/\-\.][01]?\d[/\-\.]\d{4})",
        ]),
        uhid: compile(&[r"UHID\s*No\s*[:\-]?\s*(\S+)"]),
        lab_id: compile(&[r"LAB\s*ID\s*No\s*[:\-]?\s*(\S+)"]),
    }
});

/// Pulls demographic and administrative fields out of report text.
/// Never fails: fields that cannot be found stay `None`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PatientInfoExtractor;

impl PatientInfoExtractor {
    pub fn extract(&self, text: &str) -> PatientInfo {
        let p = &*PATTERNS;
        let info = PatientInfo {
            name: first_match(&p.name, text),
            patient_id: first_match(&p.patient_id, text),
            age: first_match(&p.age, text),
            sex: first_match(&p.sex, text).map(|s| normalize_sex(&s)),
            report_date: first_match(&p.report_date, text),
            uhid: first_match(&p.uhid, text),
            lab_id: first_match(&p.lab_id, text),
        };

        tracing::debug!(
            found = info.labelled_fields().iter().filter(|(_, v)| v.is_some()).count(),
            "Patient info extraction complete"
        );
        info
    }
}

/// All non-empty capture groups of the first matching pattern, joined by a space.
fn first_match(patterns: &[Regex], text: &str) -> Option<String> {
    patterns.iter().find_map(|re| {
        let caps = re.captures(text)?;
        let joined = caps
            .iter()
            .skip(1)
            .flatten()
            .map(|m| m.as_str().trim())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        Some(joined.trim().to_string())
    })
}

fn normalize_sex(raw: &str) -> String {
    match raw.to_uppercase().as_str() {
        "M" | "MALE" => "Male".to_string(),
        "F" | "FEMALE" => "Female".to_string(),
        _ => {
            let lower = raw.to_lowercase();
            let mut chars = lower.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(text: &str) -> PatientInfo {
        PatientInfoExtractor.extract(text)
    }

    #[test]
    fn typical_lab_header() {
        let text = "Patient Name: Ravi Kumar\n\
                    Patient ID: PT-10023\n\
                    Age/Sex: 45 YRS / M\n\
                    Reported on: 12/03/2024\n\
                    UHID No: UH99812\n\
                    LAB ID No: L-5531\n";
        let info = extract(text);
        assert_eq!(info.name.as_deref(), Some("Ravi Kumar"));
        assert_eq!(info.patient_id.as_deref(), Some("PT-10023"));
        assert_eq!(info.age.as_deref(), Some("45 YRS"));
        assert_eq!(info.sex.as_deref(), Some("Male"));
        assert_eq!(info.report_date.as_deref(), Some("12/03/2024"));
        assert_eq!(info.uhid.as_deref(), Some("UH99812"));
        assert_eq!(info.lab_id.as_deref(), Some("L-5531"));
    }

    #[test]
    fn baby_prefix_is_kept_in_name() {
        let info = extract("Name: Baby. Aarav Shah\n");
        assert_eq!(info.name.as_deref(), Some("Baby. Aarav Shah"));
    }

    #[test]
    fn standalone_sex_field_is_normalized() {
        assert_eq!(extract("Sex: female").sex.as_deref(), Some("Female"));
        assert_eq!(extract("SEX - other").sex.as_deref(), Some("Other"));
        assert_eq!(extract("Age: 8 Months").age.as_deref(), Some("8 Months"));
    }

    #[test]
    fn reg_no_counts_as_patient_id() {
        assert_eq!(extract("Reg. No.: 55/2024").patient_id.as_deref(), Some("55/2024"));
    }

    #[test]
    fn date_variants() {
        assert_eq!(
            extract("Collected on - 3.7.2023").report_date.as_deref(),
            Some("3.7.2023")
        );
        assert!(extract("Date: 2023-07-03").report_date.is_none());
    }

    #[test]
    fn text_without_header_yields_empty_info() {
        assert_eq!(extract("Hemoglobin: 11.0\nWBC - 12000"), PatientInfo::default());
        assert_eq!(extract(""), PatientInfo::default());
    }
}
