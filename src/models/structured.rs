use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::enums::MetricFlag;

/// One flagged reading for a canonical metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricReading {
    pub value: Option<f64>,
    pub flag: MetricFlag,
}

impl MetricReading {
    pub fn missing() -> Self {
        Self {
            value: None,
            flag: MetricFlag::Missing,
        }
    }
}

/// Canonical metric name → flagged reading.
///
/// Keyed by canonical name, so each metric appears at most once. The recognizer
/// fills in every metric of its catalog, observed or not.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StructuredMetrics(BTreeMap<String, MetricReading>);

impl StructuredMetrics {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn insert(&mut self, name: &str, reading: MetricReading) {
        self.0.insert(name.to_string(), reading);
    }

    pub fn get(&self, name: &str) -> Option<&MetricReading> {
        self.0.get(name)
    }

    pub fn value(&self, name: &str) -> Option<f64> {
        self.0.get(name).and_then(|r| r.value)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &MetricReading)> {
        self.0.iter()
    }

    /// Readings that carry a value (anything but `missing`).
    pub fn observed(&self) -> impl Iterator<Item = (&String, &MetricReading)> {
        self.0.iter().filter(|(_, r)| r.value.is_some())
    }
}

/// Demographic and administrative fields pulled from report text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientInfo {
    pub name: Option<String>,
    pub patient_id: Option<String>,
    pub age: Option<String>,
    pub sex: Option<String>,
    pub report_date: Option<String>,
    pub uhid: Option<String>,
    pub lab_id: Option<String>,
}

impl PatientInfo {
    /// Fields in display order, paired with their export labels.
    pub fn labelled_fields(&self) -> [(&'static str, Option<&str>); 7] {
        [
            ("Patient Name", self.name.as_deref()),
            ("Patient ID", self.patient_id.as_deref()),
            ("Age", self.age.as_deref()),
            ("Sex", self.sex.as_deref()),
            ("Report Date", self.report_date.as_deref()),
            ("UHID", self.uhid.as_deref()),
            ("Lab ID", self.lab_id.as_deref()),
        ]
    }
}

/// Combined payload persisted on the report once extraction succeeds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuredReport {
    pub patient_info: PatientInfo,
    pub metrics: StructuredMetrics,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_serialize_as_plain_map() {
        let mut metrics = StructuredMetrics::new();
        metrics.insert(
            "HDL",
            MetricReading {
                value: Some(45.0),
                flag: MetricFlag::Normal,
            },
        );
        metrics.insert("LDL", MetricReading::missing());

        let json = serde_json::to_value(&metrics).unwrap();
        assert_eq!(json["HDL"]["value"], 45.0);
        assert_eq!(json["HDL"]["flag"], "normal");
        assert!(json["LDL"]["value"].is_null());
        assert_eq!(json["LDL"]["flag"], "missing");
    }

    #[test]
    fn inserting_same_name_keeps_one_entry() {
        let mut metrics = StructuredMetrics::new();
        metrics.insert("WBC", MetricReading::missing());
        metrics.insert(
            "WBC",
            MetricReading {
                value: Some(5000.0),
                flag: MetricFlag::Normal,
            },
        );
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics.value("WBC"), Some(5000.0));
        assert_eq!(metrics.observed().count(), 1);
    }

    #[test]
    fn structured_report_round_trips() {
        let report = StructuredReport {
            patient_info: PatientInfo {
                name: Some("Asha Rao".into()),
                ..Default::default()
            },
            metrics: StructuredMetrics::new(),
        };
        let json = serde_json::to_string(&report).unwrap();
        let back: StructuredReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back, report);
    }
}
