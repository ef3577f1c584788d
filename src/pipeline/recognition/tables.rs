//! Canonical metrics, their aliases and reference ranges.
//!
//! Pure data. Adding a metric or alias means adding a row here; the
//! recognizer only ever sees a [`MetricCatalog`].

use serde::{Deserialize, Serialize};

/// Closed interval `[low, high]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReferenceRange {
    pub low: f64,
    pub high: f64,
}

impl ReferenceRange {
    pub const fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    pub fn contains(&self, value: f64) -> bool {
        self.low <= value && value <= self.high
    }
}

/// (canonical name, aliases, reference range)
type MetricRow = (&'static str, &'static [&'static str], Option<(f64, f64)>);

// ── Default tables ─────────────────────────────────────────

const METRIC_TABLE: &[MetricRow] = &[
    // CBC
    ("Hemoglobin", &["hemoglobin", "haemoglobin", "hb", "hemoglobin (hb)", "hemoglobin hb"], Some((12.0, 17.0))),
    ("WBC", &["wbc", "white blood cells", "white blood", "total wbc", "total wbc count"], Some((4000.0, 11000.0))),
    ("RBC", &["rbc", "red blood cells", "red blood", "rbc count"], Some((4.0, 6.0))),
    ("Platelet Count", &["platelet", "platelets", "plts", "platelet count"], Some((150000.0, 450000.0))),
    // Lipid panel
    ("Total Cholesterol", &["cholesterol", "total cholesterol"], Some((120.0, 200.0))),
    ("HDL", &["hdl", "hdl cholesterol"], Some((40.0, 60.0))),
    ("LDL", &["ldl", "ldl cholesterol"], Some((0.0, 100.0))),
    ("Triglycerides", &["triglycerides", "tg"], Some((0.0, 150.0))),
    ("VLDL", &["vldl", "vldl cholesterol"], Some((5.0, 40.0))),
    ("LDL/HDL Ratio", &["ldl/hdl", "ldl / hdl", "ldl to hdl ratio"], Some((1.0, 3.5))),
    (
        "Total Cholesterol/HDL Ratio",
        &["total cholesterol/hdl", "total cholesterol / hdl", "tc/hdl", "chol/hdl"],
        Some((3.5, 5.0)),
    ),
    ("TG/HDL Ratio", &["tg/hdl", "tg / hdl", "triglyceride/hdl"], Some((0.5, 3.0))),
    ("Non-HDL Cholesterol", &["non-hdl", "non-hdl cholesterol", "non hdl"], Some((0.0, 130.0))),
    // Glucose
    ("Fasting Glucose", &["fbs", "fasting glucose", "fasting blood sugar"], Some((70.0, 100.0))),
    (
        "Random Glucose",
        &["random glucose", "ppbs", "postprandial glucose", "postprandial blood sugar"],
        Some((70.0, 140.0)),
    ),
    ("Glucose", &["glucose", "blood glucose"], Some((70.0, 140.0))),
    ("HbA1c", &["hba1c", "glycated hemoglobin"], Some((4.0, 5.6))),
    // Liver
    ("ALT (SGPT)", &["alt", "sgpt", "sgpt (alt)"], Some((7.0, 56.0))),
    ("AST (SGOT)", &["ast", "sgot", "sgot (ast)"], Some((5.0, 40.0))),
    ("Total Bilirubin", &["bilirubin", "total bilirubin"], Some((0.3, 1.2))),
    ("Alkaline Phosphatase", &["alkaline phosphatase", "alk phos", "alp"], Some((44.0, 147.0))),
    // Kidney
    ("Serum Creatinine", &["creatinine", "serum creatinine"], Some((0.6, 1.3))),
    ("Blood Urea", &["urea", "blood urea"], Some((10.0, 50.0))),
    // Urine
    ("Urine pH", &["urine ph"], Some((4.5, 8.0))),
    ("Specific Gravity", &["specific gravity", "urine sg"], Some((1.005, 1.030))),
];

const DERIVATION_TABLE: &[Derivation] = &[
    Derivation::ratio("LDL/HDL Ratio", "LDL", "HDL"),
    Derivation::ratio("Total Cholesterol/HDL Ratio", "Total Cholesterol", "HDL"),
    Derivation::ratio("TG/HDL Ratio", "Triglycerides", "HDL"),
    Derivation::difference("Non-HDL Cholesterol", "Total Cholesterol", "HDL"),
];

// ── Catalog ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DerivationOp {
    Ratio,
    Difference,
}

/// A composite metric computed from two recognized operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Derivation {
    pub target: &'static str,
    pub op: DerivationOp,
    pub left: &'static str,
    pub right: &'static str,
}

impl Derivation {
    pub const fn ratio(target: &'static str, left: &'static str, right: &'static str) -> Self {
        Self { target, op: DerivationOp::Ratio, left, right }
    }

    pub const fn difference(target: &'static str, left: &'static str, right: &'static str) -> Self {
        Self { target, op: DerivationOp::Difference, left, right }
    }

    /// `None` when an operand is zero or the result is not finite.
    pub fn apply(&self, left: f64, right: f64) -> Option<f64> {
        if left == 0.0 || right == 0.0 {
            return None;
        }
        let value = match self.op {
            DerivationOp::Ratio => left / right,
            DerivationOp::Difference => left - right,
        };
        value.is_finite().then(|| (value * 100.0).round() / 100.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricDefinition {
    pub canonical: String,
    pub aliases: Vec<String>,
    pub range: Option<ReferenceRange>,
}

impl MetricDefinition {
    pub fn new(canonical: &str, aliases: &[&str], range: Option<ReferenceRange>) -> Self {
        Self {
            canonical: canonical.to_string(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
            range,
        }
    }
}

/// The full set of metrics the recognizer knows about.
#[derive(Debug, Clone)]
pub struct MetricCatalog {
    metrics: Vec<MetricDefinition>,
    derivations: Vec<Derivation>,
}

impl MetricCatalog {
    pub fn new(metrics: Vec<MetricDefinition>, derivations: Vec<Derivation>) -> Self {
        Self { metrics, derivations }
    }

    pub fn metrics(&self) -> &[MetricDefinition] {
        &self.metrics
    }

    pub fn derivations(&self) -> &[Derivation] {
        &self.derivations
    }

    pub fn range_for(&self, canonical: &str) -> Option<ReferenceRange> {
        self.metrics
            .iter()
            .find(|m| m.canonical == canonical)
            .and_then(|m| m.range)
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }
}

impl Default for MetricCatalog {
    fn default() -> Self {
        let metrics = METRIC_TABLE
            .iter()
            .map(|(canonical, aliases, range)| {
                MetricDefinition::new(canonical, aliases, range.map(|(lo, hi)| ReferenceRange::new(lo, hi)))
            })
            .collect();
        Self::new(metrics, DERIVATION_TABLE.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn canonical_names_are_unique() {
        let catalog = MetricCatalog::default();
        let names: HashSet<_> = catalog.metrics().iter().map(|m| m.canonical.as_str()).collect();
        assert_eq!(names.len(), catalog.len());
        assert_eq!(catalog.len(), 25);
    }

    #[test]
    fn derivation_targets_and_operands_are_catalogued() {
        let catalog = MetricCatalog::default();
        for d in catalog.derivations() {
            for name in [d.target, d.left, d.right] {
                assert!(
                    catalog.metrics().iter().any(|m| m.canonical == name),
                    "{name} missing from catalog"
                );
            }
        }
    }

    #[test]
    fn ranges_are_closed_intervals() {
        let range = ReferenceRange::new(12.0, 17.0);
        assert!(range.contains(12.0));
        assert!(range.contains(17.0));
        assert!(!range.contains(11.99));
        assert!(!range.contains(17.01));
    }

    #[test]
    fn derivation_rounds_and_guards_zero() {
        let ratio = Derivation::ratio("X", "A", "B");
        assert_eq!(ratio.apply(130.0, 45.0), Some(2.89));
        assert_eq!(ratio.apply(130.0, 0.0), None);
        assert_eq!(ratio.apply(0.0, 45.0), None);

        let diff = Derivation::difference("Y", "A", "B");
        assert_eq!(diff.apply(210.0, 45.0), Some(165.0));
    }

    #[test]
    fn range_lookup() {
        let catalog = MetricCatalog::default();
        assert_eq!(catalog.range_for("WBC"), Some(ReferenceRange::new(4000.0, 11000.0)));
        assert_eq!(catalog.range_for("Unknown"), None);
    }
}
