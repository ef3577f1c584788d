use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use super::tables::MetricCatalog;
use crate::models::{MetricFlag, MetricReading, StructuredMetrics};

/// Runs of dash, en dash, equals and pipe act as a label/value separator.
static DELIMITERS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[-–=|]+").unwrap());

static NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[-+]?[0-9]*\.?[0-9]+").unwrap());

/// Shortest line that can hold a `| label | value |` row.
const MIN_TABLE_LINE_CHARS: usize = 10;

struct Alias {
    /// Lowercased, delimiter-normalised form used in the free-form pass.
    normalized: String,
    /// Lowercased form used for table cell containment.
    lowered: String,
    metric: usize,
}

/// Finds known metrics in report text and flags them against reference ranges.
pub struct MetricRecognizer {
    catalog: MetricCatalog,
    /// Longest first, so `hdl cholesterol` wins over `cholesterol`.
    aliases: Vec<Alias>,
}

impl Default for MetricRecognizer {
    fn default() -> Self {
        Self::new(MetricCatalog::default())
    }
}

impl MetricRecognizer {
    pub fn new(catalog: MetricCatalog) -> Self {
        let mut aliases: Vec<Alias> = catalog
            .metrics()
            .iter()
            .enumerate()
            .flat_map(|(index, metric)| {
                metric.aliases.iter().map(move |alias| {
                    let lowered = alias.trim().to_lowercase();
                    Alias {
                        normalized: normalize_delimiters(&lowered),
                        lowered,
                        metric: index,
                    }
                })
            })
            .filter(|alias| !alias.lowered.is_empty())
            .collect();
        aliases.sort_by(|a, b| b.normalized.len().cmp(&a.normalized.len()));

        Self { catalog, aliases }
    }

    pub fn catalog(&self) -> &MetricCatalog {
        &self.catalog
    }

    /// Every catalogued metric appears exactly once in the result, unobserved
    /// ones as `missing`.
    pub fn recognize(&self, text: &str) -> StructuredMetrics {
        let mut values: Vec<Option<f64>> = vec![None; self.catalog.len()];

        for line in text.lines() {
            self.scan_free_form(line, &mut values);
        }
        for line in text.lines() {
            self.scan_table_row(line, &mut values);
        }

        let mut by_name: HashMap<&str, Option<f64>> = self
            .catalog
            .metrics()
            .iter()
            .zip(values.iter())
            .map(|(metric, value)| (metric.canonical.as_str(), *value))
            .collect();
        self.derive(&mut by_name);

        let mut metrics = StructuredMetrics::new();
        for metric in self.catalog.metrics() {
            let value = by_name.get(metric.canonical.as_str()).copied().flatten();
            let flag = match (value, metric.range) {
                (None, _) => MetricFlag::Missing,
                (Some(_), None) => MetricFlag::UnknownRange,
                (Some(v), Some(range)) if range.contains(v) => MetricFlag::Normal,
                (Some(_), Some(_)) => MetricFlag::Abnormal,
            };
            metrics.insert(&metric.canonical, MetricReading { value, flag });
        }

        tracing::debug!(
            observed = metrics.observed().count(),
            total = metrics.len(),
            "Metric recognition complete"
        );
        metrics
    }

    /// `label: value` anywhere in a line. A matched alias span is consumed so
    /// shorter aliases cannot match inside it.
    fn scan_free_form(&self, line: &str, values: &mut [Option<f64>]) {
        let normalized = normalize_delimiters(&line.to_lowercase());
        let mut consumed: Vec<(usize, usize)> = Vec::new();

        for alias in &self.aliases {
            let hit = normalized
                .match_indices(alias.normalized.as_str())
                .map(|(start, m)| (start, start + m.len()))
                .find(|&(start, end)| {
                    is_word_bounded(&normalized, start, end)
                        && !consumed.iter().any(|&(s, e)| start < e && s < end)
                });

            let Some((start, end)) = hit else { continue };
            consumed.push((start, end));

            if values[alias.metric].is_none() {
                values[alias.metric] = first_number(&normalized[end..]);
            }
        }
    }

    /// `| label | value | ...` rows: column 0 names the metric, column 1 holds the value.
    fn scan_table_row(&self, line: &str, values: &mut [Option<f64>]) {
        if !line.contains('|') || line.chars().count() < MIN_TABLE_LINE_CHARS {
            return;
        }

        let cols: Vec<String> = line
            .trim()
            .trim_matches('|')
            .split('|')
            .map(|c| c.trim().to_lowercase())
            .collect();
        if cols.len() < 2 {
            return;
        }

        let Some(alias) = self.aliases.iter().find(|a| cols[0].contains(a.lowered.as_str())) else {
            return;
        };
        if values[alias.metric].is_none() {
            values[alias.metric] = first_number(&cols[1]);
        }
    }

    fn derive(&self, values: &mut HashMap<&str, Option<f64>>) {
        for derivation in self.catalog.derivations() {
            if values.get(derivation.target).copied().flatten().is_some() {
                continue;
            }
            let left = values.get(derivation.left).copied().flatten();
            let right = values.get(derivation.right).copied().flatten();
            let (Some(left), Some(right)) = (left, right) else {
                continue;
            };

            if let Some(derived) = derivation.apply(left, right) {
                tracing::debug!(metric = derivation.target, value = derived, "Derived metric");
                values.insert(derivation.target, Some(derived));
            }
        }
    }
}

fn normalize_delimiters(s: &str) -> String {
    DELIMITERS.replace_all(s, ":").into_owned()
}

fn is_word_bounded(haystack: &str, start: usize, end: usize) -> bool {
    let before = haystack[..start].chars().next_back();
    let after = haystack[end..].chars().next();
    !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
}

/// Thousands separators are dropped before the first number is taken.
fn first_number(segment: &str) -> Option<f64> {
    let cleaned = segment.replace(',', "");
    NUMBER
        .find(&cleaned)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::recognition::tables::{MetricDefinition, ReferenceRange};

    fn recognize(text: &str) -> StructuredMetrics {
        MetricRecognizer::default().recognize(text)
    }

    #[test]
    fn hemoglobin_and_wbc_both_abnormal() {
        let metrics = recognize("Hemoglobin: 11.0\nWBC - 12000\n");
        let hb = metrics.get("Hemoglobin").unwrap();
        assert_eq!(hb.value, Some(11.0));
        assert_eq!(hb.flag, MetricFlag::Abnormal);
        let wbc = metrics.get("WBC").unwrap();
        assert_eq!(wbc.value, Some(12000.0));
        assert_eq!(wbc.flag, MetricFlag::Abnormal);
    }

    #[test]
    fn empty_text_reports_every_metric_missing() {
        let catalog = MetricCatalog::default();
        let metrics = recognize("");
        assert_eq!(metrics.len(), catalog.len());
        assert!(metrics.iter().all(|(_, r)| r.flag == MetricFlag::Missing && r.value.is_none()));
    }

    #[test]
    fn range_bounds_are_inclusive() {
        let metrics = recognize("Hemoglobin 12\nHDL = 60\nLDL: 100.5");
        assert_eq!(metrics.get("Hemoglobin").unwrap().flag, MetricFlag::Normal);
        assert_eq!(metrics.get("HDL").unwrap().flag, MetricFlag::Normal);
        assert_eq!(metrics.get("LDL").unwrap().flag, MetricFlag::Abnormal);
    }

    #[test]
    fn first_value_wins() {
        let metrics = recognize("Glucose: 90\nGlucose: 250");
        assert_eq!(metrics.value("Glucose"), Some(90.0));
    }

    #[test]
    fn aliases_require_word_boundaries() {
        // "hb" must not match inside "hba1c"
        let metrics = recognize("HbA1c: 6.1");
        assert_eq!(metrics.value("HbA1c"), Some(6.1));
        assert!(metrics.value("Hemoglobin").is_none());
    }

    #[test]
    fn longer_alias_consumes_its_span() {
        let metrics = recognize("HDL Cholesterol: 45\nTotal Cholesterol: 210");
        assert_eq!(metrics.value("HDL"), Some(45.0));
        assert_eq!(metrics.value("Total Cholesterol"), Some(210.0));
    }

    #[test]
    fn ratio_alias_does_not_feed_operands() {
        let metrics = recognize("LDL/HDL: 2.9");
        assert_eq!(metrics.value("LDL/HDL Ratio"), Some(2.9));
        assert!(metrics.value("LDL").is_none());
        assert!(metrics.value("HDL").is_none());
    }

    #[test]
    fn thousands_separators_are_stripped() {
        let metrics = recognize("Platelet Count: 2,50,000 /cumm");
        assert_eq!(metrics.value("Platelet Count"), Some(250000.0));
        assert_eq!(metrics.get("Platelet Count").unwrap().flag, MetricFlag::Normal);
    }

    #[test]
    fn table_rows_fill_unset_metrics() {
        let text = "| Test | Result | Unit |\n| Serum Creatinine | 1.6 | mg/dL |\n| Blood Urea | 38 | mg/dL |";
        let metrics = recognize(text);
        assert_eq!(metrics.value("Serum Creatinine"), Some(1.6));
        assert_eq!(metrics.get("Serum Creatinine").unwrap().flag, MetricFlag::Abnormal);
        assert_eq!(metrics.value("Blood Urea"), Some(38.0));
    }

    #[test]
    fn lipid_ratios_are_derived() {
        let metrics = recognize("Total Cholesterol: 210\nHDL: 45\nLDL: 130\nTriglycerides: 180");
        assert_eq!(metrics.value("LDL/HDL Ratio"), Some(2.89));
        assert_eq!(metrics.value("Total Cholesterol/HDL Ratio"), Some(4.67));
        assert_eq!(metrics.value("TG/HDL Ratio"), Some(4.0));
        assert_eq!(metrics.value("Non-HDL Cholesterol"), Some(165.0));
        assert_eq!(metrics.get("Non-HDL Cholesterol").unwrap().flag, MetricFlag::Abnormal);
    }

    #[test]
    fn reported_ratio_is_not_overwritten() {
        let metrics = recognize("LDL: 130\nHDL: 45\nLDL/HDL Ratio: 3.1");
        assert_eq!(metrics.value("LDL/HDL Ratio"), Some(3.1));
    }

    #[test]
    fn zero_operand_skips_derivation() {
        let metrics = recognize("LDL: 130\nHDL: 0");
        assert!(metrics.value("LDL/HDL Ratio").is_none());
        assert_eq!(metrics.get("LDL/HDL Ratio").unwrap().flag, MetricFlag::Missing);
    }

    #[test]
    fn metric_without_range_is_unknown_range() {
        let catalog = MetricCatalog::new(
            vec![
                MetricDefinition::new("Ferritin", &["ferritin"], None),
                MetricDefinition::new("Vitamin D", &["vitamin d"], Some(ReferenceRange::new(30.0, 100.0))),
            ],
            vec![],
        );
        let metrics = MetricRecognizer::new(catalog).recognize("Ferritin: 220\nVitamin D: 18");
        assert_eq!(metrics.len(), 2);
        assert_eq!(metrics.get("Ferritin").unwrap().flag, MetricFlag::UnknownRange);
        assert_eq!(metrics.value("Ferritin"), Some(220.0));
        assert_eq!(metrics.get("Vitamin D").unwrap().flag, MetricFlag::Abnormal);
    }

    #[test]
    fn label_without_value_stays_missing() {
        let metrics = recognize("Urine pH: not done");
        assert_eq!(metrics.get("Urine pH").unwrap().flag, MetricFlag::Missing);
    }
}
