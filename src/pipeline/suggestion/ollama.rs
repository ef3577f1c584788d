use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use super::parser::parse_suggestion;
use super::{GenerationError, SuggestionGenerator};
use crate::models::{StructuredMetrics, Suggestion};
use crate::ollama::LlmClient;

const SYSTEM_PROMPT: &str = "You are a careful clinical assistant. You always answer with one valid JSON object.";

/// Suggestions from a local model served by Ollama.
pub struct OllamaSuggestionGenerator {
    client: Arc<dyn LlmClient + Send + Sync>,
    model: String,
}

impl OllamaSuggestionGenerator {
    pub fn new(client: Arc<dyn LlmClient + Send + Sync>, model: &str) -> Self {
        Self {
            client,
            model: model.to_string(),
        }
    }
}

impl SuggestionGenerator for OllamaSuggestionGenerator {
    fn generate(&self, metrics: &StructuredMetrics) -> Result<Suggestion, GenerationError> {
        let prompt = build_prompt(metrics)?;
        let _span = tracing::info_span!("suggestion_generate", model = %self.model).entered();
        let start = std::time::Instant::now();

        let response = self.client.generate(&self.model, &prompt, SYSTEM_PROMPT, true)?;
        let suggestion = parse_suggestion(&response)?;

        tracing::info!(
            elapsed_ms = %start.elapsed().as_millis(),
            priority = %suggestion.priority,
            "Suggestion generated"
        );
        Ok(suggestion)
    }
}

#[derive(Serialize)]
struct PromptReading {
    value: Option<f64>,
    flag: String,
}

/// Prompt carrying every metric with its flag, as pretty JSON. Metrics the
/// report did not show are sent with a null value and the `missing` flag, so
/// reports without lab values (imaging, eye tests) still reach the model.
pub fn build_prompt(metrics: &StructuredMetrics) -> Result<String, GenerationError> {
    if metrics.is_empty() {
        return Err(GenerationError::EmptyInput);
    }

    let readings: BTreeMap<&str, PromptReading> = metrics
        .iter()
        .map(|(name, reading)| {
            (
                name.as_str(),
                PromptReading {
                    value: reading.value,
                    flag: reading.flag.to_string(),
                },
            )
        })
        .collect();

    let data = serde_json::to_string_pretty(&readings)
        .map_err(|e| GenerationError::MalformedResponse(e.to_string()))?;

    Ok(format!(
        "You are an expert assistant in functional and integrative medicine.\n\
         Review the lab results below and give concise, actionable advice.\n\
         Your output MUST be a JSON object with exactly these keys:\n\
         - 'treatment_suggestions': medical treatment suggestions, if any are needed.\n\
         - 'lifestyle_recommendations': diet, activity and wellness recommendations.\n\
         - 'priority': one of 'High', 'Medium' or 'Low'.\n\
         \n\
         Lab results (JSON, each with its value and range flag; a null value flagged 'missing' was not reported):\n\
         {data}\n\
         \n\
         Ensure the JSON is perfectly formed and contains only the specified keys."
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MetricFlag, MetricReading, Priority};
    use crate::ollama::MockLlmClient;

    fn metrics() -> StructuredMetrics {
        let mut m = StructuredMetrics::new();
        m.insert("LDL", MetricReading { value: Some(160.0), flag: MetricFlag::Abnormal });
        m.insert("HDL", MetricReading::missing());
        m
    }

    #[test]
    fn prompt_lists_missing_metrics_as_missing() {
        let prompt = build_prompt(&metrics()).unwrap();
        assert!(prompt.contains("\"LDL\""));
        assert!(prompt.contains("\"abnormal\""));
        assert!(prompt.contains("\"HDL\""));
        assert!(prompt.contains("\"missing\""));
        assert!(prompt.contains("'priority'"));
    }

    #[test]
    fn report_without_values_still_reaches_model() {
        let mut m = StructuredMetrics::new();
        m.insert("HDL", MetricReading::missing());
        let client = Arc::new(MockLlmClient::new(
            r#"{"treatment_suggestions": "Follow up with imaging review", "lifestyle_recommendations": "None", "priority": "Low"}"#,
        ));
        let s = OllamaSuggestionGenerator::new(client, "m").generate(&m).unwrap();
        assert_eq!(s.priority, Priority::Low);
    }

    #[test]
    fn empty_metric_map_is_empty_input() {
        assert!(matches!(
            build_prompt(&StructuredMetrics::new()),
            Err(GenerationError::EmptyInput)
        ));
    }

    #[test]
    fn generates_from_model_json() {
        let client = Arc::new(MockLlmClient::new(
            r#"{"treatment_suggestions": "Consider statin therapy", "lifestyle_recommendations": "Reduce saturated fat", "priority": "Medium"}"#,
        ));
        let generator = OllamaSuggestionGenerator::new(client, "llama3.1:8b");
        let s = generator.generate(&metrics()).unwrap();
        assert_eq!(s.priority, Priority::Medium);
        assert_eq!(s.treatment, "Consider statin therapy");
    }

    #[test]
    fn unreachable_model_is_connection_error() {
        let generator = OllamaSuggestionGenerator::new(Arc::new(MockLlmClient::unreachable()), "m");
        assert!(matches!(
            generator.generate(&metrics()),
            Err(GenerationError::Connection(_))
        ));
    }
}
