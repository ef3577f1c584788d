//! Automated treatment/lifestyle suggestions for a structured report.

pub mod ollama;
pub mod parser;

pub use ollama::*;
pub use parser::*;

use thiserror::Error;

use crate::models::{StructuredMetrics, Suggestion};
use crate::ollama::LlmError;

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Suggestion service unreachable at {0}")]
    Connection(String),

    #[error("Suggestion request timed out after {0}s")]
    Timeout(u64),

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Suggestion response is missing '{0}'")]
    MissingField(&'static str),

    #[error("Malformed suggestion response: {0}")]
    MalformedResponse(String),

    #[error("No metrics to base suggestions on")]
    EmptyInput,
}

impl From<LlmError> for GenerationError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Connection(url) => Self::Connection(url),
            LlmError::Timeout(secs) => Self::Timeout(secs),
            LlmError::Api { status, body } => Self::HttpClient(format!("HTTP {status}: {body}")),
            LlmError::HttpClient(msg) => Self::HttpClient(msg),
            LlmError::ResponseParsing(msg) => Self::MalformedResponse(msg),
        }
    }
}

/// The external collaborator that turns flagged metrics into advice.
pub trait SuggestionGenerator {
    fn generate(&self, metrics: &StructuredMetrics) -> Result<Suggestion, GenerationError>;
}

/// Test double: a fixed suggestion, or a fixed failure.
pub struct MockSuggestionGenerator {
    outcome: Result<Suggestion, String>,
    calls: std::sync::atomic::AtomicUsize,
}

impl MockSuggestionGenerator {
    pub fn ok(suggestion: Suggestion) -> Self {
        Self {
            outcome: Ok(suggestion),
            calls: Default::default(),
        }
    }

    /// Fails every call with a malformed-response error.
    pub fn failing(reason: &str) -> Self {
        Self {
            outcome: Err(reason.to_string()),
            calls: Default::default(),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

impl SuggestionGenerator for MockSuggestionGenerator {
    fn generate(&self, _metrics: &StructuredMetrics) -> Result<Suggestion, GenerationError> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.outcome
            .clone()
            .map_err(GenerationError::MalformedResponse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Priority;

    #[test]
    fn llm_errors_map_to_generation_errors() {
        assert!(matches!(
            GenerationError::from(LlmError::Timeout(120)),
            GenerationError::Timeout(120)
        ));
        assert!(matches!(
            GenerationError::from(LlmError::Connection("http://x".into())),
            GenerationError::Connection(_)
        ));
        assert!(matches!(
            GenerationError::from(LlmError::Api { status: 500, body: "boom".into() }),
            GenerationError::HttpClient(_)
        ));
    }

    #[test]
    fn mock_counts_calls() {
        let mock = MockSuggestionGenerator::ok(Suggestion {
            treatment: "t".into(),
            lifestyle: "l".into(),
            priority: Priority::Low,
        });
        mock.generate(&StructuredMetrics::new()).unwrap();
        assert!(MockSuggestionGenerator::failing("x").generate(&StructuredMetrics::new()).is_err());
        assert_eq!(mock.calls(), 1);
    }
}
