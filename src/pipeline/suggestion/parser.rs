use serde_json::Value;

use super::GenerationError;
use crate::models::{Priority, Suggestion};

/// Parse model output into a [`Suggestion`].
///
/// Accepts bare JSON or JSON inside a ```json fence. All three keys are
/// required; the priority must be High, Medium or Low (any case).
pub fn parse_suggestion(response: &str) -> Result<Suggestion, GenerationError> {
    let json_str = extract_json_block(response);
    let value: Value = serde_json::from_str(json_str)
        .map_err(|e| GenerationError::MalformedResponse(format!("invalid JSON: {e}")))?;

    let obj = value
        .as_object()
        .ok_or_else(|| GenerationError::MalformedResponse("expected a JSON object".into()))?;

    let treatment = text_field(obj.get("treatment_suggestions"), "treatment_suggestions")?;
    let lifestyle = text_field(obj.get("lifestyle_recommendations"), "lifestyle_recommendations")?;

    let raw_priority = obj
        .get("priority")
        .ok_or(GenerationError::MissingField("priority"))?;
    let priority = raw_priority
        .as_str()
        .and_then(Priority::parse_loose)
        .ok_or_else(|| GenerationError::MalformedResponse(format!("unknown priority {raw_priority}")))?;

    Ok(Suggestion {
        treatment,
        lifestyle,
        priority,
    })
}

fn extract_json_block(response: &str) -> &str {
    let trimmed = response.trim();
    let Some(start) = trimmed.find("```") else {
        return trimmed;
    };
    let after_fence = &trimmed[start + 3..];
    let body = after_fence.strip_prefix("json").unwrap_or(after_fence);
    match body.find("```") {
        Some(end) => body[..end].trim(),
        None => body.trim(),
    }
}

/// A string, or a list of strings joined one per line.
fn text_field(value: Option<&Value>, key: &'static str) -> Result<String, GenerationError> {
    match value {
        None | Some(Value::Null) => Err(GenerationError::MissingField(key)),
        Some(Value::String(s)) => Ok(s.trim().to_string()),
        Some(Value::Array(items)) => {
            let lines: Option<Vec<&str>> = items.iter().map(Value::as_str).collect();
            lines
                .map(|l| l.join("\n"))
                .ok_or_else(|| GenerationError::MalformedResponse(format!("'{key}' must be text")))
        }
        Some(_) => Err(GenerationError::MalformedResponse(format!("'{key}' must be text"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_object() {
        let s = parse_suggestion(
            r#"{"treatment_suggestions": "Start statin", "lifestyle_recommendations": "Walk daily", "priority": "High"}"#,
        )
        .unwrap();
        assert_eq!(s.treatment, "Start statin");
        assert_eq!(s.lifestyle, "Walk daily");
        assert_eq!(s.priority, Priority::High);
    }

    #[test]
    fn parses_fenced_block_with_loose_priority() {
        let response = "Here you go:\n```json\n{\"treatment_suggestions\": \"None needed\", \"lifestyle_recommendations\": [\"Sleep 8h\", \"Less sugar\"], \"priority\": \"low\"}\n```";
        let s = parse_suggestion(response).unwrap();
        assert_eq!(s.lifestyle, "Sleep 8h\nLess sugar");
        assert_eq!(s.priority, Priority::Low);
    }

    #[test]
    fn missing_key_is_reported() {
        let err = parse_suggestion(r#"{"treatment_suggestions": "x", "priority": "Medium"}"#).unwrap_err();
        assert!(matches!(err, GenerationError::MissingField("lifestyle_recommendations")));
    }

    #[test]
    fn unknown_priority_is_malformed() {
        let err = parse_suggestion(
            r#"{"treatment_suggestions": "x", "lifestyle_recommendations": "y", "priority": "Urgent"}"#,
        )
        .unwrap_err();
        assert!(matches!(err, GenerationError::MalformedResponse(_)));
    }

    #[test]
    fn non_json_is_malformed() {
        assert!(matches!(
            parse_suggestion("I cannot help with that."),
            Err(GenerationError::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_suggestion("[1, 2]"),
            Err(GenerationError::MalformedResponse(_))
        ));
    }
}
