use std::time::Duration;

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

pub const DOCUMENT_ANALYSIS_TTL: Duration = Duration::from_secs(24 * 60 * 60);
pub const QUIZ_GENERATION_TTL: Duration = Duration::from_secs(12 * 60 * 60);
pub const CHAT_CONTEXT_TTL: Duration = Duration::from_secs(2 * 60 * 60);
pub const ANSWER_GRADING_TTL: Duration = Duration::from_secs(6 * 60 * 60);

/// Per operation-class TTLs. Call sites may override any of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtlPolicy {
    pub document_analysis: Duration,
    pub quiz_generation: Duration,
    pub chat_context: Duration,
    pub answer_grading: Duration,
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self {
            document_analysis: DOCUMENT_ANALYSIS_TTL,
            quiz_generation: QUIZ_GENERATION_TTL,
            chat_context: CHAT_CONTEXT_TTL,
            answer_grading: ANSWER_GRADING_TTL,
        }
    }
}

/// Deterministic key for a generation request.
///
/// Logically equal requests map to the same key: whitespace in the input is normalized
/// and object keys in `params` are sorted before hashing.
pub fn cache_key(input: &str, operation: &str, params: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize_input(input).as_bytes());
    hasher.update([0u8]);
    hasher.update(operation.as_bytes());
    hasher.update([0u8]);
    hasher.update(canonical_json(params).as_bytes());
    format!("{}:{}", operation, hex::encode(hasher.finalize()))
}

pub fn normalize_input(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn canonical_json(value: &Value) -> String {
    canonicalize(value).to_string()
}

fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = Map::new();
            for key in keys {
                sorted.insert(key.clone(), canonicalize(&map[key]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_ignores_param_order() {
        let a = json!({"count": 5, "difficulty": "beginner", "nested": {"x": 1, "y": 2}});
        let b = json!({"nested": {"y": 2, "x": 1}, "difficulty": "beginner", "count": 5});
        assert_eq!(cache_key("text", "quiz", &a), cache_key("text", "quiz", &b));
    }

    #[test]
    fn test_key_normalizes_whitespace() {
        let params = json!({});
        assert_eq!(
            cache_key("  some   text\n", "quiz", &params),
            cache_key("some text", "quiz", &params)
        );
    }

    #[test]
    fn test_key_separates_operations_and_params() {
        let params = json!({"count": 5});
        let quiz = cache_key("text", "quiz", &params);
        assert!(quiz.starts_with("quiz:"));
        assert_ne!(quiz, cache_key("text", "exercise", &params));
        assert_ne!(quiz, cache_key("text", "quiz", &json!({"count": 6})));
    }
}
