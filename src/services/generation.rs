use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cache::keys::{cache_key, TtlPolicy};
use crate::error::ProviderError;
use crate::types::DifficultyLevel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationKind {
    DocumentAnalysis,
    QuizGeneration,
    ExerciseGeneration,
    ChatContext,
    AnswerGrading,
}

impl GenerationKind {
    pub fn operation(&self) -> &'static str {
        match self {
            Self::DocumentAnalysis => "document_analysis",
            Self::QuizGeneration => "quiz_generation",
            Self::ExerciseGeneration => "exercise_generation",
            Self::ChatContext => "chat_context",
            Self::AnswerGrading => "answer_grading",
        }
    }

    pub fn ttl(&self, policy: &TtlPolicy) -> Duration {
        match self {
            Self::DocumentAnalysis => policy.document_analysis,
            Self::QuizGeneration | Self::ExerciseGeneration => policy.quiz_generation,
            Self::ChatContext => policy.chat_context,
            Self::AnswerGrading => policy.answer_grading,
        }
    }
}

/// A request for the generation provider. `params` carries operation options
/// (question count, difficulty, focus areas, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub kind: GenerationKind,
    pub input: String,
    #[serde(default)]
    pub params: Value,
}

impl GenerationRequest {
    pub fn new(kind: GenerationKind, input: impl Into<String>, params: Value) -> Self {
        Self {
            kind,
            input: input.into(),
            params,
        }
    }

    pub fn quiz(
        input: impl Into<String>,
        count: usize,
        difficulty: DifficultyLevel,
        focus_areas: &[String],
    ) -> Self {
        Self::new(
            GenerationKind::QuizGeneration,
            input,
            serde_json::json!({
                "count": count,
                "difficulty": difficulty.as_str(),
                "focusAreas": focus_areas,
            }),
        )
    }

    pub fn cache_key(&self) -> String {
        cache_key(&self.input, self.kind.operation(), &self.params)
    }

    /// Key for one decoded shape of the response. Raw and typed results never share an entry.
    pub fn cache_key_for(&self, view: &str) -> String {
        let operation = format!("{}/{view}", self.kind.operation());
        cache_key(&self.input, &operation, &self.params)
    }
}

/// Source of generated content (an LLM behind some API, or a fake in tests).
///
/// Responses are loosely shaped JSON; callers validate them into typed values.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<Value, ProviderError>;
}

/// Provider for tools that never generate content.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineProvider;

#[async_trait]
impl GenerationProvider for OfflineProvider {
    async fn generate(&self, request: &GenerationRequest) -> Result<Value, ProviderError> {
        Err(ProviderError::RequestFailed(format!(
            "{} is unavailable offline",
            request.kind.operation()
        )))
    }
}
