#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use learning_engine::services::generation::{GenerationKind, GenerationProvider, GenerationRequest};
use learning_engine::{
    EngineConfig, KeywordClassifier, LearningEngine, MemoryStore, ProviderError, Store,
};

/// Provider that answers every request with canned JSON and counts its calls.
pub struct FakeProvider {
    calls: AtomicUsize,
    delay: Duration,
    failure: Option<ProviderError>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            delay: Duration::ZERO,
            failure: None,
        }
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::new()
        }
    }

    pub fn failing(error: ProviderError) -> Self {
        Self {
            failure: Some(error),
            ..Self::new()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerationProvider for FakeProvider {
    async fn generate(&self, request: &GenerationRequest) -> Result<Value, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        Ok(canned_response(request))
    }
}

pub fn canned_response(request: &GenerationRequest) -> Value {
    match request.kind {
        GenerationKind::QuizGeneration => json!({
            "questions": [
                {
                    "type": "multipleChoice",
                    "question": format!("Which keyword moves ownership in {}?", request.input),
                    "options": ["move", "ref", "mut"],
                    "correctIndex": 0,
                },
                {
                    "type": "trueFalse",
                    "text": "Borrowing transfers ownership",
                    "answer": false,
                },
                { "type": "multipleChoice", "text": "broken", "options": [] },
            ]
        }),
        GenerationKind::ExerciseGeneration => json!({
            "exercises": [
                { "title": "Lifetimes", "prompt": "Annotate this function", "hints": ["'a"] }
            ]
        }),
        GenerationKind::AnswerGrading => json!({
            "score": 0.75,
            "isCorrect": true,
            "feedback": "mostly right",
        }),
        GenerationKind::DocumentAnalysis => json!({
            "summary": "notes about ownership",
            "keyTopics": ["ownership", "borrowing"],
            "difficulty": "intermediate",
            "studyTips": ["draw the stack"],
        }),
        GenerationKind::ChatContext => json!({ "context": request.input }),
    }
}

pub async fn engine_with(
    store: Arc<dyn Store>,
    provider: Arc<dyn GenerationProvider>,
) -> LearningEngine {
    LearningEngine::load(
        store,
        provider,
        Arc::new(KeywordClassifier::default()),
        EngineConfig::default(),
    )
    .await
}

pub async fn memory_engine(provider: Arc<FakeProvider>) -> (LearningEngine, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let engine = engine_with(store.clone(), provider).await;
    (engine, store)
}
