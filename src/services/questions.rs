//! Typed generation payloads.
//!
//! Provider responses are untyped JSON. Everything here converts them into the
//! tagged types the scheduler and selector work with, dropping malformed entries.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::ProviderError;
use crate::types::DifficultyLevel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum QuestionType {
    MultipleChoice,
    TrueFalse,
    FillInBlank,
    ShortAnswer,
    Essay,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum QuestionKind {
    #[serde(rename_all = "camelCase")]
    MultipleChoice {
        options: Vec<String>,
        correct_index: usize,
    },
    #[serde(rename_all = "camelCase")]
    TrueFalse { answer: bool },
    #[serde(rename_all = "camelCase")]
    FillInBlank { answer: String },
    #[serde(rename_all = "camelCase")]
    ShortAnswer { sample_answer: String },
    #[serde(rename_all = "camelCase")]
    Essay {
        #[serde(default)]
        rubric: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: String,
    pub text: String,
    #[serde(flatten)]
    pub kind: QuestionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
}

impl Question {
    pub fn new(text: impl Into<String>, kind: QuestionKind) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            text: text.into(),
            kind,
            explanation: None,
            topic: None,
        }
    }

    pub fn question_type(&self) -> QuestionType {
        match self.kind {
            QuestionKind::MultipleChoice { .. } => QuestionType::MultipleChoice,
            QuestionKind::TrueFalse { .. } => QuestionType::TrueFalse,
            QuestionKind::FillInBlank { .. } => QuestionType::FillInBlank,
            QuestionKind::ShortAnswer { .. } => QuestionType::ShortAnswer,
            QuestionKind::Essay { .. } => QuestionType::Essay,
        }
    }

    /// Answer shown on the back of a review card.
    pub fn answer_text(&self) -> String {
        match &self.kind {
            QuestionKind::MultipleChoice {
                options,
                correct_index,
            } => options.get(*correct_index).cloned().unwrap_or_default(),
            QuestionKind::TrueFalse { answer } => {
                let label = if *answer { "True" } else { "False" };
                label.to_string()
            }
            QuestionKind::FillInBlank { answer } => answer.clone(),
            QuestionKind::ShortAnswer { sample_answer } => sample_answer.clone(),
            QuestionKind::Essay { rubric } => rubric.clone().unwrap_or_default(),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.text.trim().is_empty() {
            return Err("empty question text".into());
        }
        match &self.kind {
            QuestionKind::MultipleChoice {
                options,
                correct_index,
            } => {
                if options.len() < 2 {
                    return Err("multiple choice needs at least two options".into());
                }
                if options.iter().any(|o| o.trim().is_empty()) {
                    return Err("multiple choice has an empty option".into());
                }
                if *correct_index >= options.len() {
                    return Err(format!(
                        "correct index {correct_index} out of range for {} options",
                        options.len()
                    ));
                }
            }
            QuestionKind::FillInBlank { answer } if answer.trim().is_empty() => {
                return Err("fill-in-the-blank without an answer".into());
            }
            QuestionKind::ShortAnswer { sample_answer } if sample_answer.trim().is_empty() => {
                return Err("short answer without a sample answer".into());
            }
            _ => {}
        }
        Ok(())
    }
}

/// Loose shape accepted from providers before validation.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawQuestion {
    #[serde(default)]
    id: Option<String>,
    #[serde(alias = "question", alias = "prompt")]
    text: String,
    #[serde(flatten)]
    kind: QuestionKind,
    #[serde(default)]
    explanation: Option<String>,
    #[serde(default)]
    topic: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exercise {
    pub id: String,
    pub title: String,
    pub prompt: String,
    #[serde(default)]
    pub difficulty: DifficultyLevel,
    #[serde(default)]
    pub hints: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solution: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradingResult {
    /// Fraction of full credit, 0..=1.
    pub score: f64,
    pub is_correct: bool,
    #[serde(default)]
    pub feedback: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentAnalysis {
    pub summary: String,
    #[serde(default)]
    pub key_topics: Vec<String>,
    #[serde(default)]
    pub difficulty: DifficultyLevel,
    #[serde(default)]
    pub study_tips: Vec<String>,
}

/// Accepts `{"questions": [...]}` or a bare array; invalid entries are dropped.
pub fn parse_questions(payload: &Value) -> Result<Vec<Question>, ProviderError> {
    let entries = list_field(payload, "questions")?;

    let mut seen = HashSet::new();
    let mut questions = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        let raw: RawQuestion = match serde_json::from_value(entry.clone()) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(index, error = %err, "dropping malformed question");
                continue;
            }
        };
        let id = raw
            .id
            .filter(|id| !id.trim().is_empty() && !seen.contains(id))
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let question = Question {
            id,
            text: raw.text.trim().to_string(),
            kind: raw.kind,
            explanation: raw.explanation,
            topic: raw.topic,
        };
        if let Err(reason) = question.validate() {
            warn!(index, %reason, "dropping invalid question");
            continue;
        }
        seen.insert(question.id.clone());
        questions.push(question);
    }

    if questions.is_empty() {
        return Err(ProviderError::InvalidResponse(
            "no valid questions in response".into(),
        ));
    }
    Ok(questions)
}

pub fn parse_exercises(payload: &Value) -> Result<Vec<Exercise>, ProviderError> {
    let entries = list_field(payload, "exercises")?;
    let exercises: Vec<Exercise> = entries
        .iter()
        .enumerate()
        .filter_map(|(index, entry)| {
            let mut entry = entry.clone();
            if let Some(obj) = entry.as_object_mut() {
                obj.entry("id")
                    .or_insert_with(|| Value::String(uuid::Uuid::new_v4().to_string()));
            }
            match serde_json::from_value::<Exercise>(entry) {
                Ok(ex) if !ex.prompt.trim().is_empty() => Some(ex),
                Ok(_) => {
                    warn!(index, "dropping exercise without a prompt");
                    None
                }
                Err(err) => {
                    warn!(index, error = %err, "dropping malformed exercise");
                    None
                }
            }
        })
        .collect();

    if exercises.is_empty() {
        return Err(ProviderError::InvalidResponse(
            "no valid exercises in response".into(),
        ));
    }
    Ok(exercises)
}

pub fn parse_grading(payload: &Value) -> Result<GradingResult, ProviderError> {
    let result: GradingResult = serde_json::from_value(payload.clone())
        .map_err(|e| ProviderError::InvalidResponse(format!("grading: {e}")))?;
    if !result.score.is_finite() || !(0.0..=1.0).contains(&result.score) {
        return Err(ProviderError::InvalidResponse(format!(
            "grading score {} outside 0..=1",
            result.score
        )));
    }
    Ok(result)
}

pub fn parse_document_analysis(payload: &Value) -> Result<DocumentAnalysis, ProviderError> {
    let analysis: DocumentAnalysis = serde_json::from_value(payload.clone())
        .map_err(|e| ProviderError::InvalidResponse(format!("document analysis: {e}")))?;
    if analysis.summary.trim().is_empty() {
        return Err(ProviderError::InvalidResponse(
            "document analysis without a summary".into(),
        ));
    }
    Ok(analysis)
}

fn list_field<'a>(payload: &'a Value, field: &str) -> Result<&'a Vec<Value>, ProviderError> {
    match payload {
        Value::Array(items) => Ok(items),
        Value::Object(map) => map
            .get(field)
            .and_then(Value::as_array)
            .ok_or_else(|| ProviderError::InvalidResponse(format!("missing `{field}` array"))),
        _ => Err(ProviderError::InvalidResponse(format!(
            "expected `{field}` array"
        ))),
    }
}
