use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_EASE_FACTOR: f64 = 2.5;
pub const MIN_EASE_FACTOR: f64 = 1.3;

// ============================================================================
// Spaced repetition
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewItem {
    pub id: String,
    pub prompt_text: String,
    pub answer_text: String,
    /// 1 (easiest) ..= 5 (hardest)
    pub difficulty: u8,
    pub next_review: DateTime<Utc>,
    /// `None` until the first review.
    pub last_reviewed: Option<DateTime<Utc>>,
    pub review_count: u32,
    pub ease_factor: f64,
    pub interval_days: u32,
    pub repetitions: u32,
}

impl ReviewItem {
    pub fn new(prompt_text: String, answer_text: String, difficulty: u8, now: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            prompt_text,
            answer_text,
            difficulty: difficulty.clamp(1, 5),
            next_review: now,
            last_reviewed: None,
            review_count: 0,
            ease_factor: DEFAULT_EASE_FACTOR,
            interval_days: 1,
            repetitions: 0,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_review <= now
    }

    pub fn is_new(&self) -> bool {
        self.review_count == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudySession {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub items_reviewed: u32,
    pub correct_count: u32,
}

impl StudySession {
    pub fn start(now: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            started_at: now,
            ended_at: None,
            items_reviewed: 0,
            correct_count: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.ended_at.is_none()
    }
}

/// Import/export document for the review pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SrsExport {
    pub srs_items: Vec<ReviewItem>,
    pub study_sessions: Vec<StudySession>,
    pub export_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SrsStats {
    pub total: usize,
    pub due: usize,
    pub new: usize,
    pub learning: usize,
    pub mature: usize,
    pub average_ease: f64,
}

// ============================================================================
// Progress
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DifficultyLevel {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

impl DifficultyLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Beginner => "beginner",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
        }
    }

    pub fn harder(&self) -> Self {
        match self {
            Self::Beginner => Self::Intermediate,
            _ => Self::Advanced,
        }
    }

    /// SRS difficulty (1..=5) assigned to review items admitted at this level.
    pub fn review_difficulty(&self) -> u8 {
        match self {
            Self::Beginner => 2,
            Self::Intermediate => 3,
            Self::Advanced => 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicProgress {
    pub topic: String,
    pub total_attempts: u32,
    pub average_score: f64,
    pub best_score: f64,
    pub last_attempt_date: Option<DateTime<Utc>>,
    pub streak_count: u32,
    pub difficulty_level: DifficultyLevel,
    #[serde(default)]
    pub weak_areas: BTreeSet<String>,
    #[serde(default)]
    pub strong_areas: BTreeSet<String>,
}

impl TopicProgress {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            total_attempts: 0,
            average_score: 0.0,
            best_score: 0.0,
            last_attempt_date: None,
            streak_count: 0,
            difficulty_level: DifficultyLevel::Beginner,
            weak_areas: BTreeSet::new(),
            strong_areas: BTreeSet::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionResult {
    pub question_index: usize,
    pub is_correct: bool,
    pub time_spent_seconds: u32,
    #[serde(default = "default_attempts")]
    pub attempts: u32,
}

fn default_attempts() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizAttempt {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub score: f64,
    pub max_score: f64,
    pub time_spent_seconds: u32,
    #[serde(default)]
    pub per_question_result: Vec<QuestionResult>,
}

impl QuizAttempt {
    pub fn new(score: f64, max_score: f64, per_question_result: Vec<QuestionResult>) -> Self {
        let time_spent_seconds = per_question_result
            .iter()
            .map(|r| r.time_spent_seconds)
            .sum();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            score,
            max_score,
            time_spent_seconds,
            per_question_result,
        }
    }

    /// Score as a fraction of the maximum; 0 when the quiz had no points.
    pub fn ratio(&self) -> f64 {
        if self.max_score <= 0.0 {
            0.0
        } else {
            (self.score / self.max_score).clamp(0.0, 1.0)
        }
    }

    pub fn is_perfect(&self) -> bool {
        self.max_score > 0.0 && self.score >= self.max_score
    }

    pub fn is_pass(&self) -> bool {
        self.ratio() >= crate::services::progress::PASS_RATIO
    }

    pub fn question_count(&self) -> usize {
        if self.per_question_result.is_empty() {
            self.max_score.max(0.0) as usize
        } else {
            self.per_question_result.len()
        }
    }

    pub fn correct_count(&self) -> usize {
        self.per_question_result.iter().filter(|r| r.is_correct).count()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub total_quizzes: u32,
    pub total_questions: u32,
    pub correct_answers: u32,
    pub total_time_seconds: u64,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub last_activity: Option<DateTime<Utc>>,
}

impl UserStats {
    pub fn accuracy(&self) -> f64 {
        if self.total_questions == 0 {
            0.0
        } else {
            self.correct_answers as f64 / self.total_questions as f64
        }
    }
}

// ============================================================================
// Gamification
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BadgeRarity {
    Common,
    Rare,
    Epic,
    Legendary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Badge {
    pub id: String,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub unlocked_at: DateTime<Utc>,
    pub rarity: BadgeRarity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Achievement {
    pub id: String,
    pub name: String,
    pub description: String,
    pub progress: u32,
    pub max_progress: u32,
    pub is_completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}
