//! Badge and achievement rules.
//!
//! Evaluation is pure: it reads the attempt and what the learner already holds and
//! reports what changed. The engine applies and persists the outcome.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::types::{Achievement, Badge, BadgeRarity, QuizAttempt};

pub const PERFECT_SCORE: &str = "perfect_score";
pub const QUIZ_MASTER: &str = "quiz_master";
pub const STREAK_5: &str = "streak_5";

pub const QUIZ_COUNT: &str = "quiz_count";
pub const PERFECT_SCORES: &str = "perfect_scores";

const QUIZ_MASTER_MIN_QUESTIONS: usize = 10;
const QUIZ_MASTER_RATIO: f64 = 0.9;
const STREAK_BADGE_LENGTH: u32 = 5;
const GENERIC_ICON: &str = "🏅";

#[derive(Debug, Clone, Copy)]
pub struct BadgeDefinition {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
    pub rarity: BadgeRarity,
}

pub const BADGES: &[BadgeDefinition] = &[
    BadgeDefinition {
        id: PERFECT_SCORE,
        name: "Perfect Score",
        description: "Answer every question in a quiz correctly",
        icon: "🎯",
        rarity: BadgeRarity::Rare,
    },
    BadgeDefinition {
        id: QUIZ_MASTER,
        name: "Quiz Master",
        description: "Score at least 90% on a quiz with 10 or more questions",
        icon: "🧠",
        rarity: BadgeRarity::Epic,
    },
    BadgeDefinition {
        id: STREAK_5,
        name: "On Fire",
        description: "Pass five quizzes in a row",
        icon: "🔥",
        rarity: BadgeRarity::Rare,
    },
];

#[derive(Debug, Clone, Copy)]
pub struct AchievementDefinition {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub max_progress: u32,
}

pub const ACHIEVEMENTS: &[AchievementDefinition] = &[
    AchievementDefinition {
        id: QUIZ_COUNT,
        name: "Dedicated Learner",
        description: "Complete 10 quizzes",
        max_progress: 10,
    },
    AchievementDefinition {
        id: PERFECT_SCORES,
        name: "Perfectionist",
        description: "Get 5 perfect scores",
        max_progress: 5,
    },
];

fn badge_definition(id: &str) -> Option<&'static BadgeDefinition> {
    BADGES.iter().find(|b| b.id == id)
}

pub fn badge_rarity(id: &str) -> BadgeRarity {
    badge_definition(id)
        .map(|b| b.rarity)
        .unwrap_or(BadgeRarity::Common)
}

pub fn badge_icon(id: &str) -> &'static str {
    badge_definition(id).map(|b| b.icon).unwrap_or(GENERIC_ICON)
}

pub fn unlock_badge(id: &str, now: DateTime<Utc>) -> Badge {
    let (name, description) = badge_definition(id)
        .map(|b| (b.name.to_string(), b.description.to_string()))
        .unwrap_or_else(|| (id.to_string(), String::new()));
    Badge {
        id: id.to_string(),
        name,
        description,
        icon: badge_icon(id).to_string(),
        unlocked_at: now,
        rarity: badge_rarity(id),
    }
}

/// The achievement catalogue with no progress.
pub fn default_achievements() -> Vec<Achievement> {
    ACHIEVEMENTS.iter().map(fresh_achievement).collect()
}

fn fresh_achievement(def: &AchievementDefinition) -> Achievement {
    Achievement {
        id: def.id.to_string(),
        name: def.name.to_string(),
        description: def.description.to_string(),
        progress: 0,
        max_progress: def.max_progress,
        is_completed: false,
        completed_at: None,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AchievementDelta {
    pub previous_progress: u32,
    pub newly_completed: bool,
    pub achievement: Achievement,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GamificationOutcome {
    pub unlocked_badges: Vec<Badge>,
    pub achievement_deltas: Vec<AchievementDelta>,
}

impl GamificationOutcome {
    pub fn is_empty(&self) -> bool {
        self.unlocked_badges.is_empty() && self.achievement_deltas.is_empty()
    }
}

/// Rules fire independently; already-held badges and completed achievements never change.
pub fn evaluate(
    attempt: &QuizAttempt,
    current_streak: u32,
    held_badges: &[Badge],
    achievements: &[Achievement],
    now: DateTime<Utc>,
) -> GamificationOutcome {
    let mut outcome = GamificationOutcome::default();

    let earned = [
        (PERFECT_SCORE, attempt.is_perfect()),
        (
            QUIZ_MASTER,
            attempt.question_count() >= QUIZ_MASTER_MIN_QUESTIONS
                && attempt.ratio() >= QUIZ_MASTER_RATIO,
        ),
        (STREAK_5, current_streak >= STREAK_BADGE_LENGTH),
    ];
    for (id, earned) in earned {
        if earned && !held_badges.iter().any(|b| b.id == id) {
            outcome.unlocked_badges.push(unlock_badge(id, now));
        }
    }

    for def in ACHIEVEMENTS {
        let applies = match def.id {
            PERFECT_SCORES => attempt.is_perfect(),
            _ => true,
        };
        if !applies {
            continue;
        }

        let current = achievements
            .iter()
            .find(|a| a.id == def.id)
            .cloned()
            .unwrap_or_else(|| fresh_achievement(def));
        if current.is_completed {
            continue;
        }

        let previous_progress = current.progress;
        let mut achievement = current;
        achievement.progress = (achievement.progress + 1).min(achievement.max_progress);
        let newly_completed = achievement.progress >= achievement.max_progress;
        if newly_completed {
            achievement.is_completed = true;
            achievement.completed_at = Some(now);
        }

        outcome.achievement_deltas.push(AchievementDelta {
            previous_progress,
            newly_completed,
            achievement,
        });
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::QuestionResult;

    fn attempt(correct: usize, total: usize) -> QuizAttempt {
        let results = (0..total)
            .map(|i| QuestionResult {
                question_index: i,
                is_correct: i < correct,
                time_spent_seconds: 5,
                attempts: 1,
            })
            .collect();
        QuizAttempt::new(correct as f64, total as f64, results)
    }

    fn ids(outcome: &GamificationOutcome) -> Vec<&str> {
        outcome.unlocked_badges.iter().map(|b| b.id.as_str()).collect()
    }

    #[test]
    fn test_perfect_ten_question_quiz_unlocks_both() {
        let outcome = evaluate(&attempt(10, 10), 1, &[], &default_achievements(), Utc::now());
        assert_eq!(ids(&outcome), vec![PERFECT_SCORE, QUIZ_MASTER]);
        assert_eq!(outcome.unlocked_badges[1].rarity, BadgeRarity::Epic);
    }

    #[test]
    fn test_unlocks_are_idempotent() {
        let now = Utc::now();
        let held = vec![unlock_badge(PERFECT_SCORE, now), unlock_badge(QUIZ_MASTER, now)];
        let outcome = evaluate(&attempt(10, 10), 5, &held, &[], now);
        assert_eq!(ids(&outcome), vec![STREAK_5]);
    }

    #[test]
    fn test_quiz_master_needs_ten_questions() {
        let outcome = evaluate(&attempt(9, 9), 0, &[], &[], Utc::now());
        assert_eq!(ids(&outcome), vec![PERFECT_SCORE]);

        let outcome = evaluate(&attempt(9, 10), 0, &[], &[], Utc::now());
        assert_eq!(ids(&outcome), vec![QUIZ_MASTER]);

        let outcome = evaluate(&attempt(8, 10), 4, &[], &[], Utc::now());
        assert!(outcome.unlocked_badges.is_empty());
    }

    #[test]
    fn test_achievement_progress_caps_and_completes() {
        let now = Utc::now();
        let mut achievements = default_achievements();
        achievements[0].progress = 9;

        let outcome = evaluate(&attempt(1, 2), 0, &[], &achievements, now);
        assert_eq!(outcome.achievement_deltas.len(), 1);
        let delta = &outcome.achievement_deltas[0];
        assert_eq!(delta.previous_progress, 9);
        assert!(delta.newly_completed);
        assert_eq!(delta.achievement.progress, 10);
        assert_eq!(delta.achievement.completed_at, Some(now));

        achievements[0] = delta.achievement.clone();
        let outcome = evaluate(&attempt(1, 2), 0, &[], &achievements, now);
        assert!(outcome.is_empty());
    }

    #[test]
    fn test_perfect_scores_only_count_perfect_attempts() {
        let outcome = evaluate(&attempt(3, 3), 0, &[], &default_achievements(), Utc::now());
        let perfect = outcome
            .achievement_deltas
            .iter()
            .find(|d| d.achievement.id == PERFECT_SCORES)
            .unwrap();
        assert_eq!(perfect.achievement.progress, 1);
    }

    #[test]
    fn test_unknown_badge_defaults() {
        assert_eq!(badge_rarity("mystery"), BadgeRarity::Common);
        assert_eq!(badge_icon("mystery"), GENERIC_ICON);
    }
}
