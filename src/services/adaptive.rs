use std::collections::{BTreeSet, HashSet};

use crate::services::questions::{Question, QuestionType};
use crate::types::{DifficultyLevel, TopicProgress};

/// Share of a selection reserved for questions touching weak areas.
pub const WEAK_AREA_SHARE: f64 = 0.7;

const STRUGGLING_SCORE: f64 = 0.6;
const STRUGGLING_MIN_ATTEMPTS: u32 = 3;
const EXCELLING_SCORE: f64 = 0.8;
const EXCELLING_MIN_ATTEMPTS: u32 = 5;

/// Difficulty a question type presents to a struggling, average and excelling learner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierMapping {
    pub easier: DifficultyLevel,
    pub nominal: DifficultyLevel,
    pub harder: DifficultyLevel,
}

pub fn tier_mapping(question_type: QuestionType) -> TierMapping {
    use DifficultyLevel::*;
    let (easier, nominal, harder) = match question_type {
        QuestionType::TrueFalse => (Beginner, Beginner, Intermediate),
        QuestionType::MultipleChoice => (Beginner, Intermediate, Advanced),
        QuestionType::FillInBlank => (Beginner, Intermediate, Advanced),
        QuestionType::ShortAnswer => (Intermediate, Intermediate, Advanced),
        QuestionType::Essay => (Intermediate, Advanced, Advanced),
    };
    TierMapping {
        easier,
        nominal,
        harder,
    }
}

pub fn effective_difficulty(
    question_type: QuestionType,
    progress: Option<&TopicProgress>,
) -> DifficultyLevel {
    let tiers = tier_mapping(question_type);
    let Some(progress) = progress else {
        return tiers.nominal;
    };

    if progress.average_score < STRUGGLING_SCORE
        && progress.total_attempts > STRUGGLING_MIN_ATTEMPTS
    {
        tiers.easier
    } else if progress.average_score > EXCELLING_SCORE
        && progress.total_attempts > EXCELLING_MIN_ATTEMPTS
    {
        tiers.harder
    } else {
        tiers.nominal
    }
}

pub fn matches_weak_area(question: &Question, weak_areas: &BTreeSet<String>) -> bool {
    let text = question.text.to_lowercase();
    weak_areas
        .iter()
        .map(|area| area.trim().to_lowercase())
        .any(|area| !area.is_empty() && text.contains(&area))
}

/// Picks up to `count` distinct questions at `target` (or one tier harder),
/// favouring the learner's weak areas.
///
/// `floor(count * 0.7)` slots go to weak-area matches and the rest to other questions;
/// whichever side runs short is backfilled from the other. Pool order is preserved within
/// each side.
pub fn select_questions(
    pool: &[Question],
    progress: Option<&TopicProgress>,
    target: DifficultyLevel,
    count: usize,
) -> Vec<Question> {
    if count == 0 {
        return Vec::new();
    }

    let accepted = [target, target.harder()];
    let empty = BTreeSet::new();
    let weak_areas = progress.map(|p| &p.weak_areas).unwrap_or(&empty);

    let mut seen = HashSet::new();
    let (weak, other): (Vec<&Question>, Vec<&Question>) = pool
        .iter()
        .filter(|q| seen.insert(q.id.clone()))
        .filter(|q| accepted.contains(&effective_difficulty(q.question_type(), progress)))
        .partition(|q| matches_weak_area(q, weak_areas));

    let weak_quota = (count as f64 * WEAK_AREA_SHARE).floor() as usize;
    let other_quota = count - weak_quota;

    let weak_take = weak_quota.min(weak.len());
    let other_take = other_quota.min(other.len());
    let mut selected: Vec<Question> = weak[..weak_take]
        .iter()
        .chain(other[..other_take].iter())
        .map(|q| (*q).clone())
        .collect();

    let leftovers = weak[weak_take..].iter().chain(other[other_take..].iter());
    for question in leftovers {
        if selected.len() >= count {
            break;
        }
        selected.push((*question).clone());
    }

    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::questions::QuestionKind;

    fn mc(text: &str) -> Question {
        Question::new(
            text,
            QuestionKind::MultipleChoice {
                options: vec!["a".into(), "b".into()],
                correct_index: 0,
            },
        )
    }

    fn progress_with_weak(areas: &[&str]) -> TopicProgress {
        let mut progress = TopicProgress::new("rust");
        progress.total_attempts = 4;
        progress.average_score = 0.7;
        progress.weak_areas = areas.iter().map(|a| a.to_string()).collect();
        progress
    }

    fn count_weak(selected: &[Question], progress: &TopicProgress) -> usize {
        selected
            .iter()
            .filter(|q| matches_weak_area(q, &progress.weak_areas))
            .count()
    }

    #[test]
    fn test_seventy_percent_weak_areas() {
        let progress = progress_with_weak(&["lifetimes"]);
        let mut pool: Vec<Question> = (0..10)
            .map(|i| mc(&format!("Explain LIFETIMES case {i}")))
            .collect();
        pool.extend((0..10).map(|i| mc(&format!("Traits question {i}"))));

        let selected = select_questions(&pool, Some(&progress), DifficultyLevel::Intermediate, 10);

        assert_eq!(selected.len(), 10);
        assert_eq!(count_weak(&selected, &progress), 7);
    }

    #[test]
    fn test_backfills_when_weak_side_is_short() {
        let progress = progress_with_weak(&["lifetimes"]);
        let mut pool = vec![mc("lifetimes one"), mc("lifetimes two")];
        pool.extend((0..10).map(|i| mc(&format!("other {i}"))));

        let selected = select_questions(&pool, Some(&progress), DifficultyLevel::Intermediate, 10);

        assert_eq!(selected.len(), 10);
        assert_eq!(count_weak(&selected, &progress), 2);
    }

    #[test]
    fn test_backfills_when_other_side_is_short() {
        let progress = progress_with_weak(&["borrow"]);
        let mut pool: Vec<Question> = (0..8).map(|i| mc(&format!("borrow {i}"))).collect();
        pool.push(mc("misc"));

        let selected = select_questions(&pool, Some(&progress), DifficultyLevel::Beginner, 5);

        assert_eq!(selected.len(), 5);
        assert_eq!(count_weak(&selected, &progress), 4);
    }

    #[test]
    fn test_returns_fewer_when_pool_is_small() {
        let pool = vec![mc("one"), mc("two")];
        let selected = select_questions(&pool, None, DifficultyLevel::Intermediate, 5);
        assert_eq!(selected.len(), 2);
        assert!(select_questions(&pool, None, DifficultyLevel::Intermediate, 0).is_empty());
    }

    #[test]
    fn test_duplicates_are_collapsed() {
        let q = mc("same");
        let pool = vec![q.clone(), q.clone(), q];
        assert_eq!(select_questions(&pool, None, DifficultyLevel::Beginner, 3).len(), 1);
    }

    #[test]
    fn test_difficulty_filter_uses_target_and_next_tier() {
        let tf = Question::new("Is it true?", QuestionKind::TrueFalse { answer: true });
        let essay = Question::new("Discuss", QuestionKind::Essay { rubric: None });
        let pool = vec![tf, essay, mc("mid")];

        let advanced = select_questions(&pool, None, DifficultyLevel::Advanced, 5);
        assert_eq!(advanced.len(), 1);
        assert_eq!(advanced[0].question_type(), QuestionType::Essay);

        let beginner = select_questions(&pool, None, DifficultyLevel::Beginner, 5);
        assert_eq!(beginner.len(), 2);
    }

    #[test]
    fn test_effective_difficulty_shifts() {
        let mut progress = TopicProgress::new("t");
        progress.total_attempts = 4;
        progress.average_score = 0.5;
        assert_eq!(
            effective_difficulty(QuestionType::MultipleChoice, Some(&progress)),
            DifficultyLevel::Beginner
        );

        progress.total_attempts = 6;
        progress.average_score = 0.9;
        assert_eq!(
            effective_difficulty(QuestionType::MultipleChoice, Some(&progress)),
            DifficultyLevel::Advanced
        );

        progress.total_attempts = 5;
        assert_eq!(
            effective_difficulty(QuestionType::MultipleChoice, Some(&progress)),
            DifficultyLevel::Intermediate
        );
    }
}
