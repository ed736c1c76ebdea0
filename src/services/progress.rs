use std::collections::{BTreeMap, HashMap, VecDeque};

use crate::error::{EngineError, EngineResult};
use crate::services::classifier::TopicClassifier;
use crate::types::{DifficultyLevel, QuizAttempt, TopicProgress, UserStats};

/// Smoothing factor for a topic's average score.
pub const EMA_ALPHA: f64 = 0.3;
/// Score ratio that counts as a pass for streaks.
pub const PASS_RATIO: f64 = 0.8;
const MIN_ATTEMPTS_FOR_LEVEL: u32 = 3;
const INTERMEDIATE_FLOOR: f64 = 0.6;
const ADVANCED_FLOOR: f64 = 0.8;

/// newAvg = oldAvg * (1 - α) + ratio * α
pub fn ema(previous: f64, ratio: f64) -> f64 {
    previous * (1.0 - EMA_ALPHA) + ratio * EMA_ALPHA
}

pub fn difficulty_for(total_attempts: u32, average_score: f64) -> DifficultyLevel {
    if total_attempts < MIN_ATTEMPTS_FOR_LEVEL || average_score < INTERMEDIATE_FLOOR {
        DifficultyLevel::Beginner
    } else if average_score < ADVANCED_FLOOR {
        DifficultyLevel::Intermediate
    } else {
        DifficultyLevel::Advanced
    }
}

/// Rejects attempts whose scores could not be averaged or persisted.
pub fn validate_attempt(attempt: &QuizAttempt) -> EngineResult<()> {
    let (score, max_score) = (attempt.score, attempt.max_score);
    if !score.is_finite() || !max_score.is_finite() {
        return Err(EngineError::Validation(format!(
            "attempt {} has a non-finite score",
            attempt.id
        )));
    }
    if score < 0.0 || max_score < 0.0 {
        return Err(EngineError::Validation(format!(
            "attempt {} has a negative score",
            attempt.id
        )));
    }
    if score > max_score {
        return Err(EngineError::Validation(format!(
            "attempt {} scored {score} out of {max_score}",
            attempt.id
        )));
    }
    Ok(())
}

#[derive(Debug, Default, Clone, Copy)]
struct AreaTally {
    correct: u32,
    incorrect: u32,
}

fn apply_attempt(
    progress: &mut TopicProgress,
    attempt: &QuizAttempt,
    areas: &BTreeMap<String, AreaTally>,
) {
    let ratio = attempt.ratio();

    progress.total_attempts += 1;
    progress.average_score = ema(progress.average_score, ratio);
    progress.best_score = progress.best_score.max(attempt.score);
    progress.last_attempt_date = Some(attempt.timestamp);
    progress.streak_count = if ratio >= PASS_RATIO {
        progress.streak_count + 1
    } else {
        0
    };
    progress.difficulty_level = difficulty_for(progress.total_attempts, progress.average_score);

    for (area, tally) in areas {
        if tally.incorrect > tally.correct {
            progress.strong_areas.remove(area);
            progress.weak_areas.insert(area.clone());
        } else if tally.correct > tally.incorrect {
            progress.weak_areas.remove(area);
            progress.strong_areas.insert(area.clone());
        }
    }
}

/// Per-topic rolling statistics plus the bounded attempt history.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    topics: HashMap<String, TopicProgress>,
    attempts: VecDeque<QuizAttempt>,
    stats: UserStats,
    history_limit: usize,
}

impl ProgressTracker {
    pub fn new(
        topics: Vec<TopicProgress>,
        attempts: Vec<QuizAttempt>,
        stats: UserStats,
        history_limit: usize,
    ) -> Self {
        let mut tracker = Self {
            topics: topics.into_iter().map(|p| (p.topic.clone(), p)).collect(),
            attempts: attempts.into(),
            stats,
            history_limit: history_limit.max(1),
        };
        tracker.trim_history();
        tracker
    }

    /// Records `attempt` against every topic it touched.
    ///
    /// `question_texts[i]` is the prompt of question `i`; missing texts classify by topic only.
    pub fn record_attempt(
        &mut self,
        attempt: QuizAttempt,
        topics: &[String],
        question_texts: &[String],
        classifier: &dyn TopicClassifier,
    ) -> Vec<TopicProgress> {
        let mut touched: Vec<&str> = Vec::new();
        for topic in topics.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
            if !touched.contains(&topic) {
                touched.push(topic);
            }
        }

        let mut updated = Vec::with_capacity(touched.len());
        for topic in touched {
            let areas = tally_areas(topic, &attempt, question_texts, classifier);
            let progress = self
                .topics
                .entry(topic.to_string())
                .or_insert_with(|| TopicProgress::new(topic));
            apply_attempt(progress, &attempt, &areas);
            updated.push(progress.clone());
        }

        self.update_stats(&attempt);
        self.attempts.push_back(attempt);
        self.trim_history();
        self.stats.current_streak = self.pass_streak();
        self.stats.longest_streak = self.stats.longest_streak.max(self.stats.current_streak);

        updated
    }

    fn update_stats(&mut self, attempt: &QuizAttempt) {
        let correct = if attempt.per_question_result.is_empty() {
            attempt.score.max(0.0).round() as usize
        } else {
            attempt.correct_count()
        };
        self.stats.total_quizzes += 1;
        self.stats.total_questions += attempt.question_count() as u32;
        self.stats.correct_answers += correct as u32;
        self.stats.total_time_seconds += attempt.time_spent_seconds as u64;
        self.stats.last_activity = Some(attempt.timestamp);
    }

    fn trim_history(&mut self) {
        while self.attempts.len() > self.history_limit {
            self.attempts.pop_front();
        }
    }

    /// Consecutive passing attempts, counted back from the most recent.
    pub fn pass_streak(&self) -> u32 {
        self.attempts
            .iter()
            .rev()
            .take_while(|attempt| attempt.is_pass())
            .count() as u32
    }

    pub fn topic(&self, topic: &str) -> EngineResult<&TopicProgress> {
        self.topics
            .get(topic)
            .ok_or_else(|| EngineError::TopicNotFound(topic.to_string()))
    }

    pub fn find(&self, topic: &str) -> Option<&TopicProgress> {
        self.topics.get(topic)
    }

    pub fn all(&self) -> Vec<TopicProgress> {
        let mut all: Vec<TopicProgress> = self.topics.values().cloned().collect();
        all.sort_by(|a, b| a.topic.cmp(&b.topic));
        all
    }

    pub fn recommended_level(&self, topic: &str) -> DifficultyLevel {
        self.topics
            .get(topic)
            .map(|p| p.difficulty_level)
            .unwrap_or_default()
    }

    /// Most recent first.
    pub fn recent_attempts(&self, limit: usize) -> Vec<QuizAttempt> {
        self.attempts.iter().rev().take(limit).cloned().collect()
    }

    /// Oldest first, as persisted.
    pub fn attempts(&self) -> Vec<QuizAttempt> {
        self.attempts.iter().cloned().collect()
    }

    pub fn stats(&self) -> &UserStats {
        &self.stats
    }

    pub fn reset(&mut self) {
        self.topics.clear();
        self.attempts.clear();
        self.stats = UserStats::default();
    }
}

fn tally_areas(
    topic: &str,
    attempt: &QuizAttempt,
    question_texts: &[String],
    classifier: &dyn TopicClassifier,
) -> BTreeMap<String, AreaTally> {
    let mut tallies: BTreeMap<String, AreaTally> = BTreeMap::new();
    for result in &attempt.per_question_result {
        let text = question_texts
            .get(result.question_index)
            .map(String::as_str)
            .unwrap_or("");
        for area in classifier.areas(topic, text) {
            let tally = tallies.entry(area).or_default();
            if result.is_correct {
                tally.correct += 1;
            } else {
                tally.incorrect += 1;
            }
        }
    }
    tallies
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::classifier::KeywordClassifier;
    use crate::types::QuestionResult;

    fn results(pattern: &[bool]) -> Vec<QuestionResult> {
        pattern
            .iter()
            .enumerate()
            .map(|(i, &is_correct)| QuestionResult {
                question_index: i,
                is_correct,
                time_spent_seconds: 10,
                attempts: 1,
            })
            .collect()
    }

    fn tracker() -> ProgressTracker {
        ProgressTracker::new(Vec::new(), Vec::new(), UserStats::default(), 100)
    }

    #[test]
    fn test_ema_scenario() {
        let mut progress = TopicProgress::new("rust");
        progress.average_score = 0.5;
        progress.total_attempts = 5;
        let attempt = QuizAttempt::new(4.0, 5.0, results(&[true, true, true, true, false]));

        apply_attempt(&mut progress, &attempt, &BTreeMap::new());

        assert!((progress.average_score - 0.59).abs() < 1e-9);
        assert_eq!(progress.total_attempts, 6);
        assert_eq!(progress.streak_count, 1);
        assert_eq!(progress.difficulty_level, DifficultyLevel::Beginner);
    }

    #[test]
    fn test_difficulty_thresholds() {
        assert_eq!(difficulty_for(2, 0.95), DifficultyLevel::Beginner);
        assert_eq!(difficulty_for(3, 0.59), DifficultyLevel::Beginner);
        assert_eq!(difficulty_for(3, 0.6), DifficultyLevel::Intermediate);
        assert_eq!(difficulty_for(10, 0.79), DifficultyLevel::Intermediate);
        assert_eq!(difficulty_for(10, 0.8), DifficultyLevel::Advanced);
    }

    #[test]
    fn test_streak_resets_on_failure() {
        let mut t = tracker();
        let classifier = KeywordClassifier::default();
        let topics = vec!["rust".to_string()];

        t.record_attempt(QuizAttempt::new(5.0, 5.0, Vec::new()), &topics, &[], &classifier);
        t.record_attempt(QuizAttempt::new(4.0, 5.0, Vec::new()), &topics, &[], &classifier);
        assert_eq!(t.topic("rust").unwrap().streak_count, 2);
        assert_eq!(t.stats().current_streak, 2);

        t.record_attempt(QuizAttempt::new(1.0, 5.0, Vec::new()), &topics, &[], &classifier);
        assert_eq!(t.topic("rust").unwrap().streak_count, 0);
        assert_eq!(t.stats().current_streak, 0);
        assert_eq!(t.stats().longest_streak, 2);
        assert_eq!(t.topic("rust").unwrap().best_score, 5.0);
    }

    #[test]
    fn test_weak_and_strong_areas() {
        let mut t = tracker();
        let classifier = KeywordClassifier::default();
        let topics = vec!["biology".to_string()];
        let questions = vec![
            "Describe mitosis stages".to_string(),
            "Where does photosynthesis happen?".to_string(),
        ];

        t.record_attempt(
            QuizAttempt::new(1.0, 2.0, results(&[false, true])),
            &topics,
            &questions,
            &classifier,
        );
        let progress = t.topic("biology").unwrap();
        assert!(progress.weak_areas.contains("mitosis"));
        assert!(progress.strong_areas.contains("photosynthesis"));

        t.record_attempt(
            QuizAttempt::new(1.0, 2.0, results(&[true, false])),
            &topics,
            &questions,
            &classifier,
        );
        let progress = t.topic("biology").unwrap();
        assert!(progress.strong_areas.contains("mitosis"));
        assert!(!progress.weak_areas.contains("mitosis"));
        assert!(progress.weak_areas.contains("photosynthesis"));
    }

    #[test]
    fn test_history_is_bounded_and_stats_accumulate() {
        let mut t = ProgressTracker::new(Vec::new(), Vec::new(), UserStats::default(), 3);
        let classifier = KeywordClassifier::default();
        for _ in 0..5 {
            t.record_attempt(
                QuizAttempt::new(2.0, 3.0, results(&[true, true, false])),
                &["t".to_string(), "t".to_string(), " ".to_string()],
                &[],
                &classifier,
            );
        }
        assert_eq!(t.attempts().len(), 3);
        assert_eq!(t.all().len(), 1);
        assert_eq!(t.topic("t").unwrap().total_attempts, 5);
        assert_eq!(t.stats().total_quizzes, 5);
        assert_eq!(t.stats().total_questions, 15);
        assert_eq!(t.stats().correct_answers, 10);
        assert_eq!(t.stats().total_time_seconds, 150);
    }

    #[test]
    fn test_validate_attempt_rejects_bad_scores() {
        assert!(validate_attempt(&QuizAttempt::new(4.0, 5.0, Vec::new())).is_ok());
        assert!(validate_attempt(&QuizAttempt::new(0.0, 0.0, Vec::new())).is_ok());

        for (score, max) in [
            (f64::NAN, 5.0),
            (1.0, f64::INFINITY),
            (-1.0, 5.0),
            (6.0, 5.0),
        ] {
            let err = validate_attempt(&QuizAttempt::new(score, max, Vec::new())).unwrap_err();
            assert!(matches!(err, EngineError::Validation(_)));
        }
    }

    #[test]
    fn test_unknown_topic() {
        let t = tracker();
        assert!(matches!(t.topic("nope"), Err(EngineError::TopicNotFound(_))));
        assert_eq!(t.recommended_level("nope"), DifficultyLevel::Beginner);
    }
}
