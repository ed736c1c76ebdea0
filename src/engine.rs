use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::cache::ResponseCache;
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult, ProviderError};
use crate::services::adaptive;
use crate::services::classifier::TopicClassifier;
use crate::services::gamification::{self, GamificationOutcome};
use crate::services::generation::{GenerationKind, GenerationProvider, GenerationRequest};
use crate::services::progress::{self, ProgressTracker};
use crate::services::questions::{
    parse_document_analysis, parse_exercises, parse_grading, parse_questions, DocumentAnalysis,
    Exercise, GradingResult, Question,
};
use crate::services::srs::{self, SrsDeck, PASSING_QUALITY};
use crate::store::{keys, load_slice, save_slice, Store};
use crate::types::{
    Achievement, Badge, DifficultyLevel, QuizAttempt, ReviewItem, SrsExport, SrsStats,
    StudySession, TopicProgress, UserStats,
};

/// A finished quiz as reported by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptSubmission {
    pub attempt: QuizAttempt,
    pub topics: Vec<String>,
    /// Prompt of each question, indexed like `attempt.per_question_result`.
    #[serde(default)]
    pub question_texts: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptOutcome {
    pub progress: Vec<TopicProgress>,
    pub stats: UserStats,
    pub gamification: GamificationOutcome,
}

const RAW_VIEW: &str = "raw";

struct EngineState {
    deck: SrsDeck,
    progress: ProgressTracker,
    badges: Vec<Badge>,
    achievements: Vec<Achievement>,
}

/// One learner's adaptive-learning state plus the generation cache in front of the provider.
///
/// All mutation goes through `&self` methods; callers only ever see clones.
pub struct LearningEngine {
    store: Arc<dyn Store>,
    provider: Arc<dyn GenerationProvider>,
    classifier: Arc<dyn TopicClassifier>,
    config: EngineConfig,
    cache: ResponseCache,
    state: RwLock<EngineState>,
}

impl LearningEngine {
    /// Reads every persisted slice. Corrupted slices start over from their defaults.
    pub async fn load(
        store: Arc<dyn Store>,
        provider: Arc<dyn GenerationProvider>,
        classifier: Arc<dyn TopicClassifier>,
        config: EngineConfig,
    ) -> Self {
        let items: Vec<ReviewItem> = load_slice(store.as_ref(), keys::SRS_ITEMS).await;
        let sessions: Vec<StudySession> =
            load_slice(store.as_ref(), keys::SRS_STUDY_SESSIONS).await;
        let topics: Vec<TopicProgress> = load_slice(store.as_ref(), keys::PROGRESS).await;
        let attempts: Vec<QuizAttempt> = load_slice(store.as_ref(), keys::ATTEMPTS).await;
        let stats: UserStats = load_slice(store.as_ref(), keys::USER_STATS).await;
        let badges: Vec<Badge> = load_slice(store.as_ref(), keys::BADGES).await;
        let stored_achievements: Vec<Achievement> =
            load_slice(store.as_ref(), keys::ACHIEVEMENTS).await;

        info!(
            items = items.len(),
            topics = topics.len(),
            attempts = attempts.len(),
            badges = badges.len(),
            "learning state loaded"
        );

        let state = EngineState {
            deck: SrsDeck::new(items, sessions, config.session_history_limit),
            progress: ProgressTracker::new(
                topics,
                attempts,
                stats,
                config.attempt_history_limit,
            ),
            badges,
            achievements: merge_achievements(stored_achievements),
        };

        Self {
            store,
            provider,
            classifier,
            config,
            cache: ResponseCache::new(),
            state: RwLock::new(state),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    // ========================================================================
    // Generation
    // ========================================================================

    /// Untyped generation through the cache, e.g. chat context.
    pub async fn generate(&self, request: GenerationRequest) -> EngineResult<Value> {
        self.generate_typed(request, RAW_VIEW, |raw| Ok(raw.clone())).await
    }

    pub async fn generate_quiz(&self, request: GenerationRequest) -> EngineResult<Vec<Question>> {
        if request.kind != GenerationKind::QuizGeneration {
            return Err(EngineError::Validation(format!(
                "expected a quiz request, got {}",
                request.kind.operation()
            )));
        }
        self.generate_typed(request, "questions", parse_questions).await
    }

    /// A quiz request shaped by the topic's recommended level and weak areas.
    pub async fn quiz_request_for_topic(
        &self,
        topic: &str,
        input: &str,
        count: usize,
    ) -> GenerationRequest {
        let state = self.state.read().await;
        let (level, focus_areas) = match state.progress.find(topic) {
            Some(progress) => (
                progress.difficulty_level,
                progress.weak_areas.iter().cloned().collect::<Vec<_>>(),
            ),
            None => (DifficultyLevel::default(), Vec::new()),
        };
        GenerationRequest::quiz(input, count, level, &focus_areas)
    }

    pub async fn generate_exercises(
        &self,
        input: &str,
        count: usize,
        difficulty: DifficultyLevel,
    ) -> EngineResult<Vec<Exercise>> {
        let request = GenerationRequest::new(
            GenerationKind::ExerciseGeneration,
            input,
            json!({ "count": count, "difficulty": difficulty.as_str() }),
        );
        self.generate_typed(request, "exercises", parse_exercises).await
    }

    pub async fn analyze_document(&self, document: &str) -> EngineResult<DocumentAnalysis> {
        let request = GenerationRequest::new(GenerationKind::DocumentAnalysis, document, Value::Null);
        self.generate_typed(request, "analysis", parse_document_analysis).await
    }

    pub async fn grade_answer(&self, question: &Question, answer: &str) -> EngineResult<GradingResult> {
        let request = GenerationRequest::new(
            GenerationKind::AnswerGrading,
            answer,
            json!({
                "question": question.text,
                "expectedAnswer": question.answer_text(),
            }),
        );
        self.generate_typed(request, "grading", parse_grading).await
    }

    /// Caches the validated result under a key that includes `view`, so each decoded
    /// shape of a response has its own entry.
    async fn generate_typed<T, P>(
        &self,
        request: GenerationRequest,
        view: &str,
        parse: P,
    ) -> EngineResult<T>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        P: FnOnce(&Value) -> Result<T, ProviderError> + Send + 'static,
    {
        let key = request.cache_key_for(view);
        let ttl = request.kind.ttl(&self.config.ttl);
        let operation = request.kind.operation();
        let provider = Arc::clone(&self.provider);

        let result = self
            .cache
            .get_or_compute_as(&key, ttl, move || async move {
                let raw = provider.generate(&request).await?;
                parse(&raw)
            })
            .await;

        if let Err(err) = &result {
            warn!(operation, error = %err, "generation failed");
        }
        result
    }

    // ========================================================================
    // Spaced repetition
    // ========================================================================

    pub async fn add_item(
        &self,
        prompt_text: &str,
        answer_text: &str,
        difficulty: u8,
    ) -> EngineResult<ReviewItem> {
        let item = ReviewItem::new(
            prompt_text.to_string(),
            answer_text.to_string(),
            difficulty,
            Utc::now(),
        );
        let mut state = self.state.write().await;
        state.deck.insert(item.clone());
        self.persist_deck(&state).await?;
        info!(item_id = %item.id, "review item added");
        Ok(item)
    }

    /// Admits a generated question into the review pool.
    pub async fn admit_question(&self, question: &Question) -> EngineResult<ReviewItem> {
        let difficulty = {
            let state = self.state.read().await;
            question
                .topic
                .as_deref()
                .map(|topic| state.progress.recommended_level(topic))
                .unwrap_or_default()
                .review_difficulty()
        };
        self.add_item(&question.text, &question.answer_text(), difficulty)
            .await
    }

    pub async fn get_item(&self, id: &str) -> EngineResult<ReviewItem> {
        self.state.read().await.deck.get(id).cloned()
    }

    pub async fn list_items(&self) -> Vec<ReviewItem> {
        self.state.read().await.deck.items()
    }

    pub async fn remove_item(&self, id: &str) -> EngineResult<ReviewItem> {
        let mut state = self.state.write().await;
        let removed = state.deck.remove(id)?;
        self.persist_deck(&state).await?;
        info!(item_id = %id, "review item removed");
        Ok(removed)
    }

    /// Schedules `id` after an answer rated `quality`, optionally counting it toward a session.
    pub async fn review_item(
        &self,
        id: &str,
        quality: u8,
        session_id: Option<&str>,
    ) -> EngineResult<ReviewItem> {
        let mut state = self.state.write().await;
        state.deck.get(id)?;
        if let Some(session_id) = session_id {
            state
                .deck
                .record_session_review(session_id, quality >= PASSING_QUALITY)?;
        }
        let item = state.deck.review(id, quality, Utc::now())?;
        self.persist_deck(&state).await?;
        info!(
            item_id = %id,
            quality,
            interval_days = item.interval_days,
            ease_factor = item.ease_factor,
            "review scheduled"
        );
        Ok(item)
    }

    pub async fn answer_item(
        &self,
        id: &str,
        is_correct: bool,
        response_time_ms: u64,
        session_id: Option<&str>,
    ) -> EngineResult<ReviewItem> {
        let quality = srs::quality_from_answer(is_correct, response_time_ms);
        self.review_item(id, quality, session_id).await
    }

    pub async fn due_items(&self, now: DateTime<Utc>, limit: usize) -> Vec<ReviewItem> {
        self.state.read().await.deck.due(now, limit)
    }

    pub async fn srs_stats(&self, now: DateTime<Utc>) -> SrsStats {
        self.state.read().await.deck.stats(now)
    }

    pub async fn start_study_session(&self) -> EngineResult<StudySession> {
        let mut state = self.state.write().await;
        let session = state.deck.start_session(Utc::now());
        self.persist_deck(&state).await?;
        debug!(session_id = %session.id, "study session started");
        Ok(session)
    }

    pub async fn end_study_session(&self, session_id: &str) -> EngineResult<StudySession> {
        let mut state = self.state.write().await;
        let session = state.deck.end_session(session_id, Utc::now())?;
        self.persist_deck(&state).await?;
        debug!(
            session_id,
            reviewed = session.items_reviewed,
            correct = session.correct_count,
            "study session ended"
        );
        Ok(session)
    }

    pub async fn study_sessions(&self) -> Vec<StudySession> {
        self.state.read().await.deck.sessions().to_vec()
    }

    pub async fn export_srs(&self) -> SrsExport {
        let export = self.state.read().await.deck.export(Utc::now());
        info!(items = export.srs_items.len(), "srs data exported");
        export
    }

    pub async fn export_srs_json(&self) -> EngineResult<String> {
        Ok(serde_json::to_string_pretty(&self.export_srs().await)?)
    }

    /// Replaces the review pool and session history. Invalid documents change nothing.
    pub async fn import_srs(&self, doc: SrsExport) -> EngineResult<()> {
        let mut state = self.state.write().await;
        let items = doc.srs_items.len();
        state.deck.import(doc)?;
        self.persist_deck(&state).await?;
        info!(items, "srs data imported");
        Ok(())
    }

    pub async fn import_srs_json(&self, raw: &str) -> EngineResult<()> {
        let doc: SrsExport = serde_json::from_str(raw)?;
        self.import_srs(doc).await
    }

    // ========================================================================
    // Progress
    // ========================================================================

    /// Records a finished quiz, then evaluates badges and achievements against it.
    pub async fn submit_attempt(&self, submission: AttemptSubmission) -> EngineResult<AttemptOutcome> {
        let AttemptSubmission {
            attempt,
            topics,
            question_texts,
        } = submission;
        progress::validate_attempt(&attempt)?;
        let now = Utc::now();

        let mut state = self.state.write().await;
        let progress = state.progress.record_attempt(
            attempt.clone(),
            &topics,
            &question_texts,
            self.classifier.as_ref(),
        );
        let stats = state.progress.stats().clone();

        let outcome = gamification::evaluate(
            &attempt,
            stats.current_streak,
            &state.badges,
            &state.achievements,
            now,
        );
        state.badges.extend(outcome.unlocked_badges.iter().cloned());
        for delta in &outcome.achievement_deltas {
            let updated = delta.achievement.clone();
            match state.achievements.iter().position(|a| a.id == updated.id) {
                Some(index) => state.achievements[index] = updated,
                None => state.achievements.push(updated),
            }
        }

        self.persist_progress(&state).await?;
        if !outcome.is_empty() {
            self.persist_gamification(&state).await?;
        }

        for badge in &outcome.unlocked_badges {
            info!(badge = %badge.id, rarity = ?badge.rarity, "badge unlocked");
        }
        info!(
            attempt_id = %attempt.id,
            topics = progress.len(),
            ratio = attempt.ratio(),
            streak = stats.current_streak,
            "attempt recorded"
        );

        Ok(AttemptOutcome {
            progress,
            stats,
            gamification: outcome,
        })
    }

    pub async fn topic_progress(&self, topic: &str) -> EngineResult<TopicProgress> {
        self.state.read().await.progress.topic(topic).cloned()
    }

    pub async fn all_progress(&self) -> Vec<TopicProgress> {
        self.state.read().await.progress.all()
    }

    pub async fn recent_attempts(&self, limit: usize) -> Vec<QuizAttempt> {
        self.state.read().await.progress.recent_attempts(limit)
    }

    pub async fn user_stats(&self) -> UserStats {
        self.state.read().await.progress.stats().clone()
    }

    pub async fn recommended_level(&self, topic: &str) -> DifficultyLevel {
        self.state.read().await.progress.recommended_level(topic)
    }

    /// Clears every adaptive-learning slice. The review pool is kept.
    pub async fn reset_progress(&self) -> EngineResult<()> {
        let mut state = self.state.write().await;
        state.progress.reset();
        state.badges.clear();
        state.achievements = gamification::default_achievements();
        for key in keys::ADAPTIVE_LEARNING_KEYS {
            self.store.remove(key).await?;
        }
        info!("learning progress reset");
        Ok(())
    }

    // ========================================================================
    // Adaptive selection
    // ========================================================================

    pub async fn select_questions(
        &self,
        pool: &[Question],
        topic: &str,
        target: DifficultyLevel,
        count: usize,
    ) -> Vec<Question> {
        let state = self.state.read().await;
        adaptive::select_questions(pool, state.progress.find(topic), target, count)
    }

    /// Selection at the topic's recommended level.
    pub async fn select_for_topic(
        &self,
        pool: &[Question],
        topic: &str,
        count: usize,
    ) -> Vec<Question> {
        let state = self.state.read().await;
        let progress = state.progress.find(topic);
        let target = progress.map(|p| p.difficulty_level).unwrap_or_default();
        adaptive::select_questions(pool, progress, target, count)
    }

    // ========================================================================
    // Gamification
    // ========================================================================

    pub async fn badges(&self) -> Vec<Badge> {
        self.state.read().await.badges.clone()
    }

    pub async fn achievements(&self) -> Vec<Achievement> {
        self.state.read().await.achievements.clone()
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    async fn persist_deck(&self, state: &EngineState) -> EngineResult<()> {
        let store = self.store.as_ref();
        save_slice(store, keys::SRS_ITEMS, &state.deck.items()).await?;
        save_slice(store, keys::SRS_STUDY_SESSIONS, state.deck.sessions()).await?;
        Ok(())
    }

    async fn persist_progress(&self, state: &EngineState) -> EngineResult<()> {
        let store = self.store.as_ref();
        save_slice(store, keys::PROGRESS, &state.progress.all()).await?;
        save_slice(store, keys::ATTEMPTS, &state.progress.attempts()).await?;
        save_slice(store, keys::USER_STATS, state.progress.stats()).await?;
        Ok(())
    }

    async fn persist_gamification(&self, state: &EngineState) -> EngineResult<()> {
        let store = self.store.as_ref();
        save_slice(store, keys::BADGES, &state.badges).await?;
        save_slice(store, keys::ACHIEVEMENTS, &state.achievements).await?;
        Ok(())
    }
}

/// Stored progress wins; catalogue entries the store has never seen start at zero.
fn merge_achievements(stored: Vec<Achievement>) -> Vec<Achievement> {
    let mut merged = stored;
    for fresh in gamification::default_achievements() {
        if !merged.iter().any(|a| a.id == fresh.id) {
            merged.push(fresh);
        }
    }
    merged
}
