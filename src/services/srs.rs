//! SM-2 Spaced Repetition
//!
//! Quality ratings (0-5):
//! - 0: Complete blackout, no recall
//! - 1: Incorrect, but remembered on seeing the answer
//! - 2: Incorrect, but the answer seemed easy to recall
//! - 3: Correct with serious difficulty
//! - 4: Correct after hesitation
//! - 5: Perfect response
//!
//! Anything below 3 is a lapse: the item restarts at a one day interval.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};

use crate::error::{EngineError, EngineResult};
use crate::types::{
    ReviewItem, SrsExport, SrsStats, StudySession, MIN_EASE_FACTOR,
};

pub const PASSING_QUALITY: u8 = 3;
pub const MAX_QUALITY: u8 = 5;
pub const MATURE_INTERVAL_DAYS: u32 = 21;
/// Longest interval an item can be scheduled out to.
pub const MAX_INTERVAL_DAYS: u32 = 36_500;

/// Applies one SM-2 step to `item`, answered with `quality` at `now`.
pub fn schedule(item: &ReviewItem, quality: u8, now: DateTime<Utc>) -> ReviewItem {
    let quality = quality.min(MAX_QUALITY);
    let mut next = item.clone();

    if quality < PASSING_QUALITY {
        next.interval_days = 1;
        next.repetitions = 0;
    } else {
        next.interval_days = match item.repetitions {
            0 => 1,
            1 => 6,
            _ => ((item.interval_days as f64 * item.ease_factor).round() as u32)
                .clamp(1, MAX_INTERVAL_DAYS),
        };
        next.repetitions = item.repetitions + 1;
    }

    next.ease_factor = next_ease_factor(item.ease_factor, quality);
    next.next_review = now + Duration::days(next.interval_days as i64);
    next.last_reviewed = Some(now);
    next.review_count = item.review_count + 1;
    next
}

/// EF' = max(1.3, EF + (0.1 - (5-q) * (0.08 + (5-q) * 0.02)))
pub fn next_ease_factor(ease_factor: f64, quality: u8) -> f64 {
    let miss = (MAX_QUALITY - quality.min(MAX_QUALITY)) as f64;
    (ease_factor + (0.1 - miss * (0.08 + miss * 0.02))).max(MIN_EASE_FACTOR)
}

/// Derives an SM-2 quality from a graded answer and how long it took.
pub fn quality_from_answer(is_correct: bool, response_time_ms: u64) -> u8 {
    if !is_correct {
        return 1;
    }
    if response_time_ms < 5_000 {
        5
    } else if response_time_ms < 15_000 {
        4
    } else {
        3
    }
}

/// Review pool and study-session history.
#[derive(Debug, Clone, Default)]
pub struct SrsDeck {
    items: HashMap<String, ReviewItem>,
    sessions: Vec<StudySession>,
    session_limit: usize,
}

impl SrsDeck {
    pub fn new(items: Vec<ReviewItem>, sessions: Vec<StudySession>, session_limit: usize) -> Self {
        let mut deck = Self {
            items: items.into_iter().map(|item| (item.id.clone(), item)).collect(),
            sessions,
            session_limit: session_limit.max(1),
        };
        deck.trim_sessions();
        deck
    }

    pub fn insert(&mut self, item: ReviewItem) {
        self.items.insert(item.id.clone(), item);
    }

    pub fn get(&self, id: &str) -> EngineResult<&ReviewItem> {
        self.items
            .get(id)
            .ok_or_else(|| EngineError::ItemNotFound(id.to_string()))
    }

    pub fn remove(&mut self, id: &str) -> EngineResult<ReviewItem> {
        self.items
            .remove(id)
            .ok_or_else(|| EngineError::ItemNotFound(id.to_string()))
    }

    pub fn review(&mut self, id: &str, quality: u8, now: DateTime<Utc>) -> EngineResult<ReviewItem> {
        let item = self
            .items
            .get_mut(id)
            .ok_or_else(|| EngineError::ItemNotFound(id.to_string()))?;
        *item = schedule(item, quality, now);
        Ok(item.clone())
    }

    /// Items ordered by id, for stable persistence and listing.
    pub fn items(&self) -> Vec<ReviewItem> {
        let mut items: Vec<ReviewItem> = self.items.values().cloned().collect();
        items.sort_by(|a, b| a.id.cmp(&b.id));
        items
    }

    pub fn due(&self, now: DateTime<Utc>, limit: usize) -> Vec<ReviewItem> {
        let mut due: Vec<ReviewItem> = self
            .items
            .values()
            .filter(|item| item.is_due(now))
            .cloned()
            .collect();
        due.sort_by(|a, b| a.next_review.cmp(&b.next_review).then_with(|| a.id.cmp(&b.id)));
        due.truncate(limit);
        due
    }

    pub fn stats(&self, now: DateTime<Utc>) -> SrsStats {
        let total = self.items.len();
        let mut stats = SrsStats {
            total,
            ..SrsStats::default()
        };
        let mut ease_sum = 0.0;
        for item in self.items.values() {
            ease_sum += item.ease_factor;
            if item.is_due(now) {
                stats.due += 1;
            }
            if item.is_new() {
                stats.new += 1;
            } else if item.interval_days >= MATURE_INTERVAL_DAYS {
                stats.mature += 1;
            } else {
                stats.learning += 1;
            }
        }
        if total > 0 {
            stats.average_ease = ease_sum / total as f64;
        }
        stats
    }

    pub fn sessions(&self) -> &[StudySession] {
        &self.sessions
    }

    pub fn start_session(&mut self, now: DateTime<Utc>) -> StudySession {
        let session = StudySession::start(now);
        self.sessions.push(session.clone());
        self.trim_sessions();
        session
    }

    pub fn record_session_review(&mut self, session_id: &str, correct: bool) -> EngineResult<()> {
        let session = self.active_session_mut(session_id)?;
        session.items_reviewed += 1;
        if correct {
            session.correct_count += 1;
        }
        Ok(())
    }

    pub fn end_session(&mut self, session_id: &str, now: DateTime<Utc>) -> EngineResult<StudySession> {
        let session = self.active_session_mut(session_id)?;
        session.ended_at = Some(now);
        Ok(session.clone())
    }

    fn active_session_mut(&mut self, session_id: &str) -> EngineResult<&mut StudySession> {
        self.sessions
            .iter_mut()
            .find(|s| s.id == session_id && s.is_active())
            .ok_or_else(|| EngineError::SessionNotFound(session_id.to_string()))
    }

    fn trim_sessions(&mut self) {
        if self.sessions.len() > self.session_limit {
            let overflow = self.sessions.len() - self.session_limit;
            self.sessions.drain(..overflow);
        }
    }

    pub fn export(&self, now: DateTime<Utc>) -> SrsExport {
        SrsExport {
            srs_items: self.items(),
            study_sessions: self.sessions.clone(),
            export_date: now,
        }
    }

    /// Replaces the deck with `doc`. Nothing changes if the document fails validation.
    pub fn import(&mut self, doc: SrsExport) -> EngineResult<()> {
        validate_export(&doc)?;
        let limit = self.session_limit;
        *self = Self::new(doc.srs_items, doc.study_sessions, limit);
        Ok(())
    }
}

pub fn validate_export(doc: &SrsExport) -> EngineResult<()> {
    let mut seen = HashSet::new();
    for item in &doc.srs_items {
        if item.id.trim().is_empty() {
            return Err(EngineError::Serialization("review item with empty id".into()));
        }
        if !seen.insert(item.id.as_str()) {
            return Err(EngineError::Serialization(format!(
                "duplicate review item id {}",
                item.id
            )));
        }
        if !(1..=5).contains(&item.difficulty) {
            return Err(EngineError::Serialization(format!(
                "review item {} has difficulty {} outside 1..=5",
                item.id, item.difficulty
            )));
        }
        if !item.ease_factor.is_finite() || item.ease_factor < MIN_EASE_FACTOR {
            return Err(EngineError::Serialization(format!(
                "review item {} has ease factor below {MIN_EASE_FACTOR}",
                item.id
            )));
        }
        if !(1..=MAX_INTERVAL_DAYS).contains(&item.interval_days) {
            return Err(EngineError::Serialization(format!(
                "review item {} has interval {} outside 1..={MAX_INTERVAL_DAYS} days",
                item.id, item.interval_days
            )));
        }
    }

    let mut session_ids = HashSet::new();
    for session in &doc.study_sessions {
        if session.id.trim().is_empty() || !session_ids.insert(session.id.as_str()) {
            return Err(EngineError::Serialization(format!(
                "invalid or duplicate study session id {:?}",
                session.id
            )));
        }
    }
    Ok(())
}
