pub const SRS_ITEMS: &str = "srs_items";
pub const SRS_STUDY_SESSIONS: &str = "srs_study_sessions";
pub const USER_STATS: &str = "adaptive_learning_user_stats";
pub const PROGRESS: &str = "adaptive_learning_progress";
pub const ATTEMPTS: &str = "adaptive_learning_attempts";
pub const BADGES: &str = "adaptive_learning_badges";
pub const ACHIEVEMENTS: &str = "adaptive_learning_achievements";

/// Every slice cleared by a full progress reset. SRS data survives a reset.
pub const ADAPTIVE_LEARNING_KEYS: [&str; 5] = [USER_STATS, PROGRESS, ATTEMPTS, BADGES, ACHIEVEMENTS];
