use std::path::PathBuf;
use std::time::Duration;

use crate::cache::keys::TtlPolicy;

pub const DEFAULT_ATTEMPT_HISTORY_LIMIT: usize = 100;
pub const DEFAULT_SESSION_HISTORY_LIMIT: usize = 200;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub data_dir: PathBuf,
    pub log_level: String,
    /// Directory for the rolling log file; `None` keeps logs on stderr only.
    pub log_dir: Option<PathBuf>,
    pub attempt_history_limit: usize,
    pub session_history_limit: usize,
    pub ttl: TtlPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: "info".to_string(),
            log_dir: None,
            attempt_history_limit: DEFAULT_ATTEMPT_HISTORY_LIMIT,
            session_history_limit: DEFAULT_SESSION_HISTORY_LIMIT,
            ttl: TtlPolicy::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let data_dir = env_string("LEARNING_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);

        let log_level = std::env::var("RUST_LOG").unwrap_or(defaults.log_level);
        let log_dir = file_logs_enabled(env_string("ENABLE_FILE_LOGS").as_deref())
            .then(|| PathBuf::from(env_string("LOG_DIR").unwrap_or_else(|| "./logs".into())));

        let attempt_history_limit = env_parse::<usize>("ATTEMPT_HISTORY_LIMIT")
            .filter(|v| *v > 0)
            .unwrap_or(defaults.attempt_history_limit);
        let session_history_limit = env_parse::<usize>("SESSION_HISTORY_LIMIT")
            .filter(|v| *v > 0)
            .unwrap_or(defaults.session_history_limit);

        let mut ttl = defaults.ttl;
        if let Some(secs) = env_parse::<u64>("CACHE_TTL_DOCUMENT_ANALYSIS_SECS") {
            ttl.document_analysis = Duration::from_secs(secs);
        }
        if let Some(secs) = env_parse::<u64>("CACHE_TTL_QUIZ_GENERATION_SECS") {
            ttl.quiz_generation = Duration::from_secs(secs);
        }
        if let Some(secs) = env_parse::<u64>("CACHE_TTL_CHAT_CONTEXT_SECS") {
            ttl.chat_context = Duration::from_secs(secs);
        }
        if let Some(secs) = env_parse::<u64>("CACHE_TTL_ANSWER_GRADING_SECS") {
            ttl.answer_grading = Duration::from_secs(secs);
        }

        Self {
            data_dir,
            log_level,
            log_dir,
            attempt_history_limit,
            session_history_limit,
            ttl,
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("learning-engine")
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn file_logs_enabled(flag: Option<&str>) -> bool {
    matches!(flag.map(str::trim), Some("true" | "1"))
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env_string(key)?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.attempt_history_limit, 100);
        assert_eq!(config.ttl.quiz_generation, Duration::from_secs(12 * 60 * 60));
        assert!(config.data_dir.ends_with("learning-engine"));
        assert!(config.log_dir.is_none());
    }

    #[test]
    fn test_file_logs_flag() {
        assert!(file_logs_enabled(Some("true")));
        assert!(file_logs_enabled(Some(" 1 ")));
        assert!(!file_logs_enabled(Some("yes")));
        assert!(!file_logs_enabled(None));
    }
}
