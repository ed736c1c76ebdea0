use thiserror::Error;

/// Failure reported by a generation provider.
///
/// Cloneable because one failed computation is handed to every request that
/// joined it while it was in flight.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("provider request failed: {0}")]
    RequestFailed(String),
    #[error("provider returned invalid response: {0}")]
    InvalidResponse(String),
    #[error("provider timeout")]
    Timeout,
    #[error("generation cancelled")]
    Cancelled,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O failed for {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode {key}: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("review item not found: {0}")]
    ItemNotFound(String),
    #[error("topic not found: {0}")]
    TopicNotFound(String),
    #[error("study session not found: {0}")]
    SessionNotFound(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("serialization failed: {0}")]
    Serialization(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl EngineError {
    /// Text suitable for showing to the learner.
    pub fn user_message(&self) -> String {
        match self {
            Self::Provider(_) => "generation failed, try again".to_string(),
            Self::ItemNotFound(_) | Self::SessionNotFound(_) => {
                "that item no longer exists".to_string()
            }
            Self::TopicNotFound(_) => "no progress recorded for this topic yet".to_string(),
            Self::Serialization(_) => "the import file is not valid".to_string(),
            Self::Validation(msg) => msg.clone(),
            Self::Store(_) => "could not save your progress".to_string(),
        }
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_failure_user_message() {
        let err = EngineError::from(ProviderError::Timeout);
        assert_eq!(err.user_message(), "generation failed, try again");
        assert_eq!(err.to_string(), "provider timeout");
    }
}
