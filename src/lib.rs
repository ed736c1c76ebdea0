pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod services;
pub mod store;
pub mod types;

pub use cache::ResponseCache;
pub use config::EngineConfig;
pub use engine::{AttemptOutcome, AttemptSubmission, LearningEngine};
pub use error::{EngineError, EngineResult, ProviderError, StoreError};
pub use services::classifier::{KeywordClassifier, TopicClassifier};
pub use services::generation::{GenerationKind, GenerationProvider, GenerationRequest};
pub use store::{JsonFileStore, MemoryStore, Store};
