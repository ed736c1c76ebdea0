use std::process::ExitCode;
use std::sync::Arc;

use chrono::Utc;

use learning_engine::config::EngineConfig;
use learning_engine::logging::init_tracing;
use learning_engine::services::generation::OfflineProvider;
use learning_engine::{EngineError, EngineResult, JsonFileStore, KeywordClassifier, LearningEngine};

const USAGE: &str = "usage: learning-engine <stats | due [limit] | export [file] | import <file> | reset>";
const DEFAULT_DUE_LIMIT: usize = 20;

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let config = EngineConfig::from_env();
    let _log_guard = init_tracing(&config);

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first().map(String::as_str) else {
        eprintln!("{USAGE}");
        return ExitCode::FAILURE;
    };

    let store = match JsonFileStore::open(config.data_dir.clone()).await {
        Ok(store) => store,
        Err(err) => {
            tracing::error!(error = %err, "failed to open data directory");
            return ExitCode::FAILURE;
        }
    };
    tracing::debug!(dir = %store.dir().display(), "using file store");

    let engine = LearningEngine::load(
        Arc::new(store),
        Arc::new(OfflineProvider),
        Arc::new(KeywordClassifier::default()),
        config,
    )
    .await;

    match run(&engine, command, &args[1..]).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, command, "command failed");
            eprintln!("{}", err.user_message());
            ExitCode::FAILURE
        }
    }
}

async fn run(engine: &LearningEngine, command: &str, rest: &[String]) -> EngineResult<()> {
    match command {
        "stats" => {
            let report = serde_json::json!({
                "user": engine.user_stats().await,
                "srs": engine.srs_stats(Utc::now()).await,
                "topics": engine.all_progress().await,
                "badges": engine.badges().await,
                "achievements": engine.achievements().await,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        "due" => {
            let limit = match rest.first() {
                Some(raw) => raw
                    .parse()
                    .map_err(|_| EngineError::Validation(format!("invalid limit {raw:?}")))?,
                None => DEFAULT_DUE_LIMIT,
            };
            let due = engine.due_items(Utc::now(), limit).await;
            println!("{}", serde_json::to_string_pretty(&due)?);
        }
        "export" => {
            let doc = engine.export_srs_json().await?;
            match rest.first() {
                Some(path) => write_file(path, &doc).await?,
                None => println!("{doc}"),
            }
        }
        "import" => {
            let path = rest
                .first()
                .ok_or_else(|| EngineError::Validation(USAGE.to_string()))?;
            let raw = tokio::fs::read_to_string(path).await.map_err(|source| {
                EngineError::Store(learning_engine::StoreError::Io {
                    key: path.clone(),
                    source,
                })
            })?;
            engine.import_srs_json(&raw).await?;
            eprintln!("imported {} review items", engine.list_items().await.len());
        }
        "reset" => {
            engine.reset_progress().await?;
            eprintln!("learning progress cleared");
        }
        other => {
            return Err(EngineError::Validation(format!(
                "unknown command {other:?}\n{USAGE}"
            )));
        }
    }
    Ok(())
}

async fn write_file(path: &str, contents: &str) -> EngineResult<()> {
    tokio::fs::write(path, contents).await.map_err(|source| {
        EngineError::Store(learning_engine::StoreError::Io {
            key: path.to_string(),
            source,
        })
    })
}
