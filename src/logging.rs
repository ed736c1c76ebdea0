use std::path::Path;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::EngineConfig;

const LOG_FILE_PREFIX: &str = "learning-engine.log";
const FALLBACK_LEVEL: &str = "info";

/// Keeps the background file writer alive; dropping it flushes pending lines.
pub struct FileLogGuard {
    _guard: WorkerGuard,
}

/// Installs the global subscriber. Only binaries call this; the library just emits events.
///
/// Events always go to stderr. When `config.log_dir` is set they are also written to a
/// daily rolling file in that directory.
pub fn init_tracing(config: &EngineConfig) -> Option<FileLogGuard> {
    let (file_layer, guard) = match config.log_dir.as_deref().and_then(file_writer) {
        Some((writer, guard)) => (
            Some(fmt::layer().with_writer(writer).with_ansi(false).with_target(true)),
            Some(FileLogGuard { _guard: guard }),
        ),
        None => (None, None),
    };

    let installed = tracing_subscriber::registry()
        .with(level_filter(&config.log_level))
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(file_layer)
        .try_init();
    if let Err(err) = installed {
        eprintln!("tracing subscriber already installed: {err}");
    }

    guard
}

fn level_filter(log_level: &str) -> EnvFilter {
    EnvFilter::try_new(log_level).unwrap_or_else(|err| {
        eprintln!("invalid log filter {log_level:?} ({err}), using {FALLBACK_LEVEL}");
        EnvFilter::new(FALLBACK_LEVEL)
    })
}

fn file_writer(dir: &Path) -> Option<(NonBlocking, WorkerGuard)> {
    if let Err(err) = std::fs::create_dir_all(dir) {
        eprintln!("failed to create log directory {}: {err}", dir.display());
        return None;
    }
    let appender = RollingFileAppender::new(Rotation::DAILY, dir, LOG_FILE_PREFIX);
    Some(tracing_appender::non_blocking(appender))
}
