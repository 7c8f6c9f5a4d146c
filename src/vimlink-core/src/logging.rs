use crate::{config::LoggingConfig, paths::AppDirs};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use thiserror::Error;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_LOG_FILE: &str = "vimlink.log";

pub struct LoggingGuard {
    _file_guard: WorkerGuard,
}

/// Install the process-wide subscriber.
///
/// Output always goes to a rolling file in the log directory because stdout
/// belongs to the RPC channel. `stderr = true` additionally mirrors every line
/// to stderr, which the host shows in its messages when the job fails.
pub fn init_logging(config: &LoggingConfig, dirs: &AppDirs) -> Result<LoggingGuard, LoggingError> {
    let log_dir = dirs.log_dir().to_path_buf();
    fs::create_dir_all(&log_dir).map_err(|source| LoggingError::CreateDirectory {
        path: log_dir.clone(),
        source,
    })?;

    let directive = config.level.as_filter_directive();
    let env_filter = EnvFilter::try_new(directive).map_err(|source| LoggingError::ParseLevel {
        level: directive.to_string(),
        source,
    })?;

    let (file, file_guard) = rolling_file(config, &log_dir)?;
    let writer = if config.stderr {
        BoxMakeWriter::new(
            std::io::stderr
                .with_max_level(tracing::Level::TRACE)
                .and(file),
        )
    } else {
        BoxMakeWriter::new(file)
    };

    fmt()
        .with_env_filter(env_filter)
        .with_ansi(false)
        .with_thread_names(true)
        .with_writer(writer)
        .try_init()
        .map_err(LoggingError::SubscriberInstall)?;

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

/// Non-blocking daily-rolling file, opened after pruning old rotations.
fn rolling_file(
    config: &LoggingConfig,
    log_dir: &Path,
) -> Result<(NonBlocking, WorkerGuard), LoggingError> {
    let stem = config.file_name.as_deref().unwrap_or(DEFAULT_LOG_FILE);
    prune_logs(log_dir, stem, config.max_log_files.max(1))?;
    Ok(tracing_appender::non_blocking(
        tracing_appender::rolling::daily(log_dir, stem),
    ))
}

/// Remove all but the `keep` most recently modified files starting with
/// `stem`.
fn prune_logs(dir: &Path, stem: &str, keep: usize) -> Result<(), LoggingError> {
    let listing = fs::read_dir(dir).map_err(|source| LoggingError::ReadDir {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut logs: Vec<(SystemTime, PathBuf)> = Vec::new();
    for entry in listing.flatten() {
        if !entry.file_name().to_string_lossy().starts_with(stem) {
            continue;
        }
        if let Ok(modified) = entry.metadata().and_then(|meta| meta.modified()) {
            logs.push((modified, entry.path()));
        }
    }

    logs.sort_by(|a, b| b.0.cmp(&a.0));
    for (_, path) in logs.into_iter().skip(keep) {
        fs::remove_file(&path).map_err(|source| LoggingError::Prune { path, source })?;
    }
    Ok(())
}

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("failed to create log directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse log level {level}: {source}")]
    ParseLevel {
        level: String,
        source: tracing_subscriber::filter::ParseError,
    },
    #[error("failed to install tracing subscriber: {0}")]
    SubscriberInstall(Box<dyn std::error::Error + Send + Sync>),
    #[error("failed to list log directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to prune log file {path}: {source}")]
    Prune {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn touch(dir: &Path, name: &str, age_minutes: u64) {
        let path = dir.join(name);
        fs::write(&path, b"line").unwrap();
        let file = fs::File::options().write(true).open(&path).unwrap();
        file.set_modified(SystemTime::now() - Duration::from_secs(age_minutes * 60))
            .unwrap();
    }

    #[test]
    fn prune_keeps_the_newest_rotations() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "vimlink.log.2024-01-01", 30);
        touch(dir.path(), "vimlink.log.2024-01-02", 20);
        touch(dir.path(), "vimlink.log.2024-01-03", 10);
        touch(dir.path(), "notes.txt", 60);

        prune_logs(dir.path(), "vimlink.log", 2).unwrap();

        assert!(!dir.path().join("vimlink.log.2024-01-01").exists());
        assert!(dir.path().join("vimlink.log.2024-01-02").exists());
        assert!(dir.path().join("vimlink.log.2024-01-03").exists());
        assert!(dir.path().join("notes.txt").exists());
    }

    #[test]
    fn prune_to_zero_clears_every_rotation() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "custom.log.2024-01-01", 5);

        prune_logs(dir.path(), "custom.log", 0).unwrap();
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn missing_directory_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let gone = dir.path().join("gone");
        assert!(matches!(
            prune_logs(&gone, "vimlink.log", 1),
            Err(LoggingError::ReadDir { .. })
        ));
    }
}
