//! Structured JSONL logging to a file and human-readable stderr output.
//!
//! This module provides dual-output logging:
//! - **JSONL to file** (`<data dir>/global-accel/logs/global-acceld.jsonl`)
//! - **Compact to stderr** for developers
//!
//! stdout is left alone: the daemon prints shortcut events there.
//!
//! # Usage
//!
//! ```rust,ignore
//! use global_accel::logging;
//!
//! // Initialize logging - keep the guard alive for the duration of the program
//! let _guard = logging::init();
//!
//! tracing::info!(component = "konsole", action = "NewTab", "Shortcut registered");
//! ```
//!
//! # JSONL Output Format
//!
//! ```json
//! {"timestamp":"2026-01-05T10:30:45.123Z","level":"INFO","target":"global_accel::shortcuts::registry","fields":{"message":"Shortcut triggered","component":"konsole","action":"NewTab"}}
//! ```

use std::fs::{self, OpenOptions};
use std::path::PathBuf;

use time::macros::format_description;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::shortcuts::{LoadWarning, ShortcutEvent};

const LOG_FILE_NAME: &str = "global-acceld.jsonl";

/// Guard that must be kept alive for the duration of the program.
/// Dropping this guard will flush and close the log file.
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Initialize the dual-output logging system.
///
/// If the log file cannot be opened, logging continues on stderr only.
pub fn init() -> LoggingGuard {
    let log_path = log_path();
    let file = log_path
        .parent()
        .map_or(Ok(()), fs::create_dir_all)
        .and_then(|()| {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(&log_path)
        });

    let (json_layer, file_guard) = match file {
        Ok(file) => {
            let (non_blocking_file, guard) = tracing_appender::non_blocking(file);
            let layer = fmt::layer()
                .json()
                .with_writer(non_blocking_file)
                .with_timer(fmt::time::UtcTime::new(format_description!(
                    "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z"
                )))
                .with_target(true)
                .with_level(true)
                .with_thread_names(true)
                .with_file(false)
                .with_line_number(false)
                .with_span_events(FmtSpan::NONE);
            (Some(layer), Some(guard))
        }
        Err(e) => {
            eprintln!("[LOGGING] Failed to open {}: {}", log_path.display(), e);
            (None, None)
        }
    };

    // Environment filter - default to info, allow override via RUST_LOG
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(false)
        .compact();

    // A second init (tests, embedding) keeps the first subscriber
    let installed = tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(stderr_layer)
        .try_init()
        .is_ok();

    if installed {
        tracing::info!(
            event_type = "daemon_lifecycle",
            action = "started",
            log_path = %log_path.display(),
            "Logging initialized"
        );
    }

    LoggingGuard {
        _file_guard: file_guard,
    }
}

/// Get the log directory path
fn get_log_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("global-accel").join("logs"))
        .unwrap_or_else(|| std::env::temp_dir().join("global-accel-logs"))
}

/// Get the path to the JSONL log file
pub fn log_path() -> PathBuf {
    get_log_dir().join(LOG_FILE_NAME)
}

/// Log a delivered shortcut notification.
pub fn log_shortcut_event(event: &ShortcutEvent) {
    tracing::debug!(
        event_type = "shortcut",
        kind = ?event.kind,
        component = %event.component,
        context = %event.context,
        action = %event.action,
        "Shortcut event delivered"
    );
}

/// Log the records a shortcut file load could not restore as saved.
pub fn log_load_warnings(warnings: &[LoadWarning]) {
    for warning in warnings {
        tracing::warn!(event_type = "shortcut_load", "{}", warning);
    }
    if !warnings.is_empty() {
        tracing::warn!(
            event_type = "shortcut_load",
            count = warnings.len(),
            "Some persisted shortcuts were not restored as saved"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_path_file_name() {
        let path = log_path();
        assert!(path.ends_with(LOG_FILE_NAME));
        assert!(path.parent().unwrap().ends_with("logs"));
    }
}
