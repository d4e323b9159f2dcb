//! Process-wide logging bootstrap.
//!
//! # Responsibility
//! - Install a rolling file logger for repository and transaction events.
//! - Report which configuration is active.
//!
//! # Invariants
//! - The logger is installed at most once per process.
//! - Repeating the active configuration is a no-op; any other configuration is
//!   rejected instead of silently replacing the running logger.

use crate::config::LoggingConfig;
use flexi_logger::{Cleanup, Criterion, FileSpec, Logger, LoggerHandle, Naming, WriteMode};
use log::info;
use once_cell::sync::OnceCell;
use std::path::{Path, PathBuf};

const LOG_FILE_BASENAME: &str = "aggregate_repository";
const ROTATE_AT_BYTES: u64 = 8 * 1024 * 1024;
const KEEP_LOG_FILES: usize = 4;

static ACTIVE_LOGGER: OnceCell<ActiveLogger> = OnceCell::new();

struct ActiveLogger {
    level: &'static str,
    log_dir: PathBuf,
    _handle: LoggerHandle,
}

/// Installs the file logger described by `config`.
///
/// # Errors
/// - Unknown level names.
/// - Empty or relative `log_dir`, or a directory that cannot be created.
/// - A logger is already active with a different level or directory.
pub fn init_logging(config: &LoggingConfig) -> Result<(), String> {
    let level = parse_level(&config.level)?;
    let log_dir = validate_log_dir(&config.log_dir)?;

    let active = ACTIVE_LOGGER.get_or_try_init(|| start_logger(level, &log_dir))?;
    ensure_same_config(active, level, &log_dir)
}

/// Returns `(level, log_dir)` of the active logger, if any.
pub fn logging_status() -> Option<(&'static str, PathBuf)> {
    ACTIVE_LOGGER
        .get()
        .map(|active| (active.level, active.log_dir.clone()))
}

/// `debug` for debug builds, `info` for release builds.
pub fn default_log_level() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    }
}

fn start_logger(level: &'static str, log_dir: &Path) -> Result<ActiveLogger, String> {
    std::fs::create_dir_all(log_dir).map_err(|err| {
        format!(
            "failed to create log directory `{}`: {err}",
            log_dir.display()
        )
    })?;

    let handle = Logger::try_with_str(level)
        .map_err(|err| format!("invalid log level `{level}`: {err}"))?
        .log_to_file(
            FileSpec::default()
                .directory(log_dir)
                .basename(LOG_FILE_BASENAME),
        )
        .rotate(
            Criterion::Size(ROTATE_AT_BYTES),
            Naming::Numbers,
            Cleanup::KeepLogFiles(KEEP_LOG_FILES),
        )
        .write_mode(WriteMode::BufferAndFlush)
        .append()
        .format_for_files(flexi_logger::detailed_format)
        .start()
        .map_err(|err| format!("failed to start logger: {err}"))?;

    info!(
        "event=logging_init module=logging status=ok level={} log_dir={} version={}",
        level,
        log_dir.display(),
        env!("CARGO_PKG_VERSION")
    );

    Ok(ActiveLogger {
        level,
        log_dir: log_dir.to_path_buf(),
        _handle: handle,
    })
}

fn ensure_same_config(active: &ActiveLogger, level: &str, log_dir: &Path) -> Result<(), String> {
    if active.log_dir != log_dir {
        return Err(format!(
            "logging already active at `{}`; refusing to switch to `{}`",
            active.log_dir.display(),
            log_dir.display()
        ));
    }
    if active.level != level {
        return Err(format!(
            "logging already active with level `{}`; refusing to switch to `{}`",
            active.level, level
        ));
    }
    Ok(())
}

fn parse_level(level: &str) -> Result<&'static str, String> {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok("trace"),
        "debug" => Ok("debug"),
        "info" => Ok("info"),
        "warn" | "warning" => Ok("warn"),
        "error" => Ok("error"),
        other => Err(format!(
            "unsupported log level `{other}`; expected trace|debug|info|warn|error"
        )),
    }
}

fn validate_log_dir(log_dir: &Path) -> Result<PathBuf, String> {
    if log_dir.as_os_str().is_empty() {
        return Err("log_dir cannot be empty".to_string());
    }
    if !log_dir.is_absolute() {
        return Err(format!(
            "log_dir must be an absolute path, got `{}`",
            log_dir.display()
        ));
    }
    Ok(log_dir.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::{init_logging, logging_status, parse_level, validate_log_dir};
    use crate::config::LoggingConfig;
    use std::path::Path;

    #[test]
    fn parse_level_accepts_aliases_and_case() {
        assert_eq!(parse_level(" WARNING ").unwrap(), "warn");
        assert_eq!(parse_level("Trace").unwrap(), "trace");
        assert!(parse_level("verbose").unwrap_err().contains("unsupported"));
    }

    #[test]
    fn validate_log_dir_rejects_relative_and_empty_paths() {
        assert!(validate_log_dir(Path::new("logs/dev"))
            .unwrap_err()
            .contains("absolute"));
        assert!(validate_log_dir(Path::new(""))
            .unwrap_err()
            .contains("empty"));
    }

    #[test]
    fn init_logging_is_idempotent_and_rejects_switching() {
        let dir = tempfile::tempdir().unwrap();
        let config = LoggingConfig {
            level: "info".to_string(),
            log_dir: dir.path().join("logs"),
        };

        init_logging(&config).unwrap();
        init_logging(&config).unwrap();

        let louder = LoggingConfig {
            level: "trace".to_string(),
            ..config.clone()
        };
        assert!(init_logging(&louder)
            .unwrap_err()
            .contains("refusing to switch"));

        let elsewhere = LoggingConfig {
            log_dir: dir.path().join("other"),
            ..config.clone()
        };
        assert!(init_logging(&elsewhere)
            .unwrap_err()
            .contains("refusing to switch"));

        let (level, log_dir) = logging_status().unwrap();
        assert_eq!(level, "info");
        assert_eq!(log_dir, config.log_dir);
    }
}
