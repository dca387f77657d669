//! Rolling file logs for the courier pipeline.
//!
//! # Responsibility
//! - Start one `flexi_logger` backend per process.
//! - Capture panics as sanitized log events.
//!
//! # Invariants
//! - Repeated init with identical settings is a no-op.
//! - Switching level or directory after init is rejected.
//! - Init never panics.

use flexi_logger::{Cleanup, Criterion, FileSpec, Logger, LoggerHandle, Naming, WriteMode};
use once_cell::sync::OnceCell;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

const LOG_BASENAME: &str = "courier";
const ROTATE_AT_BYTES: u64 = 10 * 1024 * 1024;
const KEEP_LOG_FILES: usize = 5;
const PANIC_PAYLOAD_LIMIT: usize = 160;

static ACTIVE: OnceCell<ActiveLogger> = OnceCell::new();
static PANIC_HOOK: OnceCell<()> = OnceCell::new();

struct ActiveLogger {
    level: &'static str,
    dir: PathBuf,
    _handle: LoggerHandle,
}

/// Logging bootstrap failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoggingError {
    UnsupportedLevel(String),
    InvalidDirectory(String),
    /// Logging is already running with different settings.
    Conflict(String),
    Backend(String),
}

impl Display for LoggingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnsupportedLevel(level) => write!(
                f,
                "unsupported log level `{level}`; expected trace|debug|info|warn|error"
            ),
            Self::InvalidDirectory(message) => write!(f, "invalid log directory: {message}"),
            Self::Conflict(message) => write!(f, "logging already initialized: {message}"),
            Self::Backend(message) => write!(f, "logger backend failed: {message}"),
        }
    }
}

impl Error for LoggingError {}

/// Starts file logging at `level` under the absolute directory `log_dir`.
///
/// # Errors
/// - Unknown level, relative or empty directory.
/// - Directory creation or backend start failure.
/// - Settings differing from an earlier successful call.
pub fn init_logging(level: &str, log_dir: &str) -> Result<(), LoggingError> {
    let level = parse_level(level)?;
    let dir = parse_log_dir(log_dir)?;

    let active = ACTIVE.get_or_try_init(|| start_backend(level, &dir))?;
    if active.dir != dir {
        return Err(LoggingError::Conflict(format!(
            "directory is `{}`, refusing `{}`",
            active.dir.display(),
            dir.display()
        )));
    }
    if active.level != level {
        return Err(LoggingError::Conflict(format!(
            "level is `{}`, refusing `{level}`",
            active.level
        )));
    }
    Ok(())
}

/// Active `(level, directory)`, or `None` before init.
pub fn logging_status() -> Option<(&'static str, PathBuf)> {
    ACTIVE.get().map(|active| (active.level, active.dir.clone()))
}

/// `debug` for debug builds, `info` otherwise.
pub fn default_log_level() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    }
}

fn start_backend(level: &'static str, dir: &Path) -> Result<ActiveLogger, LoggingError> {
    std::fs::create_dir_all(dir).map_err(|err| {
        LoggingError::InvalidDirectory(format!("cannot create `{}`: {err}", dir.display()))
    })?;

    let handle = Logger::try_with_str(level)
        .map_err(|err| LoggingError::Backend(err.to_string()))?
        .log_to_file(FileSpec::default().directory(dir).basename(LOG_BASENAME))
        .rotate(
            Criterion::Size(ROTATE_AT_BYTES),
            Naming::Numbers,
            Cleanup::KeepLogFiles(KEEP_LOG_FILES),
        )
        .write_mode(WriteMode::BufferAndFlush)
        .append()
        .format_for_files(flexi_logger::detailed_format)
        .start()
        .map_err(|err| LoggingError::Backend(err.to_string()))?;

    install_panic_hook();
    log::info!(
        "event=courier_start module=logging status=ok version={} level={} log_dir={}",
        env!("CARGO_PKG_VERSION"),
        level,
        dir.display()
    );

    Ok(ActiveLogger {
        level,
        dir: dir.to_path_buf(),
        _handle: handle,
    })
}

fn parse_level(level: &str) -> Result<&'static str, LoggingError> {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok("trace"),
        "debug" => Ok("debug"),
        "info" => Ok("info"),
        "warn" | "warning" => Ok("warn"),
        "error" => Ok("error"),
        other => Err(LoggingError::UnsupportedLevel(other.to_string())),
    }
}

fn parse_log_dir(log_dir: &str) -> Result<PathBuf, LoggingError> {
    let trimmed = log_dir.trim();
    if trimmed.is_empty() {
        return Err(LoggingError::InvalidDirectory("empty path".to_string()));
    }
    let path = Path::new(trimmed);
    if !path.is_absolute() {
        return Err(LoggingError::InvalidDirectory(format!(
            "`{trimmed}` is not absolute"
        )));
    }
    Ok(path.to_path_buf())
}

fn install_panic_hook() {
    if PANIC_HOOK.set(()).is_err() {
        return;
    }

    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let location = info
            .location()
            .map(|loc| format!("{}:{}", loc.file(), loc.line()))
            .unwrap_or_else(|| "unknown".to_string());
        let payload = if let Some(message) = info.payload().downcast_ref::<&str>() {
            (*message).to_string()
        } else if let Some(message) = info.payload().downcast_ref::<String>() {
            message.clone()
        } else {
            "non-string panic payload".to_string()
        };
        log::error!(
            "event=panic_captured module=logging status=error location={} payload={}",
            location,
            single_line(&payload, PANIC_PAYLOAD_LIMIT)
        );
        previous(info);
    }));
}

/// Flattens line breaks and caps length at `limit` characters.
fn single_line(value: &str, limit: usize) -> String {
    let flat = value.replace(['\n', '\r'], " ");
    let mut capped: String = flat.chars().take(limit).collect();
    if flat.chars().count() > limit {
        capped.push_str("...");
    }
    capped
}

#[cfg(test)]
mod tests {
    use super::{init_logging, logging_status, parse_level, parse_log_dir, single_line, LoggingError};

    #[test]
    fn levels_are_case_insensitive() {
        assert_eq!(parse_level(" WARNING ").unwrap(), "warn");
        assert_eq!(parse_level("Info").unwrap(), "info");
        assert!(matches!(
            parse_level("loud"),
            Err(LoggingError::UnsupportedLevel(_))
        ));
    }

    #[test]
    fn relative_log_dir_is_rejected() {
        assert!(matches!(
            parse_log_dir("logs"),
            Err(LoggingError::InvalidDirectory(_))
        ));
    }

    #[test]
    fn single_line_flattens_and_caps() {
        let flat = single_line("a\nb\rc-long-tail", 5);
        assert_eq!(flat, "a b c...");
    }

    #[test]
    fn repeated_init_is_idempotent_and_conflicts_fail() {
        let dir = tempfile::tempdir().unwrap();
        let other = tempfile::tempdir().unwrap();
        let dir_str = dir.path().to_str().unwrap();

        init_logging("info", dir_str).unwrap();
        init_logging("info", dir_str).unwrap();

        assert!(matches!(
            init_logging("debug", dir_str),
            Err(LoggingError::Conflict(_))
        ));
        assert!(matches!(
            init_logging("info", other.path().to_str().unwrap()),
            Err(LoggingError::Conflict(_))
        ));

        let (level, active_dir) = logging_status().unwrap();
        assert_eq!(level, "info");
        assert_eq!(active_dir, dir.path());
    }
}
