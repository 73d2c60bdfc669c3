//! # Logging Utilities
//!
//! Logging bootstrap for Lens, built on `tracing`.
//!
//! The engine itself only emits `tracing` events; whoever embeds it decides
//! where they go. Two setups are provided:
//! - **standalone** (the `lens` CLI): stderr, optionally mirrored to a file
//! - **embedded** (inside a debugger): file only, so nothing is written to
//!   the debugger's own console
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use lens_utils::init_logging;
//!
//! // Reads RUST_LOG, LENS_LOG_FORMAT and LENS_LOG_FILE
//! let _guard = init_logging().expect("Failed to initialize logging");
//! tracing::info!("inspector ready");
//! ```
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: Filter directives (e.g. `RUST_LOG=debug`, `RUST_LOG=lens_core::providers=trace`)
//! - `LENS_LOG_FORMAT`: `pretty` or `json` (default: `pretty`)
//! - `LENS_LOG_FILE`: Optional file that receives a copy of every event
//!
//! The returned [`LoggingGuard`] flushes the file writer when dropped; keep
//! it alive for as long as logging is needed.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::{env, fs, io};

use chrono::Utc;
use tracing::{Level, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::{self, MakeWriter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Output format variable
pub const FORMAT_VAR: &str = "LENS_LOG_FORMAT";

/// Log file variable
pub const FILE_VAR: &str = "LENS_LOG_FILE";

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat
{
    /// Human-readable lines (default)
    Pretty,
    /// One JSON object per event
    Json,
}

impl FromStr for LogFormat
{
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "pretty" | "dev" | "text" => Ok(LogFormat::Pretty),
            "json" | "prod" => Ok(LogFormat::Json),
            _ => Err(LoggingError::InvalidFormat(s.to_string())),
        }
    }
}

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel
{
    Error,
    Warn,
    /// Default level
    Info,
    Debug,
    /// Includes every provider cache step
    Trace,
}

impl From<LogLevel> for Level
{
    fn from(level: LogLevel) -> Self
    {
        match level {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

impl FromStr for LogLevel
{
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "error" | "err" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" | "dbg" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            _ => Err(LoggingError::InvalidLevel(s.to_string())),
        }
    }
}

/// Keeps the background file writer alive
///
/// Dropping the guard flushes pending events. Console-only setups hold no
/// writer and dropping their guard does nothing.
#[derive(Debug)]
#[must_use = "dropping the guard stops file logging"]
pub struct LoggingGuard
{
    _worker: Option<WorkerGuard>,
}

/// Initialize logging from the environment
///
/// ## Errors
///
/// Returns an error if:
/// - Logging is already initialized
/// - `LENS_LOG_FORMAT` holds an unknown format
/// - The `LENS_LOG_FILE` directory cannot be created
pub fn init_logging() -> Result<LoggingGuard, LoggingError>
{
    let format = match env::var(FORMAT_VAR) {
        Ok(value) => value.parse()?,
        Err(_) => LogFormat::Pretty,
    };
    let file = env::var_os(FILE_VAR).map(PathBuf::from);
    install(format, filter(None), true, file)
}

/// Initialize console logging with an explicit level and format
///
/// `LENS_LOG_FILE` is still honored.
///
/// ## Example
///
/// ```rust,no_run
/// use lens_utils::{init_logging_with_level, LogFormat, LogLevel};
///
/// let _guard = init_logging_with_level(LogLevel::Debug, LogFormat::Json)
///     .expect("Failed to initialize logging");
/// ```
///
/// ## Errors
///
/// Returns an error if logging is already initialized or the log file
/// directory cannot be created.
pub fn init_logging_with_level(level: LogLevel, format: LogFormat) -> Result<LoggingGuard, LoggingError>
{
    let file = env::var_os(FILE_VAR).map(PathBuf::from);
    install(format, filter(Some(level)), true, file)
}

/// Initialize file-only logging for an engine embedded in a debugger
///
/// Events go to `~/.lens/YYYY-MM-DD-lens.log`, or to the system temporary
/// directory when there is no home directory. `level` overrides `RUST_LOG`.
///
/// ## Errors
///
/// Returns an error if logging is already initialized or the log directory
/// cannot be created.
pub fn init_logging_for_host(level: Option<LogLevel>) -> Result<(PathBuf, LoggingGuard), LoggingError>
{
    let today = Utc::now().format("%Y-%m-%d").to_string();
    let path = host_log_path(env::var_os("HOME").map(PathBuf::from), &today);
    let guard = install(LogFormat::Pretty, filter(level), false, Some(path.clone()))?;
    Ok((path, guard))
}

/// Dated log file under `home/.lens`, or the temporary directory
fn host_log_path(home: Option<PathBuf>, today: &str) -> PathBuf
{
    let dir = home.map_or_else(env::temp_dir, |home| home.join(".lens"));
    dir.join(format!("{today}-lens.log"))
}

/// An explicit level wins over `RUST_LOG`, which wins over `info`
fn filter(level: Option<LogLevel>) -> EnvFilter
{
    match level {
        Some(level) => EnvFilter::new(Level::from(level).to_string()),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(Level::INFO.to_string())),
    }
}

type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync>;

fn layer<S, W>(format: LogFormat, writer: W, ansi: bool) -> BoxedLayer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let base = fmt::layer()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_timer(ChronoUtc::rfc_3339())
        .with_writer(writer);
    match format {
        LogFormat::Pretty => base.with_ansi(ansi).boxed(),
        LogFormat::Json => base.json().with_current_span(true).with_span_list(true).boxed(),
    }
}

fn install(format: LogFormat, filter: EnvFilter, console: bool, file: Option<PathBuf>) -> Result<LoggingGuard, LoggingError>
{
    let mut layers = Vec::new();
    if console {
        layers.push(layer(format, io::stderr, true));
    }

    let mut worker = None;
    if let Some(path) = file {
        let dir = path.parent().filter(|dir| !dir.as_os_str().is_empty()).unwrap_or(Path::new("."));
        fs::create_dir_all(dir)?;
        let name = path.file_name().unwrap_or(OsStr::new("lens.log"));
        let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
        layers.push(layer(format, writer, false));
        worker = Some(guard);
    }

    Registry::default()
        .with(filter)
        .with(layers)
        .try_init()
        .map_err(|err| LoggingError::InitializationFailed(err.to_string()))?;
    Ok(LoggingGuard { _worker: worker })
}

/// Logging initialization error
#[derive(Debug, thiserror::Error)]
pub enum LoggingError
{
    /// Unknown log format name
    #[error("Unknown log format: {0}. Use 'pretty' or 'json'")]
    InvalidFormat(String),

    /// Unknown log level name
    #[error("Unknown log level: {0}. Use 'error', 'warn', 'info', 'debug', or 'trace'")]
    InvalidLevel(String),

    /// A global subscriber is already installed
    #[error("Failed to initialize logging: {0}")]
    InitializationFailed(String),

    /// The log file or its directory could not be created
    #[error("File logging error: {0}")]
    FileError(#[from] io::Error),
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_log_format_from_str()
    {
        assert_eq!(LogFormat::from_str("pretty").unwrap(), LogFormat::Pretty);
        assert_eq!(LogFormat::from_str("JSON").unwrap(), LogFormat::Json);
        assert_eq!(LogFormat::from_str("text").unwrap(), LogFormat::Pretty);
        assert!(matches!(LogFormat::from_str("xml"), Err(LoggingError::InvalidFormat(_))));
    }

    #[test]
    fn test_log_level_from_str()
    {
        assert_eq!(LogLevel::from_str("warning").unwrap(), LogLevel::Warn);
        assert_eq!(LogLevel::from_str("dbg").unwrap(), LogLevel::Debug);
        assert_eq!(LogLevel::from_str("trace").unwrap(), LogLevel::Trace);
        assert!(matches!(LogLevel::from_str("loud"), Err(LoggingError::InvalidLevel(_))));
    }

    #[test]
    fn test_log_level_to_tracing_level()
    {
        assert_eq!(Level::from(LogLevel::Error), Level::ERROR);
        assert_eq!(Level::from(LogLevel::Info), Level::INFO);
        assert_eq!(Level::from(LogLevel::Trace), Level::TRACE);
    }

    #[test]
    fn test_host_log_path_is_dated()
    {
        let path = host_log_path(Some(PathBuf::from("/home/dev")), "2026-01-02");
        assert_eq!(path, PathBuf::from("/home/dev/.lens/2026-01-02-lens.log"));

        let fallback = host_log_path(None, "2026-01-02");
        assert!(fallback.starts_with(env::temp_dir()));
    }
}
