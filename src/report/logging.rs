//! Console and file logging for analysis runs.

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex, OnceLock};

use serde::{Deserialize, Serialize};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt as fmt_layer, reload, EnvFilter, Registry};

use crate::error::{AnalyzerError, Result};

/// Name of the log file written into the output directory.
pub const LOG_FILE_NAME: &str = "arima_analysis.log";

/// Verbosity accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warning,
    Error,
    /// Same filter as `Error`.
    Critical,
}

impl LogLevel {
    /// Directive understood by [`EnvFilter`].
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error | LogLevel::Critical => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
            LogLevel::Critical => "CRITICAL",
        };
        f.write_str(name)
    }
}

impl FromStr for LogLevel {
    type Err = AnalyzerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "WARNING" | "WARN" => Ok(LogLevel::Warning),
            "ERROR" => Ok(LogLevel::Error),
            "CRITICAL" => Ok(LogLevel::Critical),
            _ => Err(AnalyzerError::InvalidParameter(format!(
                "unknown log level '{}' (expected DEBUG, INFO, WARNING, ERROR or CRITICAL)",
                s
            ))),
        }
    }
}

/// File sink shared by every run in the process; each `init_logging` call
/// points it at that run's log file.
#[derive(Debug, Clone, Default)]
struct LogFile(Arc<Mutex<Option<File>>>);

impl LogFile {
    fn replace(&self, file: File) {
        if let Ok(mut slot) = self.0.lock() {
            *slot = Some(file);
        }
    }
}

impl Write for LogFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.0.lock() {
            Ok(mut slot) => match slot.as_mut() {
                Some(file) => file.write(buf),
                None => Ok(buf.len()),
            },
            Err(_) => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.0.lock() {
            Ok(mut slot) => slot.as_mut().map_or(Ok(()), |file| file.flush()),
            Err(_) => Ok(()),
        }
    }
}

impl<'a> MakeWriter<'a> for LogFile {
    type Writer = LogFile;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

struct LoggingHandles {
    file: LogFile,
    filter: reload::Handle<EnvFilter, Registry>,
}

static LOGGING: OnceLock<LoggingHandles> = OnceLock::new();

fn level_filter(level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_filter()))
}

fn install(level: LogLevel) -> LoggingHandles {
    let file = LogFile::default();
    let (filter, handle) = reload::Layer::new(level_filter(level));
    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer::layer().with_target(false))
        .with(
            fmt_layer::layer()
                .with_ansi(false)
                .with_writer(file.clone()),
        )
        .try_init()
        .is_ok();
    if !installed {
        tracing::warn!("a global subscriber is already installed; run logs go to it");
    }
    LoggingHandles {
        file,
        filter: handle,
    }
}

/// Log to stderr and to `{output_dir}/arima_analysis.log`.
///
/// The global subscriber is installed once per process. Every call redirects
/// the file output to the new directory and applies `level`; `RUST_LOG`
/// takes precedence over `level` when set.
pub fn init_logging(output_dir: &Path, level: LogLevel) -> Result<PathBuf> {
    fs::create_dir_all(output_dir)?;
    let log_path = output_dir.join(LOG_FILE_NAME);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    let handles = LOGGING.get_or_init(|| install(level));
    handles.file.replace(file);
    if let Err(e) = handles.filter.reload(level_filter(level)) {
        tracing::debug!(error = %e, "log level not applied");
    }
    tracing::debug!(path = %log_path.display(), %level, "logging to file");
    Ok(log_path)
}
