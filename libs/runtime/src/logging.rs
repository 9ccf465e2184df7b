use crate::config::Settings;
use std::{
    io::{IsTerminal, Write},
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};
use tracing::level_filters::LevelFilter;
use tracing::Level;
use tracing_subscriber::{filter::Targets, fmt};

use file_rotate::{
    compression::Compression,
    suffix::{AppendTimestamp, FileLimit},
    ContentLimit, FileRotate,
};

/// Target used by sqlx for executed statements.
const SQL_STATEMENT_TARGET: &str = "sqlx::query";

/// Logging setup derived from [`Settings`] and CLI verbosity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub console_level: String,
    pub file: Option<PathBuf>,
    pub file_level: String,
    pub max_size_mb: u64,
    pub max_backups: usize,
    /// Emit executed SQL statements at INFO.
    pub sql_statements: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            console_level: "info".to_string(),
            file: None,
            file_level: "debug".to_string(),
            max_size_mb: 100,
            max_backups: 3,
            sql_statements: false,
        }
    }
}

impl LoggingConfig {
    /// Build from settings; `verbose` (count of `-v`) raises the console level.
    pub fn from_settings(settings: &Settings, verbose: u8) -> Self {
        let console_level = match verbose {
            0 => settings.log_level.clone(),
            1 => "debug".to_string(),
            _ => "trace".to_string(),
        };
        Self {
            console_level,
            file: settings.log_file.clone(),
            sql_statements: settings.debug,
            ..Self::default()
        }
    }
}

// -------- level helpers --------
fn parse_tracing_level(s: &str) -> Option<tracing::Level> {
    match s.to_ascii_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        "off" | "none" => None,
        _ => Some(Level::INFO),
    }
}

fn level_filter(s: &str) -> LevelFilter {
    parse_tracing_level(s)
        .map(LevelFilter::from_level)
        .unwrap_or(LevelFilter::OFF)
}

/// Default level for everything plus an explicit level for SQL statements.
fn build_targets(level: &str, sql_statements: bool) -> Targets {
    let default = level_filter(level);
    let sql = if sql_statements {
        default.max(LevelFilter::INFO)
    } else {
        LevelFilter::WARN.min(default)
    };
    Targets::new()
        .with_default(default)
        .with_target(SQL_STATEMENT_TARGET, sql)
}

// -------- rotating writer for files --------
#[derive(Clone)]
struct RotWriter(Arc<Mutex<FileRotate<AppendTimestamp>>>);

impl<'a> fmt::MakeWriter<'a> for RotWriter {
    type Writer = RotWriterHandle;
    fn make_writer(&'a self) -> Self::Writer {
        RotWriterHandle(self.0.clone())
    }
}

#[derive(Clone)]
struct RotWriterHandle(Arc<Mutex<FileRotate<AppendTimestamp>>>);

fn poisoned() -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, "log file writer poisoned")
}

impl Write for RotWriterHandle {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().map_err(|_| poisoned())?.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.0.lock().map_err(|_| poisoned())?.flush()
    }
}

/// Create a rotating writer for log files, ensuring the parent directory exists.
fn create_rotating_writer_at_path(
    log_path: &Path,
    max_bytes: usize,
    max_backups: usize,
) -> std::io::Result<RotWriter> {
    if let Some(parent) = log_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let rot = FileRotate::new(
        log_path,
        AppendTimestamp::default(FileLimit::MaxFiles(max_backups)),
        ContentLimit::BytesSurpassed(max_bytes),
        Compression::None,
        #[cfg(unix)]
        None, // file permissions (Unix only)
    );

    Ok(RotWriter(Arc::new(Mutex::new(rot))))
}

// -------- public init --------

/// Install the global tracing subscriber.
///
/// Console output is human readable; the optional file receives JSON lines.
/// Calling this more than once is harmless: later calls are ignored.
pub fn init_logging(cfg: &LoggingConfig) {
    use tracing_subscriber::{layer::SubscriberExt, prelude::*, Registry};

    // Bridge `log` → `tracing` *before* installing the subscriber
    let _ = tracing_log::LogTracer::init();

    let ansi = std::io::stdout().is_terminal();

    let console_layer = fmt::layer()
        .with_ansi(ansi)
        .with_target(true)
        .with_level(true)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_filter(build_targets(&cfg.console_level, cfg.sql_statements));

    let file_writer = cfg.file.as_deref().and_then(|path| {
        let max_bytes = (cfg.max_size_mb * 1024 * 1024) as usize;
        match create_rotating_writer_at_path(path, max_bytes, cfg.max_backups) {
            Ok(writer) => Some(writer),
            Err(e) => {
                eprintln!("Failed to initialize log file '{}': {e}", path.display());
                None
            }
        }
    });

    match file_writer {
        Some(writer) => {
            let file_layer = fmt::layer()
                .json()
                .with_ansi(false)
                .with_target(true)
                .with_level(true)
                .with_timer(fmt::time::UtcTime::rfc_3339())
                .with_writer(writer)
                .with_filter(build_targets(&cfg.file_level, cfg.sql_statements));

            let _ = Registry::default()
                .with(console_layer)
                .with(file_layer)
                .try_init();
        }
        None => {
            let _ = Registry::default().with(console_layer).try_init();
        }
    }
}

// =================== tests ===================
