//! Structured logging module for Sheetbot
//!
//! Every line goes to the `tracing` subscriber and, when a log directory is
//! configured, to a daily file `sheetbot-YYYY-MM-DD.log` with categories:
//! - ROUTING: Intent matching and dispatch
//! - DATA: Source loading and reloads
//! - FALLBACK: Generative fallback decisions and calls
//! - STARTUP: Assistant construction
//! - ERROR: Errors

use chrono::{Local, Utc};
use once_cell::sync::Lazy;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing_subscriber::EnvFilter;

/// Log categories for structured logging
#[derive(Debug, Clone, Copy)]
pub enum LogCategory {
    Routing,
    Data,
    Fallback,
    Startup,
    Error,
}

impl LogCategory {
    fn as_str(&self) -> &'static str {
        match self {
            LogCategory::Routing => "ROUTING",
            LogCategory::Data => "DATA",
            LogCategory::Fallback => "FALLBACK",
            LogCategory::Startup => "STARTUP",
            LogCategory::Error => "ERROR",
        }
    }
}

/// Directory for daily log files, if file logging is enabled
static LOG_DIR: Lazy<Mutex<Option<PathBuf>>> = Lazy::new(|| Mutex::new(None));

/// Get today's log file path inside `dir`
fn get_log_file_path(dir: &Path) -> PathBuf {
    let today = Local::now().format("%Y-%m-%d").to_string();
    dir.join(format!("sheetbot-{}.log", today))
}

/// Initialize logging: installs the console subscriber (honoring `RUST_LOG`)
/// and, when `log_dir` is given, creates it for daily log files.
pub fn init_logging(log_dir: Option<&Path>) -> Result<(), std::io::Error> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // A host may already have installed a subscriber; keep theirs.
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    if let Some(dir) = log_dir {
        if !dir.exists() {
            fs::create_dir_all(dir)?;
        }
        *LOG_DIR.lock().unwrap_or_else(PoisonError::into_inner) = Some(dir.to_path_buf());
    }

    log(LogCategory::Startup, None, "Sheetbot logging initialized");

    Ok(())
}

/// Log a message with category and optional request context
pub fn log(category: LogCategory, request_id: Option<&str>, message: &str) {
    let request = request_id
        .map(|id| id.get(..8).unwrap_or(id))
        .unwrap_or("-");

    match category {
        LogCategory::Error => tracing::error!(category = category.as_str(), request, "{}", message),
        _ => tracing::info!(category = category.as_str(), request, "{}", message),
    }

    let dir = LOG_DIR
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone();
    let Some(dir) = dir else {
        return;
    };

    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let log_line = format!(
        "[{}] [{}] request={} | {}\n",
        timestamp,
        category.as_str(),
        request,
        message
    );

    if let Ok(mut file) = OpenOptions::new()
        .create(true)
        .append(true)
        .open(get_log_file_path(&dir))
    {
        let _ = file.write_all(log_line.as_bytes());
    }
}

/// Log an intent match or dispatch decision
pub fn log_routing(request_id: Option<&str>, message: &str) {
    log(LogCategory::Routing, request_id, message);
}

/// Log a data source event (load, reload, empty result)
pub fn log_data(request_id: Option<&str>, message: &str) {
    log(LogCategory::Data, request_id, message);
}

/// Log a generative fallback decision or call
pub fn log_fallback(request_id: Option<&str>, message: &str) {
    log(LogCategory::Fallback, request_id, message);
}

pub fn log_startup(message: &str) {
    log(LogCategory::Startup, None, message);
}

/// Log an error
pub fn log_error(request_id: Option<&str>, message: &str) {
    log(LogCategory::Error, request_id, message);
}

/// Clean up old log files in `dir` (keep last 7 days)
pub fn cleanup_old_logs(dir: &Path) -> Result<usize, std::io::Error> {
    let mut deleted = 0;

    if !dir.exists() {
        return Ok(0);
    }

    let cutoff = Utc::now() - chrono::Duration::days(7);

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let is_log = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with("sheetbot-") && n.ends_with(".log"))
            .unwrap_or(false);
        if !is_log {
            continue;
        }

        if let Ok(metadata) = entry.metadata() {
            if let Ok(modified) = metadata.modified() {
                let modified_time: chrono::DateTime<Utc> = modified.into();
                if modified_time < cutoff && fs::remove_file(&path).is_ok() {
                    deleted += 1;
                }
            }
        }
    }

    Ok(deleted)
}
