//! Logging and observability helpers.

pub mod sensitive;

pub use sensitive::Sensitive;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing_appender::rolling::RollingFileAppender;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

const LOG_FILE_PREFIX: &str = "mysqlpad.log";
const LOG_RETENTION_DAYS: u64 = 14;

/// Initializes the tracing subscriber and the panic hook.
///
/// Logs go to stdout by default. When `LOG_DIR` is set, they instead go
/// to a daily-rolling JSON file under that directory, with files older
/// than the retention window removed on startup.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("mysqlpad=info,tower_http=info"));

    match std::env::var_os("LOG_DIR") {
        Some(dir) => {
            let log_dir = PathBuf::from(dir);
            let _ = fs::create_dir_all(&log_dir);

            if let Err(e) = cleanup_old_logs(&log_dir, LOG_RETENTION_DAYS) {
                eprintln!("Failed to clean up old logs: {}", e);
            }

            let file_appender: RollingFileAppender =
                tracing_appender::rolling::daily(&log_dir, LOG_FILE_PREFIX);
            let _ = tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_writer(file_appender)
                .json()
                .with_thread_ids(true)
                .with_thread_names(true)
                .with_file(true)
                .with_line_number(true)
                .with_current_span(true)
                .with_span_list(true)
                .with_ansi(false)
                .with_span_events(FmtSpan::CLOSE)
                .try_init();

            tracing::info!("Tracing initialized. Logs directory: {:?}", log_dir);
        }
        None => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_span_events(FmtSpan::CLOSE)
                .try_init();
        }
    }

    register_panic_hook();
}

fn register_panic_hook() {
    let previous_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let payload = panic_info.payload();
        let location = panic_info
            .location()
            .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
            .unwrap_or_else(|| "unknown".to_string());

        let msg = if let Some(s) = payload.downcast_ref::<&str>() {
            format!("PANIC: {}", s)
        } else if let Some(s) = payload.downcast_ref::<String>() {
            format!("PANIC: {}", s)
        } else {
            "PANIC: unknown cause".to_string()
        };

        tracing::error!(target: "panic", location = %location, message = %msg, "Application panicked");

        // Call previous hook to ensure default behavior (like printing to stderr) continues
        previous_hook(panic_info);
    }));
}

fn cleanup_old_logs(log_dir: &Path, retention_days: u64) -> std::io::Result<()> {
    let entries = fs::read_dir(log_dir)?;
    let now = SystemTime::now();
    let retention_duration = Duration::from_secs(retention_days * 24 * 60 * 60);

    for entry in entries {
        let entry = entry?;
        let path = entry.path();

        // Rolled files are named `mysqlpad.log.YYYY-MM-DD`.
        let is_log_file = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(|name| name.starts_with(LOG_FILE_PREFIX))
            .unwrap_or(false);
        if !is_log_file {
            continue;
        }

        if let Ok(metadata) = fs::metadata(&path) {
            if let Ok(modified) = metadata.modified() {
                if let Ok(age) = now.duration_since(modified) {
                    if age > retention_duration {
                        if let Err(e) = fs::remove_file(&path) {
                            eprintln!("Failed to remove old log file {:?}: {}", path, e);
                        }
                    }
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn cleanup_removes_only_expired_log_files() {
        let dir = std::env::temp_dir().join(format!(
            "mysqlpad-logtest-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        fs::create_dir_all(&dir).unwrap();

        let old_log = dir.join("mysqlpad.log.2000-01-01");
        let keeper = dir.join("notes.txt");
        fs::write(&old_log, "stale").unwrap();
        fs::write(&keeper, "keep").unwrap();

        // Zero-day retention expires anything written before this instant.
        std::thread::sleep(Duration::from_millis(20));
        cleanup_old_logs(&dir, 0).unwrap();

        assert!(!old_log.exists());
        assert!(keeper.exists());

        let _ = fs::remove_dir_all(&dir);
    }
}
