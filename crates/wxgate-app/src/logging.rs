use anyhow::{Context, Result};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::writer::MakeWriter;

pub const LOG_FILE_PREFIX: &str = "wxgate-";
pub const LOG_FILE_SUFFIX: &str = ".log";
pub const DEFAULT_RETENTION_DAYS: i64 = 30;

fn env_filter() -> tracing_subscriber::EnvFilter {
    tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into())
}

/// Log to daily files under `log_dir`, pruning files older than `retention_days`.
pub fn init_logging(log_dir: &Path, retention_days: i64) -> Result<()> {
    fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;
    cleanup_old_logs(log_dir, Utc::now(), retention_days)?;

    let writer = DailyLogWriter::new(log_dir.to_path_buf(), retention_days)?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_ansi(false)
        .with_writer(writer)
        .init();

    Ok(())
}

pub fn init_console_logging() {
    tracing_subscriber::fmt().with_env_filter(env_filter()).init();
}

struct DailyState {
    day: String,
    file: File,
}

#[derive(Clone)]
struct DailyLogWriter {
    log_dir: PathBuf,
    retention_days: i64,
    state: Arc<Mutex<DailyState>>,
}

impl DailyLogWriter {
    fn new(log_dir: PathBuf, retention_days: i64) -> Result<Self> {
        let day = day_key(Utc::now());
        let file = open_log_file(&log_dir, &day)
            .with_context(|| format!("Failed to open log file in {}", log_dir.display()))?;
        Ok(Self {
            log_dir,
            retention_days,
            state: Arc::new(Mutex::new(DailyState { day, file })),
        })
    }
}

impl<'a> MakeWriter<'a> for DailyLogWriter {
    type Writer = DailyLogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

impl Write for DailyLogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let now = Utc::now();
        let today = day_key(now);
        let mut state = self
            .state
            .lock()
            .map_err(|_| io::Error::other("failed to lock log writer"))?;

        if state.day != today {
            state.file.flush()?;
            state.file = open_log_file(&self.log_dir, &today)?;
            state.day = today;
            let _ = cleanup_old_logs(&self.log_dir, now, self.retention_days);
        }

        state.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| io::Error::other("failed to lock log writer"))?;
        state.file.flush()
    }
}

fn day_key(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%d").to_string()
}

fn open_log_file(log_dir: &Path, day: &str) -> io::Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join(format!("{LOG_FILE_PREFIX}{day}{LOG_FILE_SUFFIX}")))
}

/// Remove gateway log files whose day is older than the retention window.
pub fn cleanup_old_logs(log_dir: &Path, now: DateTime<Utc>, retention_days: i64) -> Result<()> {
    let cutoff = (now - Duration::days(retention_days)).date_naive();
    let entries = match fs::read_dir(log_dir) {
        Ok(v) => v,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e).with_context(|| format!("Failed to read {}", log_dir.display())),
    };

    for entry in entries {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let Some(day) = path
            .file_name()
            .and_then(|s| s.to_str())
            .and_then(parse_log_filename_day)
        else {
            continue;
        };
        if day < cutoff {
            let _ = fs::remove_file(&path);
        }
    }
    Ok(())
}

fn parse_log_filename_day(file_name: &str) -> Option<NaiveDate> {
    let body = file_name
        .strip_prefix(LOG_FILE_PREFIX)?
        .strip_suffix(LOG_FILE_SUFFIX)?;
    NaiveDate::parse_from_str(body, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn test_dir() -> PathBuf {
        std::env::temp_dir().join(format!("wxgate_logging_test_{}", Uuid::new_v4()))
    }

    #[test]
    fn test_parse_log_filename_day() {
        assert!(parse_log_filename_day("wxgate-2026-02-08.log").is_some());
        assert!(parse_log_filename_day("wxgate-2026-02-08-10.log").is_none());
        assert!(parse_log_filename_day("other-2026-02-08.log").is_none());
    }

    #[test]
    fn test_cleanup_old_logs_keeps_recent_removes_old() {
        let dir = test_dir();
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("wxgate-2025-01-01.log"), "old").unwrap();
        fs::write(dir.join("wxgate-2026-02-08.log"), "new").unwrap();
        fs::write(dir.join("unrelated.txt"), "keep").unwrap();

        let now = DateTime::parse_from_rfc3339("2026-02-08T11:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        cleanup_old_logs(&dir, now, 30).unwrap();

        assert!(!dir.join("wxgate-2025-01-01.log").exists());
        assert!(dir.join("wxgate-2026-02-08.log").exists());
        assert!(dir.join("unrelated.txt").exists());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_cleanup_missing_dir_is_ok() {
        assert!(cleanup_old_logs(&test_dir(), Utc::now(), 30).is_ok());
    }

    #[test]
    fn test_daily_writer_appends_to_today_file() {
        let dir = test_dir();
        fs::create_dir_all(&dir).unwrap();
        let mut writer = DailyLogWriter::new(dir.clone(), 30).unwrap();
        writer.write_all(b"line one\n").unwrap();
        writer.flush().unwrap();

        let today = dir.join(format!("wxgate-{}.log", day_key(Utc::now())));
        let content = fs::read_to_string(today).unwrap();
        assert!(content.contains("line one"));
        let _ = fs::remove_dir_all(&dir);
    }
}
