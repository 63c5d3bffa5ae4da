//! Run log output.
//!
//! The organizer never prints directly. It writes leveled messages to a
//! [`RunLog`] handed to it by the caller:
//! - [`FacadeLog`] forwards to the `log` crate; [`init_logging`] installs a
//!   `simplelog` backend writing to stdout and, optionally, a log file
//! - [`MemoryLog`] keeps records in memory, for tests and embedding
//!
//! Lines have the form `2025-01-31 14:02:11,532 [INFO] message`.

use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use log::{Level, LevelFilter, SetLoggerError};
use simplelog::{
    ColorChoice, CombinedLogger, Config, ConfigBuilder, LevelPadding, SharedLogger, TermLogger,
    TerminalMode, WriteLogger,
};
use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use time::macros::format_description;

/// Leveled log collaborator used by the organizer.
pub trait RunLog {
    /// Records one message at `level`.
    fn log(&mut self, level: Level, message: &str);

    fn debug(&mut self, message: &str) {
        self.log(Level::Debug, message);
    }

    fn info(&mut self, message: &str) {
        self.log(Level::Info, message);
    }

    fn warn(&mut self, message: &str) {
        self.log(Level::Warn, message);
    }

    fn error(&mut self, message: &str) {
        self.log(Level::Error, message);
    }
}

impl<L: RunLog + ?Sized> RunLog for &mut L {
    fn log(&mut self, level: Level, message: &str) {
        (**self).log(level, message);
    }
}

/// Errors from installing the global logger.
#[derive(Debug, Error)]
pub enum LogInitError {
    #[error("Could not open log file {}: {source}", .path.display())]
    File { path: PathBuf, source: io::Error },

    #[error("A logger is already installed: {0}")]
    AlreadyInstalled(#[from] SetLoggerError),
}

fn log_config() -> Config {
    let mut builder = ConfigBuilder::new();
    builder
        .set_time_format_custom(format_description!(
            "[year]-[month]-[day] [hour]:[minute]:[second],[subsecond digits:3]"
        ))
        .set_level_padding(LevelPadding::Off)
        .set_target_level(LevelFilter::Off)
        .set_thread_level(LevelFilter::Off)
        .set_location_level(LevelFilter::Off);
    // Stays on UTC if the local offset can't be determined.
    let _ = builder.set_time_offset_to_local();
    builder.build()
}

/// Installs the process-wide logger: colored lines on stdout, plus plain
/// lines appended to `log_file` when given.
///
/// # Errors
///
/// Fails if the log file cannot be opened for appending or a logger was
/// already installed.
///
/// # Example
///
/// ```no_run
/// use dirsort::output::{FacadeLog, RunLog, init_logging};
/// use log::LevelFilter;
/// use std::path::Path;
///
/// init_logging(LevelFilter::Info, Some(Path::new("run.log"))).unwrap();
/// FacadeLog::new().info("Starting");
/// ```
pub fn init_logging(level: LevelFilter, log_file: Option<&Path>) -> Result<(), LogInitError> {
    let config = log_config();
    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        level,
        config.clone(),
        TerminalMode::Stdout,
        ColorChoice::Auto,
    )];

    if let Some(path) = log_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| LogInitError::File {
                path: path.to_path_buf(),
                source,
            })?;
        loggers.push(WriteLogger::new(level, config, file));
    }

    CombinedLogger::init(loggers)?;
    Ok(())
}

/// Forwards messages to the `log` macros.
#[derive(Default)]
pub struct FacadeLog {
    progress: Option<ProgressBar>,
}

impl FacadeLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hides `progress` while a line is written so the bar isn't torn.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }
}

impl RunLog for FacadeLog {
    fn log(&mut self, level: Level, message: &str) {
        match &self.progress {
            Some(progress) => progress.suspend(|| log::log!(level, "{}", message)),
            None => log::log!(level, "{}", message),
        }
    }
}

/// A captured log message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub level: Level,
    pub message: String,
}

/// Collects log records in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryLog {
    records: Vec<LogRecord>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[LogRecord] {
        &self.records
    }

    /// Messages recorded at exactly `level`, in order.
    pub fn messages_at(&self, level: Level) -> Vec<&str> {
        self.records
            .iter()
            .filter(|r| r.level == level)
            .map(|r| r.message.as_str())
            .collect()
    }

    /// True if any message contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.records.iter().any(|r| r.message.contains(needle))
    }

    /// Number of messages that start with `prefix`.
    pub fn count_prefixed(&self, prefix: &str) -> usize {
        self.records
            .iter()
            .filter(|r| r.message.starts_with(prefix))
            .count()
    }
}

impl RunLog for MemoryLog {
    fn log(&mut self, level: Level, message: &str) {
        self.records.push(LogRecord {
            level,
            message: message.to_string(),
        });
    }
}

/// Creates a progress bar for per-file processing, drawn on stderr.
pub fn create_progress_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▓░");
    pb.set_style(style);
    pb
}

/// "file" or "files" depending on `count`.
pub fn file_word(count: usize) -> &'static str {
    if count == 1 { "file" } else { "files" }
}

/// Prints a fatal error to stderr with a red cross.
pub fn print_fatal(message: &str) {
    eprintln!("{} {}", "✗".red(), message);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_memory_log_helpers() {
        let mut log = MemoryLog::new();
        log.info("Copied 'a' -> 'b'");
        log.error("Failed to copy 'c' -> 'd': denied");
        log.debug("skipping e");

        assert_eq!(log.records().len(), 3);
        assert_eq!(log.messages_at(Level::Error), vec!["Failed to copy 'c' -> 'd': denied"]);
        assert!(log.contains("denied"));
        assert_eq!(log.count_prefixed("Copied"), 1);
    }

    #[test]
    fn test_mut_ref_forwards() {
        fn emit<L: RunLog>(mut log: L) {
            log.warn("careful");
        }

        let mut log = MemoryLog::new();
        emit(&mut log);
        assert_eq!(log.messages_at(Level::Warn), vec!["careful"]);
    }

    // The only test in this binary that installs the global logger.
    #[test]
    fn test_facade_log_appends_plain_lines_to_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let log_path = temp_dir.path().join("run.log");
        std::fs::write(&log_path, "previous line\n").unwrap();

        init_logging(LevelFilter::Info, Some(&log_path)).unwrap();
        let mut log = FacadeLog::new();
        log.info("first");
        log.error("second");
        log.debug("filtered out");

        let contents = std::fs::read_to_string(&log_path).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "previous line");
        assert!(lines[1].ends_with("[INFO] first"));
        assert!(lines[2].ends_with("[ERROR] second"));
        assert!(!contents.contains("\u{1b}["), "file lines must not carry color codes");

        // A second install is refused.
        assert!(matches!(
            init_logging(LevelFilter::Info, None),
            Err(LogInitError::AlreadyInstalled(_))
        ));
    }

    #[test]
    fn test_unwritable_log_file_is_reported() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        // A directory can't be opened as a log file; nothing gets installed.
        let err = init_logging(LevelFilter::Info, Some(temp_dir.path())).unwrap_err();
        assert!(matches!(err, LogInitError::File { .. }));
        assert!(err.to_string().starts_with("Could not open log file"));
    }

    #[test]
    fn test_file_word() {
        assert_eq!(file_word(1), "file");
        assert_eq!(file_word(0), "files");
        assert_eq!(file_word(7), "files");
    }
}
