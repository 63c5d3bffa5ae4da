//! Placement engine: moves or copies files into category subdirectories.
//!
//! For every file found under the source directory the [`Organizer`]:
//! 1. classifies the file by extension
//! 2. ensures `dest/<Category>` exists
//! 3. picks a free name, `stem(1).ext`, `stem(2).ext`, … on collision
//! 4. copies, moves, or (in dry-run mode) only logs the intended action
//!
//! A failure on one file is logged and recorded in its [`FileOutcome`]; the
//! run always continues with the next file.
//!
//! Collision checks are not atomic. If another process creates the chosen
//! target between the check and the transfer, a move may replace it (rename
//! semantics) and a copy will overwrite it. An interrupted copy can leave a
//! partial target behind.
//!
//! Targets already picked during a run are compared by exact path. On a
//! case-insensitive filesystem `A.txt` and `a.txt` are distinct there, so a
//! dry run may list both while a real run ends up with `a(1).txt`.

use crate::config::CompiledFilters;
use crate::file_category::{CategoryTable, OTHERS};
use crate::output::{RunLog, file_word};
use chrono::Local;
use indicatif::ProgressBar;
use std::collections::{BTreeMap, HashSet};
use std::ffi::OsString;
use std::fmt;
use std::fs::{self, FileTimes};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use thiserror::Error;
use walkdir::WalkDir;

/// What to do with each file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Action {
    /// Duplicate the file, leaving the source in place.
    #[default]
    Copy,
    /// Relocate the file.
    Move,
}

impl Action {
    pub fn verb(&self) -> &'static str {
        match self {
            Action::Copy => "copy",
            Action::Move => "move",
        }
    }

    fn past_tense(&self) -> &'static str {
        match self {
            Action::Copy => "Copied",
            Action::Move => "Moved",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.verb())
    }
}

/// Run options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrganizeMode {
    pub action: Action,
    /// Log intended actions without touching the filesystem. Overrides `action`.
    pub dry_run: bool,
    /// Descend into subdirectories.
    pub recursive: bool,
}

/// Errors that can occur while organizing.
#[derive(Debug, Error)]
pub enum OrganizeError {
    #[error("Failed to create directory {}: {source}", .path.display())]
    DirectoryCreationFailed { path: PathBuf, source: io::Error },

    #[error("Failed to {action} {} to {}: {source}", .from.display(), .to.display())]
    TransferFailed {
        action: Action,
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },

    #[error("Path has no file name: {}", .0.display())]
    NoFileName(PathBuf),

    #[error("Could not scan {}", .path.display())]
    Scan {
        path: PathBuf,
        source: walkdir::Error,
    },
}

impl OrganizeError {
    /// The part of the message not already implied by the source and target.
    fn cause_message(&self) -> String {
        match self {
            Self::TransferFailed { source, .. } => source.to_string(),
            other => other.to_string(),
        }
    }
}

/// Result type for organization operations.
pub type OrganizeResult<T> = Result<T, OrganizeError>;

/// How a single file was handled.
#[derive(Debug)]
pub enum OutcomeStatus {
    Moved,
    Copied,
    /// Dry run: nothing was changed.
    Simulated,
    Failed(OrganizeError),
}

/// Result for one file.
#[derive(Debug)]
pub struct FileOutcome {
    pub source: PathBuf,
    /// Resolved, collision-free destination.
    pub target: PathBuf,
    pub category: String,
    pub status: OutcomeStatus,
}

impl FileOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self.status, OutcomeStatus::Failed(_))
    }
}

/// Everything a run did.
#[derive(Debug, Default)]
pub struct RunSummary {
    /// Files found by the scan, after filtering.
    pub discovered: usize,
    pub outcomes: Vec<FileOutcome>,
    pub elapsed: Duration,
    /// Set when the scan itself failed and no file was processed.
    pub scan_error: Option<OrganizeError>,
}

impl RunSummary {
    /// Files moved or copied.
    pub fn succeeded(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, OutcomeStatus::Moved | OutcomeStatus::Copied))
            .count()
    }

    pub fn simulated(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, OutcomeStatus::Simulated))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_failure()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &FileOutcome> {
        self.outcomes.iter().filter(|o| o.is_failure())
    }

    /// Number of files per category, sorted by category name.
    pub fn category_counts(&self) -> BTreeMap<&str, usize> {
        let mut counts = BTreeMap::new();
        for outcome in &self.outcomes {
            *counts.entry(outcome.category.as_str()).or_insert(0) += 1;
        }
        counts
    }
}

/// Sorts files from a source directory into category folders.
///
/// The category table, filters and log are supplied by the caller; the
/// organizer keeps no other state between runs.
///
/// # Examples
///
/// ```no_run
/// use dirsort::file_category::CategoryTable;
/// use dirsort::file_organizer::{Action, OrganizeMode, Organizer};
/// use dirsort::output::MemoryLog;
/// use std::path::Path;
///
/// let mut organizer = Organizer::new(CategoryTable::default(), MemoryLog::new());
/// let mode = OrganizeMode { action: Action::Move, dry_run: true, recursive: false };
/// let summary = organizer.run(Path::new("/home/me/Downloads"), Path::new("/home/me/Sorted"), mode);
/// println!("{} files would be moved", summary.simulated());
/// ```
pub struct Organizer<L: RunLog> {
    table: CategoryTable,
    filters: CompiledFilters,
    log: L,
    progress: Option<ProgressBar>,
}

impl<L: RunLog> Organizer<L> {
    pub fn new(table: CategoryTable, log: L) -> Self {
        Self {
            table,
            filters: CompiledFilters::default(),
            log,
            progress: None,
        }
    }

    pub fn with_filters(mut self, filters: CompiledFilters) -> Self {
        self.filters = filters;
        self
    }

    /// Ticks `progress` once per processed file.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn log(&self) -> &L {
        &self.log
    }

    pub fn into_log(self) -> L {
        self.log
    }

    /// Runs [`Organizer::organize`] between start and end banners.
    ///
    /// A scan failure is logged as an unexpected error and stored in the
    /// returned summary; the end banner is written either way.
    pub fn run(&mut self, source: &Path, dest: &Path, mode: OrganizeMode) -> RunSummary {
        let clock = Instant::now();
        self.log.info(&format!(
            "Starting file organizer at {}",
            iso_timestamp(Local::now())
        ));

        let mut summary = match self.organize(source, dest, mode) {
            Ok(summary) => summary,
            Err(e) => {
                self.log
                    .error(&format!("Unexpected error: {}", error_chain(&e)));
                RunSummary {
                    scan_error: Some(e),
                    ..RunSummary::default()
                }
            }
        };

        self.log_summary(&summary, mode);

        summary.elapsed = clock.elapsed();
        self.log.info(&format!(
            "Finished at {} (Duration: {})",
            iso_timestamp(Local::now()),
            format_duration(summary.elapsed)
        ));
        summary
    }

    /// Scans `source` and places every eligible file under `dest`.
    ///
    /// # Errors
    ///
    /// Only a failure to read `source` itself is returned; per-file problems
    /// are reported through the summary and the log.
    pub fn organize(
        &mut self,
        source: &Path,
        dest: &Path,
        mode: OrganizeMode,
    ) -> OrganizeResult<RunSummary> {
        self.log.info(&format!(
            "Scanning: {} (recursive={})",
            source.display(),
            mode.recursive
        ));

        let files = self.collect_files(source, dest, mode.recursive)?;
        self.log.info(&format!("Found {} file(s)", files.len()));

        if let Some(progress) = &self.progress {
            progress.set_length(files.len() as u64);
        }

        let mut summary = RunSummary {
            discovered: files.len(),
            ..RunSummary::default()
        };
        let mut reserved = HashSet::new();

        for file in &files {
            let outcome = self.place_file(file, dest, mode, &mut reserved);
            summary.outcomes.push(outcome);
            if let Some(progress) = &self.progress {
                progress.inc(1);
            }
        }

        if let Some(progress) = &self.progress {
            progress.finish_and_clear();
        }

        Ok(summary)
    }

    /// Lists files to process, in lexical order.
    ///
    /// Ignored directory names are pruned at every depth. The destination is
    /// never descended into when it lies inside the source, and when both are
    /// the same directory its category folders are skipped.
    fn collect_files(
        &mut self,
        source: &Path,
        dest: &Path,
        recursive: bool,
    ) -> OrganizeResult<Vec<PathBuf>> {
        let filters = &self.filters;
        let table = &self.table;
        let max_depth = if recursive { usize::MAX } else { 1 };

        let walker = WalkDir::new(source)
            .min_depth(1)
            .max_depth(max_depth)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                entry.depth() == 0
                    || (!filters.is_ignored_name(entry.file_name())
                        && !is_destination_area(entry.path(), dest, table))
            });

        let mut files = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.depth() == 0 => {
                    return Err(OrganizeError::Scan {
                        path: source.to_path_buf(),
                        source: e,
                    });
                }
                Err(e) => {
                    self.log.warn(&format!("Skipping unreadable entry: {}", e));
                    continue;
                }
            };

            // Follows symlinks: linked files count, linked directories don't.
            if !entry.path().is_file() {
                continue;
            }

            let relative = entry.path().strip_prefix(source).unwrap_or(entry.path());
            if !filters.should_include(relative) {
                self.log
                    .debug(&format!("Excluded by filters: {}", relative.display()));
                continue;
            }

            files.push(entry.into_path());
        }

        Ok(files)
    }

    fn place_file(
        &mut self,
        file: &Path,
        dest: &Path,
        mode: OrganizeMode,
        reserved: &mut HashSet<PathBuf>,
    ) -> FileOutcome {
        let category = self.table.classify_path(file).to_string();
        let category_dir = dest.join(&category);

        let Some(file_name) = file.file_name() else {
            let error = OrganizeError::NoFileName(file.to_path_buf());
            return self.fail(file, category_dir, category, mode.action, error);
        };
        let planned = category_dir.join(file_name);

        if !mode.dry_run
            && let Err(source) = fs::create_dir_all(&category_dir)
        {
            let error = OrganizeError::DirectoryCreationFailed {
                path: category_dir,
                source,
            };
            return self.fail(file, planned, category, mode.action, error);
        }

        let target = resolve_collision_with(&planned, |candidate| {
            reserved.contains(candidate) || entry_exists(candidate)
        });
        reserved.insert(target.clone());

        if mode.dry_run {
            self.log.info(&format!(
                "[DRY RUN] Would {} '{}' -> '{}'",
                mode.action,
                file.display(),
                target.display()
            ));
            return FileOutcome {
                source: file.to_path_buf(),
                target,
                category,
                status: OutcomeStatus::Simulated,
            };
        }

        let result = match mode.action {
            Action::Copy => copy_with_metadata(file, &target),
            Action::Move => move_file(file, &target),
        };

        match result {
            Ok(()) => {
                self.log.info(&format!(
                    "{} '{}' -> '{}'",
                    mode.action.past_tense(),
                    file.display(),
                    target.display()
                ));
                let status = match mode.action {
                    Action::Copy => OutcomeStatus::Copied,
                    Action::Move => OutcomeStatus::Moved,
                };
                FileOutcome {
                    source: file.to_path_buf(),
                    target,
                    category,
                    status,
                }
            }
            Err(source) => {
                let error = OrganizeError::TransferFailed {
                    action: mode.action,
                    from: file.to_path_buf(),
                    to: target.clone(),
                    source,
                };
                self.fail(file, target, category, mode.action, error)
            }
        }
    }

    fn fail(
        &mut self,
        file: &Path,
        target: PathBuf,
        category: String,
        action: Action,
        error: OrganizeError,
    ) -> FileOutcome {
        self.log.error(&format!(
            "Failed to {} '{}' -> '{}': {}",
            action,
            file.display(),
            target.display(),
            error.cause_message()
        ));
        FileOutcome {
            source: file.to_path_buf(),
            target,
            category,
            status: OutcomeStatus::Failed(error),
        }
    }

    fn log_summary(&mut self, summary: &RunSummary, mode: OrganizeMode) {
        if summary.outcomes.is_empty() {
            return;
        }

        for (category, count) in summary.category_counts() {
            self.log
                .info(&format!("  {}: {} {}", category, count, file_word(count)));
        }

        if mode.dry_run {
            self.log.info(&format!(
                "Dry run: {} {} would be {}, nothing was changed",
                summary.simulated(),
                file_word(summary.simulated()),
                mode.action.past_tense().to_lowercase()
            ));
        } else {
            self.log.info(&format!(
                "{} {} {}, {} failed",
                mode.action.past_tense(),
                summary.succeeded(),
                file_word(summary.succeeded()),
                summary.failed()
            ));
        }
    }
}

/// True for `dest` itself and for its category folders.
fn is_destination_area(path: &Path, dest: &Path, table: &CategoryTable) -> bool {
    if path == dest {
        return true;
    }
    if path.parent() != Some(dest) || !path.is_dir() {
        return false;
    }
    let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
    name == OTHERS || table.categories().iter().any(|c| c.name == name)
}

/// True if anything (file, directory, or dangling symlink) exists at `path`.
fn entry_exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// Returns `target` if nothing exists there, otherwise the first free
/// `stem(n).ext` sibling.
///
/// # Examples
///
/// ```no_run
/// use dirsort::file_organizer::resolve_collision;
/// use std::path::Path;
///
/// // With "a.txt" and "a(1).txt" already present:
/// assert_eq!(resolve_collision(Path::new("out/a.txt")), Path::new("out/a(2).txt"));
/// ```
pub fn resolve_collision(target: &Path) -> PathBuf {
    resolve_collision_with(target, entry_exists)
}

/// Like [`resolve_collision`], with a caller-supplied occupancy check.
pub fn resolve_collision_with(target: &Path, is_taken: impl Fn(&Path) -> bool) -> PathBuf {
    if !is_taken(target) {
        return target.to_path_buf();
    }

    let stem = target.file_stem().unwrap_or_default();
    let extension = target.extension();
    let mut counter: u64 = 1;
    loop {
        let mut name = OsString::from(stem);
        name.push(format!("({})", counter));
        if let Some(ext) = extension {
            name.push(".");
            name.push(ext);
        }
        let candidate = target.with_file_name(name);
        if !is_taken(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}

/// Copies content, permissions and access/modification times.
pub fn copy_with_metadata(from: &Path, to: &Path) -> io::Result<()> {
    let metadata = fs::metadata(from)?;
    fs::copy(from, to)?;

    let times = FileTimes::new()
        .set_accessed(metadata.accessed()?)
        .set_modified(metadata.modified()?);
    // A read-only copy can't be opened for writing; a read handle is enough
    // to set times on Unix.
    let copied = fs::File::options()
        .write(true)
        .open(to)
        .or_else(|_| fs::File::open(to))?;
    copied.set_times(times)
}

/// Renames `from` to `to`, copying and deleting when they are on different
/// filesystems.
pub fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            copy_with_metadata(from, to)?;
            fs::remove_file(from)
        }
        Err(e) => Err(e),
    }
}

fn iso_timestamp(time: chrono::DateTime<Local>) -> String {
    time.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

/// Formats as `H:MM:SS.mmm`.
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    format!(
        "{}:{:02}:{:02}.{:03}",
        secs / 3600,
        (secs / 60) % 60,
        secs % 60,
        duration.subsec_millis()
    )
}

fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
