//! Command-line interface module for dirsort.
//!
//! This module handles:
//! - argument parsing (`clap` derive)
//! - pre-flight validation of the source and destination directories
//! - loading the category table and filters
//! - installing the logger and running the [`Organizer`]

use crate::config::{AppConfig, CompiledFilters, ConfigError};
use crate::file_category::CategoryTable;
use crate::file_organizer::{Action, OrganizeMode, Organizer, RunSummary};
use crate::output::{FacadeLog, LogInitError, RunLog, create_progress_bar, init_logging};
use clap::Parser;
use indicatif::ProgressBar;
use log::LevelFilter;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Organize files in a folder by extension.
#[derive(Debug, Clone, Parser)]
#[command(name = "dirsort", version, about)]
pub struct Cli {
    /// Source directory
    #[arg(short = 's', long = "source", value_name = "PATH")]
    pub source: PathBuf,

    /// Destination directory (created if missing)
    #[arg(short = 'd', long = "dest", value_name = "PATH")]
    pub dest: PathBuf,

    /// Move files instead of copying
    #[arg(long = "move")]
    pub move_files: bool,

    /// Show actions without doing them
    #[arg(long)]
    pub dry_run: bool,

    /// Scan directories recursively
    #[arg(long)]
    pub recursive: bool,

    /// Also append log lines to this file
    #[arg(long = "log", value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Category and filter configuration (TOML or JSON)
    #[arg(short = 'c', long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Include debug messages
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Show a progress bar on stderr
    #[arg(long)]
    pub progress: bool,
}

impl Cli {
    pub fn mode(&self) -> OrganizeMode {
        OrganizeMode {
            action: if self.move_files {
                Action::Move
            } else {
                Action::Copy
            },
            dry_run: self.dry_run,
            recursive: self.recursive,
        }
    }
}

/// Errors that stop a run before any file is touched.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Source directory does not exist: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("Source is not a directory: {}", .0.display())]
    SourceNotDirectory(PathBuf),

    #[error("Could not resolve source directory {}: {source}", .path.display())]
    SourceUnreadable { path: PathBuf, source: io::Error },

    #[error("Could not create destination directory {}: {source}", .path.display())]
    Destination { path: PathBuf, source: io::Error },

    #[error(transparent)]
    Logging(#[from] LogInitError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl CliError {
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) => 2,
            _ => 1,
        }
    }
}

/// Validated inputs for a run.
struct Prepared {
    source: PathBuf,
    dest: PathBuf,
    table: CategoryTable,
    filters: CompiledFilters,
}

/// Installs the stdout (and optional file) logger and runs the organizer.
///
/// Configuration comes from `--config` or is discovered, see
/// [`AppConfig::load`].
///
/// # Examples
///
/// ```no_run
/// use clap::Parser;
/// use dirsort::cli::{Cli, run};
///
/// let cli = Cli::parse_from(["dirsort", "-s", "Downloads", "-d", "Sorted", "--dry-run"]);
/// match run(&cli) {
///     Ok(summary) => println!("{} files planned", summary.simulated()),
///     Err(e) => eprintln!("Error: {}", e),
/// }
/// ```
pub fn run(cli: &Cli) -> Result<RunSummary, CliError> {
    let source = resolve_source(&cli.source)?;
    let config = AppConfig::load(cli.config.as_deref())?;
    let prepared = prepare(cli, source, &config)?;

    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    init_logging(level, cli.log_file.as_deref())?;

    let progress = cli.progress.then(|| create_progress_bar(0));
    let mut log = FacadeLog::new();
    if let Some(progress) = &progress {
        log = log.with_progress(progress.clone());
    }

    Ok(execute(cli, prepared, log, progress))
}

/// Runs the organizer, sending log output to `log`.
///
/// Performs the same validation and configuration lookup as [`run`];
/// `--log`, `--verbose` and `--progress` are left to the caller's log
/// implementation.
pub fn run_with_log<L: RunLog>(cli: &Cli, log: L) -> Result<RunSummary, CliError> {
    let source = resolve_source(&cli.source)?;
    let config = AppConfig::load(cli.config.as_deref())?;
    let prepared = prepare(cli, source, &config)?;
    Ok(execute(cli, prepared, log, None))
}

/// Like [`run_with_log`], with an already loaded configuration.
///
/// `--config` is ignored and no configuration file is looked up.
pub fn run_with_config<L: RunLog>(
    cli: &Cli,
    config: &AppConfig,
    log: L,
) -> Result<RunSummary, CliError> {
    let source = resolve_source(&cli.source)?;
    let prepared = prepare(cli, source, config)?;
    Ok(execute(cli, prepared, log, None))
}

fn prepare(cli: &Cli, source: PathBuf, config: &AppConfig) -> Result<Prepared, CliError> {
    let table = config.category_table()?;
    let filters = config.compile_filters()?;
    let dest = prepare_destination(&cli.dest)?;

    Ok(Prepared {
        source,
        dest,
        table,
        filters,
    })
}

fn execute<L: RunLog>(
    cli: &Cli,
    prepared: Prepared,
    mut log: L,
    progress: Option<ProgressBar>,
) -> RunSummary {
    for duplicate in prepared.table.duplicate_extensions() {
        log.warn(&format!(
            "Extension '{}' is listed in both '{}' and '{}'; '{}' takes precedence",
            duplicate.extension, duplicate.kept_by, duplicate.shadowed_in, duplicate.kept_by
        ));
    }

    let mut organizer = Organizer::new(prepared.table, log).with_filters(prepared.filters);
    if let Some(progress) = progress {
        organizer = organizer.with_progress(progress);
    }

    organizer.run(&prepared.source, &prepared.dest, cli.mode())
}

/// Checks that `path` is an existing directory and returns its canonical form.
fn resolve_source(path: &Path) -> Result<PathBuf, CliError> {
    if !path.exists() {
        return Err(CliError::SourceNotFound(path.to_path_buf()));
    }
    if !path.is_dir() {
        return Err(CliError::SourceNotDirectory(path.to_path_buf()));
    }
    fs::canonicalize(path).map_err(|source| CliError::SourceUnreadable {
        path: path.to_path_buf(),
        source,
    })
}

/// Creates the destination if needed and returns its canonical form.
fn prepare_destination(path: &Path) -> Result<PathBuf, CliError> {
    let to_error = |source: io::Error| CliError::Destination {
        path: path.to_path_buf(),
        source,
    };
    fs::create_dir_all(path).map_err(to_error)?;
    fs::canonicalize(path).map_err(to_error)
}
