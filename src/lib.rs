//! dirsort - sort files into category folders by extension
//!
//! This library scans a source directory, classifies each file by its
//! extension using an ordered category table, and copies or moves it into
//! `<dest>/<Category>/`, picking a free `name(n).ext` when the target is
//! taken. A dry-run mode logs what would happen without changing anything.

pub mod cli;
pub mod config;
pub mod file_category;
pub mod file_organizer;
pub mod output;

pub use config::{AppConfig, CompiledFilters, ConfigError};
pub use file_category::{CategoryTable, OTHERS, classify};
pub use file_organizer::{Action, OrganizeError, OrganizeMode, Organizer, RunSummary};
pub use output::{FacadeLog, MemoryLog, RunLog, init_logging};

pub use cli::{Cli, CliError, run, run_with_config, run_with_log};
