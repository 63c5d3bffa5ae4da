//! Category table and file filtering configuration.
//!
//! Configuration is read from a TOML file (or JSON, when the file name ends in
//! `.json`). Both sections are optional; a missing `categories` list means the
//! built-in table is used.
//!
//! ```toml
//! [[categories]]
//! name = "Photos"
//! extensions = [".jpg", ".png"]
//!
//! [[categories]]
//! name = "Docs"
//! extensions = ["pdf", "txt"]
//!
//! [filters]
//! include_hidden = true
//! ignored_dirs = [".git", "__pycache__"]
//!
//! [filters.exclude]
//! filenames = [".DS_Store", "Thumbs.db"]
//! patterns = ["*.tmp", "node_modules/**"]
//! extensions = ["bak", "tmp"]
//! regex = []
//!
//! [filters.include]
//! patterns = []
//! ```
//!
//! Categories are matched in the order they are declared.

use crate::file_category::{CategoryDef, CategoryTable};
use glob::Pattern;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashSet;
use std::ffi::OsStr;
use std::fs;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Name of the per-directory configuration file.
pub const LOCAL_CONFIG_FILE: &str = ".dirsortrc.toml";

/// Directory names skipped at any depth unless configured otherwise.
pub const DEFAULT_IGNORED_DIRS: &[&str] = &[".git", ".hg", ".svn", "__pycache__"];

/// Errors that can occur while loading or compiling configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    #[error("Could not read configuration {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid TOML configuration {}: {source}", .path.display())]
    Toml {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid JSON configuration {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid glob pattern '{pattern}': {reason}")]
    InvalidGlobPattern { pattern: String, reason: String },

    #[error("Invalid regex pattern '{pattern}': {reason}")]
    InvalidRegexPattern { pattern: String, reason: String },

    #[error("Invalid category name '{name}': {reason}")]
    InvalidCategoryName { name: String, reason: &'static str },

    #[error("Category '{name}' lists no extensions")]
    EmptyCategory { name: String },
}

/// Top-level configuration file contents.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Replacement category table, in precedence order.
    #[serde(default)]
    pub categories: Option<Vec<CategoryDef>>,

    #[serde(default)]
    pub filters: FilterRules,
}

/// Rules deciding which files are considered at all.
#[derive(Debug, Clone, Deserialize)]
pub struct FilterRules {
    /// Whether files and directories starting with "." are processed.
    #[serde(default = "default_include_hidden")]
    pub include_hidden: bool,

    /// Directory names skipped at any depth.
    #[serde(default = "default_ignored_dirs")]
    pub ignored_dirs: Vec<String>,

    #[serde(default)]
    pub exclude: ExcludeRules,

    /// Whitelist that overrides `exclude` and the hidden-file rule.
    #[serde(default)]
    pub include: IncludeRules,
}

fn default_include_hidden() -> bool {
    true
}

fn default_ignored_dirs() -> Vec<String> {
    DEFAULT_IGNORED_DIRS.iter().map(|s| s.to_string()).collect()
}

impl Default for FilterRules {
    fn default() -> Self {
        Self {
            include_hidden: default_include_hidden(),
            ignored_dirs: default_ignored_dirs(),
            exclude: ExcludeRules::default(),
            include: IncludeRules::default(),
        }
    }
}

/// Rules for excluding files.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExcludeRules {
    /// Exact file names (e.g. "Thumbs.db").
    #[serde(default)]
    pub filenames: Vec<String>,

    /// Glob patterns matched against the path relative to the source directory.
    #[serde(default)]
    pub patterns: Vec<String>,

    /// Extensions, with or without the leading dot.
    #[serde(default)]
    pub extensions: Vec<String>,

    /// Regexes matched against the file name.
    #[serde(default)]
    pub regex: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IncludeRules {
    #[serde(default)]
    pub patterns: Vec<String>,
}

impl AppConfig {
    /// Load configuration, falling back to defaults.
    ///
    /// Lookup order:
    /// 1. `config_path`, if given (must exist)
    /// 2. `.dirsortrc.toml` in the current directory
    /// 3. `~/.config/dirsort/config.toml`
    /// 4. built-in defaults
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }

        let home = std::env::var_os("HOME").map(PathBuf::from);
        match discover(Path::new("."), home.as_deref()) {
            Some(path) => Self::load_from_file(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load configuration from a specific TOML or JSON file.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::ConfigNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        if is_json {
            serde_json::from_str(&content).map_err(|source| ConfigError::Json {
                path: path.to_path_buf(),
                source,
            })
        } else {
            toml::from_str(&content).map_err(|source| ConfigError::Toml {
                path: path.to_path_buf(),
                source,
            })
        }
    }

    /// Builds the category table, or the built-in one if none is configured.
    ///
    /// # Errors
    ///
    /// Fails if a category name is not usable as a single directory name or a
    /// category ends up with no extensions.
    pub fn category_table(&self) -> Result<CategoryTable, ConfigError> {
        let Some(defs) = &self.categories else {
            return Ok(CategoryTable::builtin());
        };

        for def in defs {
            validate_category_name(&def.name)?;
        }

        let table = CategoryTable::from_defs(defs.iter().cloned());
        if let Some(empty) = table.categories().iter().find(|c| c.extensions.is_empty()) {
            return Err(ConfigError::EmptyCategory {
                name: empty.name.clone(),
            });
        }
        Ok(table)
    }

    /// Compile filter rules into matchers.
    pub fn compile_filters(&self) -> Result<CompiledFilters, ConfigError> {
        CompiledFilters::new(&self.filters)
    }
}

/// Finds the first configuration file present in `cwd` or under `home`.
pub fn discover(cwd: &Path, home: Option<&Path>) -> Option<PathBuf> {
    let local_config = cwd.join(LOCAL_CONFIG_FILE);
    if local_config.is_file() {
        return Some(local_config);
    }

    let home_config = home?.join(".config").join("dirsort").join("config.toml");
    home_config.is_file().then_some(home_config)
}

fn validate_category_name(name: &str) -> Result<(), ConfigError> {
    let invalid = |reason| ConfigError::InvalidCategoryName {
        name: name.to_string(),
        reason,
    };

    if name.trim().is_empty() {
        return Err(invalid("name is empty"));
    }
    if name.contains(['/', '\\']) {
        return Err(invalid("name must not contain path separators"));
    }
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(invalid("name must be a plain directory name")),
    }
}

/// Compiled filter rules.
///
/// Paths passed in are relative to the source directory.
#[derive(Debug)]
pub struct CompiledFilters {
    include_hidden: bool,
    ignored_dirs: HashSet<String>,
    exclude_filenames: HashSet<String>,
    exclude_extensions: HashSet<String>,
    exclude_patterns: Vec<Pattern>,
    exclude_regexes: Vec<Regex>,
    include_patterns: Vec<Pattern>,
}

impl CompiledFilters {
    fn new(rules: &FilterRules) -> Result<Self, ConfigError> {
        let compile_globs = |patterns: &[String]| {
            patterns
                .iter()
                .map(|pattern| {
                    Pattern::new(pattern).map_err(|e| ConfigError::InvalidGlobPattern {
                        pattern: pattern.clone(),
                        reason: e.to_string(),
                    })
                })
                .collect::<Result<Vec<_>, _>>()
        };

        let exclude_regexes = rules
            .exclude
            .regex
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| ConfigError::InvalidRegexPattern {
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            include_hidden: rules.include_hidden,
            ignored_dirs: rules.ignored_dirs.iter().cloned().collect(),
            exclude_filenames: rules.exclude.filenames.iter().cloned().collect(),
            exclude_extensions: rules
                .exclude
                .extensions
                .iter()
                .map(|ext| ext.trim().trim_start_matches('.').to_lowercase())
                .collect(),
            exclude_patterns: compile_globs(&rules.exclude.patterns)?,
            exclude_regexes,
            include_patterns: compile_globs(&rules.include.patterns)?,
        })
    }

    /// True if `name` is one of the ignored directory names.
    pub fn is_ignored_name(&self, name: &OsStr) -> bool {
        self.ignored_dirs.contains(name.to_string_lossy().as_ref())
    }

    /// Check if a file should be organized.
    ///
    /// Checks run in this order, stopping at the first decision:
    /// 1. include patterns: always include
    /// 2. hidden path component while hidden files are disabled: exclude
    /// 3. exact file name: exclude
    /// 4. extension: exclude
    /// 5. glob pattern: exclude
    /// 6. regex on the file name: exclude
    /// 7. otherwise include
    ///
    /// Ignored directories are handled by the walker, not here.
    pub fn should_include(&self, relative_path: &Path) -> bool {
        let file_name = relative_path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();

        if self
            .include_patterns
            .iter()
            .any(|pattern| pattern.matches_path(relative_path))
        {
            return true;
        }

        if !self.include_hidden && has_hidden_component(relative_path) {
            return false;
        }

        if self.exclude_filenames.contains(file_name.as_ref()) {
            return false;
        }

        if let Some(ext) = relative_path.extension()
            && self
                .exclude_extensions
                .contains(&ext.to_string_lossy().to_lowercase())
        {
            return false;
        }

        if self
            .exclude_patterns
            .iter()
            .any(|pattern| pattern.matches_path(relative_path))
        {
            return false;
        }

        !self
            .exclude_regexes
            .iter()
            .any(|regex| regex.is_match(&file_name))
    }
}

impl Default for CompiledFilters {
    fn default() -> Self {
        Self {
            include_hidden: true,
            ignored_dirs: default_ignored_dirs().into_iter().collect(),
            exclude_filenames: HashSet::new(),
            exclude_extensions: HashSet::new(),
            exclude_patterns: Vec::new(),
            exclude_regexes: Vec::new(),
            include_patterns: Vec::new(),
        }
    }
}

fn has_hidden_component(path: &Path) -> bool {
    path.components().any(|c| match c {
        Component::Normal(name) => name.to_string_lossy().starts_with('.'),
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn filters_with(exclude: ExcludeRules) -> CompiledFilters {
        let rules = FilterRules {
            exclude,
            ..FilterRules::default()
        };
        CompiledFilters::new(&rules).unwrap()
    }

    #[test]
    fn test_default_config_uses_builtin_table() {
        let config = AppConfig::default();
        let table = config.category_table().unwrap();
        assert_eq!(table, CategoryTable::builtin());
        assert!(config.filters.include_hidden);
        assert_eq!(config.filters.ignored_dirs, default_ignored_dirs());
    }

    #[test]
    fn test_parse_toml_categories_keep_declaration_order() {
        let config: AppConfig = toml::from_str(
            r#"
            [[categories]]
            name = "Photos"
            extensions = ["JPG", ".png"]

            [[categories]]
            name = "Installers"
            extensions = [".exe", ".sh"]

            [[categories]]
            name = "Scripts"
            extensions = [".sh"]
            "#,
        )
        .unwrap();

        let table = config.category_table().unwrap();
        let names: Vec<_> = table.categories().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Photos", "Installers", "Scripts"]);
        assert_eq!(table.classify(".jpg"), "Photos");
        assert_eq!(table.classify(".sh"), "Installers");
        assert_eq!(table.duplicate_extensions().len(), 1);
    }

    #[test]
    fn test_parse_filters_section_only() {
        let config: AppConfig = toml::from_str(
            r#"
            [filters]
            include_hidden = false

            [filters.exclude]
            extensions = ["bak"]
            "#,
        )
        .unwrap();

        assert!(config.categories.is_none());
        assert!(!config.filters.include_hidden);
        assert_eq!(config.filters.ignored_dirs, default_ignored_dirs());
        assert_eq!(config.filters.exclude.extensions, vec!["bak".to_string()]);
    }

    #[test]
    fn test_load_from_json_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("categories.json");
        fs::write(
            &path,
            r#"{"categories": [{"name": "Docs", "extensions": ["pdf", ".TXT"]}]}"#,
        )
        .unwrap();

        let config = AppConfig::load_from_file(&path).unwrap();
        let table = config.category_table().unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.classify(".txt"), "Docs");
        assert_eq!(table.classify(".png"), "Others");
    }

    #[test]
    fn test_load_missing_file() {
        let result = AppConfig::load(Some(Path::new("/definitely/not/here.toml")));
        assert!(matches!(result, Err(ConfigError::ConfigNotFound(_))));
    }

    #[test]
    fn test_load_invalid_toml() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("bad.toml");
        fs::write(&path, "[[categories]\nname = ").unwrap();

        let result = AppConfig::load_from_file(&path);
        assert!(matches!(result, Err(ConfigError::Toml { .. })));
    }

    #[test]
    fn test_discover_prefers_local_file() {
        let cwd = TempDir::new().expect("Failed to create temp directory");
        let home = TempDir::new().expect("Failed to create temp directory");
        let home_config = home.path().join(".config").join("dirsort");
        fs::create_dir_all(&home_config).unwrap();
        fs::write(home_config.join("config.toml"), "").unwrap();

        assert_eq!(
            discover(cwd.path(), Some(home.path())),
            Some(home_config.join("config.toml"))
        );

        fs::write(cwd.path().join(LOCAL_CONFIG_FILE), "").unwrap();
        assert_eq!(
            discover(cwd.path(), Some(home.path())),
            Some(cwd.path().join(LOCAL_CONFIG_FILE))
        );
        assert_eq!(discover(home.path(), None), None);
    }

    #[test]
    fn test_invalid_category_names_rejected() {
        for name in ["", "  ", "a/b", "..", ".", "a\\b"] {
            let config = AppConfig {
                categories: Some(vec![CategoryDef {
                    name: name.to_string(),
                    extensions: [".txt".to_string()].into_iter().collect(),
                }]),
                filters: FilterRules::default(),
            };
            assert!(
                matches!(
                    config.category_table(),
                    Err(ConfigError::InvalidCategoryName { .. })
                ),
                "name {:?} should be rejected",
                name
            );
        }
    }

    #[test]
    fn test_category_without_extensions_rejected() {
        let config: AppConfig = toml::from_str(
            r#"
            [[categories]]
            name = "Nothing"
            extensions = [" "]
            "#,
        )
        .unwrap();
        assert!(matches!(
            config.category_table(),
            Err(ConfigError::EmptyCategory { .. })
        ));
    }

    #[test]
    fn test_ignored_names() {
        let filters = CompiledFilters::default();
        assert!(filters.is_ignored_name(OsStr::new(".git")));
        assert!(filters.is_ignored_name(OsStr::new("__pycache__")));
        assert!(filters.is_ignored_name(OsStr::new(".svn")));
        assert!(!filters.is_ignored_name(OsStr::new("git")));
    }

    #[test]
    fn test_hidden_files_included_by_default() {
        let filters = CompiledFilters::default();
        assert!(filters.should_include(Path::new(".bashrc")));
        assert!(filters.should_include(Path::new(".config/app.toml")));
    }

    #[test]
    fn test_hidden_files_excluded_when_disabled() {
        let rules = FilterRules {
            include_hidden: false,
            include: IncludeRules {
                patterns: vec![".important".to_string()],
            },
            ..FilterRules::default()
        };
        let filters = CompiledFilters::new(&rules).unwrap();

        assert!(!filters.should_include(Path::new(".DS_Store")));
        assert!(!filters.should_include(Path::new(".cache/data.bin")));
        assert!(filters.should_include(Path::new(".important")));
        assert!(filters.should_include(Path::new("visible.txt")));
    }

    #[test]
    fn test_exclude_filenames_and_extensions() {
        let filters = filters_with(ExcludeRules {
            filenames: vec!["Thumbs.db".to_string()],
            extensions: vec![".bak".to_string(), "TMP".to_string()],
            ..Default::default()
        });

        assert!(!filters.should_include(Path::new("Thumbs.db")));
        assert!(!filters.should_include(Path::new("old.bak")));
        assert!(!filters.should_include(Path::new("scratch.tmp")));
        assert!(!filters.should_include(Path::new("OLD.BAK")));
        assert!(filters.should_include(Path::new("notes.txt")));
    }

    #[test]
    fn test_exclude_glob_respects_directory_boundaries() {
        let filters = filters_with(ExcludeRules {
            patterns: vec!["**/logs/**".to_string(), "*.part".to_string()],
            ..Default::default()
        });

        assert!(!filters.should_include(Path::new("logs/app.log")));
        assert!(!filters.should_include(Path::new("app/logs/debug.log")));
        assert!(!filters.should_include(Path::new("movie.part")));
        assert!(filters.should_include(Path::new("my_logs/app.log")));
    }

    #[test]
    fn test_exclude_regex_on_file_name() {
        let filters = filters_with(ExcludeRules {
            regex: vec![r"^~\$.*".to_string()],
            ..Default::default()
        });

        assert!(!filters.should_include(Path::new("docs/~$report.docx")));
        assert!(filters.should_include(Path::new("docs/report.docx")));
    }

    #[test]
    fn test_invalid_patterns_return_errors() {
        let bad_glob = FilterRules {
            exclude: ExcludeRules {
                patterns: vec!["[invalid".to_string()],
                ..Default::default()
            },
            ..FilterRules::default()
        };
        assert!(matches!(
            CompiledFilters::new(&bad_glob),
            Err(ConfigError::InvalidGlobPattern { .. })
        ));

        let bad_regex = FilterRules {
            exclude: ExcludeRules {
                regex: vec!["[invalid(".to_string()],
                ..Default::default()
            },
            ..FilterRules::default()
        };
        assert!(matches!(
            CompiledFilters::new(&bad_regex),
            Err(ConfigError::InvalidRegexPattern { .. })
        ));
    }
}
