//! Extension-based file categorization.
//!
//! A [`CategoryTable`] is an ordered list of named categories, each owning a set
//! of lowercase extensions (with the leading dot). Lookups walk the table in
//! declaration order and the first category containing the extension wins, so
//! an extension listed twice always resolves to the earlier category.
//!
//! # Examples
//!
//! ```
//! use dirsort::file_category::{CategoryTable, OTHERS, classify};
//!
//! let table = CategoryTable::default();
//! assert_eq!(classify(".JPG", &table), "Images");
//! assert_eq!(classify(".pdf", &table), "Documents");
//! assert_eq!(classify("", &table), OTHERS);
//! ```

use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;

/// Category assigned to every extension no table entry claims.
pub const OTHERS: &str = "Others";

/// Built-in categories in precedence order.
const BUILTIN_CATEGORIES: &[(&str, &[&str])] = &[
    (
        "Images",
        &[".jpg", ".jpeg", ".png", ".gif", ".bmp", ".tiff", ".webp", ".svg"],
    ),
    ("Videos", &[".mp4", ".mkv", ".avi", ".mov", ".wmv", ".flv"]),
    (
        "Documents",
        &[
            ".pdf", ".doc", ".docx", ".txt", ".ppt", ".pptx", ".xls", ".xlsx", ".odt",
        ],
    ),
    ("Archives", &[".zip", ".tar", ".gz", ".rar", ".7z"]),
    ("Audio", &[".mp3", ".wav", ".flac", ".aac", ".ogg"]),
    (
        "Code",
        &[
            ".py", ".js", ".java", ".c", ".cpp", ".cs", ".html", ".css", ".json", ".sql",
        ],
    ),
    ("Executables", &[".exe", ".msi", ".sh", ".bat"]),
    ("Ebooks", &[".epub", ".mobi", ".azw3"]),
];

/// A named category and the extensions it claims.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CategoryDef {
    /// Category name, also used as the destination subdirectory name.
    pub name: String,
    /// Extensions claimed by this category.
    #[serde(default)]
    pub extensions: BTreeSet<String>,
}

/// An extension claimed by more than one category.
///
/// Only `kept_by` ever matches; `shadowed_in` is unreachable for this extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateExtension {
    pub extension: String,
    pub kept_by: String,
    pub shadowed_in: String,
}

/// Ordered mapping from category name to extension set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryTable {
    categories: Vec<CategoryDef>,
}

impl CategoryTable {
    /// Creates a table with no categories; everything classifies as [`OTHERS`].
    pub fn empty() -> Self {
        Self {
            categories: Vec::new(),
        }
    }

    /// Creates the built-in table (Images, Videos, Documents, Archives, Audio,
    /// Code, Executables, Ebooks).
    pub fn builtin() -> Self {
        let mut table = Self::empty();
        for (name, extensions) in BUILTIN_CATEGORIES {
            table.add_category(name, extensions.iter().copied());
        }
        table
    }

    /// Builds a table from category definitions, normalizing every extension.
    pub fn from_defs(defs: impl IntoIterator<Item = CategoryDef>) -> Self {
        let mut table = Self::empty();
        for def in defs {
            table.add_category(&def.name, def.extensions.iter());
        }
        table
    }

    /// Appends a category, or extends it if a category with this name exists.
    ///
    /// Extensions are normalized with [`normalize_extension`]; empty entries
    /// are dropped.
    pub fn add_category<I, S>(&mut self, name: &str, extensions: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let normalized = extensions
            .into_iter()
            .map(|ext| normalize_extension(ext.as_ref()))
            .filter(|ext| !ext.is_empty());

        match self.categories.iter_mut().find(|c| c.name == name) {
            Some(existing) => existing.extensions.extend(normalized),
            None => self.categories.push(CategoryDef {
                name: name.to_string(),
                extensions: normalized.collect(),
            }),
        }
    }

    /// Builder-style variant of [`CategoryTable::add_category`].
    pub fn with_category<I, S>(mut self, name: &str, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.add_category(name, extensions);
        self
    }

    /// Categories in precedence order.
    pub fn categories(&self) -> &[CategoryDef] {
        &self.categories
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Maps an extension (any case, with or without the leading dot) to a
    /// category name.
    ///
    /// # Examples
    ///
    /// ```
    /// use dirsort::file_category::CategoryTable;
    ///
    /// let table = CategoryTable::default();
    /// assert_eq!(table.classify(".MP3"), "Audio");
    /// assert_eq!(table.classify(".xyz"), "Others");
    /// ```
    pub fn classify(&self, extension: &str) -> &str {
        let extension = normalize_extension(extension);
        if extension.is_empty() {
            return OTHERS;
        }
        self.categories
            .iter()
            .find(|category| category.extensions.contains(&extension))
            .map(|category| category.name.as_str())
            .unwrap_or(OTHERS)
    }

    /// Classifies a path by its extension.
    pub fn classify_path(&self, path: &Path) -> &str {
        self.classify(&extension_of(path))
    }

    /// Lists extensions claimed by more than one category.
    pub fn duplicate_extensions(&self) -> Vec<DuplicateExtension> {
        let mut owners: HashMap<&str, &str> = HashMap::new();
        let mut duplicates = Vec::new();

        for category in &self.categories {
            for extension in &category.extensions {
                match owners.get(extension.as_str()) {
                    Some(kept_by) => duplicates.push(DuplicateExtension {
                        extension: extension.clone(),
                        kept_by: kept_by.to_string(),
                        shadowed_in: category.name.clone(),
                    }),
                    None => {
                        owners.insert(extension.as_str(), category.name.as_str());
                    }
                }
            }
        }

        duplicates
    }
}

impl Default for CategoryTable {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Maps an extension to its category in `table`, falling back to [`OTHERS`].
pub fn classify<'a>(extension: &str, table: &'a CategoryTable) -> &'a str {
    table.classify(extension)
}

/// Lowercases an extension and ensures it carries a leading dot.
///
/// Blank input stays empty.
pub fn normalize_extension(extension: &str) -> String {
    let trimmed = extension.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    let lower = trimmed.to_lowercase();
    if lower.starts_with('.') {
        lower
    } else {
        format!(".{}", lower)
    }
}

/// Returns the lowercase final suffix of `path` including the dot.
///
/// Files without a suffix (including dotfiles such as `.bashrc`) yield an
/// empty string.
pub fn extension_of(path: &Path) -> String {
    match path.extension() {
        Some(ext) if !ext.is_empty() => format!(".{}", ext.to_string_lossy().to_lowercase()),
        _ => String::new(),
    }
}
