//! Settings for building and querying an index.
//!
//! A `Config` is a plain value passed into every operation. User defaults live in
//! `config.toml` in the app data directory (see [app_data](crate::app_data)); any
//! field left out of the file keeps its built-in default.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::app_data;
use crate::hashing::{DEFAULT_HASH_DIM, MAX_HASH_DIM};
use crate::similarity::{DEFAULT_LIMIT, DEFAULT_THRESHOLD};
use crate::tokenize::DEFAULT_EXCERPT_CHARS;

pub const CONFIG_FILENAME: &str = "config.toml";
/// Directory created inside the indexed root to hold the index file.
pub const DEFAULT_INDEX_DIR: &str = ".simfind";

const DEFAULT_EXTENSIONS: &[&str] = &["md", "mdx", "txt", "ts", "tsx", "js", "jsx", "py", "rs", "go"];
const DEFAULT_EXCLUDE_DIRS: &[&str] = &[
    "node_modules",
    ".git",
    ".hg",
    ".svn",
    "target",
    "dist",
    "build",
    "out",
    ".next",
    "coverage",
    "__pycache__",
    ".cache",
    ".venv",
    "venv",
];

/// How a query's terms are weighted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryWeighting {
    /// Use the indexed corpus's document frequencies.
    #[default]
    Corpus,
    /// Treat the query as a corpus of one (pure term frequency).
    Query,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// File extensions to index, without the dot. Matched case-insensitively.
    pub extensions: Vec<String>,
    /// Directory names never descended into.
    pub exclude_dirs: Vec<String>,
    /// Name of the directory inside the root that holds the index.
    pub index_dir: String,
    pub hash_dim: usize,
    /// Characters read from the start of each document.
    pub excerpt_chars: usize,
    pub limit: usize,
    /// Inclusive minimum similarity for a result.
    pub threshold: f32,
    /// Prepend frontmatter title and tags to the indexed text.
    pub enrich_with_frontmatter: bool,
    pub query_weighting: QueryWeighting,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            extensions: DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            exclude_dirs: DEFAULT_EXCLUDE_DIRS.iter().map(|s| s.to_string()).collect(),
            index_dir: DEFAULT_INDEX_DIR.to_string(),
            hash_dim: DEFAULT_HASH_DIM,
            excerpt_chars: DEFAULT_EXCERPT_CHARS,
            limit: DEFAULT_LIMIT,
            threshold: DEFAULT_THRESHOLD,
            enrich_with_frontmatter: true,
            query_weighting: QueryWeighting::Corpus,
        }
    }
}

impl Config {
    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    /// Rejects settings no operation can work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hash_dim == 0 {
            return Err(ConfigError::Invalid("hash_dim must be at least 1".into()));
        }
        if self.hash_dim > MAX_HASH_DIM {
            return Err(ConfigError::Invalid(format!(
                "hash_dim must be at most {MAX_HASH_DIM}, got {}",
                self.hash_dim
            )));
        }
        if self.excerpt_chars == 0 {
            return Err(ConfigError::Invalid("excerpt_chars must be at least 1".into()));
        }
        if self.limit == 0 {
            return Err(ConfigError::Invalid("limit must be at least 1".into()));
        }
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(ConfigError::Invalid(format!(
                "threshold must be between 0 and 1, got {}",
                self.threshold
            )));
        }
        if self.extensions.is_empty() {
            return Err(ConfigError::Invalid("at least one extension is required".into()));
        }
        if self.index_dir.is_empty() || self.index_dir.contains(['/', '\\']) {
            return Err(ConfigError::Invalid(format!(
                "index_dir must be a plain directory name, got {:?}",
                self.index_dir
            )));
        }
        Ok(())
    }

    /// Whether a file with extension `ext` (no dot) is indexed.
    pub fn allows_extension(&self, ext: &str) -> bool {
        let ext = ext.trim_start_matches('.');
        self.extensions
            .iter()
            .any(|allowed| allowed.trim_start_matches('.').eq_ignore_ascii_case(ext))
    }

    /// Whether a directory named `name` is skipped during discovery.
    pub fn excludes_dir(&self, name: &str) -> bool {
        name == self.index_dir || self.exclude_dirs.iter().any(|d| d == name)
    }
}

/// Path of the user config file, if the app data directory can be determined.
pub fn config_path() -> Option<PathBuf> {
    app_data::app_data_dir().map(|dir| dir.join(CONFIG_FILENAME))
}

/// Load the user config. Returns the defaults when there is no config file.
pub fn load_config() -> Result<Config, ConfigError> {
    match config_path() {
        Some(path) if path.is_file() => load_config_from(&path),
        _ => Ok(Config::default()),
    }
}

/// Load config from an explicit file.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let s = std::fs::read_to_string(path).map_err(|e| ConfigError::Read(path.to_path_buf(), e))?;
    let config = Config::from_toml_str(&s).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
    config.validate()?;
    Ok(config)
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {0}: {1}")]
    Read(PathBuf, std::io::Error),
    #[error("failed to parse config {0}: {1}")]
    Parse(PathBuf, toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}
