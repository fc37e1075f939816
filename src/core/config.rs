//! Runtime configuration loaded from environment variables

use std::fmt;
use std::path::{Path, PathBuf};

/// Local model directory override (checked first)
pub const MODEL_PATH_ENV: &str = "WISETASK_MODEL_PATH";
/// Model name override (checked second)
pub const MODEL_NAME_ENV: &str = "WISETASK_MODEL";
/// SQLite database file
pub const DB_PATH_ENV: &str = "WISETASK_DB_PATH";

/// Built-in model used when no override is set
pub const DEFAULT_MODEL_NAME: &str = "htp";
pub const DEFAULT_DB_PATH: &str = "data/semantic_search.db";

/// Where the embedding model comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelSource {
    /// Model files in a local directory
    LocalPath(PathBuf),
    /// Model identified by name
    Named(String),
}

impl ModelSource {
    /// Resolve the model source from the two optional overrides.
    ///
    /// First match wins: local path, then model name, then the built-in default.
    /// Blank values count as unset.
    pub fn resolve(local_path: Option<&str>, model_name: Option<&str>) -> Self {
        if let Some(path) = local_path.map(str::trim).filter(|p| !p.is_empty()) {
            return ModelSource::LocalPath(expand_home(path));
        }

        if let Some(name) = model_name.map(str::trim).filter(|n| !n.is_empty()) {
            return ModelSource::Named(name.to_string());
        }

        ModelSource::Named(DEFAULT_MODEL_NAME.to_string())
    }

    pub fn from_env() -> Self {
        let local_path = std::env::var(MODEL_PATH_ENV).ok();
        let model_name = std::env::var(MODEL_NAME_ENV).ok();
        Self::resolve(local_path.as_deref(), model_name.as_deref())
    }
}

impl Default for ModelSource {
    fn default() -> Self {
        ModelSource::Named(DEFAULT_MODEL_NAME.to_string())
    }
}

impl fmt::Display for ModelSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelSource::LocalPath(path) => write!(f, "{}", path.display()),
            ModelSource::Named(name) => write!(f, "{}", name),
        }
    }
}

/// Search service configuration
#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub db_path: PathBuf,
    pub model: ModelSource,
}

impl SearchConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let db_path = std::env::var(DB_PATH_ENV)
            .ok()
            .filter(|p| !p.trim().is_empty())
            .map(|p| expand_home(&p))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH));

        Self {
            db_path,
            model: ModelSource::from_env(),
        }
    }

    /// Apply command-line overrides on top of the environment
    pub fn with_overrides(mut self, db_path: Option<PathBuf>, model: Option<String>) -> Self {
        if let Some(path) = db_path {
            self.db_path = path;
        }
        if let Some(name) = model {
            self.model = ModelSource::resolve(None, Some(&name));
        }
        self
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            model: ModelSource::default(),
        }
    }
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return Path::new(&home).join(rest);
        }
    }
    PathBuf::from(path)
}
