//! Configuration module for the exemplar store.
//!
//! This module provides a layered configuration system that supports:
//! - Default values
//! - TOML configuration file
//! - Environment variable overrides
//! - CLI argument overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `EX_` and use double underscores
//! to separate nested levels:
//! - `EX_EMBEDDING__MODEL=BGESmallENV15` sets `embedding.model`
//! - `EX_EMBEDDING__OFFLINE=true` sets `embedding.offline`
//! - `EX_SEARCH__TOP_K=8` sets `search.top_k`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::store::{DEFAULT_DEDUP_THRESHOLD, MAX_BATCH_SIZE};
use crate::vector::ModelOptions;

/// Directory holding settings, data and models, relative to the workspace.
pub const CONFIG_DIR: &str = ".exemplar";

const SETTINGS_FILE: &str = "settings.toml";

const ENV_PREFIX: &str = "EX_";

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Global debug mode
    #[serde(default)]
    pub debug: bool,

    /// Directory for the committed index, metadata and manifest
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Corpus used when `build` is run without an explicit path
    #[serde(default = "default_corpus_path")]
    pub corpus_path: PathBuf,

    /// Embedding provider settings
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Retrieval settings
    #[serde(default)]
    pub search: SearchConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct EmbeddingConfig {
    /// Model identifier, e.g. "AllMiniLML6V2"
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Where downloaded model files are kept
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Never download; fail if the model is not cached
    #[serde(default)]
    pub offline: bool,

    /// Texts per provider call, 1 to 64
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SearchConfig {
    /// Results returned when the caller does not ask for a count
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// `raw` similarity above which a hit is dropped as a near-duplicate
    #[serde(default = "default_dedup_threshold")]
    pub dedup_threshold: f64,
}

// Default value functions
fn default_version() -> u32 {
    1
}
fn default_data_dir() -> PathBuf {
    PathBuf::from(CONFIG_DIR).join("data")
}
fn default_corpus_path() -> PathBuf {
    PathBuf::from(CONFIG_DIR).join("corpus.jsonl")
}
fn default_embedding_model() -> String {
    "AllMiniLML6V2".to_string()
}
fn default_cache_dir() -> PathBuf {
    PathBuf::from(CONFIG_DIR).join("models")
}
fn default_batch_size() -> usize {
    MAX_BATCH_SIZE
}
fn default_top_k() -> usize {
    5
}
fn default_dedup_threshold() -> f64 {
    DEFAULT_DEDUP_THRESHOLD
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            debug: false,
            data_dir: default_data_dir(),
            corpus_path: default_corpus_path(),
            embedding: EmbeddingConfig::default(),
            search: SearchConfig::default(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            cache_dir: default_cache_dir(),
            offline: false,
            batch_size: default_batch_size(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            dedup_threshold: default_dedup_threshold(),
        }
    }
}

impl EmbeddingConfig {
    /// Batch size clamped to the supported range.
    pub fn effective_batch_size(&self) -> usize {
        self.batch_size.clamp(1, MAX_BATCH_SIZE)
    }

    pub fn model_options(&self, show_download_progress: bool) -> ModelOptions {
        ModelOptions {
            model: self.model.clone(),
            cache_dir: self.cache_dir.clone(),
            offline: self.offline,
            show_download_progress,
        }
    }
}

impl Settings {
    /// Load configuration from all sources
    pub fn load() -> Result<Self, Box<figment::Error>> {
        let config_path = Self::find_workspace_config()
            .unwrap_or_else(|| PathBuf::from(CONFIG_DIR).join(SETTINGS_FILE));
        Self::load_from(config_path)
    }

    /// Load configuration from a specific file
    ///
    /// Environment variables still override the file.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, Box<figment::Error>> {
        Self::load_layers(path.as_ref(), ENV_PREFIX)
    }

    fn load_layers(path: &Path, env_prefix: &str) -> Result<Self, Box<figment::Error>> {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path))
            // Double underscore separates nested levels, single underscore stays
            .merge(Env::prefixed(env_prefix).map(|key| {
                key.as_str().to_lowercase().replace("__", ".").into()
            }))
            .extract()
            .map_err(Box::new)
    }

    /// Find the settings file by looking for the config directory
    /// from the current directory up to the root
    fn find_workspace_config() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;

        current
            .ancestors()
            .map(|ancestor| ancestor.join(CONFIG_DIR))
            .find(|dir| dir.is_dir())
            .map(|dir| dir.join(SETTINGS_FILE))
    }

    /// Save current configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Box<dyn std::error::Error>> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }

    /// Create a default settings file with helpful comments
    pub fn init_config_file(force: bool) -> Result<PathBuf, Box<dyn std::error::Error>> {
        Self::init_config_file_at(&PathBuf::from(CONFIG_DIR).join(SETTINGS_FILE), force)
    }

    pub(crate) fn init_config_file_at(
        config_path: &Path,
        force: bool,
    ) -> Result<PathBuf, Box<dyn std::error::Error>> {
        if !force && config_path.exists() {
            return Err("Configuration file already exists. Use --force to overwrite".into());
        }

        if let Some(parent) = config_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let template = format!(
            r#"# Exemplar Configuration File

# Version of the configuration schema
version = 1

# Verbose logging
debug = false

# Committed index, metadata and manifest
data_dir = "{CONFIG_DIR}/data"

# Corpus read by `exemplar build` when no path is given
# One JSON record per line: subject, art_style, visual_elements, mood, technical, raw
corpus_path = "{CONFIG_DIR}/corpus.jsonl"

[embedding]
# Model to use for embeddings
# Supported: {models}
model = "AllMiniLML6V2"

# Downloaded model files
cache_dir = "{CONFIG_DIR}/models"

# Refuse to download; the model must already be in cache_dir
offline = false

# Texts embedded per call (1 to {MAX_BATCH_SIZE})
batch_size = {MAX_BATCH_SIZE}

[search]
# Results per query
top_k = 5

# Two results whose raw texts are more similar than this (0.0 to 1.0)
# are treated as duplicates and only the nearer one is kept
dedup_threshold = {DEFAULT_DEDUP_THRESHOLD}
"#,
            models = crate::vector::SUPPORTED_MODELS.join(", ")
        );

        std::fs::write(config_path, template)?;

        Ok(config_path.to_path_buf())
    }
}
