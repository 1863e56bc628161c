//! Runtime configuration for the image search service
//!
//! Values come from defaults, then environment variables, then explicit
//! overrides. The CLI layers clap flags (which also read the same
//! environment variables) on top of [`SearchConfig::default`].

use image_search_embed::{DEFAULT_MODEL_NAME, EmbedConfig};
use std::path::PathBuf;

pub const DB_PATH_ENV: &str = "DB_PATH";
pub const COLLECTION_NAME_ENV: &str = "COLLECTION_NAME";
pub const MODEL_NAME_ENV: &str = "MODEL_NAME";
pub const MODEL_CACHE_DIR_ENV: &str = "MODEL_CACHE_DIR";

pub const DEFAULT_DB_PATH: &str = "./image_db";
pub const DEFAULT_COLLECTION_NAME: &str = "images";
pub const DEFAULT_MODEL_CACHE_DIR: &str = "models";

/// Number of results a similarity search returns when the caller does not say.
pub const DEFAULT_N_RESULTS: usize = 15;

/// Where the store lives and which model fills it.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchConfig {
    /// Directory holding the SQLite database
    pub db_path: PathBuf,
    /// Collection every operation is bound to
    pub collection_name: String,
    /// Embedding model identifier, see [`image_search_embed::ImageModel`]
    pub model_name: String,
    /// Where model weights are downloaded to
    pub model_cache_dir: PathBuf,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            collection_name: DEFAULT_COLLECTION_NAME.to_string(),
            model_name: DEFAULT_MODEL_NAME.to_string(),
            model_cache_dir: PathBuf::from(DEFAULT_MODEL_CACHE_DIR),
        }
    }
}

impl SearchConfig {
    /// Defaults overridden by `DB_PATH`, `COLLECTION_NAME`, `MODEL_NAME`
    /// and `MODEL_CACHE_DIR` when they are set and non-empty.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`SearchConfig::from_env`] with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let mut config = Self::default();
        if let Some(db_path) = get(DB_PATH_ENV) {
            config.db_path = PathBuf::from(db_path);
        }
        if let Some(collection_name) = get(COLLECTION_NAME_ENV) {
            config.collection_name = collection_name;
        }
        if let Some(model_name) = get(MODEL_NAME_ENV) {
            config.model_name = model_name;
        }
        if let Some(model_cache_dir) = get(MODEL_CACHE_DIR_ENV) {
            config.model_cache_dir = PathBuf::from(model_cache_dir);
        }
        config
    }

    pub fn with_db_path<P: Into<PathBuf>>(mut self, db_path: P) -> Self {
        self.db_path = db_path.into();
        self
    }

    pub fn with_collection_name<S: Into<String>>(mut self, collection_name: S) -> Self {
        self.collection_name = collection_name.into();
        self
    }

    pub fn with_model_name<S: Into<String>>(mut self, model_name: S) -> Self {
        self.model_name = model_name.into();
        self
    }

    pub fn with_model_cache_dir<P: Into<PathBuf>>(mut self, model_cache_dir: P) -> Self {
        self.model_cache_dir = model_cache_dir.into();
        self
    }

    /// Embedding configuration for the selected model.
    ///
    /// Fails with `InvalidConfig` when the model identifier is unknown.
    pub fn embed_config(&self) -> image_search_embed::Result<EmbedConfig> {
        Ok(EmbedConfig::from_model_name(&self.model_name)?.with_cache_dir(&self.model_cache_dir))
    }
}
