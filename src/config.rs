//! Engine configuration: optional JSON file, then environment overrides.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{EngineError, TemplateError};
use crate::terms::attach::{AttachTemplate, DEFAULT_TEMPLATE};
use crate::terms::glossary::HeaderMode;
use crate::terms::EngineOptions;

pub const ENV_LEMMA_DIR: &str = "TERMBRIDGE_LEMMA_DIR";
pub const ENV_LEMMA_URL: &str = "TERMBRIDGE_LEMMA_URL";
pub const ENV_TEMPLATE: &str = "TERMBRIDGE_TEMPLATE";

/// Where lemma data comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LemmaConfig {
    /// Directory holding `exceptions.tsv` / `lexicon.txt`. `None` = built-in table only.
    pub data_dir: Option<PathBuf>,
    /// Base URL for downloading missing files into `data_dir`.
    pub fetch_url: Option<String>,
    pub fetch_timeout_secs: u64,
}

impl Default for LemmaConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            fetch_url: None,
            fetch_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub lemma: LemmaConfig,
    pub attach_template: String,
    pub header: HeaderMode,
    pub index_cache_capacity: usize,
    pub detect_language: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lemma: LemmaConfig::default(),
            attach_template: DEFAULT_TEMPLATE.to_string(),
            header: HeaderMode::Auto,
            index_cache_capacity: 8,
            detect_language: true,
        }
    }
}

impl EngineConfig {
    /// Read `path` if given (missing fields take defaults), then apply env overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, EngineError> {
        let mut config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path)?;
                let config: Self = serde_json::from_str(&content)
                    .map_err(|e| EngineError::Config(format!("{}: {e}", path.display())))?;
                info!(path = %path.display(), "config loaded");
                config
            }
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Override fields from environment-style lookups. Empty values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(dir) = get(ENV_LEMMA_DIR) {
            debug!(dir = %dir, "lemma dir from environment");
            self.lemma.data_dir = Some(PathBuf::from(dir));
        }
        if let Some(url) = get(ENV_LEMMA_URL) {
            self.lemma.fetch_url = Some(url);
        }
        if let Some(template) = get(ENV_TEMPLATE) {
            self.attach_template = template;
        }
    }

    pub fn template(&self) -> Result<AttachTemplate, TemplateError> {
        AttachTemplate::parse(&self.attach_template)
    }

    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            index_cache_capacity: self.index_cache_capacity,
            detect_language: self.detect_language,
        }
    }
}
