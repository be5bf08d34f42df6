//! Pipeline configuration
//!
//! Resolution order, lowest to highest: built-in defaults, optional JSON config
//! file, environment (including `.env`, loaded by the binary), CLI flags.

use crate::error::{CanonError, Result};
use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";
pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub timeout_secs: u64,
    pub max_retries: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 60,
            max_retries: 2,
        }
    }
}

impl LlmConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default().with_max_retries(self.max_retries)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub inventory_path: PathBuf,
    pub taxonomy_path: PathBuf,
    pub output_path: PathBuf,
    pub mapping_dir: PathBuf,
    pub category_store_file: String,
    pub manufacturer_store_file: String,
    pub llm: LlmConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            inventory_path: PathBuf::from("raw_inventory.json"),
            taxonomy_path: PathBuf::from("taxonomy.json"),
            output_path: PathBuf::from("processed_inventory.json"),
            mapping_dir: PathBuf::from("mapping_folder"),
            category_store_file: "category_mapping.json".to_string(),
            manufacturer_store_file: "manufacturer_mapping.json".to_string(),
            llm: LlmConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Read a JSON config file. Omitted fields keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| CanonError::Config(format!("Failed to read config {}: {}", path.display(), e)))?;
        serde_json::from_str(&content)
            .map_err(|e| CanonError::Config(format!("Invalid config {}: {}", path.display(), e)))
    }

    /// Overlay environment variables onto this config.
    pub fn with_env(self) -> Self {
        self.with_env_from(|key| std::env::var(key).ok())
    }

    pub(crate) fn with_env_from(mut self, get: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(key) = get("OPENAI_API_KEY").or_else(|| get("GROQ_API_KEY")) {
            if !key.trim().is_empty() {
                self.llm.api_key = Some(key);
            }
        }
        if let Some(model) = get("OPENAI_MODEL") {
            self.llm.model = model;
        }
        if let Some(base_url) = get("OPENAI_BASE_URL") {
            self.llm.base_url = base_url;
        }
        if let Some(dir) = get("MAPPING_DIR") {
            self.mapping_dir = PathBuf::from(dir);
        }
        self
    }

    pub fn category_store_path(&self) -> PathBuf {
        self.mapping_dir.join(&self.category_store_file)
    }

    pub fn manufacturer_store_path(&self) -> PathBuf {
        self.mapping_dir.join(&self.manufacturer_store_file)
    }
}
