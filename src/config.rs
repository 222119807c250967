use crate::constants::{DEFAULT_CHAT_MODEL, DEFAULT_OPENAI_API_BASE, DEFAULT_VISION_MODEL};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application configuration loaded from settings.toml
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub openai: OpenAiConfig,
    #[serde(default)]
    pub clip: ClipConfig,
    #[serde(default)]
    pub meilisearch: MeilisearchConfig,
    #[serde(default)]
    pub annotator: AnnotatorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// API key; falls back to the OPENAI_API_KEY environment variable
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_vision_model")]
    pub vision_model: String,
    #[serde(default = "default_chat_model")]
    pub chat_model: String,
}

fn default_api_base() -> String {
    DEFAULT_OPENAI_API_BASE.to_string()
}

fn default_vision_model() -> String {
    DEFAULT_VISION_MODEL.to_string()
}

fn default_chat_model() -> String {
    DEFAULT_CHAT_MODEL.to_string()
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            api_key: None,
            vision_model: default_vision_model(),
            chat_model: default_chat_model(),
        }
    }
}

/// CLIP-style embedding server (joint text/image space)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClipConfig {
    pub url: String,
    #[serde(default = "default_embedding_dims")]
    pub dims: usize,
}

fn default_embedding_dims() -> usize {
    256 // uform-vl-english-small dimension
}

impl Default for ClipConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8686".to_string(),
            dims: default_embedding_dims(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeilisearchConfig {
    pub url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    pub index_name: String,
}

impl Default for MeilisearchConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:7700".to_string(),
            api_key: None,
            index_name: "stylesync".to_string(),
        }
    }
}

/// Knobs for the batch annotation pipeline.
/// Everything the pipeline tunes lives here rather than in code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotatorConfig {
    /// Maximum simultaneous in-flight labeling requests
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Cap on the number of images sampled per run; 0 means no cap
    #[serde(default = "default_sample_size")]
    pub sample_size: usize,
    /// Seed for the sampling shuffle; None uses OS entropy
    #[serde(default)]
    pub shuffle_seed: Option<u64>,
    /// Attempts per image, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the first retry, in seconds
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
    /// Growth factor applied to the delay per subsequent retry (1.0 = fixed)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    /// Random jitter applied to each delay, as a fraction of the delay
    #[serde(default = "default_jitter")]
    pub jitter: f64,
    /// Per-request HTTP timeout, in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Overall batch deadline in seconds; None runs to completion
    #[serde(default)]
    pub batch_deadline_secs: Option<u64>,
}

fn default_concurrency() -> usize {
    7
}

fn default_sample_size() -> usize {
    500
}

fn default_max_attempts() -> u32 {
    4
}

fn default_retry_delay_secs() -> u64 {
    5
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_jitter() -> f64 {
    0.2
}

fn default_request_timeout_secs() -> u64 {
    120
}

impl Default for AnnotatorConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            sample_size: default_sample_size(),
            shuffle_seed: None,
            max_attempts: default_max_attempts(),
            retry_delay_secs: default_retry_delay_secs(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: default_jitter(),
            request_timeout_secs: default_request_timeout_secs(),
            batch_deadline_secs: None,
        }
    }
}

impl AnnotatorConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn batch_deadline(&self) -> Option<Duration> {
        self.batch_deadline_secs.map(Duration::from_secs)
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Config = toml::from_str(&content)
            .context("Failed to parse config file")?;

        Ok(config)
    }

    /// Load configuration from default location or return defaults
    pub fn load() -> Result<Self> {
        let default_paths = [
            PathBuf::from("config/settings.toml"),
            PathBuf::from("./config/settings.toml"),
            PathBuf::from("~/.config/stylesync/settings.toml"),
        ];

        for path in &default_paths {
            if path.exists() {
                return Self::from_file(path);
            }
        }

        Ok(Self::default())
    }

    /// Get OpenAI API key from config or environment variable
    pub fn openai_api_key(&self) -> Option<String> {
        self.openai
            .api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
    }

    /// Get Meilisearch API key from config or environment variable
    pub fn meilisearch_api_key(&self) -> Option<String> {
        self.meilisearch
            .api_key
            .clone()
            .or_else(|| std::env::var("MEILI_MASTER_KEY").ok())
    }
}
