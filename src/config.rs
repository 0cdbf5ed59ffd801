use serde::{Deserialize, Serialize};
use std::path::Path;
use crate::error::{Result, SubtransError};

/// Environment variable consulted when no API key is configured
pub const API_KEY_ENV: &str = "SUBTRANS_API_KEY";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub translate: TranslateConfig,
    pub batch: BatchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslateConfig {
    /// Chat completions endpoint URL
    pub endpoint: String,
    /// Model name sent with every request
    pub model: String,
    /// Bearer token; falls back to SUBTRANS_API_KEY when unset
    pub api_key: Option<String>,
    /// Language the subtitles are translated into
    pub target_language: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Nucleus sampling mass
    pub top_p: f32,
    /// Upper bound on generated tokens per request
    pub max_tokens: u32,
    /// Request timeout ceiling in seconds
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Batch size used for the first batch
    pub base_size: usize,
    /// Smallest batch size adaptive shrinking may reach
    pub min_size: usize,
    /// Largest batch size adaptive growth may reach
    pub max_size: usize,
    /// Whole-batch attempts before degrading to per-item translation
    pub max_retries: u32,
    /// Backoff unit; retry `n` waits `backoff_base_ms * 2^n`
    pub backoff_base_ms: u64,
}

impl Default for TranslateConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.deepseek.com/v1/chat/completions".to_string(),
            model: "deepseek-chat".to_string(),
            api_key: None,
            target_language: "Simplified Chinese".to_string(),
            temperature: 0.1,
            top_p: 0.85,
            max_tokens: 4096,
            timeout_secs: 120,
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            base_size: 15,
            min_size: 3,
            max_size: 20,
            max_retries: 3,
            backoff_base_ms: 1000,
        }
    }
}

impl TranslateConfig {
    /// Resolve the bearer token from the config or the environment
    pub fn resolve_api_key(&self) -> Result<String> {
        if let Some(key) = self.api_key.as_deref().filter(|k| !k.trim().is_empty()) {
            return Ok(key.trim().to_string());
        }

        match std::env::var(API_KEY_ENV) {
            Ok(key) if !key.trim().is_empty() => Ok(key.trim().to_string()),
            _ => Err(SubtransError::Config(format!(
                "No API key configured. Set translate.api_key or the {} environment variable",
                API_KEY_ENV
            ))),
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SubtransError::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| SubtransError::Config(format!("Failed to parse config file: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| SubtransError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| SubtransError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let batch = &self.batch;

        if batch.min_size == 0 {
            return Err(SubtransError::Config("batch.min_size must be at least 1".to_string()));
        }
        if batch.min_size > batch.max_size {
            return Err(SubtransError::Config(format!(
                "batch.min_size ({}) exceeds batch.max_size ({})",
                batch.min_size, batch.max_size
            )));
        }
        if batch.base_size < batch.min_size || batch.base_size > batch.max_size {
            return Err(SubtransError::Config(format!(
                "batch.base_size ({}) must lie within [{}, {}]",
                batch.base_size, batch.min_size, batch.max_size
            )));
        }
        if batch.max_retries == 0 {
            return Err(SubtransError::Config("batch.max_retries must be at least 1".to_string()));
        }
        if self.translate.timeout_secs == 0 {
            return Err(SubtransError::Config(
                "translate.timeout_secs must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}
