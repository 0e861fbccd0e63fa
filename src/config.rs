//! Configuration for the evaluation harness.
//!
//! Supports both environment variables and YAML config file.
//! Environment variables take precedence over config file values.

use crate::error::{EvalError, Result};
use crate::llm::{RateLimit, RateLimitPolicy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};

/// LLM configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL for the OpenAI-compatible API (e.g., "http://localhost:4000")
    pub api_base: String,

    /// API key for authentication (may be empty for local proxies)
    pub api_key: String,

    /// Maximum tokens for response (optional)
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Temperature for generation (optional)
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_max_tokens() -> u32 {
    64
}

fn default_temperature() -> f32 {
    0.0
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_base: String::new(),
            api_key: String::new(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

/// Locations of the processed inputs and evaluation outputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Root data directory; all other paths are relative to it.
    pub root: PathBuf,
    /// Ground-truth question set.
    pub qa_set: PathBuf,
    /// Knowledge-chunk store used by the retriever.
    pub knowledge_chunks: PathBuf,
    /// Directory holding per-model output records.
    pub evals: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("data"),
            qa_set: PathBuf::from("processed/ap_history_qa.json"),
            knowledge_chunks: PathBuf::from("processed/ap_history_concepts.json"),
            evals: PathBuf::from("evals"),
        }
    }
}

impl DataConfig {
    pub fn qa_set_path(&self) -> PathBuf {
        self.root.join(&self.qa_set)
    }

    pub fn knowledge_chunks_path(&self) -> PathBuf {
        self.root.join(&self.knowledge_chunks)
    }

    pub fn evals_root(&self) -> PathBuf {
        self.root.join(&self.evals)
    }
}

/// Embedding and re-ranking model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Sentence-transformers model used to embed chunks and queries.
    pub embedding_model: String,
    /// Cross-encoder model used for re-ranking.
    pub cross_encoder_model: String,
    /// When set, re-ranking goes through this `/rerank` endpoint instead of a local model.
    #[serde(default)]
    pub rerank_api_base: Option<String>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            embedding_model: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
            cross_encoder_model: "cross-encoder/ms-marco-MiniLM-L6-v2".to_string(),
            rerank_api_base: None,
        }
    }
}

/// Models evaluated when none are given on the command line.
pub fn default_models() -> Vec<String> {
    [
        "ollama/granite3.3:2b",
        "ollama/phi4-mini:3.8b",
        "ollama/qwen3:4b",
        "ollama/gemma3:1b",
        "ollama/gemma3:4b",
        "ollama/qwen3:1.7b",
    ]
    .iter()
    .map(|m| m.to_string())
    .collect()
}

/// Full application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// LLM settings
    pub llm: LlmConfig,
    /// Input and output paths
    pub data: DataConfig,
    /// Retrieval models
    pub retrieval: RetrievalConfig,
    /// Per-provider call caps
    pub rate_limits: RateLimitPolicy,
    /// Models to evaluate
    pub models: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm: LlmConfig::default(),
            data: DataConfig::default(),
            retrieval: RetrievalConfig::default(),
            rate_limits: RateLimitPolicy::default(),
            models: default_models(),
        }
    }
}

/// Configuration file structure (YAML format).
#[derive(Debug, Deserialize)]
struct ConfigFile {
    llm: Option<LlmFileSection>,
    data: Option<DataFileSection>,
    retrieval: Option<RetrievalFileSection>,
    rate_limits: Option<RateLimitFileSection>,
    models: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct LlmFileSection {
    api_base: Option<String>,
    api_key: Option<String>,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct DataFileSection {
    root: Option<PathBuf>,
    qa_set: Option<PathBuf>,
    knowledge_chunks: Option<PathBuf>,
    evals: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct RetrievalFileSection {
    embedding_model: Option<String>,
    cross_encoder_model: Option<String>,
    rerank_api_base: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RateLimitFileSection {
    default: Option<RateLimit>,
    providers: Option<BTreeMap<String, RateLimit>>,
}

impl Config {
    /// Load configuration from environment variables and optional config file.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (LLM_API_BASE, LLM_API_KEY, EVAL_DATA_DIR, ...)
    /// 2. Config file (~/.config/history-eval/config.yaml)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        let mut config = Config::default();

        if let Some(config_path) = Self::config_file_path() {
            if config_path.exists() {
                config = Self::load_from_file(&config_path)?;
            }
        }

        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(api_base) = env::var("LLM_API_BASE") {
            self.llm.api_base = api_base;
        }

        if let Ok(api_key) = env::var("LLM_API_KEY") {
            self.llm.api_key = api_key;
        }

        if let Ok(max_tokens) = env::var("LLM_MAX_TOKENS") {
            if let Ok(tokens) = max_tokens.parse() {
                self.llm.max_tokens = tokens;
            }
        }

        if let Ok(temperature) = env::var("LLM_TEMPERATURE") {
            if let Ok(temp) = temperature.parse() {
                self.llm.temperature = temp;
            }
        }

        if let Ok(root) = env::var("EVAL_DATA_DIR") {
            self.data.root = PathBuf::from(root);
        }

        if let Ok(rerank) = env::var("RERANK_API_BASE") {
            self.retrieval.rerank_api_base = Some(rerank).filter(|r| !r.is_empty());
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| EvalError::io(path, e))?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML text, filling gaps with defaults.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let file_config: ConfigFile = serde_yaml::from_str(content)
            .map_err(|e| EvalError::Config(format!("Failed to parse config file: {}", e)))?;

        let mut config = Config::default();

        if let Some(llm) = file_config.llm {
            if let Some(api_base) = llm.api_base {
                config.llm.api_base = api_base;
            }
            if let Some(api_key) = llm.api_key {
                config.llm.api_key = api_key;
            }
            if let Some(max_tokens) = llm.max_tokens {
                config.llm.max_tokens = max_tokens;
            }
            if let Some(temperature) = llm.temperature {
                config.llm.temperature = temperature;
            }
        }

        if let Some(data) = file_config.data {
            if let Some(root) = data.root {
                config.data.root = root;
            }
            if let Some(qa_set) = data.qa_set {
                config.data.qa_set = qa_set;
            }
            if let Some(chunks) = data.knowledge_chunks {
                config.data.knowledge_chunks = chunks;
            }
            if let Some(evals) = data.evals {
                config.data.evals = evals;
            }
        }

        if let Some(retrieval) = file_config.retrieval {
            if let Some(model) = retrieval.embedding_model {
                config.retrieval.embedding_model = model;
            }
            if let Some(model) = retrieval.cross_encoder_model {
                config.retrieval.cross_encoder_model = model;
            }
            config.retrieval.rerank_api_base = retrieval.rerank_api_base;
        }

        if let Some(limits) = file_config.rate_limits {
            if let Some(default) = limits.default {
                config.rate_limits.default = default;
            }
            if let Some(providers) = limits.providers {
                config.rate_limits.providers = providers;
            }
        }

        if let Some(models) = file_config.models {
            config.models = models;
        }

        Ok(config)
    }

    /// Get the default config file path.
    pub fn config_file_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "history-eval")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Validate that required configuration is present.
    pub fn validate(&self) -> Result<()> {
        if self.llm.api_base.is_empty() {
            return Err(EvalError::Config(
                "LLM API base URL is required. Set LLM_API_BASE environment variable or add to config file.".to_string()
            ));
        }

        if self.models.is_empty() {
            return Err(EvalError::Config(
                "At least one model is required. Add a `models` list to the config file."
                    .to_string(),
            ));
        }

        self.rate_limits.validate()?;

        Ok(())
    }

    /// Create a config from explicit values (useful for testing).
    pub fn with_llm(api_base: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            llm: LlmConfig {
                api_base: api_base.into(),
                api_key: api_key.into(),
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.llm.api_base.is_empty());
        assert_eq!(config.llm.temperature, 0.0);
        assert_eq!(config.models.len(), 6);
        assert_eq!(
            config.data.qa_set_path(),
            PathBuf::from("data/processed/ap_history_qa.json")
        );
        assert_eq!(config.data.evals_root(), PathBuf::from("data/evals"));
    }

    #[test]
    fn test_validate_fails_without_required_fields() {
        let config = Config::default();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_with_llm() {
        let config = Config::with_llm("http://localhost:4000", "");
        assert_eq!(config.llm.api_base, "http://localhost:4000");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_yaml_overrides_sections() {
        let yaml = r#"
llm:
  api_base: "http://proxy:4000"
data:
  root: "/srv/eval"
retrieval:
  rerank_api_base: "http://rerank:8080"
rate_limits:
  providers:
    anthropic:
      max_calls: 5
      window_secs: 30
models:
  - "gemini/gemini-2.0-flash"
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.llm.api_base, "http://proxy:4000");
        assert_eq!(config.data.root, PathBuf::from("/srv/eval"));
        assert_eq!(
            config.data.knowledge_chunks_path(),
            PathBuf::from("/srv/eval/processed/ap_history_concepts.json")
        );
        assert_eq!(
            config.retrieval.rerank_api_base.as_deref(),
            Some("http://rerank:8080")
        );
        assert_eq!(config.models, vec!["gemini/gemini-2.0-flash".to_string()]);

        let limit = config.rate_limits.limit_for("anthropic/claude");
        assert_eq!(limit.max_calls, 5);
        assert_eq!(limit.window(), Duration::from_secs(30));
        // Replacing the provider table drops the built-in hosted entries.
        assert_eq!(config.rate_limits.limit_for("gemini/x").max_calls, 60);
    }

    #[test]
    fn test_from_yaml_rejects_garbage() {
        assert!(Config::from_yaml("llm: [unclosed").is_err());
    }
}
