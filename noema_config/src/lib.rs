//! # Noema Config
//!
//! Configuration for the noema hypergraph knowledge base.
//!
//! Provides TOML-based configuration parsing and validation for the oracle
//! endpoints, extraction settings, and reasoning defaults.
//!
//! # Configuration Schema
//!
//! The configuration file (`noema.toml`) supports the following sections:
//! - `[models]` — generation and embedding oracle endpoints
//! - `[extraction]` — chunk batching and construction-time resolution
//! - `[reasoning]` — traversal bounds and reasoning-time resolution
//!
//! # Environment Variable Overrides
//!
//! Every field can be overridden via environment variables using the `NOEMA_`
//! prefix and `_` as section separator:
//! - `NOEMA_MODELS_GENERATION_ENDPOINT` → `models.generation_endpoint`
//! - `NOEMA_MODELS_EMBEDDING_ENDPOINT` → `models.embedding_endpoint`
//! - `NOEMA_EXTRACTION_BATCH_WIDTH` → `extraction.batch_width`
//! - `NOEMA_REASONING_MAX_DEPTH` → `reasoning.max_depth`
//! - etc.

use serde::{Deserialize, Serialize};

/// Top-level noema configuration.
///
/// Parsed from `noema.toml` or constructed programmatically. Environment
/// variables with the `NOEMA_` prefix override TOML values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NoemaConfig {
    /// Oracle endpoint settings.
    #[serde(default)]
    pub models: ModelsConfig,
    /// Hypergraph construction settings.
    #[serde(default)]
    pub extraction: ExtractionConfig,
    /// Reasoning/traversal settings.
    #[serde(default)]
    pub reasoning: ReasoningConfig,
}

/// Oracle endpoint configuration.
///
/// Both oracles speak the OpenAI-compatible wire format, so any local or
/// hosted server exposing `/chat/completions` and `/embeddings` works.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    /// Base URL of the text generation endpoint (default: local Ollama).
    #[serde(default = "default_generation_endpoint")]
    pub generation_endpoint: String,
    /// Generation model id.
    #[serde(default = "default_generation_model")]
    pub generation_model: String,
    /// Environment variable holding the generation API key. Empty value or
    /// unset variable means no Authorization header is sent.
    #[serde(default = "default_api_key_env")]
    pub generation_api_key_env: String,
    /// Maximum tokens per generation call (default: 1024).
    #[serde(default = "default_max_tokens")]
    pub generation_max_tokens: u32,
    /// Sampling temperature (default: 0.1).
    #[serde(default = "default_temperature")]
    pub generation_temperature: f32,
    /// Base URL of the embedding endpoint.
    #[serde(default = "default_embedding_endpoint")]
    pub embedding_endpoint: String,
    /// Embedding model id.
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    /// Environment variable holding the embedding API key.
    #[serde(default = "default_api_key_env")]
    pub embedding_api_key_env: String,
    /// HTTP timeout for oracle calls, in seconds (default: 120).
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            generation_endpoint: default_generation_endpoint(),
            generation_model: default_generation_model(),
            generation_api_key_env: default_api_key_env(),
            generation_max_tokens: default_max_tokens(),
            generation_temperature: default_temperature(),
            embedding_endpoint: default_embedding_endpoint(),
            embedding_model: default_embedding_model(),
            embedding_api_key_env: default_api_key_env(),
            request_timeout_secs: default_timeout_secs(),
        }
    }
}

/// Hypergraph construction configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Chunks per extraction batch (default: 4). Chosen so each batch's text
    /// stays within the generation oracle's practical context budget.
    #[serde(default = "default_batch_width")]
    pub batch_width: usize,
    /// Cosine-distance threshold for fuzzy entity resolution during
    /// construction (default: 0.15, i.e. ~0.85 similarity). Tight, to avoid
    /// polluting the graph with near-duplicate concepts.
    #[serde(default = "default_construction_threshold")]
    pub resolution_threshold: f32,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            batch_width: default_batch_width(),
            resolution_threshold: default_construction_threshold(),
        }
    }
}

/// Reasoning/traversal configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningConfig {
    /// Maximum hops in a traversal path (default: 3).
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    /// Stop after this many goal-reaching paths (default: 3).
    #[serde(default = "default_k_paths")]
    pub k_paths: usize,
    /// Minimum shared concepts for hyperedge adjacency (default: 1).
    #[serde(default = "default_intersection_size")]
    pub intersection_size: usize,
    /// Cosine-distance threshold for endpoint resolution (default: 0.4).
    /// Loose: the caller prefers a best-effort guess over a hard failure.
    #[serde(default = "default_reasoning_threshold")]
    pub resolution_threshold: f32,
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            k_paths: default_k_paths(),
            intersection_size: default_intersection_size(),
            resolution_threshold: default_reasoning_threshold(),
        }
    }
}

fn default_generation_endpoint() -> String {
    "http://localhost:11434/v1".to_string()
}
fn default_generation_model() -> String {
    "llama3.1:8b".to_string()
}
fn default_api_key_env() -> String {
    "NOEMA_API_KEY".to_string()
}
fn default_max_tokens() -> u32 {
    1024
}
fn default_temperature() -> f32 {
    0.1
}
fn default_embedding_endpoint() -> String {
    "http://localhost:11434/v1".to_string()
}
fn default_embedding_model() -> String {
    "nomic-embed-text".to_string()
}
fn default_timeout_secs() -> u64 {
    120
}
fn default_batch_width() -> usize {
    4
}
fn default_construction_threshold() -> f32 {
    0.15
}
fn default_max_depth() -> usize {
    3
}
fn default_k_paths() -> usize {
    3
}
fn default_intersection_size() -> usize {
    1
}
fn default_reasoning_threshold() -> f32 {
    0.4
}

impl NoemaConfig {
    /// Load configuration from a TOML file, then apply environment overrides.
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read config file '{}': {}", path, e))?;
        Self::parse_toml(&contents)
    }

    /// Parse configuration from a TOML string, then apply environment overrides.
    pub fn parse_toml(toml_str: &str) -> anyhow::Result<Self> {
        let mut config: NoemaConfig = toml::from_str(toml_str)
            .map_err(|e| anyhow::anyhow!("Invalid config TOML: {}", e))?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply `NOEMA_*` environment variable overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("NOEMA_MODELS_GENERATION_ENDPOINT") {
            self.models.generation_endpoint = v;
        }
        if let Ok(v) = std::env::var("NOEMA_MODELS_GENERATION_MODEL") {
            self.models.generation_model = v;
        }
        if let Ok(v) = std::env::var("NOEMA_MODELS_GENERATION_API_KEY_ENV") {
            self.models.generation_api_key_env = v;
        }
        if let Ok(v) = std::env::var("NOEMA_MODELS_GENERATION_MAX_TOKENS") {
            if let Ok(parsed) = v.parse() {
                self.models.generation_max_tokens = parsed;
            }
        }
        if let Ok(v) = std::env::var("NOEMA_MODELS_GENERATION_TEMPERATURE") {
            if let Ok(parsed) = v.parse() {
                self.models.generation_temperature = parsed;
            }
        }
        if let Ok(v) = std::env::var("NOEMA_MODELS_EMBEDDING_ENDPOINT") {
            self.models.embedding_endpoint = v;
        }
        if let Ok(v) = std::env::var("NOEMA_MODELS_EMBEDDING_MODEL") {
            self.models.embedding_model = v;
        }
        if let Ok(v) = std::env::var("NOEMA_MODELS_EMBEDDING_API_KEY_ENV") {
            self.models.embedding_api_key_env = v;
        }
        if let Ok(v) = std::env::var("NOEMA_MODELS_REQUEST_TIMEOUT_SECS") {
            if let Ok(parsed) = v.parse() {
                self.models.request_timeout_secs = parsed;
            }
        }
        if let Ok(v) = std::env::var("NOEMA_EXTRACTION_BATCH_WIDTH") {
            if let Ok(parsed) = v.parse() {
                self.extraction.batch_width = parsed;
            }
        }
        if let Ok(v) = std::env::var("NOEMA_EXTRACTION_RESOLUTION_THRESHOLD") {
            if let Ok(parsed) = v.parse() {
                self.extraction.resolution_threshold = parsed;
            }
        }
        if let Ok(v) = std::env::var("NOEMA_REASONING_MAX_DEPTH") {
            if let Ok(parsed) = v.parse() {
                self.reasoning.max_depth = parsed;
            }
        }
        if let Ok(v) = std::env::var("NOEMA_REASONING_K_PATHS") {
            if let Ok(parsed) = v.parse() {
                self.reasoning.k_paths = parsed;
            }
        }
        if let Ok(v) = std::env::var("NOEMA_REASONING_INTERSECTION_SIZE") {
            if let Ok(parsed) = v.parse() {
                self.reasoning.intersection_size = parsed;
            }
        }
        if let Ok(v) = std::env::var("NOEMA_REASONING_RESOLUTION_THRESHOLD") {
            if let Ok(parsed) = v.parse() {
                self.reasoning.resolution_threshold = parsed;
            }
        }
    }

    /// Validate field ranges.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.extraction.batch_width == 0 {
            anyhow::bail!("extraction.batch_width must be at least 1");
        }
        for (label, threshold) in [
            (
                "extraction.resolution_threshold",
                self.extraction.resolution_threshold,
            ),
            (
                "reasoning.resolution_threshold",
                self.reasoning.resolution_threshold,
            ),
        ] {
            if !(0.0..=1.0).contains(&threshold) {
                anyhow::bail!("{} must be within [0.0, 1.0], got {}", label, threshold);
            }
        }
        if self.reasoning.max_depth == 0 {
            anyhow::bail!("reasoning.max_depth must be at least 1");
        }
        if self.reasoning.k_paths == 0 {
            anyhow::bail!("reasoning.k_paths must be at least 1");
        }
        if self.reasoning.intersection_size == 0 {
            anyhow::bail!("reasoning.intersection_size must be at least 1");
        }
        Ok(())
    }
}
