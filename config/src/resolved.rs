//! Resolved configuration types.
//!
//! Existence of a value is the proof of its validity: thresholds are in
//! range, windows and timeouts are non-zero, paths are non-empty. The raw
//! structs below mirror the TOML shape and are resolved via `TryFrom` at
//! the deserialization boundary.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {message}")]
    Io { path: String, message: String },
    #[error("failed to parse config: {0}")]
    Parse(String),
    #[error("similarity_threshold must be in (0, 1], got {0}")]
    ThresholdOutOfRange(f32),
    #[error("web_default_confidence must be in [0, 1], got {0}")]
    DefaultConfidenceOutOfRange(f32),
    #[error("{field} must be greater than zero")]
    ZeroDuration { field: &'static str },
    #[error("pair_concurrency must be greater than zero")]
    ZeroConcurrency,
    #[error("top_k must be greater than zero")]
    ZeroTopK,
    #[error("{field} must not be empty")]
    EmptyField { field: &'static str },
}

// ---------------------------------------------------------------------------
// Raw TOML shape (private)
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    policy: RawPolicy,
    #[serde(default)]
    model: RawModel,
    #[serde(default)]
    search: RawSearch,
    #[serde(default)]
    storage: RawStorage,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPolicy {
    dedup_tolerance_secs: Option<u64>,
    active_window_secs: Option<u64>,
    similarity_threshold: Option<f32>,
    top_k: Option<usize>,
    web_timeout_secs: Option<u64>,
    web_default_confidence: Option<f32>,
    pair_concurrency: Option<usize>,
    idle_eviction_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawModel {
    endpoint: Option<String>,
    chat_model: Option<String>,
    embed_model: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSearch {
    endpoint: Option<String>,
    api_key_env: Option<String>,
    result_count: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawStorage {
    db_path: Option<PathBuf>,
    corpus_path: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Resolved types (public)
// ---------------------------------------------------------------------------

/// Policy knobs for the turn-processing core.
#[derive(Debug, Clone)]
pub struct PolicyConfig {
    /// Two mentions of the same substance in the same thread closer than
    /// this are treated as one (log append is idempotent inside it).
    pub dedup_tolerance: Duration,
    /// Trailing window over which logged substances count as "active" for
    /// interaction checks.
    pub active_window: Duration,
    /// Minimum similarity score for a semantic hit to count as usable
    /// evidence.
    pub similarity_threshold: f32,
    /// How many candidates to pull from the similarity index per query.
    pub top_k: usize,
    /// Time limit for a single web evidence call before the pair is
    /// marked unresolved.
    pub web_timeout: Duration,
    /// Confidence assigned to web evidence when the tool reports no
    /// relevance of its own.
    pub web_default_confidence: f32,
    /// Upper bound on concurrently resolved pairs within one turn.
    pub pair_concurrency: usize,
    /// Threads idle longer than this are eligible for eviction.
    pub idle_eviction: Duration,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            dedup_tolerance: Duration::from_secs(1800),
            active_window: Duration::from_secs(24 * 3600),
            similarity_threshold: 0.78,
            top_k: 3,
            web_timeout: Duration::from_secs(8),
            web_default_confidence: 0.2,
            pair_concurrency: 4,
            idle_eviction: Duration::from_secs(1800),
        }
    }
}

/// Language-model endpoints (Ollama-style HTTP API).
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub endpoint: String,
    pub chat_model: String,
    pub embed_model: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:11434".to_string(),
            chat_model: "qwen3:8b".to_string(),
            embed_model: "nomic-embed-text".to_string(),
        }
    }
}

/// Web evidence tool endpoint. The API key is read from the named
/// environment variable, never stored in the file.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub endpoint: String,
    pub api_key_env: String,
    pub result_count: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.search.brave.com/res/v1/web/search".to_string(),
            api_key_env: "BRAVE_API_KEY".to_string(),
            result_count: 5,
        }
    }
}

/// On-disk locations.
#[derive(Debug, Clone, Default)]
pub struct StorageConfig {
    /// SQLite substance log. `None` selects `<data dir>/kava.db`.
    pub db_path: Option<PathBuf>,
    /// Curated interaction corpus (TOML). `None` selects the bundled demo
    /// corpus next to the binary.
    pub corpus_path: Option<PathBuf>,
}

/// Fully resolved application configuration.
#[derive(Debug, Clone, Default)]
pub struct KavaConfig {
    pub policy: PolicyConfig,
    pub model: ModelConfig,
    pub search: SearchConfig,
    pub storage: StorageConfig,
}

impl KavaConfig {
    /// Load and validate configuration from a TOML file. A missing file is
    /// not an error: defaults apply.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::from_toml(&text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(ConfigError::Io {
                path: path.display().to_string(),
                message: e.to_string(),
            }),
        }
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Self::try_from(raw)
    }
}

impl TryFrom<RawConfig> for KavaConfig {
    type Error = ConfigError;

    fn try_from(raw: RawConfig) -> Result<Self, Self::Error> {
        let defaults = PolicyConfig::default();

        let similarity_threshold = raw
            .policy
            .similarity_threshold
            .unwrap_or(defaults.similarity_threshold);
        if !(similarity_threshold > 0.0 && similarity_threshold <= 1.0) {
            return Err(ConfigError::ThresholdOutOfRange(similarity_threshold));
        }

        let web_default_confidence = raw
            .policy
            .web_default_confidence
            .unwrap_or(defaults.web_default_confidence);
        if !(0.0..=1.0).contains(&web_default_confidence) {
            return Err(ConfigError::DefaultConfidenceOutOfRange(
                web_default_confidence,
            ));
        }

        let policy = PolicyConfig {
            dedup_tolerance: nonzero_secs(
                raw.policy.dedup_tolerance_secs,
                defaults.dedup_tolerance,
                "dedup_tolerance_secs",
            )?,
            active_window: nonzero_secs(
                raw.policy.active_window_secs,
                defaults.active_window,
                "active_window_secs",
            )?,
            similarity_threshold,
            top_k: match raw.policy.top_k {
                Some(0) => return Err(ConfigError::ZeroTopK),
                Some(k) => k,
                None => defaults.top_k,
            },
            web_timeout: nonzero_secs(
                raw.policy.web_timeout_secs,
                defaults.web_timeout,
                "web_timeout_secs",
            )?,
            web_default_confidence,
            pair_concurrency: match raw.policy.pair_concurrency {
                Some(0) => return Err(ConfigError::ZeroConcurrency),
                Some(n) => n,
                None => defaults.pair_concurrency,
            },
            idle_eviction: nonzero_secs(
                raw.policy.idle_eviction_secs,
                defaults.idle_eviction,
                "idle_eviction_secs",
            )?,
        };

        let model_defaults = ModelConfig::default();
        let model = ModelConfig {
            endpoint: nonempty(raw.model.endpoint, model_defaults.endpoint, "model.endpoint")?,
            chat_model: nonempty(
                raw.model.chat_model,
                model_defaults.chat_model,
                "model.chat_model",
            )?,
            embed_model: nonempty(
                raw.model.embed_model,
                model_defaults.embed_model,
                "model.embed_model",
            )?,
        };

        let search_defaults = SearchConfig::default();
        let search = SearchConfig {
            endpoint: nonempty(
                raw.search.endpoint,
                search_defaults.endpoint,
                "search.endpoint",
            )?,
            api_key_env: nonempty(
                raw.search.api_key_env,
                search_defaults.api_key_env,
                "search.api_key_env",
            )?,
            result_count: raw
                .search
                .result_count
                .unwrap_or(search_defaults.result_count)
                .max(1),
        };

        Ok(Self {
            policy,
            model,
            search,
            storage: StorageConfig {
                db_path: raw.storage.db_path,
                corpus_path: raw.storage.corpus_path,
            },
        })
    }
}

fn nonzero_secs(
    raw: Option<u64>,
    default: Duration,
    field: &'static str,
) -> Result<Duration, ConfigError> {
    match raw {
        Some(0) => Err(ConfigError::ZeroDuration { field }),
        Some(secs) => Ok(Duration::from_secs(secs)),
        None => Ok(default),
    }
}

fn nonempty(
    raw: Option<String>,
    default: String,
    field: &'static str,
) -> Result<String, ConfigError> {
    match raw {
        Some(value) if value.trim().is_empty() => Err(ConfigError::EmptyField { field }),
        Some(value) => Ok(value),
        None => Ok(default),
    }
}
