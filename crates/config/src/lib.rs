//! Configuration loading, validation, and management for ragctx.
//!
//! Loads configuration from `~/.ragctx/config.toml` with environment
//! variable overrides. Every knob the pipeline consumes is a plain number,
//! string or list; there is no nested schema beyond one table per stage.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.ragctx/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Ingestion-time chunking
    #[serde(default)]
    pub chunking: ChunkingConfig,

    /// Query-time retrieval
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Prompt token budget
    #[serde(default)]
    pub budget: BudgetConfig,

    /// Token counting
    #[serde(default)]
    pub tokenizer: TokenizerConfig,

    /// Embedding service
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Reference chunk/vector store
    #[serde(default)]
    pub store: StoreConfig,

    /// Default system prompts, per domain
    #[serde(default)]
    pub prompts: PromptConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Upper bound on tokens per chunk
    #[serde(default = "default_chunk_size")]
    pub chunk_size_tokens: usize,

    /// Tokens carried from the tail of one chunk into the next (0 disables)
    #[serde(default = "default_overlap")]
    pub overlap_tokens: usize,
}

fn default_chunk_size() -> usize {
    500
}
fn default_overlap() -> usize {
    50
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size_tokens: default_chunk_size(),
            overlap_tokens: default_overlap(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Hits requested per query
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Per-domain quota for domain-agnostic queries (0 = ceil(top_k / domains))
    #[serde(default)]
    pub per_domain_top_k: usize,

    /// Relevance floor; hits scoring below it are dropped (<= 0 disables)
    #[serde(default = "default_min_score")]
    pub min_score: f32,

    /// Domains that documents are ingested into and searched individually
    #[serde(default = "default_base_domains")]
    pub base_domains: Vec<String>,

    /// Name that selects domain-agnostic fan-out
    #[serde(default = "default_general_domain")]
    pub general_domain: String,

    /// Maximum number of document ids a single query may filter on
    #[serde(default = "default_max_document_filter")]
    pub max_document_filter: usize,

    /// Emit a per-query retrieval trace at debug level
    #[serde(default)]
    pub debug: bool,
}

fn default_top_k() -> usize {
    5
}
fn default_min_score() -> f32 {
    0.2
}
fn default_base_domains() -> Vec<String> {
    vec!["hr".into(), "it".into(), "rpa".into(), "security".into()]
}
fn default_general_domain() -> String {
    "general".into()
}
fn default_max_document_filter() -> usize {
    10
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            per_domain_top_k: 0,
            min_score: default_min_score(),
            base_domains: default_base_domains(),
            general_domain: default_general_domain(),
            max_document_filter: default_max_document_filter(),
            debug: false,
        }
    }
}

impl RetrievalConfig {
    /// Whether `domain` is one of the configured base domains.
    pub fn is_base_domain(&self, domain: &str) -> bool {
        self.base_domains.iter().any(|d| d == domain)
    }
}

/// What gives way first when the aggregate input ceiling is exceeded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrimPriority {
    /// Drop oldest history turns first, then tighten retrieval
    #[default]
    HistoryFirst,
    /// Tighten retrieval first, then drop oldest history turns
    RetrievalFirst,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetConfig {
    #[serde(default = "default_max_history_tokens")]
    pub max_history_tokens: usize,

    #[serde(default = "default_max_retrieval_tokens")]
    pub max_retrieval_tokens: usize,

    /// Aggregate ceiling over system prompt, history, user message and retrieval
    #[serde(default = "default_max_input_tokens")]
    pub max_input_tokens: usize,

    /// Passed through to the generation call untouched
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: usize,

    #[serde(default)]
    pub trim_priority: TrimPriority,
}

fn default_max_history_tokens() -> usize {
    2000
}
fn default_max_retrieval_tokens() -> usize {
    1500
}
fn default_max_input_tokens() -> usize {
    4000
}
fn default_max_output_tokens() -> usize {
    2048
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            max_history_tokens: default_max_history_tokens(),
            max_retrieval_tokens: default_max_retrieval_tokens(),
            max_input_tokens: default_max_input_tokens(),
            max_output_tokens: default_max_output_tokens(),
            trim_priority: TrimPriority::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenizerKind {
    /// Whitespace word count
    #[default]
    Whitespace,
    /// A Hugging Face `tokenizer.json`, from `path` or downloaded from `repo`
    Huggingface,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenizerConfig {
    #[serde(default)]
    pub kind: TokenizerKind,

    /// Local `tokenizer.json`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Hugging Face Hub repository holding a `tokenizer.json`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// "hashing" (offline) or "http" (OpenAI-compatible `/embeddings`)
    #[serde(default = "default_embedding_provider")]
    pub provider: String,

    #[serde(default = "default_dimensions")]
    pub dimensions: usize,

    /// Texts per embedding request during ingestion
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

fn default_embedding_provider() -> String {
    "hashing".into()
}
fn default_dimensions() -> usize {
    384
}
fn default_batch_size() -> usize {
    32
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            dimensions: default_dimensions(),
            batch_size: default_batch_size(),
            api_url: None,
            model: None,
            api_key: None,
        }
    }
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for EmbeddingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingConfig")
            .field("provider", &self.provider)
            .field("dimensions", &self.dimensions)
            .field("batch_size", &self.batch_size)
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("api_key", &redact(&self.api_key))
            .finish()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory of the JSONL reference store (default `~/.ragctx/store`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

/// System prompt used when a request brings none of its own.
///
/// The prompt is `base`, then `Domain Focus:` with the domain's entry (when
/// there is one), then `output_contract`, separated by blank lines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptConfig {
    #[serde(default = "default_base_prompt")]
    pub base: String,

    /// Appended last; empty disables it
    #[serde(default = "default_output_contract")]
    pub output_contract: String,

    /// Focus text keyed by base domain name or the general domain name
    #[serde(default = "default_domain_prompts")]
    pub domains: BTreeMap<String, String>,
}

fn default_base_prompt() -> String {
    "You are a sales assistant AI. Answer clearly and only using the provided context when available.".into()
}
fn default_output_contract() -> String {
    concat!(
        "Return ONLY valid JSON with this exact shape:\n",
        "{\n",
        "  \"answer\": \"<plain text answer>\",\n",
        "  \"follow_up_questions\": [\"q1\", \"q2\"],\n",
        "  \"confidence_score\": 0.0\n",
        "}\n",
        "Rules:\n",
        "- follow_up_questions must be exactly 2 short strings.\n",
        "- confidence_score must be a number between 0 and 1.\n",
        "- Do not include markdown or extra keys.\n",
    )
    .into()
}
fn default_domain_prompts() -> BTreeMap<String, String> {
    [
        (
            "general",
            "You are a generalist sales assistant spanning RPA, IT, HR, and Security. \
             Answer with balanced coverage and note assumptions when domain context is ambiguous.",
        ),
        (
            "rpa",
            "You specialize in RPA automation. Provide concrete automation examples, ROI framing, and rollout steps.",
        ),
        (
            "it",
            "You specialize in IT infrastructure and cloud services. Emphasize reliability, scalability, and managed services.",
        ),
        (
            "hr",
            "You specialize in HR solutions. Focus on talent workflows, payroll tech, and compliance considerations.",
        ),
        (
            "security",
            "You specialize in cybersecurity. Emphasize risk reduction, best practices, and defense-in-depth.",
        ),
    ]
    .into_iter()
    .map(|(domain, prompt)| (domain.to_string(), prompt.to_string()))
    .collect()
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            base: default_base_prompt(),
            output_contract: default_output_contract(),
            domains: default_domain_prompts(),
        }
    }
}

impl PromptConfig {
    /// Compose the system prompt for `domain`. Unknown domains get the base
    /// prompt and the output contract only.
    pub fn system_prompt(&self, domain: &str) -> String {
        let mut prompt = self.base.clone();
        if let Some(focus) = self.domains.get(domain).filter(|f| !f.trim().is_empty()) {
            prompt.push_str("\n\nDomain Focus:\n");
            prompt.push_str(focus);
        }
        if !self.output_contract.trim().is_empty() {
            prompt.push_str("\n\n");
            prompt.push_str(&self.output_contract);
        }
        prompt
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.ragctx/config.toml),
    /// then apply `RAGCTX_*` environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        Self::load_with_env(&config_path)
    }

    /// Load from a specific path, then apply environment overrides.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup (the process environment in
    /// [`AppConfig::load`]).
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        override_parsed(&lookup, "RAGCTX_CHUNK_SIZE", &mut self.chunking.chunk_size_tokens)?;
        override_parsed(&lookup, "RAGCTX_CHUNK_OVERLAP", &mut self.chunking.overlap_tokens)?;
        override_parsed(&lookup, "RAGCTX_TOP_K", &mut self.retrieval.top_k)?;
        override_parsed(&lookup, "RAGCTX_TOP_K_PER_DOMAIN", &mut self.retrieval.per_domain_top_k)?;
        override_parsed(&lookup, "RAGCTX_MIN_SCORE", &mut self.retrieval.min_score)?;
        override_parsed(&lookup, "RAGCTX_MAX_HISTORY_TOKENS", &mut self.budget.max_history_tokens)?;
        override_parsed(
            &lookup,
            "RAGCTX_MAX_RETRIEVAL_TOKENS",
            &mut self.budget.max_retrieval_tokens,
        )?;
        override_parsed(&lookup, "RAGCTX_MAX_INPUT_TOKENS", &mut self.budget.max_input_tokens)?;
        override_parsed(&lookup, "RAGCTX_MAX_OUTPUT_TOKENS", &mut self.budget.max_output_tokens)?;

        if let Some(flag) = lookup("RAGCTX_DEBUG") {
            self.retrieval.debug = matches!(
                flag.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }

        if let Some(base) = lookup("RAGCTX_SYSTEM_PROMPT") {
            self.prompts.base = base;
        }

        if self.embedding.api_key.is_none() {
            self.embedding.api_key = lookup("RAGCTX_EMBEDDING_API_KEY");
        }

        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".ragctx")
    }

    /// Directory of the reference JSONL store.
    pub fn store_dir(&self) -> PathBuf {
        self.store
            .dir
            .clone()
            .unwrap_or_else(|| Self::config_dir().join("store"))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunking.chunk_size_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "chunking.chunk_size_tokens must be > 0".into(),
            ));
        }

        if self.chunking.overlap_tokens >= self.chunking.chunk_size_tokens {
            return Err(ConfigError::ValidationError(
                "chunking.overlap_tokens must be smaller than chunk_size_tokens".into(),
            ));
        }

        if self.retrieval.base_domains.is_empty() {
            return Err(ConfigError::ValidationError(
                "retrieval.base_domains must not be empty".into(),
            ));
        }

        if self.retrieval.is_base_domain(&self.retrieval.general_domain) {
            return Err(ConfigError::ValidationError(format!(
                "retrieval.general_domain '{}' collides with a base domain",
                self.retrieval.general_domain
            )));
        }

        if !self.retrieval.min_score.is_finite() {
            return Err(ConfigError::ValidationError(
                "retrieval.min_score must be a finite number".into(),
            ));
        }

        if self.embedding.dimensions == 0 {
            return Err(ConfigError::ValidationError(
                "embedding.dimensions must be > 0".into(),
            ));
        }

        if self.embedding.batch_size == 0 {
            return Err(ConfigError::ValidationError(
                "embedding.batch_size must be > 0".into(),
            ));
        }

        Ok(())
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        Self::default().to_toml()
    }

    /// Render this configuration as TOML.
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }
}

fn override_parsed<F, T>(lookup: &F, key: &str, slot: &mut T) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    if let Some(raw) = lookup(key) {
        *slot = raw.trim().parse().map_err(|e: T::Err| ConfigError::EnvError {
            var: key.to_string(),
            reason: e.to_string(),
        })?;
    }
    Ok(())
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Invalid value in environment variable {var}: {reason}")]
    EnvError { var: String, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
