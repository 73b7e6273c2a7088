use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::path::{Path, PathBuf};
use url::Url;

/// Column keys that look like identifiers
pub const DEFAULT_LOCKED_KEY_PATTERN: &str = r"(?i)(^|_)(id|uuid|guid|key|code|sku)$";

/// Application configuration module
/// This module handles loading, validating and saving configuration settings.
/// Backends are listed in priority order; the hub falls through them top to bottom.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Source language code (ISO)
    pub source_language: String,

    /// Target language code (ISO)
    pub target_language: String,

    /// Translation config
    #[serde(default)]
    pub translation: TranslationConfig,

    /// Orchestrator behaviour
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    /// Glossary substitutions enforced on translated text
    #[serde(default)]
    pub glossary: Vec<GlossaryEntry>,

    /// Snapshot database location, defaults under the user data dir
    #[serde(default)]
    pub snapshot_db_path: Option<PathBuf>,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Translation backend type
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    // @backend: OpenAI chat completions
    #[default]
    OpenAI,
    // @backend: Anthropic messages
    Anthropic,
    // @backend: Ollama generate
    Ollama,
    // @backend: LM Studio (OpenAI-compatible local server)
    LMStudio,
}

impl BackendKind {
    // @returns: Capitalized backend name
    pub fn display_name(&self) -> &str {
        match self {
            Self::OpenAI => "OpenAI",
            Self::Anthropic => "Anthropic",
            Self::Ollama => "Ollama",
            Self::LMStudio => "LM Studio",
        }
    }

    // @returns: Lowercase backend identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAI => "openai",
            Self::Anthropic => "anthropic",
            Self::Ollama => "ollama",
            Self::LMStudio => "lmstudio",
        }
    }

    /// Whether the backend is useless without an API key
    pub fn requires_api_key(&self) -> bool {
        matches!(self, Self::OpenAI | Self::Anthropic)
    }

    /// Environment variable consulted when the config holds no key
    pub fn api_key_env_var(&self) -> Option<&'static str> {
        match self {
            Self::OpenAI => Some("OPENAI_API_KEY"),
            Self::Anthropic => Some("ANTHROPIC_API_KEY"),
            _ => None,
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for BackendKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "anthropic" => Ok(Self::Anthropic),
            "ollama" => Ok(Self::Ollama),
            "lmstudio" => Ok(Self::LMStudio),
            _ => Err(anyhow!("Invalid backend type: {}", s)),
        }
    }
}

/// One entry of the backend priority list
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BackendConfig {
    // @field: Backend type identifier
    #[serde(rename = "type")]
    pub kind: BackendKind,

    // @field: Model name
    #[serde(default = "String::new")]
    pub model: String,

    // @field: API key
    #[serde(default = "String::new")]
    pub api_key: String,

    // @field: Service URL
    #[serde(default = "String::new")]
    pub endpoint: String,

    // @field: Timeout seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    // @field: Disabled backends are skipped entirely
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl BackendConfig {
    // @param kind: Backend enum
    // @returns: Backend config with defaults
    pub fn new(kind: BackendKind) -> Self {
        Self {
            kind,
            model: String::new(),
            api_key: String::new(),
            endpoint: String::new(),
            timeout_secs: match kind {
                BackendKind::Anthropic => default_anthropic_timeout_secs(),
                _ => default_timeout_secs(),
            },
            enabled: true,
        }
    }

    /// Model, falling back to the backend's default
    pub fn resolved_model(&self) -> String {
        if !self.model.is_empty() {
            return self.model.clone();
        }
        match self.kind {
            BackendKind::OpenAI => default_openai_model(),
            BackendKind::Anthropic => default_anthropic_model(),
            BackendKind::Ollama => default_ollama_model(),
            BackendKind::LMStudio => default_lmstudio_model(),
        }
    }

    /// Endpoint, falling back to the backend's default
    pub fn resolved_endpoint(&self) -> String {
        if !self.endpoint.is_empty() {
            return self.endpoint.clone();
        }
        match self.kind {
            BackendKind::OpenAI => default_openai_endpoint(),
            BackendKind::Anthropic => default_anthropic_endpoint(),
            BackendKind::Ollama => default_ollama_endpoint(),
            BackendKind::LMStudio => default_lmstudio_endpoint(),
        }
    }

    /// API key from the file, or from the backend's environment variable
    pub fn resolved_api_key(&self) -> String {
        if !self.api_key.is_empty() {
            return self.api_key.clone();
        }
        self.kind
            .api_key_env_var()
            .and_then(|var| std::env::var(var).ok())
            .unwrap_or_default()
    }
}

/// Translation service configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TranslationConfig {
    /// Backends in priority order
    #[serde(default = "default_backends")]
    pub backends: Vec<BackendConfig>,

    /// Common translation settings
    #[serde(default)]
    pub common: TranslationCommonConfig,
}

impl TranslationConfig {
    /// Enabled backends in priority order
    pub fn enabled_backends(&self) -> impl Iterator<Item = &BackendConfig> {
        self.backends.iter().filter(|b| b.enabled)
    }

    /// Configuration for a backend kind
    pub fn backend_config(&self, kind: BackendKind) -> Option<&BackendConfig> {
        self.backends.iter().find(|b| b.kind == kind)
    }
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            backends: default_backends(),
            common: TranslationCommonConfig::default(),
        }
    }
}

/// Common translation settings applicable to all backends
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TranslationCommonConfig {
    /// Rows per batch on a full run
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Rows per batch on a targeted retry
    #[serde(default = "default_retry_batch_size")]
    pub retry_batch_size: usize,

    /// Pause between consecutive batches in milliseconds
    #[serde(default = "default_inter_batch_delay_ms")]
    pub inter_batch_delay_ms: u64,

    /// Retry count per backend before falling through
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    /// Linear backoff base for retries (in milliseconds)
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Temperature parameter for text generation (0.0 to 1.0)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens requested per completion
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Batches held by the result cache
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

impl Default for TranslationCommonConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            retry_batch_size: default_retry_batch_size(),
            inter_batch_delay_ms: default_inter_batch_delay_ms(),
            retry_count: default_retry_count(),
            retry_backoff_ms: default_retry_backoff_ms(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            cache_capacity: default_cache_capacity(),
        }
    }
}

/// Orchestrator settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OrchestratorConfig {
    /// Column keys matching this pattern are never translated
    #[serde(default = "default_locked_key_pattern")]
    pub locked_key_pattern: String,

    /// Skip cells that already pass the target-language check
    #[serde(default)]
    pub selective: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            locked_key_pattern: default_locked_key_pattern(),
            selective: false,
        }
    }
}

/// A glossary substitution
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct GlossaryEntry {
    /// Term as a backend may render it
    pub from: String,
    /// Required rendering
    pub to: String,
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_level_filter(&self) -> log::LevelFilter {
        match self {
            Self::Error => log::LevelFilter::Error,
            Self::Warn => log::LevelFilter::Warn,
            Self::Info => log::LevelFilter::Info,
            Self::Debug => log::LevelFilter::Debug,
            Self::Trace => log::LevelFilter::Trace,
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "error" => Ok(Self::Error),
            "warn" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            _ => Err(anyhow!("Invalid log level: {}", s)),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_anthropic_timeout_secs() -> u64 {
    60
}

fn default_batch_size() -> usize {
    5
}

fn default_retry_batch_size() -> usize {
    3
}

fn default_inter_batch_delay_ms() -> u64 {
    300
}

fn default_retry_count() -> u32 {
    2
}

fn default_retry_backoff_ms() -> u64 {
    1000 // multiplied by the attempt number
}

fn default_temperature() -> f32 {
    0.2
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_cache_capacity() -> usize {
    512
}

fn default_true() -> bool {
    true
}

fn default_locked_key_pattern() -> String {
    DEFAULT_LOCKED_KEY_PATTERN.to_string()
}

fn default_openai_endpoint() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_anthropic_endpoint() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_ollama_endpoint() -> String {
    "http://localhost:11434".to_string()
}

fn default_lmstudio_endpoint() -> String {
    // LM Studio default server (OpenAI compatible) runs on port 1234 under /v1
    "http://localhost:1234/v1".to_string()
}

fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_anthropic_model() -> String {
    "claude-3-haiku-20240307".to_string()
}

fn default_ollama_model() -> String {
    "llama3".to_string()
}

fn default_lmstudio_model() -> String {
    // Placeholder; users should set to the loaded model name in LM Studio
    "local-model".to_string()
}

fn default_backends() -> Vec<BackendConfig> {
    vec![
        BackendConfig::new(BackendKind::OpenAI),
        BackendConfig::new(BackendKind::Anthropic),
        BackendConfig::new(BackendKind::Ollama),
    ]
}

impl Config {
    /// Load from a JSON file, writing defaults first when the file is missing
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if !path.exists() {
            let config = Self::default();
            config.save(path)?;
            log::info!("Created default configuration at {}", path.display());
            return Ok(config);
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Save as pretty JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        crate::language_utils::validate_language_code(&self.source_language)?;
        crate::language_utils::validate_language_code(&self.target_language)?;

        regex::Regex::new(&self.orchestrator.locked_key_pattern)
            .with_context(|| format!("Invalid locked key pattern: {}", self.orchestrator.locked_key_pattern))?;

        let common = &self.translation.common;
        if common.batch_size == 0 || common.retry_batch_size == 0 {
            return Err(anyhow!("Batch sizes must be greater than zero"));
        }
        if common.cache_capacity == 0 {
            return Err(anyhow!("Cache capacity must be greater than zero"));
        }
        if !(0.0..=1.0).contains(&common.temperature) {
            return Err(anyhow!("Temperature must be between 0.0 and 1.0"));
        }

        if self.translation.enabled_backends().next().is_none() {
            return Err(anyhow!("At least one translation backend must be enabled"));
        }

        for backend in self.translation.enabled_backends() {
            check_endpoint(&backend.resolved_endpoint())
                .with_context(|| format!("Invalid endpoint for {} backend", backend.kind.display_name()))?;
        }

        for entry in &self.glossary {
            if entry.from.trim().is_empty() {
                return Err(anyhow!("Glossary entries need a non-empty 'from' term"));
            }
        }

        Ok(())
    }

    /// Snapshot database path, explicit or under the user data dir
    pub fn snapshot_db_path(&self) -> PathBuf {
        self.snapshot_db_path
            .clone()
            .unwrap_or_else(crate::database::default_database_path)
    }
}

/// Endpoints must be http(s) URLs with a host; a bare `host:port` is read as http
fn check_endpoint(endpoint: &str) -> Result<()> {
    let url = if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        Url::parse(endpoint)?
    } else {
        Url::parse(&format!("http://{}", endpoint))?
    };
    if url.host_str().is_none_or(str::is_empty) {
        return Err(anyhow!("Endpoint has no host: {}", endpoint));
    }
    Ok(())
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            source_language: "zh".to_string(),
            target_language: "en".to_string(),
            translation: TranslationConfig::default(),
            orchestrator: OrchestratorConfig::default(),
            glossary: Vec::new(),
            snapshot_db_path: None,
            log_level: LogLevel::default(),
        }
    }
}
