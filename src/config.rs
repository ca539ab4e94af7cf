use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// Tool filtering tier for small models.
/// Controls how aggressively the tool catalog is narrowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterMode {
    /// Full catalog pass-through.
    #[default]
    None,
    /// Pinned tools only, no semantic search.
    Minimal,
    /// Pinned + semantic + defaults.
    Moderate,
    /// Same algorithm as `Moderate`, usually paired with a smaller `max_tools`.
    Aggressive,
}

impl FilterMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Minimal => "minimal",
            Self::Moderate => "moderate",
            Self::Aggressive => "aggressive",
        }
    }
}

impl FromStr for FilterMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "" | "none" | "off" => Ok(Self::None),
            "minimal" => Ok(Self::Minimal),
            "moderate" => Ok(Self::Moderate),
            "aggressive" => Ok(Self::Aggressive),
            other => Err(anyhow::anyhow!("Unknown small model mode: {}", other)),
        }
    }
}

/// Which embedding provider backs the semantic tool index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmbedderKind {
    Disabled,
    /// In-process ONNX bi-encoder.
    #[default]
    LocalModel,
    /// OpenAI-compatible embeddings endpoint.
    RemoteHttp,
}

impl FromStr for EmbedderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "disabled" | "none" => Ok(Self::Disabled),
            "local-model" | "local" | "sentence-transformers" => Ok(Self::LocalModel),
            "remote-http" | "http" | "remote" => Ok(Self::RemoteHttp),
            other => Err(anyhow::anyhow!("Unknown embedder type: {}", other)),
        }
    }
}

pub const DEFAULT_PINNED_TOOLS: &[&str] = &["suggest_tools", "list_tool_categories"];

pub const DEFAULT_FALLBACK_TOOLS: &[&str] = &["explore_cluster", "cluster_summary", "project_summary"];

/// Settings for the visibility policy engine. Read once at construction.
#[derive(Debug, Clone)]
pub struct FilterConfig {
    pub mode: FilterMode,
    /// Cap on visible tools for `Moderate`/`Aggressive`.
    pub max_tools: usize,
    /// Always-visible tool names, in priority order.
    pub pinned_tools: Vec<String>,
    /// Capacity of the conversation context buffer.
    pub context_size: usize,
    /// High-value tools used to fill remaining slots, in priority order.
    pub default_tools: Vec<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            mode: FilterMode::None,
            max_tools: 10,
            pinned_tools: to_owned_list(DEFAULT_PINNED_TOOLS),
            context_size: 5,
            default_tools: to_owned_list(DEFAULT_FALLBACK_TOOLS),
        }
    }
}

/// Settings for the semantic tool index and its embedding provider.
#[derive(Debug, Clone)]
pub struct ScopeConfig {
    pub enabled: bool,
    pub embedder: EmbedderKind,
    /// Model identifier sent to the remote endpoint and mixed into the cache key.
    pub model: String,
    /// Required when `embedder` is `RemoteHttp`.
    pub endpoint: Option<String>,
    /// Result count used when a caller does not pass `k`.
    pub default_k: usize,
    pub model_path: PathBuf,
    pub tokenizer_path: PathBuf,
    pub max_sequence_length: usize,
    /// Number of ONNX sessions for the local embedder.
    pub pool_size: usize,
    pub timeout_secs: u64,
    /// Pre-computed tool embeddings are stored here when set.
    pub cache_path: Option<PathBuf>,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            embedder: EmbedderKind::LocalModel,
            model: "all-MiniLM-L6-v2".to_string(),
            endpoint: None,
            default_k: 5,
            model_path: PathBuf::from("./bi-encoder-model/model_int8.onnx"),
            tokenizer_path: PathBuf::from("./bi-encoder-model/tokenizer.json"),
            max_sequence_length: 256,
            pool_size: 2,
            timeout_secs: 30,
            cache_path: None,
        }
    }
}

pub struct Config {
    pub host: String,
    pub port: u16,
    pub shutdown_timeout_secs: u64,
    /// Optional path to an MCP `list_tools` JSON document.
    pub tools_path: Option<PathBuf>,
    /// Server origin recorded on every loaded tool.
    pub tools_server_name: String,
    pub filter: FilterConfig,
    pub scope: ScopeConfig,
}

impl Config {
    /// Load configuration from environment variables with sensible defaults.
    ///
    /// `SMALL_MODEL_MODE` selects the filtering tier (`none`, `minimal`,
    /// `moderate`, `aggressive`); `TOOLSCOPE_EMBEDDER_TYPE` selects the
    /// embedding provider (`disabled`, `local-model`, `remote-http`).
    pub fn from_env() -> anyhow::Result<Self> {
        let filter_defaults = FilterConfig::default();
        let scope_defaults = ScopeConfig::default();

        let filter = FilterConfig {
            mode: env::var("SMALL_MODEL_MODE")
                .unwrap_or_default()
                .parse()?,
            max_tools: env::var("SMALL_MODEL_MAX_TOOLS")
                .unwrap_or_else(|_| filter_defaults.max_tools.to_string())
                .parse()?,
            pinned_tools: env::var("SMALL_MODEL_PINNED_TOOLS")
                .map(|s| parse_list(&s))
                .unwrap_or(filter_defaults.pinned_tools),
            context_size: env::var("SMALL_MODEL_CONTEXT_SIZE")
                .unwrap_or_else(|_| filter_defaults.context_size.to_string())
                .parse()?,
            default_tools: env::var("SMALL_MODEL_DEFAULT_TOOLS")
                .map(|s| parse_list(&s))
                .unwrap_or(filter_defaults.default_tools),
        };

        let scope = ScopeConfig {
            enabled: parse_bool(
                &env::var("TOOLSCOPE_ENABLED").unwrap_or_else(|_| "true".to_string()),
            )?,
            embedder: env::var("TOOLSCOPE_EMBEDDER_TYPE")
                .unwrap_or_else(|_| "local-model".to_string())
                .parse()?,
            model: env::var("TOOLSCOPE_EMBEDDER_MODEL").unwrap_or(scope_defaults.model),
            endpoint: env::var("TOOLSCOPE_EMBEDDER_URL")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            default_k: env::var("TOOLSCOPE_DEFAULT_K")
                .unwrap_or_else(|_| scope_defaults.default_k.to_string())
                .parse()?,
            model_path: env::var("BI_ENCODER_MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or(scope_defaults.model_path),
            tokenizer_path: env::var("BI_ENCODER_TOKENIZER_PATH")
                .map(PathBuf::from)
                .unwrap_or(scope_defaults.tokenizer_path),
            max_sequence_length: env::var("MAX_SEQ_LENGTH")
                .unwrap_or_else(|_| scope_defaults.max_sequence_length.to_string())
                .parse()?,
            pool_size: env::var("BI_ENCODER_POOL_SIZE")
                .unwrap_or_else(|_| scope_defaults.pool_size.to_string())
                .parse()?,
            timeout_secs: env::var("EMBEDDER_TIMEOUT_SECS")
                .unwrap_or_else(|_| scope_defaults.timeout_secs.to_string())
                .parse()?,
            cache_path: env::var("EMBEDDINGS_CACHE_PATH").ok().map(PathBuf::from),
        };

        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()?,
            shutdown_timeout_secs: env::var("SHUTDOWN_TIMEOUT")
                .unwrap_or_else(|_| "30".to_string())
                .parse()?,
            tools_path: env::var("TOOLS_PATH").ok().map(PathBuf::from),
            tools_server_name: env::var("TOOLS_SERVER_NAME")
                .unwrap_or_else(|_| "rhoai".to_string()),
            filter,
            scope,
        })
    }
}

/// Split a comma-separated list, dropping blanks and duplicates while keeping order.
pub fn parse_list(raw: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for item in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if !out.iter().any(|existing| existing == item) {
            out.push(item.to_string());
        }
    }
    out
}

fn parse_bool(raw: &str) -> anyhow::Result<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(anyhow::anyhow!("Invalid boolean: {}", other)),
    }
}

fn to_owned_list(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
