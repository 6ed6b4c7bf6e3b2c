//! Configuration loading with env-var overrides.
//!
//! Reads `config/default.toml` relative to the current working directory
//! (or an explicit path), then applies `GREENWEB_WORK_DIR`,
//! `GREENWEB_LOG_LEVEL` and `GREENWEB_BIND` env overrides.

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::error::AppError;

/// Which storage backend holds users, projects, badges and chat history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    Sqlite,
}

impl StorageBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageBackend::Memory => "memory",
            StorageBackend::Sqlite => "sqlite",
        }
    }
}

/// How `/api/carbon/analyze` produces its metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisMode {
    /// Lookup-table formulas only.
    Formula,
    /// Ask the LLM first, fall back to the formulas on any failure.
    Llm,
}

/// HTTP server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address to bind the API listener to.
    pub bind: String,
    /// Browser origins allowed to call the API with credentials.
    pub cors_origins: Vec<String>,
}

/// Session cookie configuration.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub session_ttl_hours: u64,
    /// Adds the `Secure` attribute to the session cookie.
    pub secure_cookie: bool,
    /// How often expired sessions are purged.
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// SQLite file name, relative to `work_dir` unless absolute.
    pub db_file: PathBuf,
}

#[derive(Debug, Clone)]
pub struct CarbonConfig {
    pub analysis: AnalysisMode,
    /// Page size used by `/api/carbon/analyze` when the client sends none.
    pub default_page_size_mb: f64,
    /// Timeout for fetching a page in `/api/carbon/website`.
    pub fetch_timeout_seconds: u64,
}

/// OpenAI / OpenAI-compatible provider configuration.
/// Populated from `[llm.openai]` in the TOML.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// Full chat completions endpoint URL.
    pub api_base_url: String,
    /// Model name passed in the request body.
    pub model: String,
    /// Sampling temperature (ignored for models that forbid it).
    pub temperature: f32,
    /// Per-request HTTP timeout in seconds.
    pub timeout_seconds: u64,
}

/// LLM configuration.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Which provider is active: `"none"`, `"dummy"` or `"openai"`.
    /// Maps to `default` in `[llm]` TOML.
    pub provider: String,
    pub openai: OpenAiConfig,
}

/// Fully-resolved configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub name: String,
    /// Working directory for all persistent data (already expanded, no `~`).
    pub work_dir: PathBuf,
    pub log_level: String,
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub storage: StorageConfig,
    pub carbon: CarbonConfig,
    pub llm: LlmConfig,
    /// API key from `LLM_API_KEY` env var. Never sourced from TOML.
    pub llm_api_key: Option<String>,
}

impl Config {
    /// Absolute path of the SQLite database file.
    pub fn db_path(&self) -> PathBuf {
        if self.storage.db_file.is_absolute() {
            self.storage.db_file.clone()
        } else {
            self.work_dir.join(&self.storage.db_file)
        }
    }
}

/// Raw TOML shape — `serde` target before resolution.
#[derive(Deserialize)]
struct RawConfig {
    server: RawServer,
    #[serde(default)]
    auth: RawAuth,
    #[serde(default)]
    storage: RawStorage,
    #[serde(default)]
    carbon: RawCarbon,
    #[serde(default)]
    llm: RawLlm,
}

#[derive(Deserialize)]
struct RawServer {
    #[serde(default = "default_name")]
    name: String,
    work_dir: String,
    #[serde(default = "default_log_level")]
    log_level: String,
    #[serde(default = "default_bind")]
    bind: String,
    #[serde(default)]
    cors_origins: Vec<String>,
}

#[derive(Deserialize)]
struct RawAuth {
    #[serde(default = "default_session_ttl_hours")]
    session_ttl_hours: u64,
    #[serde(default)]
    secure_cookie: bool,
    #[serde(default = "default_sweep_interval_secs")]
    sweep_interval_secs: u64,
}

impl Default for RawAuth {
    fn default() -> Self {
        Self {
            session_ttl_hours: default_session_ttl_hours(),
            secure_cookie: false,
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

#[derive(Deserialize)]
struct RawStorage {
    #[serde(default = "default_storage_backend")]
    backend: String,
    #[serde(default = "default_db_file")]
    db_file: String,
}

impl Default for RawStorage {
    fn default() -> Self {
        Self { backend: default_storage_backend(), db_file: default_db_file() }
    }
}

#[derive(Deserialize)]
struct RawCarbon {
    #[serde(default = "default_analysis")]
    analysis: String,
    #[serde(default = "default_page_size_mb")]
    default_page_size_mb: f64,
    #[serde(default = "default_fetch_timeout_seconds")]
    fetch_timeout_seconds: u64,
}

impl Default for RawCarbon {
    fn default() -> Self {
        Self {
            analysis: default_analysis(),
            default_page_size_mb: default_page_size_mb(),
            fetch_timeout_seconds: default_fetch_timeout_seconds(),
        }
    }
}

#[derive(Deserialize)]
struct RawLlm {
    /// Maps to `default = "..."` in `[llm]`.
    #[serde(rename = "default", default = "default_llm_provider")]
    provider: String,
    #[serde(default)]
    openai: RawOpenAiConfig,
}

impl Default for RawLlm {
    fn default() -> Self {
        Self { provider: default_llm_provider(), openai: RawOpenAiConfig::default() }
    }
}

#[derive(Deserialize)]
struct RawOpenAiConfig {
    #[serde(default = "default_openai_api_base_url")]
    api_base_url: String,
    #[serde(default = "default_openai_model")]
    model: String,
    #[serde(default = "default_openai_temperature")]
    temperature: f32,
    #[serde(default = "default_openai_timeout_seconds")]
    timeout_seconds: u64,
}

impl Default for RawOpenAiConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_openai_api_base_url(),
            model: default_openai_model(),
            temperature: default_openai_temperature(),
            timeout_seconds: default_openai_timeout_seconds(),
        }
    }
}

fn default_name() -> String { "greenweb".to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_bind() -> String { "127.0.0.1:5000".to_string() }
fn default_session_ttl_hours() -> u64 { 24 * 7 }

/// One year.
const MAX_SESSION_TTL_HOURS: u64 = 24 * 365;
fn default_sweep_interval_secs() -> u64 { 3600 }
fn default_storage_backend() -> String { "memory".to_string() }
fn default_db_file() -> String { "greenweb.db".to_string() }
fn default_analysis() -> String { "formula".to_string() }
fn default_page_size_mb() -> f64 { 2.5 }
fn default_fetch_timeout_seconds() -> u64 { 10 }
fn default_llm_provider() -> String { "none".to_string() }
fn default_openai_api_base_url() -> String { "https://api.openai.com/v1/chat/completions".to_string() }
fn default_openai_model() -> String { "gpt-4o".to_string() }
fn default_openai_temperature() -> f32 { 0.2 }
fn default_openai_timeout_seconds() -> u64 { 60 }

/// Env-var overrides applied on top of the TOML file.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub work_dir: Option<String>,
    pub log_level: Option<String>,
    pub bind: Option<String>,
}

impl Overrides {
    pub fn from_env() -> Self {
        Self {
            work_dir: env::var("GREENWEB_WORK_DIR").ok(),
            log_level: env::var("GREENWEB_LOG_LEVEL").ok(),
            bind: env::var("GREENWEB_BIND").ok(),
        }
    }
}

/// Load config from `path` (default `config/default.toml`), then apply
/// env-var overrides.
pub fn load(path: Option<&str>) -> Result<Config, AppError> {
    let path = Path::new(path.unwrap_or("config/default.toml"));
    let mut config = load_from(path, &Overrides::from_env())?;
    config.llm_api_key = env::var("LLM_API_KEY").ok().filter(|k| !k.is_empty());
    Ok(config)
}

/// Internal loader — accepts an explicit path and overrides.
/// Tests pass overrides directly instead of mutating env vars.
pub fn load_from(path: &Path, overrides: &Overrides) -> Result<Config, AppError> {
    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;
    parse(&raw, overrides)
        .map_err(|e| AppError::Config(format!("{e} (in {})", path.display())))
}

fn parse(raw: &str, overrides: &Overrides) -> Result<Config, String> {
    let parsed: RawConfig = toml::from_str(raw).map_err(|e| format!("parse error: {e}"))?;

    let s = parsed.server;
    let work_dir = expand_home(overrides.work_dir.as_deref().unwrap_or(&s.work_dir));
    let log_level = overrides.log_level.clone().unwrap_or(s.log_level);
    let bind = overrides.bind.clone().unwrap_or(s.bind);

    let backend = match parsed.storage.backend.as_str() {
        "memory" => StorageBackend::Memory,
        "sqlite" => StorageBackend::Sqlite,
        other => return Err(format!("unknown storage backend '{other}'")),
    };

    let analysis = match parsed.carbon.analysis.as_str() {
        "formula" => AnalysisMode::Formula,
        "llm" => AnalysisMode::Llm,
        other => return Err(format!("unknown carbon analysis mode '{other}'")),
    };

    let page_size = parsed.carbon.default_page_size_mb;
    if !(page_size.is_finite() && page_size > 0.0) {
        return Err(format!("carbon.default_page_size_mb must be positive, got {page_size}"));
    }
    let ttl = parsed.auth.session_ttl_hours;
    if !(1..=MAX_SESSION_TTL_HOURS).contains(&ttl) {
        return Err(format!(
            "auth.session_ttl_hours must be between 1 and {MAX_SESSION_TTL_HOURS}, got {ttl}"
        ));
    }

    Ok(Config {
        name: s.name,
        work_dir,
        log_level,
        server: ServerConfig { bind, cors_origins: s.cors_origins },
        auth: AuthConfig {
            session_ttl_hours: parsed.auth.session_ttl_hours,
            secure_cookie: parsed.auth.secure_cookie,
            sweep_interval_secs: parsed.auth.sweep_interval_secs.max(1),
        },
        storage: StorageConfig {
            backend,
            db_file: PathBuf::from(parsed.storage.db_file),
        },
        carbon: CarbonConfig {
            analysis,
            default_page_size_mb: page_size,
            fetch_timeout_seconds: parsed.carbon.fetch_timeout_seconds,
        },
        llm: LlmConfig {
            provider: parsed.llm.provider,
            openai: OpenAiConfig {
                api_base_url: parsed.llm.openai.api_base_url,
                model: parsed.llm.openai.model,
                temperature: parsed.llm.openai.temperature,
                timeout_seconds: parsed.llm.openai.timeout_seconds,
            },
        },
        llm_api_key: None,
    })
}

/// Expand a leading `~` to the user's home directory.
/// Absolute or relative paths without `~` are returned unchanged.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}

// ── test helpers ──────────────────────────────────────────────────────────────

impl Config {
    /// Safe `Config` for tests — in-memory store, no LLM, no external calls.
    pub fn test_default(work_dir: &Path) -> Self {
        Self {
            name: "greenweb-test".into(),
            work_dir: work_dir.to_path_buf(),
            log_level: "info".into(),
            server: ServerConfig { bind: "127.0.0.1:0".into(), cors_origins: Vec::new() },
            auth: AuthConfig {
                session_ttl_hours: default_session_ttl_hours(),
                secure_cookie: false,
                sweep_interval_secs: default_sweep_interval_secs(),
            },
            storage: StorageConfig {
                backend: StorageBackend::Memory,
                db_file: PathBuf::from(default_db_file()),
            },
            carbon: CarbonConfig {
                analysis: AnalysisMode::Formula,
                default_page_size_mb: default_page_size_mb(),
                fetch_timeout_seconds: 1,
            },
            llm: LlmConfig {
                provider: "none".into(),
                openai: OpenAiConfig {
                    api_base_url: "http://localhost:0/v1/chat/completions".into(),
                    model: "test-model".into(),
                    temperature: 0.0,
                    timeout_seconds: 1,
                },
            },
            llm_api_key: None,
        }
    }
}
