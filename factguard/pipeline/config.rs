use std::{
    collections::BTreeMap,
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{bail, Context, Result};
use factguard_logging::LogLevel;
use serde::Deserialize;

use crate::{
    cache::{DEFAULT_MAX_ENTRIES, DEFAULT_TTL_SECS},
    correction_memory::DEFAULT_SIMILARITY_THRESHOLD,
    rate_limiter::DEFAULT_CALLS_PER_SECOND,
};

/// Top-level service configuration loaded from TOML.
#[derive(Debug, Clone)]
pub struct FactguardConfig {
    /// HTTP listener settings.
    pub server: ServerConfig,
    /// Result cache settings.
    pub cache: CacheConfig,
    /// Web-search throttle.
    pub rate_limit: RateLimitConfig,
    /// Generative collaborator.
    pub inference: InferenceConfig,
    /// Web-search collaborator.
    pub search: SearchConfig,
    /// Correction memory.
    pub memory: MemoryConfig,
    /// Stage toggles.
    pub pipeline: PipelineConfig,
    /// Structured log output.
    pub logging: LoggingConfig,
    /// Caller authentication.
    pub auth: AuthConfig,
    source_dir: PathBuf,
}

impl Default for FactguardConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            cache: CacheConfig::default(),
            rate_limit: RateLimitConfig::default(),
            inference: InferenceConfig::default(),
            search: SearchConfig::default(),
            memory: MemoryConfig::default(),
            pipeline: PipelineConfig::default(),
            logging: LoggingConfig::default(),
            auth: AuthConfig::default(),
            source_dir: PathBuf::from("."),
        }
    }
}

impl FactguardConfig {
    /// Loads and validates configuration from a TOML file. Relative paths
    /// resolve against the file's directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let source_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Self::parse(&raw, source_dir).with_context(|| format!("parsing {}", path.display()))
    }

    /// Parses and validates a TOML document whose relative paths are
    /// anchored at `source_dir`.
    pub fn parse(raw: &str, source_dir: impl Into<PathBuf>) -> Result<Self> {
        let document: ConfigSerde = toml::from_str(raw)?;
        let mut config = Self {
            server: document.server,
            cache: document.cache,
            rate_limit: document.rate_limit,
            inference: document.inference,
            search: document.search,
            memory: document.memory,
            pipeline: document.pipeline,
            logging: document.logging,
            auth: document.auth,
            source_dir: source_dir.into(),
        };
        config.validate()?;
        if let Some(dir) = config.memory.journal_dir.take() {
            config.memory.journal_dir = Some(config.resolve_path(dir));
        }
        if let Some(file) = config.logging.path.take() {
            config.logging.path = Some(config.resolve_path(file));
        }
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.cache.ttl_secs == 0 {
            bail!("cache.ttl_secs must be positive");
        }
        if self.cache.max_entries == 0 {
            bail!("cache.max_entries must be positive");
        }
        if self.rate_limit.calls_per_second == 0 {
            bail!("rate_limit.calls_per_second must be positive");
        }
        let threshold = self.memory.similarity_threshold;
        if !(threshold > 0.0 && threshold <= 1.0) {
            bail!("memory.similarity_threshold must be in (0, 1], got {threshold}");
        }
        if self.inference.timeout_ms == 0 || self.search.timeout_ms == 0 {
            bail!("collaborator timeouts must be positive");
        }
        if self.inference.provider == Provider::Http && self.inference.endpoint.trim().is_empty() {
            bail!("inference.endpoint is required for the http provider");
        }
        if self.search.provider == Provider::Http && self.search.endpoint.trim().is_empty() {
            bail!("search.endpoint is required for the http provider");
        }
        if self.server.max_body_bytes == 0 {
            bail!("server.max_body_bytes must be positive");
        }
        self.logging.min_level()?;
        Ok(())
    }

    /// Resolves a path relative to the configuration file.
    #[must_use]
    pub fn resolve_path(&self, candidate: impl AsRef<Path>) -> PathBuf {
        let candidate = candidate.as_ref();
        if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.source_dir.join(candidate)
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigSerde {
    #[serde(default)]
    server: ServerConfig,
    #[serde(default)]
    cache: CacheConfig,
    #[serde(default)]
    rate_limit: RateLimitConfig,
    #[serde(default)]
    inference: InferenceConfig,
    #[serde(default)]
    search: SearchConfig,
    #[serde(default)]
    memory: MemoryConfig,
    #[serde(default)]
    pipeline: PipelineConfig,
    #[serde(default)]
    logging: LoggingConfig,
    #[serde(default)]
    auth: AuthConfig,
}

/// Which implementation backs a collaborator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Real HTTP service.
    #[default]
    Http,
    /// In-process canned answers.
    Loopback,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Socket address to bind.
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Largest accepted request body.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

/// Result cache settings.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Lifetime of an entry in seconds.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    /// Capacity before least-recently-used eviction.
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
            max_entries: default_max_entries(),
        }
    }
}

impl CacheConfig {
    /// Entry lifetime as a chrono duration.
    #[must_use]
    pub fn ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::try_from(self.ttl_secs).unwrap_or(DEFAULT_TTL_SECS))
    }
}

/// Web-search throttle.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Ceiling on outbound search calls per second.
    #[serde(default = "default_calls_per_second")]
    pub calls_per_second: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            calls_per_second: default_calls_per_second(),
        }
    }
}

/// Generative collaborator settings.
#[derive(Debug, Clone, Deserialize)]
pub struct InferenceConfig {
    /// Backing implementation.
    #[serde(default)]
    pub provider: Provider,
    /// Chat-completions URL.
    #[serde(default = "default_inference_endpoint")]
    pub endpoint: String,
    /// Model identifier.
    #[serde(default = "default_model")]
    pub model: String,
    /// Environment variable holding the API key.
    #[serde(default = "default_inference_key_env")]
    pub api_key_env: Option<String>,
    /// Per-call deadline in milliseconds.
    #[serde(default = "default_inference_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            provider: Provider::default(),
            endpoint: default_inference_endpoint(),
            model: default_model(),
            api_key_env: default_inference_key_env(),
            timeout_ms: default_inference_timeout_ms(),
        }
    }
}

impl InferenceConfig {
    /// API key read from the configured environment variable.
    #[must_use]
    pub fn api_key(&self) -> Option<String> {
        read_secret(self.api_key_env.as_deref())
    }

    /// Per-call deadline.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Web-search collaborator settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    /// Backing implementation.
    #[serde(default)]
    pub provider: Provider,
    /// Search-and-contents URL.
    #[serde(default = "default_search_endpoint")]
    pub endpoint: String,
    /// Environment variable holding the API key.
    #[serde(default = "default_search_key_env")]
    pub api_key_env: Option<String>,
    /// Per-call deadline in milliseconds.
    #[serde(default = "default_search_timeout_ms")]
    pub timeout_ms: u64,
    /// Hits requested per query.
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    /// Domain allow-list; empty keeps the built-in authoritative list.
    #[serde(default)]
    pub domains: Vec<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            provider: Provider::default(),
            endpoint: default_search_endpoint(),
            api_key_env: default_search_key_env(),
            timeout_ms: default_search_timeout_ms(),
            max_results: default_max_results(),
            domains: Vec::new(),
        }
    }
}

impl SearchConfig {
    /// API key read from the configured environment variable.
    #[must_use]
    pub fn api_key(&self) -> Option<String> {
        read_secret(self.api_key_env.as_deref())
    }

    /// Per-call deadline.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Correction memory settings.
#[derive(Debug, Clone, Deserialize)]
pub struct MemoryConfig {
    /// Jaccard ratio a correction must exceed to suppress a check.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
    /// Directory of the per-user journal; in-memory only when absent.
    #[serde(default)]
    pub journal_dir: Option<PathBuf>,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
            journal_dir: None,
        }
    }
}

/// Stage toggles.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Whether HIGH candidates are checked against web search.
    #[serde(default = "default_true")]
    pub cross_verify: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { cross_verify: true }
    }
}

/// Structured log output.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// JSON-lines log file; none disables file logging.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Minimum level written.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            path: None,
            level: default_log_level(),
        }
    }
}

impl LoggingConfig {
    /// Parsed minimum level.
    pub fn min_level(&self) -> Result<LogLevel> {
        self.level
            .parse()
            .with_context(|| format!("logging.level '{}'", self.level))
    }
}

/// Caller authentication.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthConfig {
    /// Bearer token to user id.
    #[serde(default)]
    pub tokens: BTreeMap<String, String>,
    /// Environment variable holding extra `token=user` pairs separated by commas.
    #[serde(default)]
    pub tokens_env: Option<String>,
}

impl AuthConfig {
    /// Configured tokens merged with those from `tokens_env`.
    #[must_use]
    pub fn all_tokens(&self) -> BTreeMap<String, String> {
        let mut tokens = self.tokens.clone();
        if let Some(raw) = read_secret(self.tokens_env.as_deref()) {
            for pair in raw.split(',') {
                if let Some((token, user)) = pair.split_once('=') {
                    let (token, user) = (token.trim(), user.trim());
                    if !token.is_empty() && !user.is_empty() {
                        tokens.insert(token.to_string(), user.to_string());
                    }
                }
            }
        }
        tokens
    }
}

fn read_secret(var: Option<&str>) -> Option<String> {
    var.and_then(|name| env::var(name).ok())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn default_listen() -> String {
    "127.0.0.1:8080".into()
}

const fn default_max_body_bytes() -> usize {
    256 * 1024
}

#[allow(clippy::cast_sign_loss)]
const fn default_ttl_secs() -> u64 {
    DEFAULT_TTL_SECS as u64
}

const fn default_max_entries() -> usize {
    DEFAULT_MAX_ENTRIES
}

const fn default_calls_per_second() -> u32 {
    DEFAULT_CALLS_PER_SECOND
}

fn default_inference_endpoint() -> String {
    "https://api.openai.com/v1/chat/completions".into()
}

fn default_model() -> String {
    "gpt-4o-mini".into()
}

#[allow(clippy::unnecessary_wraps)]
fn default_inference_key_env() -> Option<String> {
    Some("OPENAI_API_KEY".into())
}

const fn default_inference_timeout_ms() -> u64 {
    30_000
}

fn default_search_endpoint() -> String {
    "https://api.exa.ai/search".into()
}

#[allow(clippy::unnecessary_wraps)]
fn default_search_key_env() -> Option<String> {
    Some("EXA_API_KEY".into())
}

const fn default_search_timeout_ms() -> u64 {
    10_000
}

const fn default_max_results() -> usize {
    5
}

const fn default_similarity_threshold() -> f64 {
    DEFAULT_SIMILARITY_THRESHOLD
}

const fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn loads_defaults_and_resolves_paths() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("factguard.toml");
        fs::write(
            &path,
            r#"
[server]
listen = "0.0.0.0:9000"

[memory]
journal_dir = "data/corrections"

[logging]
path = "logs/factcheck.log"
level = "debug"

[auth.tokens]
"secret-token" = "alice"
"#,
        )
        .unwrap();
        let config = FactguardConfig::load(&path).unwrap();
        assert_eq!(config.server.listen, "0.0.0.0:9000");
        assert_eq!(config.cache.ttl_secs, 86_400);
        assert_eq!(config.rate_limit.calls_per_second, 4);
        assert_eq!(config.inference.timeout(), Duration::from_secs(30));
        assert_eq!(config.search.timeout(), Duration::from_secs(10));
        assert!(config.pipeline.cross_verify);
        assert_eq!(
            config.memory.journal_dir.as_deref(),
            Some(dir.path().join("data/corrections").as_path())
        );
        assert_eq!(
            config.logging.path.as_deref(),
            Some(dir.path().join("logs/factcheck.log").as_path())
        );
        assert_eq!(config.logging.min_level().unwrap(), LogLevel::Debug);
        assert_eq!(config.auth.all_tokens()["secret-token"], "alice");
    }

    #[test]
    fn rejects_invalid_threshold_and_unknown_sections() {
        let err = FactguardConfig::parse("[memory]\nsimilarity_threshold = 1.5\n", ".").unwrap_err();
        assert!(err.to_string().contains("similarity_threshold"));
        assert!(FactguardConfig::parse("[caches]\nttl_secs = 5\n", ".").is_err());
        assert!(FactguardConfig::parse("[rate_limit]\ncalls_per_second = 0\n", ".").is_err());
        assert!(FactguardConfig::parse("[logging]\nlevel = \"loud\"\n", ".").is_err());
    }

    #[test]
    fn secrets_come_from_environment() {
        env::set_var("FACTGUARD_TEST_SEARCH_KEY", " key-123 ");
        env::set_var("FACTGUARD_TEST_TOKENS", "t1=bob, t2 = carol,broken");
        let config = FactguardConfig::parse(
            r#"
[search]
provider = "loopback"
api_key_env = "FACTGUARD_TEST_SEARCH_KEY"

[auth]
tokens_env = "FACTGUARD_TEST_TOKENS"
"#,
            ".",
        )
        .unwrap();
        assert_eq!(config.search.provider, Provider::Loopback);
        assert_eq!(config.search.api_key().as_deref(), Some("key-123"));
        let tokens = config.auth.all_tokens();
        assert_eq!(tokens["t1"], "bob");
        assert_eq!(tokens["t2"], "carol");
        assert_eq!(tokens.len(), 2);
    }
}
