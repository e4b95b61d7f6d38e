use serde::Deserialize;
use std::path::{Path, PathBuf};
use steward_events::PublisherConfig;
use steward_gateway::RateLimits;
use steward_orchestrator::{
    HttpReasonerConfig, StaticPolicyGate, DEFAULT_FALLBACK_AGENT, DEFAULT_LEDGER_CAPACITY,
    DEFAULT_MIN_CONFIDENCE,
};

/// Top-level `steward.toml`. Every section is optional.
#[derive(Debug, Deserialize)]
pub struct StewardConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub routing: RoutingConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub events: EventsConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    /// Static deny rules; no policy gate is installed when absent.
    #[serde(default)]
    pub governance: Option<StaticPolicyGate>,
}

impl Default for StewardConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            server: ServerConfig::default(),
            routing: RoutingConfig::default(),
            execution: ExecutionConfig::default(),
            events: EventsConfig::default(),
            security: SecurityConfig::default(),
            governance: None,
        }
    }
}

impl StewardConfig {
    /// Read and parse `path`. A missing file yields the defaults.
    pub async fn load(path: &Path) -> anyhow::Result<Self> {
        if !tokio::fs::try_exists(path).await? {
            tracing::warn!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e)
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if !(0.0..=1.0).contains(&self.routing.min_confidence) {
            anyhow::bail!("routing.min_confidence must be within [0, 1]");
        }
        if self.events.sink == SinkKind::Http && self.events.url.is_none() {
            anyhow::bail!("events.url is required when events.sink = \"http\"");
        }
        let limits = &self.security.rate_limits;
        if limits.requests_per_minute == 0 || limits.requests_per_hour == 0 || limits.burst_size == 0 {
            anyhow::bail!("security rate limits must be positive");
        }
        Ok(())
    }

    pub fn trust_dir(&self) -> PathBuf {
        self.data_dir.join("trust")
    }

    pub fn feedback_path(&self) -> PathBuf {
        self.data_dir.join("feedback.jsonl")
    }

    pub fn events_path(&self) -> PathBuf {
        self.data_dir.join("events.jsonl")
    }
}

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RoutingConfig {
    /// Fallback agent; an empty string disables the fallback.
    #[serde(default = "default_agent")]
    pub default_agent: String,
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,
    #[serde(default)]
    pub seed: u64,
    #[serde(default)]
    pub reasoner: Option<HttpReasonerConfig>,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            default_agent: default_agent(),
            min_confidence: default_min_confidence(),
            seed: 0,
            reasoner: None,
        }
    }
}

impl RoutingConfig {
    pub fn fallback_agent(&self) -> Option<String> {
        let agent = self.default_agent.trim();
        (!agent.is_empty()).then(|| agent.to_string())
    }
}

#[derive(Debug, Deserialize)]
pub struct ExecutionConfig {
    #[serde(default = "default_agent_timeout_ms")]
    pub agent_timeout_ms: u64,
    #[serde(default = "default_ledger_capacity")]
    pub ledger_capacity: usize,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            agent_timeout_ms: default_agent_timeout_ms(),
            ledger_capacity: default_ledger_capacity(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    #[default]
    Jsonl,
    Http,
    None,
}

#[derive(Debug, Default, Deserialize)]
pub struct EventsConfig {
    #[serde(flatten)]
    pub publisher: PublisherConfig,
    #[serde(default)]
    pub sink: SinkKind,
    /// Collector base URL for the `http` sink.
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SecurityConfig {
    #[serde(flatten)]
    pub rate_limits: RateLimits,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8000
}
fn default_agent() -> String {
    DEFAULT_FALLBACK_AGENT.to_string()
}
fn default_min_confidence() -> f64 {
    DEFAULT_MIN_CONFIDENCE
}
fn default_agent_timeout_ms() -> u64 {
    300_000
}
fn default_ledger_capacity() -> usize {
    DEFAULT_LEDGER_CAPACITY
}
