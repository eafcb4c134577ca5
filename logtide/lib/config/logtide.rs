//! Logtide configuration types and helpers.

use std::path::{Path, PathBuf};

use getset::Getters;
use serde::{Deserialize, Serialize};
use tokio::fs;
use typed_builder::TypedBuilder;

use crate::{
    utils::{expand_home, CURSOR_DB_FILENAME, LOGTIDE_CONFIG_FILENAME},
    LogtideError, LogtideResult,
};

use super::{
    DEFAULT_ANALYSIS_TIMEOUT_SECS, DEFAULT_BACKOFF_CEILING_SECS, DEFAULT_FIRST_SIGHT_BACKLOG,
    DEFAULT_INDEX_PREFIX, DEFAULT_INITIAL_SCAN_LINES, DEFAULT_LOGTIDE_HOME,
    DEFAULT_LOG_INTERVAL_SECS, DEFAULT_MAX_CONTEXT_CHARS, DEFAULT_MAX_LINES_PER_FETCH,
    DEFAULT_METRICS_INTERVAL_SECS, DEFAULT_OLLAMA_MODEL, DEFAULT_OLLAMA_URL, DEFAULT_SINK_URL,
    DEFAULT_SSH_PORT, DEFAULT_TRANSPORT_TIMEOUT_SECS, DEFAULT_WORKER_LIMIT,
};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The logtide configuration.
#[derive(Debug, Default, Clone, Deserialize, Serialize, PartialEq, Getters)]
#[getset(get = "pub with_prefix")]
pub struct LogtideConfig {
    /// The hosts to collect from.
    #[serde(default)]
    pub(super) hosts: Vec<HostConfig>,

    /// The collector loop settings.
    #[serde(default)]
    pub(super) collector: CollectorConfig,

    /// The issue analysis settings.
    #[serde(default)]
    pub(super) analysis: AnalysisConfig,

    /// The storage sink settings.
    #[serde(default)]
    pub(super) sink: SinkConfig,

    /// The path of the cursor database. Defaults to
    /// `~/.logtide/cursors.db`.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub(super) cursor_db: Option<PathBuf>,
}

/// One monitored host.
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder, PartialEq, Getters)]
#[getset(get = "pub with_prefix")]
pub struct HostConfig {
    /// The unique name of the host.
    #[builder(setter(transform = |name: impl AsRef<str>| name.as_ref().to_string()))]
    pub(super) name: String,

    /// How the host's Docker daemon is reached.
    pub(super) transport: TransportKind,

    /// The hostname or address to connect to. Required for ssh hosts.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    #[builder(default)]
    pub(super) hostname: Option<String>,

    /// The ssh port. Defaults to 22.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    #[builder(default)]
    pub(super) port: Option<u16>,

    /// The ssh user.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    #[builder(default)]
    pub(super) user: Option<String>,

    /// The ssh identity file.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    #[builder(default)]
    pub(super) identity_file: Option<PathBuf>,

    /// The base url of the polling agent. Required for agent hosts.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    #[builder(default)]
    pub(super) url: Option<String>,

    /// Whether the host is a Swarm manager.
    #[serde(default)]
    #[builder(default)]
    pub(super) swarm_manager: bool,
}

/// How a host's Docker daemon is reached.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// The Docker CLI on the collector's own machine.
    Local,

    /// The Docker CLI executed over ssh.
    Ssh,

    /// A remote polling agent reached over HTTP.
    Agent,
}

/// Settings for the collector loop.
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder, PartialEq, Eq, Getters)]
#[getset(get = "pub with_prefix")]
pub struct CollectorConfig {
    /// Seconds between log polls per host.
    #[serde(default = "CollectorConfig::default_log_interval_secs")]
    #[builder(default = CollectorConfig::default_log_interval_secs())]
    pub(super) log_interval_secs: u64,

    /// Seconds between metrics samples per host.
    #[serde(default = "CollectorConfig::default_metrics_interval_secs")]
    #[builder(default = CollectorConfig::default_metrics_interval_secs())]
    pub(super) metrics_interval_secs: u64,

    /// Cap on log lines fetched per container per tick.
    #[serde(default = "CollectorConfig::default_max_lines_per_fetch")]
    #[builder(default = CollectorConfig::default_max_lines_per_fetch())]
    pub(super) max_lines_per_fetch: u32,

    /// Tail applied the first time a container is seen.
    #[serde(default = "CollectorConfig::default_first_sight_backlog")]
    #[builder(default = CollectorConfig::default_first_sight_backlog())]
    pub(super) first_sight_backlog: u32,

    /// How many containers are fetched concurrently within one host.
    #[serde(default = "CollectorConfig::default_worker_limit")]
    #[builder(default = CollectorConfig::default_worker_limit())]
    pub(super) worker_limit: usize,

    /// Per-call transport deadline in seconds.
    #[serde(default = "CollectorConfig::default_transport_timeout_secs")]
    #[builder(default = CollectorConfig::default_transport_timeout_secs())]
    pub(super) transport_timeout_secs: u64,

    /// Ceiling for per-pair retry backoff, in seconds.
    #[serde(default = "CollectorConfig::default_backoff_ceiling_secs")]
    #[builder(default = CollectorConfig::default_backoff_ceiling_secs())]
    pub(super) backoff_ceiling_secs: u64,
}

/// Settings for the issue analysis pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder, PartialEq, Eq, Getters)]
#[getset(get = "pub with_prefix")]
pub struct AnalysisConfig {
    /// Whether the language-model analysis path is enabled. When disabled,
    /// detection uses the rule-based path only.
    #[serde(default = "AnalysisConfig::default_enabled")]
    #[builder(default = AnalysisConfig::default_enabled())]
    pub(super) enabled: bool,

    /// The base url of the Ollama API.
    #[serde(default = "AnalysisConfig::default_ollama_url")]
    #[builder(default = AnalysisConfig::default_ollama_url())]
    pub(super) ollama_url: String,

    /// The model used for analysis.
    #[serde(default = "AnalysisConfig::default_model")]
    #[builder(default = AnalysisConfig::default_model())]
    pub(super) model: String,

    /// Cap on characters of log context sent per analysis call.
    #[serde(default = "AnalysisConfig::default_max_context_chars")]
    #[builder(default = AnalysisConfig::default_max_context_chars())]
    pub(super) max_context_chars: usize,

    /// Deadline for one analysis request, in seconds.
    #[serde(default = "AnalysisConfig::default_request_timeout_secs")]
    #[builder(default = AnalysisConfig::default_request_timeout_secs())]
    pub(super) request_timeout_secs: u64,

    /// Lines per container consumed by the one-time initial scan.
    #[serde(default = "AnalysisConfig::default_initial_scan_lines")]
    #[builder(default = AnalysisConfig::default_initial_scan_lines())]
    pub(super) initial_scan_lines: u32,
}

/// Settings for the storage sink.
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder, PartialEq, Eq, Getters)]
#[getset(get = "pub with_prefix")]
pub struct SinkConfig {
    /// Which sink implementation to use.
    #[serde(default)]
    #[builder(default)]
    pub(super) kind: SinkKind,

    /// The base url of the HTTP sink.
    #[serde(default = "SinkConfig::default_url")]
    #[builder(default = SinkConfig::default_url())]
    pub(super) url: String,

    /// The index name prefix used by the HTTP sink.
    #[serde(default = "SinkConfig::default_index_prefix")]
    #[builder(default = SinkConfig::default_index_prefix())]
    pub(super) index_prefix: String,
}

/// Which storage sink implementation to use.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    /// Bulk-index documents into an HTTP document store.
    #[default]
    Http,

    /// Keep records in memory. Used by tests and one-shot scans.
    Memory,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl LogtideConfig {
    /// Returns the resolved cursor database path, with `~` expanded and the
    /// default location applied when unset.
    pub fn cursor_db_path(&self) -> PathBuf {
        match &self.cursor_db {
            Some(path) => expand_home(path),
            None => DEFAULT_LOGTIDE_HOME.join(CURSOR_DB_FILENAME),
        }
    }
}

impl HostConfig {
    /// Returns the ssh port, defaulting to 22.
    pub fn port_or_default(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_SSH_PORT)
    }
}

impl CollectorConfig {
    /// Returns the default seconds between log polls.
    pub fn default_log_interval_secs() -> u64 {
        DEFAULT_LOG_INTERVAL_SECS
    }

    /// Returns the default seconds between metrics samples.
    pub fn default_metrics_interval_secs() -> u64 {
        DEFAULT_METRICS_INTERVAL_SECS
    }

    /// Returns the default cap on lines fetched per container per tick.
    pub fn default_max_lines_per_fetch() -> u32 {
        DEFAULT_MAX_LINES_PER_FETCH
    }

    /// Returns the default first-sight tail.
    pub fn default_first_sight_backlog() -> u32 {
        DEFAULT_FIRST_SIGHT_BACKLOG
    }

    /// Returns the default per-host worker limit.
    pub fn default_worker_limit() -> usize {
        DEFAULT_WORKER_LIMIT
    }

    /// Returns the default per-call transport deadline in seconds.
    pub fn default_transport_timeout_secs() -> u64 {
        DEFAULT_TRANSPORT_TIMEOUT_SECS
    }

    /// Returns the default backoff ceiling in seconds.
    pub fn default_backoff_ceiling_secs() -> u64 {
        DEFAULT_BACKOFF_CEILING_SECS
    }
}

impl AnalysisConfig {
    /// Returns whether language-model analysis is enabled by default.
    pub fn default_enabled() -> bool {
        true
    }

    /// Returns the default Ollama base url.
    pub fn default_ollama_url() -> String {
        DEFAULT_OLLAMA_URL.to_string()
    }

    /// Returns the default analysis model.
    pub fn default_model() -> String {
        DEFAULT_OLLAMA_MODEL.to_string()
    }

    /// Returns the default analysis context cap in characters.
    pub fn default_max_context_chars() -> usize {
        DEFAULT_MAX_CONTEXT_CHARS
    }

    /// Returns the default analysis request deadline in seconds.
    pub fn default_request_timeout_secs() -> u64 {
        DEFAULT_ANALYSIS_TIMEOUT_SECS
    }

    /// Returns the default initial-scan line count per container.
    pub fn default_initial_scan_lines() -> u32 {
        DEFAULT_INITIAL_SCAN_LINES
    }
}

impl SinkConfig {
    /// Returns the default HTTP sink url.
    pub fn default_url() -> String {
        DEFAULT_SINK_URL.to_string()
    }

    /// Returns the default index name prefix.
    pub fn default_index_prefix() -> String {
        DEFAULT_INDEX_PREFIX.to_string()
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Loads and validates the configuration from the given path, defaulting to
/// `logtide.yaml` in the working directory.
pub async fn load_config(config_file: Option<&Path>) -> LogtideResult<LogtideConfig> {
    let path = config_file
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(LOGTIDE_CONFIG_FILENAME));

    if !path.exists() {
        return Err(LogtideError::ConfigNotFound(path.display().to_string()));
    }

    let contents = fs::read_to_string(&path).await?;
    let config: LogtideConfig = serde_yaml::from_str(&contents)?;
    config.validate()?;

    Ok(config)
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Default for CollectorConfig {
    fn default() -> Self {
        CollectorConfig::builder().build()
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig::builder().build()
    }
}

impl Default for SinkConfig {
    fn default() -> Self {
        SinkConfig::builder().build()
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_applies_defaults() {
        let yaml = r#"
hosts:
  - name: local
    transport: local
"#;
        let config: LogtideConfig = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.hosts.len(), 1);
        assert_eq!(config.hosts[0].transport, TransportKind::Local);
        assert_eq!(config.collector.log_interval_secs, 30);
        assert_eq!(config.collector.metrics_interval_secs, 15);
        assert_eq!(config.collector.max_lines_per_fetch, 500);
        assert_eq!(config.analysis.model, DEFAULT_OLLAMA_MODEL);
        assert!(config.analysis.enabled);
        assert_eq!(config.sink.kind, SinkKind::Http);
        config.validate().unwrap();
    }

    #[test]
    fn test_full_config_round_trips() {
        let yaml = r#"
hosts:
  - name: prod-1
    transport: ssh
    hostname: prod-1.internal
    port: 2222
    user: ops
    identity_file: /home/ops/.ssh/id_ed25519
  - name: edge-7
    transport: agent
    url: "http://edge-7:9400"
    swarm_manager: true
collector:
  log_interval_secs: 10
  metrics_interval_secs: 5
  max_lines_per_fetch: 200
  first_sight_backlog: 100
  worker_limit: 2
  transport_timeout_secs: 15
  backoff_ceiling_secs: 120
analysis:
  enabled: false
  ollama_url: "http://ollama:11434"
  model: "llama3.1:8b"
sink:
  kind: memory
cursor_db: /tmp/cursors.db
"#;
        let config: LogtideConfig = serde_yaml::from_str(yaml).unwrap();
        config.validate().unwrap();

        assert_eq!(config.hosts[0].port_or_default(), 2222);
        assert_eq!(config.hosts[1].transport, TransportKind::Agent);
        assert!(config.hosts[1].swarm_manager);
        assert_eq!(config.collector.backoff_ceiling_secs, 120);
        assert!(!config.analysis.enabled);
        assert_eq!(config.sink.kind, SinkKind::Memory);
        assert_eq!(config.cursor_db_path(), PathBuf::from("/tmp/cursors.db"));

        let serialized = serde_yaml::to_string(&config).unwrap();
        let reparsed: LogtideConfig = serde_yaml::from_str(&serialized).unwrap();
        assert_eq!(config, reparsed);
    }

    #[test]
    fn test_host_builder_defaults() {
        let host = HostConfig::builder()
            .name("local")
            .transport(TransportKind::Local)
            .build();

        assert_eq!(host.get_name(), "local");
        assert_eq!(host.port_or_default(), 22);
        assert!(!host.swarm_manager);
    }
}
