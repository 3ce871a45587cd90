//! Node configuration.
//!
//! [`NodeConfig::load`] layers, lowest priority first:
//! 1. built-in defaults
//! 2. an optional TOML file
//! 3. environment variables prefixed `NAKA__`, e.g. `NAKA__HTTP_PORT=9000`
//!
//! When no layer lists any `[[networks]]`, the embedded `networks.toml`
//! table is used.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use naka_collectors::CollectorConfig;
use naka_core::constants::{
    DEFAULT_CYCLE_DEADLINE_SECS, DEFAULT_HTTP_PORT, DEFAULT_JOB_TIMEOUT_SECS,
    DEFAULT_MAX_CONCURRENT_JOBS, DEFAULT_REFRESH_INTERVAL_SECS, DEFAULT_TOTAL_TOLERANCE_BPS,
};
use naka_core::error::ConfigError;
use naka_core::{Comparison, Fraction, ThresholdPolicy, Token, WeightMode};

/// Networks shipped with the node.
pub const BUILTIN_NETWORKS: &str = include_str!("../networks.toml");

const ENV_PREFIX: &str = "NAKA";

fn default_enabled() -> bool {
    true
}

fn default_tolerance_bps() -> u32 {
    DEFAULT_TOTAL_TOLERANCE_BPS
}

/// One tracked network.
///
/// `threshold`, `comparison`, and `weight_mode` have no defaults: every
/// network must state them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub token: Token,
    pub chain_name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub collector: CollectorConfig,
    pub threshold: Fraction,
    pub comparison: Comparison,
    pub weight_mode: WeightMode,
    #[serde(default = "default_tolerance_bps")]
    pub total_tolerance_bps: u32,
}

impl NetworkConfig {
    pub fn policy(&self) -> ThresholdPolicy {
        ThresholdPolicy::new(self.threshold, self.comparison)
            .with_total_tolerance_bps(self.total_tolerance_bps)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidNetwork {
            token: self.token.to_string(),
            reason,
        };
        if self.token.as_str().is_empty() {
            return Err(invalid("empty token".into()));
        }
        if self.chain_name.trim().is_empty() {
            return Err(invalid("empty chain_name".into()));
        }
        if let Some(native) = self.collector.native_mode() {
            if native != self.weight_mode {
                return Err(invalid(format!(
                    "collector {} reports {native:?} weights but weight_mode is {:?}",
                    self.collector.kind(),
                    self.weight_mode
                )));
            }
        }
        Ok(())
    }
}

/// Configuration for a node instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Root directory for persistent data.
    pub data_dir: PathBuf,
    /// IP address the HTTP server binds to.
    pub http_bind: String,
    pub http_port: u16,
    /// Seconds between refresh cycles.
    pub refresh_interval_secs: u64,
    /// Per-job bound on collector I/O.
    pub job_timeout_secs: u64,
    /// Bound on a whole cycle; outstanding jobs are abandoned past it.
    pub cycle_deadline_secs: u64,
    /// Cap on simultaneous outbound collector calls.
    pub max_concurrent_jobs: usize,
    /// Log level filter string (e.g. "info", "naka_node_lib=debug").
    pub log_level: String,
    #[serde(default)]
    pub networks: Vec<NetworkConfig>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            http_bind: "127.0.0.1".to_string(),
            http_port: DEFAULT_HTTP_PORT,
            refresh_interval_secs: DEFAULT_REFRESH_INTERVAL_SECS,
            job_timeout_secs: DEFAULT_JOB_TIMEOUT_SECS,
            cycle_deadline_secs: DEFAULT_CYCLE_DEADLINE_SECS,
            max_concurrent_jobs: DEFAULT_MAX_CONCURRENT_JOBS,
            log_level: "info".to_string(),
            networks: Vec::new(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("naka")
}

fn load_err(e: config::ConfigError) -> ConfigError {
    ConfigError::Load(e.to_string())
}

impl NodeConfig {
    /// Build the layered configuration and validate it.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let mut builder = Config::builder()
            .set_default("data_dir", defaults.data_dir.to_string_lossy().into_owned())
            .and_then(|b| b.set_default("http_bind", defaults.http_bind))
            .and_then(|b| b.set_default("http_port", i64::from(defaults.http_port)))
            .and_then(|b| b.set_default("refresh_interval_secs", defaults.refresh_interval_secs))
            .and_then(|b| b.set_default("job_timeout_secs", defaults.job_timeout_secs))
            .and_then(|b| b.set_default("cycle_deadline_secs", defaults.cycle_deadline_secs))
            .and_then(|b| b.set_default("max_concurrent_jobs", defaults.max_concurrent_jobs as u64))
            .and_then(|b| b.set_default("log_level", defaults.log_level))
            .map_err(load_err)?;

        if let Some(path) = file {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
        }

        let mut config: Self = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(load_err)?
            .try_deserialize()
            .map_err(load_err)?;

        if config.networks.is_empty() {
            config.networks = Self::builtin_networks()?;
        }
        config.validate()?;
        Ok(config)
    }

    /// The embedded network table on its own.
    pub fn builtin_networks() -> Result<Vec<NetworkConfig>, ConfigError> {
        #[derive(Deserialize)]
        struct Table {
            networks: Vec<NetworkConfig>,
        }
        let table: Table = Config::builder()
            .add_source(File::from_str(BUILTIN_NETWORKS, FileFormat::Toml))
            .build()
            .map_err(load_err)?
            .try_deserialize()
            .map_err(load_err)?;
        Ok(table.networks)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent_jobs == 0 {
            return Err(ConfigError::Invalid("max_concurrent_jobs must be at least 1".into()));
        }
        if self.job_timeout_secs == 0 || self.cycle_deadline_secs == 0 {
            return Err(ConfigError::Invalid("timeouts must be at least 1 second".into()));
        }
        if self.refresh_interval_secs == 0 {
            return Err(ConfigError::Invalid("refresh_interval_secs must be at least 1".into()));
        }

        let mut seen = HashSet::new();
        for network in &self.networks {
            network.validate()?;
            if !seen.insert(network.token.clone()) {
                return Err(ConfigError::DuplicateToken(network.token.to_string()));
            }
        }
        Ok(())
    }

    /// Networks that take part in refresh cycles.
    pub fn enabled_networks(&self) -> impl Iterator<Item = &NetworkConfig> {
        self.networks.iter().filter(|n| n.enabled)
    }

    /// Path to the RocksDB coefficient store.
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("coefficients")
    }

    /// Socket address string for the HTTP server.
    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.http_bind, self.http_port)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_secs)
    }

    pub fn cycle_deadline(&self) -> Duration {
        Duration::from_secs(self.cycle_deadline_secs)
    }
}
