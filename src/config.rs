//! Configuration
//!
//! Node and network settings, plus process-level settings loaded from the
//! environment.

use crate::domain::services::health_policy::DEFAULT_ERROR_RATE_THRESHOLD;
use crate::domain::value_objects::Strategy;
use std::time::Duration;

/// Per-node settings.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Unique identifier for this node (e.g., "edge-eu-1")
    pub id: String,
    /// Free-form region label
    pub region: String,
    /// Advertised capacity, reported in the node descriptor
    pub capacity: usize,
    /// Whether successful results are cached
    pub cache_enabled: bool,
    /// Lifetime of a cached result
    pub cache_ttl: Duration,
    /// Preferred reconciliation cadence with the parent
    pub sync_interval: Duration,
    /// Number of workers in the pool
    pub max_concurrent: usize,
    /// Accepted for the transport layer; no effect on dispatch
    pub compression_level: u32,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            id: String::new(),
            region: "local".to_string(),
            capacity: 1000,
            cache_enabled: true,
            cache_ttl: Duration::from_secs(300),
            sync_interval: Duration::from_secs(30),
            max_concurrent: 10,
            compression_level: 6,
        }
    }
}

impl NodeConfig {
    /// Create a new configuration with node ID and region.
    pub fn new(id: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            region: region.into(),
            ..Default::default()
        }
    }

    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn cache_enabled(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = interval;
        self
    }

    pub fn max_concurrent(mut self, workers: usize) -> Self {
        self.max_concurrent = workers;
        self
    }

    pub fn compression_level(mut self, level: u32) -> Self {
        self.compression_level = level;
        self
    }

    /// Capacity of the node's intake queue.
    pub fn intake_capacity(&self) -> usize {
        self.max_concurrent * 10
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.id.is_empty() {
            return Err(ConfigError::MissingNodeId);
        }
        if self.max_concurrent == 0 {
            return Err(ConfigError::NoWorkers);
        }
        if self.compression_level > 9 {
            return Err(ConfigError::CompressionLevel(self.compression_level));
        }
        Ok(())
    }
}

/// Network-wide settings.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    pub strategy: Strategy,
    /// Interval between health checks
    pub health_check_interval: Duration,
    /// Interval between sync cycles
    pub sync_interval: Duration,
    /// Error rate above which a node is marked unhealthy
    pub error_rate_threshold: f64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::RoundRobin,
            health_check_interval: Duration::from_secs(10),
            sync_interval: Duration::from_secs(30),
            error_rate_threshold: DEFAULT_ERROR_RATE_THRESHOLD,
        }
    }
}

impl NetworkConfig {
    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn health_check_interval(mut self, interval: Duration) -> Self {
        self.health_check_interval = interval;
        self
    }

    pub fn sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = interval;
        self
    }

    pub fn error_rate_threshold(mut self, threshold: f64) -> Self {
        self.error_rate_threshold = threshold;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.health_check_interval.is_zero() {
            return Err(ConfigError::ZeroInterval("health_check_interval"));
        }
        if self.sync_interval.is_zero() {
            return Err(ConfigError::ZeroInterval("sync_interval"));
        }
        if !(0.0..=1.0).contains(&self.error_rate_threshold) {
            return Err(ConfigError::ErrorRateThreshold(self.error_rate_threshold));
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("node id is required")]
    MissingNodeId,
    #[error("max_concurrent must be at least 1")]
    NoWorkers,
    #[error("compression level {0} is out of range 0-9")]
    CompressionLevel(u32),
    #[error("invalid node spec '{0}', expected id[:region]")]
    NodeSpec(String),
    #[error("{0} must be greater than zero")]
    ZeroInterval(&'static str),
    #[error("error rate threshold {0} is out of range 0-1")]
    ErrorRateThreshold(f64),
}

/// Process-level settings.
#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: String,
    /// Nodes to start, as (id, region)
    pub nodes: Vec<(String, String)>,
    pub strategy: Strategy,
    pub max_concurrent: usize,
    pub cache_enabled: bool,
    pub cache_ttl_secs: u64,
    pub health_interval_secs: u64,
    pub sync_interval_secs: u64,
    pub request_timeout_ms: u64,
    /// Directory for per-node SQLite stores; in-memory stores when unset
    pub data_dir: Option<String>,
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            nodes: vec![("edge-1".to_string(), "local".to_string())],
            strategy: Strategy::RoundRobin,
            max_concurrent: 10,
            cache_enabled: true,
            cache_ttl_secs: 300,
            health_interval_secs: 10,
            sync_interval_secs: 30,
            request_timeout_ms: 30_000,
            data_dir: None,
            debug: false,
        }
    }
}

impl Config {
    /// Node configuration for one entry of `nodes`.
    pub fn node_config(&self, id: &str, region: &str) -> NodeConfig {
        NodeConfig::new(id, region)
            .max_concurrent(self.max_concurrent)
            .cache_enabled(self.cache_enabled)
            .cache_ttl(Duration::from_secs(self.cache_ttl_secs))
            .sync_interval(Duration::from_secs(self.sync_interval_secs))
    }

    pub fn network_config(&self) -> NetworkConfig {
        NetworkConfig::default()
            .strategy(self.strategy)
            .health_check_interval(Duration::from_secs(self.health_interval_secs))
            .sync_interval(Duration::from_secs(self.sync_interval_secs))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Validate the network settings and every node's settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.network_config().validate()?;
        for (id, region) in &self.nodes {
            self.node_config(id, region).validate()?;
        }
        Ok(())
    }
}

/// Parse a comma-separated node list, e.g. `edge-1:eu,edge-2:us`.
/// A missing region defaults to `local`.
pub fn parse_nodes(spec: &str) -> Result<Vec<(String, String)>, ConfigError> {
    spec.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|entry| {
            let mut parts = entry.splitn(2, ':');
            let id = parts.next().unwrap_or_default().trim();
            let region = parts.next().map(str::trim).unwrap_or("local");
            if id.is_empty() || region.is_empty() {
                return Err(ConfigError::NodeSpec(entry.to_string()));
            }
            Ok((id.to_string(), region.to_string()))
        })
        .collect()
}

fn env_flag(name: &str, default: bool) -> bool {
    std::env::var(name)
        .map(|v| v == "1" || v.to_lowercase() == "true")
        .unwrap_or(default)
}

fn env_num<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

pub fn load_config() -> anyhow::Result<Config> {
    let defaults = Config::default();

    let listen_addr =
        std::env::var("EDGE_LISTEN_ADDR").unwrap_or_else(|_| defaults.listen_addr.clone());

    let nodes = match std::env::var("EDGE_NODES") {
        Ok(spec) => parse_nodes(&spec)?,
        Err(_) => defaults.nodes.clone(),
    };
    if nodes.is_empty() {
        anyhow::bail!("EDGE_NODES lists no nodes");
    }

    let strategy = std::env::var("EDGE_STRATEGY")
        .map(|s| Strategy::from_name(&s))
        .unwrap_or(defaults.strategy);

    let max_concurrent = env_num("EDGE_MAX_CONCURRENT", defaults.max_concurrent);
    let cache_enabled = env_flag("EDGE_CACHE_ENABLED", defaults.cache_enabled);
    let cache_ttl_secs = env_num("EDGE_CACHE_TTL_SECS", defaults.cache_ttl_secs);
    let health_interval_secs = env_num("EDGE_HEALTH_INTERVAL_SECS", defaults.health_interval_secs);
    let sync_interval_secs = env_num("EDGE_SYNC_INTERVAL_SECS", defaults.sync_interval_secs);
    let request_timeout_ms = env_num("EDGE_REQUEST_TIMEOUT_MS", defaults.request_timeout_ms);

    let data_dir = std::env::var("EDGE_DATA_DIR").ok();

    let debug = std::env::var("DEBUG").is_ok();

    let config = Config {
        listen_addr,
        nodes,
        strategy,
        max_concurrent,
        cache_enabled,
        cache_ttl_secs,
        health_interval_secs,
        sync_interval_secs,
        request_timeout_ms,
        data_dir,
        debug,
    };
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_default_node_config() {
        let cfg = NodeConfig::default();
        assert!(cfg.id.is_empty());
        assert!(cfg.cache_enabled);
        assert_eq!(cfg.cache_ttl, Duration::from_secs(300));
        assert_eq!(cfg.max_concurrent, 10);
        assert_eq!(cfg.intake_capacity(), 100);
    }

    #[test]
    fn test_node_builder_pattern() {
        let cfg = NodeConfig::new("edge-eu-1", "eu")
            .capacity(50)
            .cache_enabled(false)
            .cache_ttl(Duration::from_secs(5))
            .max_concurrent(4)
            .compression_level(9);

        assert_eq!(cfg.id, "edge-eu-1");
        assert_eq!(cfg.region, "eu");
        assert_eq!(cfg.capacity, 50);
        assert!(!cfg.cache_enabled);
        assert_eq!(cfg.intake_capacity(), 40);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_validate_missing_node_id() {
        assert_eq!(
            NodeConfig::default().validate(),
            Err(ConfigError::MissingNodeId)
        );
    }

    #[test]
    fn test_validate_no_workers() {
        let cfg = NodeConfig::new("n", "eu").max_concurrent(0);
        assert_eq!(cfg.validate(), Err(ConfigError::NoWorkers));
    }

    #[test]
    fn test_validate_compression_level() {
        let cfg = NodeConfig::new("n", "eu").compression_level(12);
        assert_eq!(cfg.validate(), Err(ConfigError::CompressionLevel(12)));
    }

    #[test]
    fn test_default_network_config() {
        let cfg = NetworkConfig::default();
        assert_eq!(cfg.strategy, Strategy::RoundRobin);
        assert_eq!(cfg.error_rate_threshold, 0.5);
        assert_eq!(cfg.health_check_interval, Duration::from_secs(10));
    }

    #[test]
    fn test_validate_network_config() {
        assert!(NetworkConfig::default().validate().is_ok());
        assert_eq!(
            NetworkConfig::default()
                .health_check_interval(Duration::ZERO)
                .validate(),
            Err(ConfigError::ZeroInterval("health_check_interval"))
        );
        assert_eq!(
            NetworkConfig::default().sync_interval(Duration::ZERO).validate(),
            Err(ConfigError::ZeroInterval("sync_interval"))
        );
        assert_eq!(
            NetworkConfig::default().error_rate_threshold(1.5).validate(),
            Err(ConfigError::ErrorRateThreshold(1.5))
        );
        assert!(NetworkConfig::default()
            .error_rate_threshold(f64::NAN)
            .validate()
            .is_err());
    }

    #[test]
    fn test_config_validate_rejects_zero_intervals() {
        let cfg = Config {
            health_interval_secs: 0,
            ..Default::default()
        };
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::ZeroInterval("health_check_interval"))
        );

        let cfg = Config {
            sync_interval_secs: 0,
            ..Default::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroInterval("sync_interval")));

        let cfg = Config {
            max_concurrent: 0,
            ..Default::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::NoWorkers));
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_parse_nodes() {
        let nodes = parse_nodes("edge-1:eu, edge-2:us ,edge-3").unwrap();
        assert_eq!(
            nodes,
            vec![
                ("edge-1".to_string(), "eu".to_string()),
                ("edge-2".to_string(), "us".to_string()),
                ("edge-3".to_string(), "local".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_nodes_rejects_empty_id() {
        assert!(matches!(
            parse_nodes(":eu"),
            Err(ConfigError::NodeSpec(_))
        ));
    }

    #[test]
    fn test_config_derives_node_and_network_config() {
        let cfg = Config {
            max_concurrent: 3,
            cache_ttl_secs: 7,
            strategy: Strategy::Fastest,
            ..Default::default()
        };
        let node = cfg.node_config("a", "eu");
        assert_eq!(node.max_concurrent, 3);
        assert_eq!(node.cache_ttl, Duration::from_secs(7));
        assert_eq!(cfg.network_config().strategy, Strategy::Fastest);
        assert_eq!(cfg.request_timeout(), Duration::from_secs(30));
    }
}
