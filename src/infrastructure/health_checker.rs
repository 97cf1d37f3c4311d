//! Health Checker
//!
//! Periodically re-evaluates every node's health flag from its error rate.

use crate::application::edge_node::EdgeNode;
use crate::application::node_registry::NodeRegistry;
use crate::domain::entities::HealthStatus;
use crate::domain::services::health_policy::{self, DEFAULT_ERROR_RATE_THRESHOLD};
use crate::infrastructure::shutdown::ShutdownController;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Health check configuration.
#[derive(Debug, Clone)]
pub struct HealthCheckConfig {
    /// Interval between health checks
    pub interval: Duration,
    /// Error rate above which a node is marked unhealthy
    pub error_rate_threshold: f64,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            error_rate_threshold: DEFAULT_ERROR_RATE_THRESHOLD,
        }
    }
}

type HealthCallback = Arc<dyn Fn(&str, HealthStatus) + Send + Sync>;

/// Error-rate health checker for edge nodes.
///
/// Each tick applies [`health_policy::evaluate`] to the node's current
/// metrics. There is no hysteresis: a node near the threshold may flip on
/// every tick. The flag is advisory and never stops the node.
#[derive(Clone)]
pub struct HealthChecker {
    config: HealthCheckConfig,
    /// Callback when health changes
    on_health_change: Option<HealthCallback>,
}

impl HealthChecker {
    pub fn new(config: HealthCheckConfig) -> Self {
        Self {
            config,
            on_health_change: None,
        }
    }

    /// Set callback for health status changes.
    pub fn on_health_change<F>(mut self, callback: F) -> Self
    where
        F: Fn(&str, HealthStatus) + Send + Sync + 'static,
    {
        self.on_health_change = Some(Arc::new(callback));
        self
    }

    pub fn config(&self) -> &HealthCheckConfig {
        &self.config
    }

    /// Evaluate one node, returning its new status.
    pub fn check_node(&self, node: &EdgeNode) -> HealthStatus {
        let error_rate = node.metrics().error_rate;
        let status = health_policy::evaluate(error_rate, self.config.error_rate_threshold);
        let previous = node.set_health_status(status);

        if previous != status {
            match status {
                HealthStatus::Healthy => {
                    tracing::info!("node {} is now healthy", node.id());
                }
                HealthStatus::Unhealthy => {
                    tracing::warn!(
                        "node {} is now unhealthy: error rate {:.2}",
                        node.id(),
                        error_rate
                    );
                }
            }
            if let Some(callback) = &self.on_health_change {
                callback(node.id(), status);
            }
        }
        status
    }

    /// Run one check over every node. Returns how many nodes changed state.
    pub fn check_once(&self, nodes: &NodeRegistry) -> usize {
        let mut changed = 0;
        for node in nodes.all() {
            let before = node.health_status();
            if self.check_node(&node) != before {
                changed += 1;
            }
        }
        changed
    }

    /// Start the health check loop. It stops when `shutdown` fires.
    #[cfg_attr(coverage_nightly, coverage(off))]
    pub fn start(&self, nodes: Arc<NodeRegistry>, shutdown: ShutdownController) -> JoinHandle<()> {
        let checker = self.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(checker.config.interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = shutdown.wait() => break,
                    _ = interval.tick() => {
                        let changed = checker.check_once(&nodes);
                        if changed > 0 {
                            tracing::debug!("health check: {} nodes changed state", changed);
                        }
                    }
                }
            }
            tracing::debug!("health checker stopped");
        })
    }
}

impl Default for HealthChecker {
    fn default() -> Self {
        Self::new(HealthCheckConfig::default())
    }
}
