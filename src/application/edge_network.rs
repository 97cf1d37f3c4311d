//! Edge Network - Main application use case
//!
//! Routes requests across a set of edge nodes and runs the background
//! health checking and sync loops.

use crate::application::edge_node::EdgeNode;
use crate::application::metrics::MetricsCollector;
use crate::application::node_registry::NodeRegistry;
use crate::config::NetworkConfig;
use crate::domain::context::RequestContext;
use crate::domain::entities::{Metrics, NodeDescriptor, Params};
use crate::domain::errors::EdgeError;
use crate::domain::ports::RequestHandler;
use crate::domain::services::LoadBalancer;
use crate::domain::value_objects::Strategy;
use crate::infrastructure::health_checker::{HealthCheckConfig, HealthChecker};
use crate::infrastructure::shutdown::ShutdownController;
use crate::infrastructure::sync_manager::{SyncManager, SyncReport};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;

/// Top-level orchestrator.
///
/// Owns the node registry, load balancer, health checker and sync manager.
/// Everything is instance state; several networks can live in one process.
pub struct EdgeNetwork {
    nodes: Arc<NodeRegistry>,
    balancer: LoadBalancer,
    health_checker: HealthChecker,
    sync_manager: SyncManager,
    metrics: MetricsCollector,
    shutdown: ShutdownController,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl EdgeNetwork {
    /// Create a network. Fails if `config` does not validate.
    pub fn new(config: NetworkConfig) -> Result<Self, EdgeError> {
        let health_checker = HealthChecker::new(HealthCheckConfig {
            interval: config.health_check_interval,
            error_rate_threshold: config.error_rate_threshold,
        });
        Self::with_health_checker(config, health_checker)
    }

    /// Create a network with a custom health checker (e.g. one with a
    /// change callback). The checker's own interval and threshold apply.
    pub fn with_health_checker(
        config: NetworkConfig,
        health_checker: HealthChecker,
    ) -> Result<Self, EdgeError> {
        config.validate()?;
        let checker_config = health_checker.config();
        NetworkConfig::default()
            .health_check_interval(checker_config.interval)
            .error_rate_threshold(checker_config.error_rate_threshold)
            .validate()?;

        Ok(Self {
            nodes: Arc::new(NodeRegistry::new()),
            balancer: LoadBalancer::new(config.strategy),
            health_checker,
            sync_manager: SyncManager::new(config.sync_interval),
            metrics: MetricsCollector::new(),
            shutdown: ShutdownController::new(),
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// Add a node. A node with the same id is replaced (not closed) and
    /// returned to the caller.
    pub fn add_node(&self, node: Arc<EdgeNode>) -> Option<Arc<EdgeNode>> {
        let id = node.id().to_string();
        let replaced = self.nodes.insert(node);
        if replaced.is_some() {
            tracing::warn!("node {} replaced an existing node with the same id", id);
        } else {
            tracing::info!("node {} joined the network", id);
        }
        replaced
    }

    /// Remove a node and close it.
    pub fn remove_node(&self, id: &str) -> Result<(), EdgeError> {
        let node = self
            .nodes
            .remove(id)
            .ok_or_else(|| EdgeError::UnknownNode(id.to_string()))?;
        tracing::info!("node {} left the network", id);
        node.close()
    }

    pub fn get_node(&self, id: &str) -> Option<Arc<EdgeNode>> {
        self.nodes.get(id)
    }

    /// Descriptors of every node, ordered by id.
    pub fn nodes(&self) -> Vec<NodeDescriptor> {
        self.nodes.descriptors()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn strategy(&self) -> Strategy {
        self.balancer.strategy()
    }

    /// Pick a healthy node for the next request.
    pub fn select_node(&self) -> Result<Arc<EdgeNode>, EdgeError> {
        let candidates = self.nodes.descriptors();
        let picked = self
            .balancer
            .pick(&candidates)
            .ok_or(EdgeError::NoHealthyNode)?;
        // The node may have been removed since the snapshot
        self.nodes
            .get(&picked.id)
            .ok_or(EdgeError::NoHealthyNode)
    }

    /// Route a request to a healthy node and wait for its reply.
    pub async fn process_request(
        &self,
        ctx: &RequestContext,
        path: &str,
        params: Params,
    ) -> Result<Value, EdgeError> {
        let start = Instant::now();

        let node = match self.select_node() {
            Ok(node) => node,
            Err(err) => {
                tracing::warn!("cannot route {}: {}", path, err);
                self.metrics.update(start, false, false);
                return Err(err);
            }
        };
        tracing::debug!("routing {} to node {}", path, node.id());

        let result = node.process_request(ctx, path, params).await;
        self.metrics.update(start, result.is_ok(), false);
        result
    }

    /// Network-wide request metrics. Cache hits are only tracked per node.
    pub fn metrics(&self) -> Metrics {
        self.metrics.snapshot()
    }

    /// Run one health check over every node now.
    pub fn check_health(&self) -> usize {
        self.health_checker.check_once(&self.nodes)
    }

    /// Run one sync cycle over every node now.
    pub async fn sync_now(&self) -> SyncReport {
        self.sync_manager.sync_once(&self.nodes).await
    }

    pub fn shutdown_controller(&self) -> ShutdownController {
        self.shutdown.clone()
    }

    /// Start the health check and sync loops.
    pub fn start(&self) {
        let mut tasks = self.tasks.lock();
        if !tasks.is_empty() {
            tracing::debug!("network background tasks already running");
            return;
        }
        tasks.push(
            self.health_checker
                .start(self.nodes.clone(), self.shutdown.clone()),
        );
        tasks.push(
            self.sync_manager
                .start(self.nodes.clone(), self.shutdown.clone()),
        );
        tracing::info!(
            "edge network started nodes={} strategy={}",
            self.nodes.len(),
            self.balancer.strategy()
        );
    }

    /// Stop the background loops and close every node.
    pub async fn shutdown(&self) {
        self.shutdown.shutdown();

        let tasks: Vec<JoinHandle<()>> = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            if let Err(e) = task.await {
                tracing::error!("background task failed: {:?}", e);
            }
        }

        for node in self.nodes.drain() {
            if let Err(e) = node.close() {
                tracing::warn!("closing node {}: {}", node.id(), e);
            }
        }
        tracing::info!("edge network stopped");
    }
}

#[async_trait]
impl RequestHandler for EdgeNetwork {
    async fn process_request(
        &self,
        ctx: &RequestContext,
        path: &str,
        params: Params,
    ) -> Result<Value, EdgeError> {
        EdgeNetwork::process_request(self, ctx, path, params).await
    }

    fn metrics(&self) -> Metrics {
        EdgeNetwork::metrics(self)
    }

    fn node_metrics(&self, node_id: &str) -> Option<Metrics> {
        self.get_node(node_id).map(|n| n.metrics())
    }

    fn nodes(&self) -> Vec<NodeDescriptor> {
        EdgeNetwork::nodes(self)
    }
}
