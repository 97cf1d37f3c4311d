//! Edge Node
//!
//! One independently addressable compute unit: worker pool, dispatcher,
//! response cache, metrics and a local data store.

use crate::application::cache::ResponseCache;
use crate::application::metrics::MetricsCollector;
use crate::application::registry::ResolverRegistry;
use crate::application::worker_pool::{Executor, Job, LoadGuard, WorkerPool, WorkerState};
use crate::config::NodeConfig;
use crate::domain::context::RequestContext;
use crate::domain::entities::{HealthStatus, Metrics, NodeDescriptor, Params};
use crate::domain::errors::EdgeError;
use crate::domain::ports::{DataStore, DetachedParent, ParentSync, RequestHandler, Resolver};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{oneshot, Mutex};

/// An edge node.
///
/// Construction spawns the worker and dispatcher tasks, so it must happen
/// inside a Tokio runtime.
pub struct EdgeNode {
    config: NodeConfig,
    registry: Arc<ResolverRegistry>,
    cache: Arc<ResponseCache>,
    metrics: Arc<MetricsCollector>,
    pool: WorkerPool,
    load: Arc<AtomicUsize>,
    health: RwLock<HealthStatus>,
    data_store: Arc<dyn DataStore>,
    parent: Arc<dyn ParentSync>,
    /// Held for the duration of a sync so two syncs never overlap
    sync_lock: Mutex<()>,
    last_synced: RwLock<Option<Instant>>,
    closed: AtomicBool,
}

impl EdgeNode {
    /// Create a node with no upstream parent.
    pub fn new(config: NodeConfig, data_store: Arc<dyn DataStore>) -> Result<Self, EdgeError> {
        Self::with_parent(config, data_store, Arc::new(DetachedParent))
    }

    /// Create a node that reconciles with `parent`.
    pub fn with_parent(
        config: NodeConfig,
        data_store: Arc<dyn DataStore>,
        parent: Arc<dyn ParentSync>,
    ) -> Result<Self, EdgeError> {
        config.validate()?;

        let registry = Arc::new(ResolverRegistry::new());
        let cache = Arc::new(ResponseCache::new(config.cache_ttl));
        let metrics = Arc::new(MetricsCollector::new());

        let executor = Executor::new(
            registry.clone(),
            config.cache_enabled.then(|| cache.clone()),
            metrics.clone(),
        );
        let pool = WorkerPool::start(config.max_concurrent, config.intake_capacity(), executor);

        tracing::info!(
            "edge node {} started region={} workers={} cache={}",
            config.id,
            config.region,
            config.max_concurrent,
            config.cache_enabled
        );

        Ok(Self {
            config,
            registry,
            cache,
            metrics,
            pool,
            load: Arc::new(AtomicUsize::new(0)),
            health: RwLock::new(HealthStatus::Healthy),
            data_store,
            parent,
            sync_lock: Mutex::new(()),
            last_synced: RwLock::new(None),
            closed: AtomicBool::new(false),
        })
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }

    pub fn region(&self) -> &str {
        &self.config.region
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Register an async closure as the resolver for `path`.
    pub fn register_handler<F, Fut>(&self, path: impl Into<String>, handler: F)
    where
        F: Fn(RequestContext, Params) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        self.registry.register(path, Arc::new(handler));
    }

    /// Register a resolver object for `path`.
    pub fn register_resolver(&self, path: impl Into<String>, resolver: Arc<dyn Resolver>) {
        self.registry.register(path, resolver);
    }

    pub fn registry(&self) -> &ResolverRegistry {
        &self.registry
    }

    /// Enqueue a request and wait for its reply.
    ///
    /// Returns the context's error as soon as `ctx` is done, whether the
    /// request is still queued or already running. A context that is done on
    /// entry fails immediately without enqueuing anything.
    pub async fn process_request(
        &self,
        ctx: &RequestContext,
        path: &str,
        params: Params,
    ) -> Result<Value, EdgeError> {
        if let Some(err) = ctx.err() {
            return Err(err);
        }
        let intake = self.pool.intake().ok_or(EdgeError::NodeClosed)?;

        let (reply_tx, reply_rx) = oneshot::channel();
        let job = Job {
            path: path.to_string(),
            params,
            ctx: ctx.clone(),
            reply: reply_tx,
            load: Some(LoadGuard::acquire(&self.load)),
        };

        tokio::select! {
            biased;
            err = ctx.done() => return Err(err),
            sent = intake.send(job) => sent.map_err(|_| EdgeError::NodeClosed)?,
        }

        tokio::select! {
            biased;
            reply = reply_rx => reply.map_err(|_| EdgeError::NodeClosed)?,
            err = ctx.done() => Err(err),
        }
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub fn metrics(&self) -> Metrics {
        self.metrics.snapshot()
    }

    /// Requests accepted and not yet finished.
    pub fn current_load(&self) -> usize {
        self.load.load(Ordering::SeqCst)
    }

    pub fn health_status(&self) -> HealthStatus {
        *self.health.read()
    }

    /// Set the health flag, returning the previous value.
    pub fn set_health_status(&self, status: HealthStatus) -> HealthStatus {
        std::mem::replace(&mut *self.health.write(), status)
    }

    pub fn descriptor(&self) -> NodeDescriptor {
        NodeDescriptor {
            id: self.config.id.clone(),
            region: self.config.region.clone(),
            capacity: self.config.capacity,
            current_load: self.current_load(),
            health_status: self.health_status(),
            metrics: self.metrics(),
        }
    }

    pub fn worker_states(&self) -> Vec<WorkerState> {
        self.pool.states()
    }

    pub fn data_store(&self) -> Arc<dyn DataStore> {
        self.data_store.clone()
    }

    /// Reconcile with the parent authority.
    ///
    /// Concurrent calls for the same node are serialized.
    pub async fn sync_with_parent(&self) -> Result<(), EdgeError> {
        let _guard = self.sync_lock.lock().await;
        self.parent.sync(&self.config.id).await?;
        *self.last_synced.write() = Some(Instant::now());
        Ok(())
    }

    /// When the last successful sync finished.
    pub fn last_synced(&self) -> Option<Instant> {
        *self.last_synced.read()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Stop the workers, close the intake queue and release the data store.
    ///
    /// Requests already queued are still answered. A node can be closed only
    /// once; the second call fails with [`EdgeError::NodeClosed`].
    pub fn close(&self) -> Result<(), EdgeError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(EdgeError::NodeClosed);
        }
        self.pool.close();
        self.data_store.close()?;
        tracing::info!("edge node {} closed", self.config.id);
        Ok(())
    }
}

#[async_trait]
impl RequestHandler for EdgeNode {
    async fn process_request(
        &self,
        ctx: &RequestContext,
        path: &str,
        params: Params,
    ) -> Result<Value, EdgeError> {
        EdgeNode::process_request(self, ctx, path, params).await
    }

    fn metrics(&self) -> Metrics {
        EdgeNode::metrics(self)
    }
}
