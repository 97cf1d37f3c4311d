//! Worker Pool & Dispatcher
//!
//! A fixed set of workers, each with a small bounded inbox, fed by one
//! dispatcher that reads from a bounded intake queue.
//!
//! Idle workers announce themselves on a ready queue. For every request the
//! dispatcher takes one ready token without waiting and hands the request to
//! that worker. When no token is available (every worker is busy) the
//! dispatcher runs the request itself, inline. Under sustained overload the
//! dispatcher becomes the bottleneck, but requests always make progress and
//! nothing queues without bound.

use crate::application::cache::ResponseCache;
use crate::application::metrics::MetricsCollector;
use crate::application::registry::ResolverRegistry;
use crate::domain::context::RequestContext;
use crate::domain::entities::Params;
use crate::domain::errors::EdgeError;
use crate::domain::value_objects::CacheKey;
use futures::FutureExt;
use parking_lot::Mutex;
use serde_json::Value;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};

/// Capacity of each worker's inbox.
pub const WORKER_INBOX_CAPACITY: usize = 10;

/// Lifecycle of a worker task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Processing,
    Stopped,
}

impl WorkerState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Idle,
            1 => Self::Processing,
            _ => Self::Stopped,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Processing => 1,
            Self::Stopped => 2,
        }
    }
}

/// RAII guard for a node's in-flight request count.
///
/// Decrements the count when dropped, whichever way the request ends.
pub struct LoadGuard {
    load: Arc<AtomicUsize>,
}

impl LoadGuard {
    pub fn acquire(load: &Arc<AtomicUsize>) -> Self {
        load.fetch_add(1, Ordering::SeqCst);
        Self { load: load.clone() }
    }
}

impl Drop for LoadGuard {
    fn drop(&mut self) {
        self.load.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A queued request. Consumed exactly once, by a worker or by the dispatcher.
pub struct Job {
    pub path: String,
    pub params: Params,
    pub ctx: RequestContext,
    pub reply: oneshot::Sender<Result<Value, EdgeError>>,
    pub load: Option<LoadGuard>,
}

/// Shared execution logic: cache, then resolver, then metrics.
#[derive(Clone)]
pub struct Executor {
    registry: Arc<ResolverRegistry>,
    /// None when caching is disabled for the node
    cache: Option<Arc<ResponseCache>>,
    metrics: Arc<MetricsCollector>,
}

impl Executor {
    pub fn new(
        registry: Arc<ResolverRegistry>,
        cache: Option<Arc<ResponseCache>>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            registry,
            cache,
            metrics,
        }
    }

    /// Serve one request. Every outcome is recorded in the metrics.
    ///
    /// Only successful results are cached; a failed call leaves any earlier
    /// entry untouched and the next identical call reaches the resolver.
    pub async fn execute(
        &self,
        ctx: RequestContext,
        path: &str,
        params: Params,
    ) -> Result<Value, EdgeError> {
        let start = Instant::now();

        let key = self.cache.as_ref().map(|_| CacheKey::new(path, &params));
        if let (Some(cache), Some(key)) = (&self.cache, &key) {
            if let Some(value) = cache.get(key) {
                tracing::debug!("cache hit for {}", key);
                self.metrics.update(start, true, true);
                return Ok(value);
            }
        }

        let Some(resolver) = self.registry.lookup(path) else {
            self.metrics.update(start, false, false);
            return Err(EdgeError::NotFound {
                path: path.to_string(),
            });
        };

        let outcome = AssertUnwindSafe(resolver.resolve(ctx, params))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(anyhow::anyhow!(panic_message(path, panic.as_ref()))));

        match outcome {
            Ok(value) => {
                if let (Some(cache), Some(key)) = (&self.cache, key) {
                    cache.insert(key, value.clone());
                }
                self.metrics.update(start, true, false);
                Ok(value)
            }
            Err(err) => {
                self.metrics.update(start, false, false);
                Err(EdgeError::Resolver(err))
            }
        }
    }

    /// Execute a job and deliver its reply.
    ///
    /// A job whose context is already done when it is picked up is answered
    /// with the context's error and never reaches the cache or resolver. Its
    /// caller has stopped waiting, so it is not recorded in the metrics.
    pub async fn run(&self, job: Job) {
        let Job {
            path,
            params,
            ctx,
            reply,
            load,
        } = job;

        if let Some(err) = ctx.err() {
            drop(load);
            tracing::debug!("skipping {}: {}", path, err);
            let _ = reply.send(Err(err));
            return;
        }

        let result = self.execute(ctx, &path, params).await;
        // Release the load first so a woken caller sees it settled
        drop(load);
        if reply.send(result).is_err() {
            tracing::debug!("caller stopped waiting for {}", path);
        }
    }
}

/// Turn a resolver panic into an error message. The panic stays contained
/// to the request; the worker or dispatcher that ran it keeps serving.
fn panic_message(path: &str, panic: &(dyn Any + Send)) -> String {
    let detail = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    tracing::error!("resolver for {} panicked: {}", path, detail);
    format!("resolver panicked: {}", detail)
}

/// Worker pool plus its dispatcher.
///
/// Must be started inside a Tokio runtime.
pub struct WorkerPool {
    intake: Mutex<Option<mpsc::Sender<Job>>>,
    intake_capacity: usize,
    states: Vec<Arc<AtomicU8>>,
}

impl WorkerPool {
    /// Spawn `workers` worker tasks and the dispatcher task.
    pub fn start(workers: usize, intake_capacity: usize, executor: Executor) -> Self {
        let (intake_tx, intake_rx) = mpsc::channel(intake_capacity.max(1));
        // Each worker holds at most one token, so sends never wait
        let (ready_tx, ready_rx) = mpsc::channel(workers.max(1));

        let mut inboxes = Vec::with_capacity(workers);
        let mut states = Vec::with_capacity(workers);

        for id in 0..workers {
            let (inbox_tx, inbox_rx) = mpsc::channel(WORKER_INBOX_CAPACITY);
            let state = Arc::new(AtomicU8::new(WorkerState::Idle.as_u8()));
            inboxes.push(inbox_tx);
            states.push(state.clone());

            tokio::spawn(worker_loop(
                id,
                inbox_rx,
                ready_tx.clone(),
                executor.clone(),
                state,
            ));
        }
        drop(ready_tx);

        tokio::spawn(dispatch_loop(intake_rx, ready_rx, inboxes, executor));

        Self {
            intake: Mutex::new(Some(intake_tx)),
            intake_capacity,
            states,
        }
    }

    /// Sender side of the intake queue, or None once the pool is closed.
    pub fn intake(&self) -> Option<mpsc::Sender<Job>> {
        self.intake.lock().clone()
    }

    pub fn intake_capacity(&self) -> usize {
        self.intake_capacity
    }

    pub fn size(&self) -> usize {
        self.states.len()
    }

    pub fn states(&self) -> Vec<WorkerState> {
        self.states
            .iter()
            .map(|s| WorkerState::from_u8(s.load(Ordering::SeqCst)))
            .collect()
    }

    /// Close the intake queue. Requests already queued are still served;
    /// afterwards the dispatcher and every worker stop.
    ///
    /// Returns false if the pool was already closed.
    pub fn close(&self) -> bool {
        self.intake.lock().take().is_some()
    }
}

async fn worker_loop(
    id: usize,
    mut inbox: mpsc::Receiver<Job>,
    ready: mpsc::Sender<usize>,
    executor: Executor,
    state: Arc<AtomicU8>,
) {
    loop {
        state.store(WorkerState::Idle.as_u8(), Ordering::SeqCst);
        if ready.send(id).await.is_err() {
            break;
        }
        let Some(job) = inbox.recv().await else {
            break;
        };
        state.store(WorkerState::Processing.as_u8(), Ordering::SeqCst);
        executor.run(job).await;
    }
    state.store(WorkerState::Stopped.as_u8(), Ordering::SeqCst);
    tracing::debug!("worker {} stopped", id);
}

async fn dispatch_loop(
    mut intake: mpsc::Receiver<Job>,
    mut ready: mpsc::Receiver<usize>,
    inboxes: Vec<mpsc::Sender<Job>>,
    executor: Executor,
) {
    while let Some(job) = intake.recv().await {
        let job = match ready.try_recv().ok().and_then(|id| inboxes.get(id)) {
            Some(inbox) => match inbox.try_send(job) {
                Ok(()) => continue,
                Err(TrySendError::Full(job) | TrySendError::Closed(job)) => job,
            },
            None => job,
        };

        tracing::debug!("all workers busy, running {} inline", job.path);
        executor.run(job).await;
    }
    tracing::debug!("intake closed, dispatcher stopping");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::Resolver;
    use serde_json::json;
    use std::time::Duration;
    use tokio::sync::Notify;

    fn executor_with(registry: Arc<ResolverRegistry>) -> (Executor, Arc<MetricsCollector>) {
        let metrics = Arc::new(MetricsCollector::new());
        let cache = Arc::new(ResponseCache::new(Duration::from_secs(60)));
        (
            Executor::new(registry, Some(cache), metrics.clone()),
            metrics,
        )
    }

    async fn submit(pool: &WorkerPool, path: &str) -> oneshot::Receiver<Result<Value, EdgeError>> {
        let (tx, rx) = oneshot::channel();
        pool.intake()
            .unwrap()
            .send(Job {
                path: path.to_string(),
                params: Params::new(),
                ctx: RequestContext::background(),
                reply: tx,
                load: None,
            })
            .await
            .unwrap();
        rx
    }

    async fn wait_for<F: Fn() -> bool>(cond: F) {
        for _ in 0..200 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached");
    }

    #[tokio::test]
    async fn test_executor_not_found() {
        let (executor, metrics) = executor_with(Arc::new(ResolverRegistry::new()));
        let err = executor
            .execute(RequestContext::background(), "query:none", Params::new())
            .await
            .unwrap_err();
        assert!(matches!(err, EdgeError::NotFound { .. }));
        assert_eq!(metrics.snapshot().error_rate, 1.0);
    }

    #[tokio::test]
    async fn test_executor_without_cache_always_resolves() {
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = Arc::new(ResolverRegistry::new());
        let counter = calls.clone();
        registry.register(
            "query:count",
            Arc::new(move |_ctx: RequestContext, _params: Params| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, anyhow::Error>(json!("ok"))
                }
            }),
        );
        let metrics = Arc::new(MetricsCollector::new());
        let executor = Executor::new(registry, None, metrics.clone());

        for _ in 0..3 {
            executor
                .execute(RequestContext::background(), "query:count", Params::new())
                .await
                .unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(metrics.snapshot().cache_hit_rate, 0.0);
    }

    #[tokio::test]
    async fn test_pool_serves_requests() {
        let registry = Arc::new(ResolverRegistry::new());
        registry.register(
            "query:echo",
            Arc::new(|_ctx: RequestContext, _params: Params| async {
                Ok::<_, anyhow::Error>(json!("pong"))
            }),
        );
        let (executor, metrics) = executor_with(registry);
        let pool = WorkerPool::start(2, 20, executor);

        let rx = submit(&pool, "query:echo").await;
        assert_eq!(rx.await.unwrap().unwrap(), json!("pong"));
        assert_eq!(metrics.snapshot().request_count, 1);
    }

    #[tokio::test]
    async fn test_saturated_pool_falls_back_inline() {
        let gate = Arc::new(Notify::new());
        let registry = Arc::new(ResolverRegistry::new());
        let blocker = gate.clone();
        registry.register(
            "slow",
            Arc::new(move |_ctx: RequestContext, _params: Params| {
                let blocker = blocker.clone();
                async move {
                    blocker.notified().await;
                    Ok::<_, anyhow::Error>(json!("slow"))
                }
            }),
        );
        registry.register(
            "fast",
            Arc::new(|_ctx: RequestContext, _params: Params| async {
                Ok::<_, anyhow::Error>(json!("fast"))
            }),
        );
        let (executor, _) = executor_with(registry);
        let pool = WorkerPool::start(1, 10, executor);

        // Occupy the only worker
        let slow = submit(&pool, "slow").await;
        wait_for(|| pool.states() == vec![WorkerState::Processing]).await;

        // No worker is free: the dispatcher serves this one itself
        let fast = submit(&pool, "fast").await;
        let reply = tokio::time::timeout(Duration::from_secs(1), fast)
            .await
            .expect("inline fallback did not run");
        assert_eq!(reply.unwrap().unwrap(), json!("fast"));

        gate.notify_one();
        assert_eq!(slow.await.unwrap().unwrap(), json!("slow"));
    }

    #[tokio::test]
    async fn test_close_stops_workers() {
        let (executor, _) = executor_with(Arc::new(ResolverRegistry::new()));
        let pool = WorkerPool::start(3, 30, executor);
        assert_eq!(pool.size(), 3);

        assert!(pool.close());
        assert!(pool.intake().is_none());
        wait_for(|| pool.states().iter().all(|s| *s == WorkerState::Stopped)).await;

        assert!(!pool.close());
    }

    #[tokio::test]
    async fn test_queued_requests_served_after_close() {
        let registry = Arc::new(ResolverRegistry::new());
        registry.register(
            "query:echo",
            Arc::new(|_ctx: RequestContext, _params: Params| async {
                Ok::<_, anyhow::Error>(json!(1))
            }),
        );
        let (executor, _) = executor_with(registry);
        let pool = WorkerPool::start(1, 10, executor);

        let rx = submit(&pool, "query:echo").await;
        pool.close();
        assert_eq!(rx.await.unwrap().unwrap(), json!(1));
    }

    struct Panicking;

    #[async_trait::async_trait]
    impl Resolver for Panicking {
        async fn resolve(&self, _ctx: RequestContext, _params: Params) -> anyhow::Result<Value> {
            panic!("kaboom")
        }
    }

    fn panicking_registry() -> Arc<ResolverRegistry> {
        let registry = Arc::new(ResolverRegistry::new());
        registry.register("boom", Arc::new(Panicking));
        registry.register(
            "ok",
            Arc::new(|_ctx: RequestContext, _params: Params| async {
                Ok::<_, anyhow::Error>(json!("ok"))
            }),
        );
        registry
    }

    #[tokio::test]
    async fn test_worker_survives_resolver_panic() {
        let (executor, metrics) = executor_with(panicking_registry());
        let pool = WorkerPool::start(1, 10, executor);

        let err = submit(&pool, "boom").await.await.unwrap().unwrap_err();
        assert!(matches!(err, EdgeError::Resolver(_)));
        assert_eq!(err.to_string(), "resolver panicked: kaboom");

        let ok = submit(&pool, "ok").await.await.unwrap();
        assert_eq!(ok.unwrap(), json!("ok"));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.request_count, 2);
        assert_eq!(snapshot.error_rate, 0.5);
        wait_for(|| pool.states() == vec![WorkerState::Idle]).await;
    }

    #[tokio::test]
    async fn test_inline_resolver_panic_keeps_dispatcher_alive() {
        let gate = Arc::new(Notify::new());
        let registry = panicking_registry();
        let blocker = gate.clone();
        registry.register(
            "slow",
            Arc::new(move |_ctx: RequestContext, _params: Params| {
                let blocker = blocker.clone();
                async move {
                    blocker.notified().await;
                    Ok::<_, anyhow::Error>(json!("slow"))
                }
            }),
        );
        let (executor, metrics) = executor_with(registry);
        let pool = WorkerPool::start(1, 10, executor);

        let slow = submit(&pool, "slow").await;
        wait_for(|| pool.states() == vec![WorkerState::Processing]).await;

        // The only worker is busy, so both of these run on the dispatcher
        let boom = tokio::time::timeout(Duration::from_secs(1), submit(&pool, "boom").await)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(boom, Err(EdgeError::Resolver(_))));

        let ok = tokio::time::timeout(Duration::from_secs(1), submit(&pool, "ok").await)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(ok.unwrap(), json!("ok"));

        gate.notify_one();
        assert_eq!(slow.await.unwrap().unwrap(), json!("slow"));
        assert_eq!(metrics.snapshot().request_count, 3);
        assert!(pool.intake().is_some());
    }

    #[tokio::test]
    async fn test_done_context_is_not_executed() {
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = Arc::new(ResolverRegistry::new());
        let counter = calls.clone();
        registry.register(
            "query:count",
            Arc::new(move |_ctx: RequestContext, _params: Params| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, anyhow::Error>(json!(1)) }
            }),
        );
        let (executor, metrics) = executor_with(registry);

        let ctx = RequestContext::background();
        ctx.cancel();
        let load = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = oneshot::channel();
        executor
            .run(Job {
                path: "query:count".to_string(),
                params: Params::new(),
                ctx,
                reply: tx,
                load: Some(LoadGuard::acquire(&load)),
            })
            .await;

        assert!(matches!(rx.await.unwrap(), Err(EdgeError::Cancelled)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(metrics.snapshot().request_count, 0);
        assert_eq!(load.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_load_guard() {
        let load = Arc::new(AtomicUsize::new(0));
        {
            let _a = LoadGuard::acquire(&load);
            let _b = LoadGuard::acquire(&load);
            assert_eq!(load.load(Ordering::SeqCst), 2);
        }
        assert_eq!(load.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_worker_state_encoding() {
        for s in [WorkerState::Idle, WorkerState::Processing, WorkerState::Stopped] {
            assert_eq!(WorkerState::from_u8(s.as_u8()), s);
        }
    }
}
