//! Graceful Shutdown Handler
//!
//! Signals shutdown to background loops and tracks in-flight ingress
//! requests so they can drain before nodes are closed.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};

/// Shutdown coordinator.
///
/// Built on a watch channel, so a loop that subscribes after shutdown was
/// initiated still observes it.
#[derive(Clone)]
pub struct ShutdownController {
    state: Arc<watch::Sender<bool>>,
    in_flight: Arc<AtomicUsize>,
    drained: Arc<Notify>,
}

impl ShutdownController {
    pub fn new() -> Self {
        let (state, _) = watch::channel(false);
        Self {
            state: Arc::new(state),
            in_flight: Arc::new(AtomicUsize::new(0)),
            drained: Arc::new(Notify::new()),
        }
    }

    /// Initiate shutdown. Later calls are no-ops.
    pub fn shutdown(&self) {
        let changed = self.state.send_if_modified(|down| !std::mem::replace(down, true));
        if changed {
            tracing::info!("initiating graceful shutdown");
        }
    }

    pub fn is_shutdown(&self) -> bool {
        *self.state.borrow()
    }

    /// Resolves once shutdown has been initiated.
    pub async fn wait(&self) {
        let mut rx = self.state.subscribe();
        // Err only if the sender is gone, and we hold it
        let _ = rx.wait_for(|down| *down).await;
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Track one in-flight request until the guard is dropped.
    pub fn request_guard(&self) -> RequestGuard {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        RequestGuard {
            controller: self.clone(),
        }
    }

    fn request_ended(&self) {
        let prev = self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if prev == 1 && self.is_shutdown() {
            self.drained.notify_waiters();
        }
    }

    /// Wait for in-flight requests to finish, up to `timeout`.
    ///
    /// Returns false if requests were still running when time ran out.
    pub async fn wait_for_drain(&self, timeout: Duration) -> bool {
        let drained = self.drained.notified();
        tokio::pin!(drained);
        // Register before checking the count so a wakeup in between is not lost
        drained.as_mut().enable();
        if self.in_flight() == 0 {
            return true;
        }

        tokio::select! {
            _ = drained => true,
            _ = tokio::time::sleep(timeout) => {
                tracing::warn!("drain timeout: {} requests still running", self.in_flight());
                false
            }
        }
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard for one in-flight request.
pub struct RequestGuard {
    controller: ShutdownController,
}

impl Drop for RequestGuard {
    fn drop(&mut self) {
        self.controller.request_ended();
    }
}

/// Resolves when the process receives Ctrl+C or SIGTERM, after initiating
/// shutdown on `controller`.
#[cfg_attr(coverage_nightly, coverage(off))]
pub async fn shutdown_signal(controller: ShutdownController) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C"),
        _ = terminate => tracing::info!("received SIGTERM"),
    }

    controller.shutdown();
}
