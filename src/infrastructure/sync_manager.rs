//! Sync Manager
//!
//! Asks every node to reconcile with its parent on a fixed cadence.

use crate::application::node_registry::NodeRegistry;
use crate::infrastructure::shutdown::ShutdownController;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Outcome of one sync cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub synced: usize,
    pub failed: usize,
}

/// Periodic driver of [`EdgeNode::sync_with_parent`].
///
/// What a sync moves is the parent's business; this only guarantees the
/// cadence. Overlap protection lives in the node, so a manual sync running
/// alongside a scheduled one is still serialized.
///
/// [`EdgeNode::sync_with_parent`]: crate::application::EdgeNode::sync_with_parent
#[derive(Debug, Clone)]
pub struct SyncManager {
    interval: Duration,
}

impl SyncManager {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Sync every node once. Failures are logged and counted, never fatal.
    pub async fn sync_once(&self, nodes: &NodeRegistry) -> SyncReport {
        let mut report = SyncReport::default();
        for node in nodes.all() {
            match node.sync_with_parent().await {
                Ok(()) => report.synced += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!("sync of node {} failed: {}", node.id(), e);
                }
            }
        }
        report
    }

    /// Start the sync loop. It stops when `shutdown` fires.
    #[cfg_attr(coverage_nightly, coverage(off))]
    pub fn start(&self, nodes: Arc<NodeRegistry>, shutdown: ShutdownController) -> JoinHandle<()> {
        let manager = self.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(manager.interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = shutdown.wait() => break,
                    _ = interval.tick() => {
                        let report = manager.sync_once(&nodes).await;
                        tracing::debug!(
                            "sync cycle done, synced={} failed={}",
                            report.synced,
                            report.failed
                        );
                    }
                }
            }
            tracing::debug!("sync manager stopped");
        })
    }
}
