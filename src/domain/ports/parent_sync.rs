//! Parent Sync Port
//!
//! Reconciliation of node state with an upstream authority.

use crate::domain::errors::EdgeError;
use async_trait::async_trait;

/// Upstream authority a node reconciles with.
///
/// What moves during a sync is up to the implementation. Callers only
/// guarantee cadence and that two syncs of the same node never overlap.
#[async_trait]
pub trait ParentSync: Send + Sync {
    async fn sync(&self, node_id: &str) -> Result<(), EdgeError>;
}

/// Parent used when a node has no upstream authority configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct DetachedParent;

#[async_trait]
impl ParentSync for DetachedParent {
    async fn sync(&self, node_id: &str) -> Result<(), EdgeError> {
        tracing::debug!("node {} has no parent, nothing to sync", node_id);
        Ok(())
    }
}
