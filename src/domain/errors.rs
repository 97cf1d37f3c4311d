//! Domain Errors
//!
//! Every failure a caller of the dispatch layer can observe.

use crate::config::ConfigError;

/// Errors surfaced by nodes, the network and the HTTP boundary.
///
/// None of these are retried internally. Retry policy belongs to the caller.
#[derive(Debug, thiserror::Error)]
pub enum EdgeError {
    /// No resolver is registered for the requested path.
    #[error("no handler for path: {path}")]
    NotFound { path: String },

    /// The caller's context was cancelled while waiting for a reply.
    #[error("request cancelled")]
    Cancelled,

    /// The caller's deadline passed while waiting for a reply.
    #[error("request deadline exceeded")]
    DeadlineExceeded,

    /// The resolver itself failed. The message is passed through verbatim.
    #[error(transparent)]
    Resolver(anyhow::Error),

    /// The load balancer found no healthy candidate.
    #[error("no healthy nodes available")]
    NoHealthyNode,

    /// The ingress payload could not be decoded.
    #[error("invalid request payload: {0}")]
    InvalidPayload(String),

    /// The node's intake queue has been closed.
    #[error("node is closed")]
    NodeClosed,

    /// No node with this id is registered in the network.
    #[error("unknown node: {0}")]
    UnknownNode(String),

    /// Reconciliation with the parent authority failed.
    #[error("sync failed: {0}")]
    Sync(String),

    /// The local data store rejected an operation.
    #[error("data store error: {0}")]
    DataStore(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl EdgeError {
    /// Whether this error came from the caller's own context rather than the work.
    pub fn is_context_error(&self) -> bool {
        matches!(self, EdgeError::Cancelled | EdgeError::DeadlineExceeded)
    }
}
