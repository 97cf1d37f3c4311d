//! Request Handler Port
//!
//! Inbound interface shared by a single node and the whole network, so the
//! HTTP adapter can front either one.

use crate::domain::context::RequestContext;
use crate::domain::entities::{Metrics, NodeDescriptor, Params};
use crate::domain::errors::EdgeError;
use async_trait::async_trait;
use serde_json::Value;

#[async_trait]
pub trait RequestHandler: Send + Sync {
    /// Execute `path` with `params`, blocking until a reply or `ctx` is done.
    async fn process_request(
        &self,
        ctx: &RequestContext,
        path: &str,
        params: Params,
    ) -> Result<Value, EdgeError>;

    /// Aggregate metrics of this handler.
    fn metrics(&self) -> Metrics;

    /// Metrics of one member node, if this handler fronts several.
    fn node_metrics(&self, _node_id: &str) -> Option<Metrics> {
        None
    }

    /// Member nodes, if this handler fronts several.
    fn nodes(&self) -> Vec<NodeDescriptor> {
        Vec::new()
    }
}
