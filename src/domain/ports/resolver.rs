//! Resolver Port
//!
//! Defines the handler executed for one request path.

use crate::domain::context::RequestContext;
use crate::domain::entities::Params;
use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;

/// Business logic behind one request path.
///
/// Resolvers are invoked concurrently from several workers, so they must be
/// `Send + Sync`. Long-running resolvers should watch `ctx` and stop early
/// once it is done; the dispatcher only stops waiting, it never aborts them.
#[async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(&self, ctx: RequestContext, params: Params) -> anyhow::Result<Value>;
}

/// Plain async closures are resolvers.
#[async_trait]
impl<F, Fut> Resolver for F
where
    F: Fn(RequestContext, Params) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
{
    async fn resolve(&self, ctx: RequestContext, params: Params) -> anyhow::Result<Value> {
        (self)(ctx, params).await
    }
}
