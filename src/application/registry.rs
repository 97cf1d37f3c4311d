//! Resolver Registry
//!
//! Maps request paths to their resolvers.

use crate::domain::ports::Resolver;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Path -> resolver lookup table.
///
/// Read-mostly: workers look up on every cache miss, registration normally
/// happens before traffic starts. Registering a path twice replaces the
/// earlier resolver.
#[derive(Default)]
pub struct ResolverRegistry {
    resolvers: RwLock<HashMap<String, Arc<dyn Resolver>>>,
}

impl ResolverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `resolver` under `path`, replacing any existing mapping.
    pub fn register(&self, path: impl Into<String>, resolver: Arc<dyn Resolver>) {
        let path = path.into();
        if self.resolvers.write().insert(path.clone(), resolver).is_some() {
            tracing::debug!("replaced resolver for {}", path);
        }
    }

    pub fn lookup(&self, path: &str) -> Option<Arc<dyn Resolver>> {
        self.resolvers.read().get(path).cloned()
    }

    pub fn len(&self) -> usize {
        self.resolvers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registered paths, sorted.
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.resolvers.read().keys().cloned().collect();
        paths.sort();
        paths
    }
}
