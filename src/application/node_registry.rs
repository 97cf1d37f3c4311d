//! Node Registry
//!
//! The set of nodes a network routes across.

use crate::application::edge_node::EdgeNode;
use crate::domain::entities::NodeDescriptor;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Nodes keyed by id.
///
/// Iteration is ordered by node id, which makes load-balancer tie-breaks
/// deterministic. Accessors hand out `Arc` clones so no lock is held while
/// a caller works with a node.
#[derive(Default)]
pub struct NodeRegistry {
    nodes: RwLock<BTreeMap<String, Arc<EdgeNode>>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `node`, returning the node it replaced, if any.
    pub fn insert(&self, node: Arc<EdgeNode>) -> Option<Arc<EdgeNode>> {
        self.nodes.write().insert(node.id().to_string(), node)
    }

    pub fn remove(&self, id: &str) -> Option<Arc<EdgeNode>> {
        self.nodes.write().remove(id)
    }

    pub fn get(&self, id: &str) -> Option<Arc<EdgeNode>> {
        self.nodes.read().get(id).cloned()
    }

    pub fn all(&self) -> Vec<Arc<EdgeNode>> {
        self.nodes.read().values().cloned().collect()
    }

    pub fn descriptors(&self) -> Vec<NodeDescriptor> {
        self.all().iter().map(|n| n.descriptor()).collect()
    }

    /// Remove and return every node.
    pub fn drain(&self) -> Vec<Arc<EdgeNode>> {
        std::mem::take(&mut *self.nodes.write()).into_values().collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
