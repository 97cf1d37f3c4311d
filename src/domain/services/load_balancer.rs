//! Load Balancer Service
//!
//! Pure domain logic for selecting the node that serves a request.
//! This service has NO external dependencies - it's pure Rust.

use crate::domain::entities::NodeDescriptor;
use crate::domain::value_objects::Strategy;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Load balancer service for selecting a node.
///
/// Only healthy nodes are candidates. Candidates are considered in the
/// order given, and the first one wins any tie.
pub struct LoadBalancer {
    strategy: Strategy,
    /// Round-robin cursor, only ever incremented
    counter: AtomicUsize,
}

impl LoadBalancer {
    pub fn new(strategy: Strategy) -> Self {
        Self {
            strategy,
            counter: AtomicUsize::new(0),
        }
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Select a node for the next request.
    ///
    /// # Returns
    /// The selected node, or None if no node is healthy. Unhealthy nodes are
    /// never used as a fallback.
    ///
    /// # Example
    /// ```ignore
    /// let lb = LoadBalancer::new(Strategy::LeastLoaded);
    /// let node = lb.pick(&network.nodes()).ok_or(EdgeError::NoHealthyNode)?;
    /// ```
    pub fn pick<'a>(&self, nodes: &'a [NodeDescriptor]) -> Option<&'a NodeDescriptor> {
        let healthy: Vec<&NodeDescriptor> = nodes.iter().filter(|n| n.is_healthy()).collect();
        if healthy.is_empty() {
            return None;
        }

        match self.strategy {
            Strategy::RoundRobin => {
                let turn = self.counter.fetch_add(1, Ordering::Relaxed);
                Some(healthy[turn % healthy.len()])
            }
            // min_by_key/min_by return the first of several equal minima
            Strategy::LeastLoaded => healthy.into_iter().min_by_key(|n| n.current_load),
            Strategy::Fastest => healthy.into_iter().min_by(|a, b| {
                a.metrics
                    .avg_response_time
                    .total_cmp(&b.metrics.avg_response_time)
            }),
        }
    }
}

impl Default for LoadBalancer {
    fn default() -> Self {
        Self::new(Strategy::default())
    }
}
