//! Application Layer
//!
//! Request dispatch for a single node and routing across a network of nodes.

pub mod cache;
pub mod edge_network;
pub mod edge_node;
pub mod metrics;
pub mod node_registry;
pub mod registry;
pub mod worker_pool;

pub use cache::ResponseCache;
pub use edge_network::EdgeNetwork;
pub use edge_node::EdgeNode;
pub use metrics::MetricsCollector;
pub use node_registry::NodeRegistry;
pub use registry::ResolverRegistry;
pub use worker_pool::{Executor, Job, LoadGuard, WorkerPool, WorkerState, WORKER_INBOX_CAPACITY};
