//! edge-dispatch Library
//!
//! Request dispatch and load balancing for a network of edge nodes: each
//! node runs a bounded worker pool with a response cache, and the network
//! routes requests to healthy nodes by a configurable strategy.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

// Re-export commonly used types
pub use adapters::inbound::ApiServer;
pub use adapters::outbound::{InMemoryDataStore, SqliteDataStore};
pub use application::{EdgeNetwork, EdgeNode};
pub use config::{load_config, NetworkConfig, NodeConfig};
pub use domain::entities::{HealthStatus, Metrics, NodeDescriptor, Params};
pub use domain::errors::EdgeError;
pub use domain::ports::{DataStore, ParentSync, RequestHandler, Resolver};
pub use domain::services::LoadBalancer;
pub use domain::value_objects::{CacheKey, Strategy};
pub use domain::RequestContext;
pub use infrastructure::ShutdownController;
