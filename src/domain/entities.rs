//! Domain Entities - Core business objects
//!
//! These entities represent the core concepts of the dispatch domain.
//! They carry no behaviour beyond simple accessors.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Named parameters of a request.
pub type Params = HashMap<String, Value>;

/// Advisory health flag of a node.
///
/// An unhealthy node keeps running; it is only excluded from new
/// load-balancer selections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    #[default]
    Healthy,
    Unhealthy,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Unhealthy => "unhealthy",
        }
    }
}

/// Running aggregates for a node or for the whole network.
///
/// `error_rate` and `cache_hit_rate` always stay in `[0, 1]`.
/// The resource fields are reserved for an external collector and stay zero.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Metrics {
    #[serde(rename = "RequestCount")]
    pub request_count: u64,
    /// Mean response time in seconds.
    #[serde(rename = "AvgResponseTime")]
    pub avg_response_time: f64,
    #[serde(rename = "ErrorRate")]
    pub error_rate: f64,
    #[serde(rename = "CacheHitRate")]
    pub cache_hit_rate: f64,
    #[serde(rename = "CPUUsage")]
    pub cpu_usage: f64,
    #[serde(rename = "MemoryUsage")]
    pub memory_usage: f64,
    #[serde(rename = "NetworkIn")]
    pub network_in: u64,
    #[serde(rename = "NetworkOut")]
    pub network_out: u64,
}

/// Point-in-time view of a node, as seen by the load balancer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDescriptor {
    pub id: String,
    pub region: String,
    pub capacity: usize,
    /// Requests accepted by the node and not yet finished
    pub current_load: usize,
    pub health_status: HealthStatus,
    pub metrics: Metrics,
}

impl NodeDescriptor {
    pub fn is_healthy(&self) -> bool {
        self.health_status.is_healthy()
    }
}
