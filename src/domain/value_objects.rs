//! Value Objects - Immutable domain primitives
//!
//! Value objects are identified by their value rather than identity.
//! They are immutable and can be freely shared.

use crate::domain::entities::Params;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Cache key derived from a request path and its parameters.
///
/// Parameters are sorted by name before serialization, so two parameter
/// maps with equal contents always produce the same key regardless of the
/// map's iteration order. Nested objects are serialized by `serde_json`,
/// whose object type is already ordered.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(path: &str, params: &Params) -> Self {
        let mut names: Vec<&String> = params.keys().collect();
        names.sort();

        let mut key = String::with_capacity(path.len() + 2 + params.len() * 16);
        key.push_str(path);
        key.push('{');
        for (i, name) in names.into_iter().enumerate() {
            if i > 0 {
                key.push(',');
            }
            // Value's Display is its compact JSON form, escaping included
            key.push_str(&Value::String(name.clone()).to_string());
            key.push(':');
            key.push_str(&params[name].to_string());
        }
        key.push('}');
        Self(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Load-balancing strategy for picking a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Rotate through healthy nodes in order
    #[default]
    RoundRobin,
    /// Node with the fewest in-flight requests
    LeastLoaded,
    /// Node with the lowest mean response time
    Fastest,
}

impl Strategy {
    /// Parse a strategy name. Unknown names fall back to round-robin.
    ///
    /// # Examples
    /// ```
    /// use edge_dispatch::domain::value_objects::Strategy;
    ///
    /// assert_eq!(Strategy::from_name("least-loaded"), Strategy::LeastLoaded);
    /// assert_eq!(Strategy::from_name("random"), Strategy::RoundRobin); // fallback
    /// ```
    pub fn from_name(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "round-robin" | "round_robin" | "roundrobin" => Self::RoundRobin,
            "least-loaded" | "least_loaded" | "leastloaded" => Self::LeastLoaded,
            "fastest" => Self::Fastest,
            other => {
                tracing::debug!("unknown strategy '{}', using round-robin", other);
                Self::RoundRobin
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RoundRobin => "round-robin",
            Self::LeastLoaded => "least-loaded",
            Self::Fastest => "fastest",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
