//! Domain Layer
//!
//! Entities, value objects, ports and pure services of the dispatch domain.

pub mod context;
pub mod entities;
pub mod errors;
pub mod ports;
pub mod services;
pub mod value_objects;

pub use context::RequestContext;
pub use entities::{HealthStatus, Metrics, NodeDescriptor, Params};
pub use errors::EdgeError;
pub use value_objects::{CacheKey, Strategy};
