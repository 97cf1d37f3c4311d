//! Adapters
//!
//! Inbound HTTP API and outbound data stores.

pub mod inbound;
pub mod outbound;
