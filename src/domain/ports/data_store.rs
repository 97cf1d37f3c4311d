//! Data Store Port
//!
//! The local storage handle a node owns for its lifetime.

use crate::domain::errors::EdgeError;

/// Handle to node-local storage.
///
/// The dispatch layer only needs to release it when the node closes.
/// Query semantics belong to the adapters and the resolvers that use them.
pub trait DataStore: Send + Sync {
    /// Release the underlying resources.
    fn close(&self) -> Result<(), EdgeError>;
}
