//! Infrastructure Layer
//!
//! Background loops and process lifecycle.

pub mod health_checker;
pub mod shutdown;
pub mod sync_manager;

pub use health_checker::{HealthCheckConfig, HealthChecker};
pub use shutdown::{shutdown_signal, RequestGuard, ShutdownController};
pub use sync_manager::{SyncManager, SyncReport};
