mod data_store;
mod parent_sync;
mod request_handler;
mod resolver;

pub use data_store::DataStore;
pub use parent_sync::{DetachedParent, ParentSync};
pub use request_handler::RequestHandler;
pub use resolver::Resolver;
