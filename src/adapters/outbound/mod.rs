mod memory_data_store;
mod sqlite_data_store;

pub use memory_data_store::InMemoryDataStore;
pub use sqlite_data_store::SqliteDataStore;
