mod memory_store;
mod scylla_store;
mod store;

pub use memory_store::MemoryStore;
pub use scylla_store::ScyllaStore;
pub use store::*;
