//! In-process persistence.

mod store;

pub use store::MemoryStore;
