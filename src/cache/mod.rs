//! Replacement map and the external stores it is persisted through.

mod map;
mod store;

pub use map::ReplacementMap;
pub use store::{CacheStore, JsonFileStore, MemoryStore};
