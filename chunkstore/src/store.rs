//! Chunk stores.

mod memory_store;

pub use memory_store::MemoryChunkStore;
