//! An in-memory chunk store.

use std::{collections::BTreeMap, ops::Range};

use parking_lot::Mutex;

use crate::{
    naming::{self, ChunkSource, NAME_SEP},
    ChunkArray, ChunkStore, ChunkStoreError, DataType,
};

/// An in-memory chunk store.
///
/// Chunks are held by chunk name and verified against the expected data type and shape on retrieval,
/// exactly like a chunk store with a remote backend.
#[derive(Debug, Default)]
pub struct MemoryChunkStore {
    chunk_map: Mutex<BTreeMap<String, ChunkArray>>,
}

impl MemoryChunkStore {
    /// Create a new, empty memory chunk store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of chunks in the store.
    #[must_use]
    pub fn len(&self) -> usize {
        self.chunk_map.lock().len()
    }

    /// Returns true if the store holds no chunks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunk_map.lock().is_empty()
    }
}

impl ChunkStore for MemoryChunkStore {
    fn get_chunk(
        &self,
        array_name: &str,
        ranges: &[Range<u64>],
        data_type: &DataType,
    ) -> Result<ChunkArray, ChunkStoreError> {
        let (chunk_name, shape) =
            naming::chunk_metadata(array_name, ranges, ChunkSource::DataType(data_type))?;
        let chunk = self.chunk_map.lock().get(&chunk_name).cloned();
        let chunk = chunk.ok_or_else(|| {
            ChunkStoreError::ChunkNotFound(format!("Chunk {chunk_name:?}: not in memory store"))
        })?;
        naming::check_chunk(&chunk_name, &chunk, data_type, &shape)?;
        Ok(chunk)
    }

    fn put_chunk(
        &self,
        array_name: &str,
        ranges: &[Range<u64>],
        chunk: &ChunkArray,
    ) -> Result<(), ChunkStoreError> {
        let (chunk_name, _) = naming::chunk_metadata(array_name, ranges, ChunkSource::Chunk(chunk))?;
        self.chunk_map.lock().insert(chunk_name, chunk.clone());
        Ok(())
    }

    fn has_chunk(
        &self,
        array_name: &str,
        ranges: &[Range<u64>],
        _data_type: &DataType,
    ) -> Result<bool, ChunkStoreError> {
        let chunk_name = naming::chunk_name(array_name, ranges)?;
        Ok(self.chunk_map.lock().contains_key(&chunk_name))
    }

    fn list_chunk_ids(&self, array_name: &str) -> Result<Vec<String>, ChunkStoreError> {
        naming::validate_array_name(array_name)?;
        let prefix = format!("{array_name}{NAME_SEP}");
        let chunk_map = self.chunk_map.lock();
        Ok(chunk_map
            .range(prefix.clone()..)
            .map(|(chunk_name, _)| chunk_name)
            .take_while(|chunk_name| chunk_name.starts_with(&prefix))
            .filter_map(|chunk_name| chunk_name.strip_prefix(&prefix))
            .filter(|chunk_id| !chunk_id.contains(NAME_SEP))
            .map(str::to_string)
            .collect())
    }

    fn delete_chunk(&self, array_name: &str, ranges: &[Range<u64>]) -> Result<(), ChunkStoreError> {
        let chunk_name = naming::chunk_name(array_name, ranges)?;
        self.chunk_map.lock().remove(&chunk_name);
        Ok(())
    }
}
