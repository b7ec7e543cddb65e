use std::ops::Range;

use auto_impl::auto_impl;

use crate::{ChunkArray, ChunkStoreError, DataType};

/// A chunk store.
///
/// A chunk store reads, writes and enumerates chunks of N-dimensional arrays.
/// The chunk with index `ranges` of the array `array_name` is identified by its chunk name
/// (see [`chunk_metadata`](crate::naming::chunk_metadata)).
///
/// Each chunk is an independent unit: there is no atomicity across chunks,
/// and concurrent writes to the same chunk are resolved by the backend (last write wins).
#[auto_impl(&, Arc)]
pub trait ChunkStore: Send + Sync {
    /// Retrieve the chunk with index `ranges` of `array_name`.
    ///
    /// # Errors
    /// Returns a [`ChunkStoreError`]:
    ///  - [`InvalidChunk`](ChunkStoreError::InvalidChunk) if the request is malformed,
    ///  - [`ChunkNotFound`](ChunkStoreError::ChunkNotFound) if the chunk does not exist,
    ///  - [`BadChunk`](ChunkStoreError::BadChunk) if the stored chunk cannot be decoded or does not have `data_type` and the shape implied by `ranges`, or
    ///  - [`StoreUnavailable`](ChunkStoreError::StoreUnavailable) if the store cannot be reached.
    fn get_chunk(
        &self,
        array_name: &str,
        ranges: &[Range<u64>],
        data_type: &DataType,
    ) -> Result<ChunkArray, ChunkStoreError>;

    /// Store `chunk` with index `ranges` of `array_name`, replacing any existing chunk.
    ///
    /// # Errors
    /// Returns a [`ChunkStoreError`] if the request is malformed (including a shape inconsistent with `ranges`) or the store cannot be written.
    fn put_chunk(
        &self,
        array_name: &str,
        ranges: &[Range<u64>],
        chunk: &ChunkArray,
    ) -> Result<(), ChunkStoreError>;

    /// Returns true if the chunk with index `ranges` of `array_name` exists.
    ///
    /// The default implementation retrieves the chunk.
    ///
    /// # Errors
    /// Returns a [`ChunkStoreError`] other than [`ChunkNotFound`](ChunkStoreError::ChunkNotFound) if the existence of the chunk cannot be determined.
    fn has_chunk(
        &self,
        array_name: &str,
        ranges: &[Range<u64>],
        data_type: &DataType,
    ) -> Result<bool, ChunkStoreError> {
        match self.get_chunk(array_name, ranges, data_type) {
            Ok(_) => Ok(true),
            Err(ChunkStoreError::ChunkNotFound(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Returns the index strings of all chunks of `array_name`, in no particular order.
    ///
    /// # Errors
    /// Returns a [`ChunkStoreError`] if `array_name` is malformed or the store cannot be listed.
    fn list_chunk_ids(&self, array_name: &str) -> Result<Vec<String>, ChunkStoreError>;

    /// Erase the chunk with index `ranges` of `array_name`.
    ///
    /// Erasing a chunk that does not exist succeeds.
    ///
    /// # Errors
    /// Returns a [`ChunkStoreError`] if the request is malformed or the chunk cannot be erased.
    fn delete_chunk(&self, array_name: &str, ranges: &[Range<u64>]) -> Result<(), ChunkStoreError>;

    /// Prepare the store for chunks of `array_name`, e.g. by creating a bucket.
    ///
    /// The default implementation does nothing.
    ///
    /// # Errors
    /// Returns a [`ChunkStoreError`] if the store cannot be prepared.
    fn create_array(&self, array_name: &str) -> Result<(), ChunkStoreError> {
        let _ = array_name;
        Ok(())
    }
}
