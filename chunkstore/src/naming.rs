//! Chunk naming and metadata.
//!
//! The full identifier of each chunk (the "chunk name") is
//! `"<array name>/<index string>"`, where the array name is hierarchical
//! (e.g. `"<bucket>/<path>"`) and the index string joins the zero-padded start
//! index of each dimension of the chunk with `_` (e.g. `"00001_00512"`).

use std::ops::Range;

use itertools::Itertools;

use crate::{
    chunk_array::{ArrayShape, ChunkArray},
    data_type::DataType,
    error::ChunkStoreError,
};

/// The separator of the components of a hierarchical name.
pub const NAME_SEP: char = '/';

/// The separator of the per-dimension indices of an index string.
pub const INDEX_SEP: char = '_';

/// The minimum width of each zero-padded index of an index string.
pub const NAME_INDEX_WIDTH: usize = 5;

/// What the chunk metadata is derived from.
#[derive(Debug, Clone, Copy)]
pub enum ChunkSource<'a> {
    /// The expected data type of a chunk to be read.
    DataType(&'a DataType),
    /// An actual chunk to be written.
    Chunk(&'a ChunkArray),
}

/// Join name components with [`NAME_SEP`].
#[must_use]
pub fn join(names: &[&str]) -> String {
    names.join("/")
}

/// Split `name` into its first `n` components and the remainder.
///
/// # Errors
/// Returns [`ChunkStoreError::InvalidChunk`] if `name` does not have `n` leading components followed by a non-empty remainder.
pub fn split(name: &str, n: usize) -> Result<(Vec<&str>, &str), ChunkStoreError> {
    let mut components = name.splitn(n + 1, NAME_SEP).collect::<Vec<_>>();
    let remainder = if components.len() == n + 1 {
        components.pop()
    } else {
        None
    };
    match remainder {
        Some(remainder) if !remainder.is_empty() && components.iter().all(|c| !c.is_empty()) => {
            Ok((components, remainder))
        }
        _ => Err(ChunkStoreError::InvalidChunk(format!(
            "name {name:?} does not have {n} leading component(s) and a remainder"
        ))),
    }
}

/// Returns the index string of a chunk with index `ranges`, e.g. `"00001_00512"`.
#[must_use]
pub fn chunk_id_str(ranges: &[Range<u64>]) -> String {
    ranges
        .iter()
        .map(|range| format!("{:0width$}", range.start, width = NAME_INDEX_WIDTH))
        .join(&INDEX_SEP.to_string())
}

/// Check that `array_name` is non-empty and has no empty components.
///
/// # Errors
/// Returns [`ChunkStoreError::InvalidChunk`] if `array_name` is malformed.
pub fn validate_array_name(array_name: &str) -> Result<(), ChunkStoreError> {
    if array_name.is_empty() || array_name.split(NAME_SEP).any(str::is_empty) {
        Err(ChunkStoreError::InvalidChunk(format!(
            "invalid array name {array_name:?}"
        )))
    } else {
        Ok(())
    }
}

/// Derive the chunk name of a chunk of `array_name` with index `ranges`.
///
/// # Errors
/// Returns [`ChunkStoreError::InvalidChunk`] if
///  - `array_name` is empty or has an empty component, or
///  - `ranges` is empty or a range has a non-positive length.
pub fn chunk_name(array_name: &str, ranges: &[Range<u64>]) -> Result<String, ChunkStoreError> {
    validate_array_name(array_name)?;
    let chunk_name = format!("{array_name}{NAME_SEP}{}", chunk_id_str(ranges));
    if ranges.is_empty() {
        return Err(ChunkStoreError::InvalidChunk(format!(
            "Chunk {chunk_name:?}: no index ranges"
        )));
    }
    if let Some(range) = ranges.iter().find(|range| range.end <= range.start) {
        return Err(ChunkStoreError::InvalidChunk(format!(
            "Chunk {chunk_name:?}: index range {range:?} has a non-positive length"
        )));
    }
    Ok(chunk_name)
}

/// Derive the chunk name and shape of a chunk of `array_name` with index `ranges`.
///
/// The shape is implied by `ranges`. If `source` is an actual chunk, its shape must equal the implied shape.
///
/// # Errors
/// Returns [`ChunkStoreError::InvalidChunk`] if [`chunk_name`] fails or
/// the shape of a source chunk differs from the shape implied by `ranges`.
pub fn chunk_metadata(
    array_name: &str,
    ranges: &[Range<u64>],
    source: ChunkSource<'_>,
) -> Result<(String, ArrayShape), ChunkStoreError> {
    let chunk_name = chunk_name(array_name, ranges)?;
    let shape: ArrayShape = ranges.iter().map(|range| range.end - range.start).collect();
    if let ChunkSource::Chunk(chunk) = source {
        if chunk.shape() != shape.as_slice() {
            return Err(ChunkStoreError::InvalidChunk(format!(
                "Chunk {chunk_name:?}: shape {shape:?} implied by the index ranges differs from the actual shape {:?}",
                chunk.shape()
            )));
        }
    }
    Ok((chunk_name, shape))
}

/// Derive the chunk name and shape like [`chunk_metadata`], checking `ranges` against the declared `array_shape`.
///
/// # Errors
/// Returns [`ChunkStoreError::InvalidChunk`] if the dimensionality of `ranges` differs from `array_shape`,
/// a range ends beyond the extent of the array, or [`chunk_metadata`] fails.
pub fn chunk_metadata_within(
    array_name: &str,
    ranges: &[Range<u64>],
    source: ChunkSource<'_>,
    array_shape: &[u64],
) -> Result<(String, ArrayShape), ChunkStoreError> {
    if ranges.len() != array_shape.len() {
        return Err(ChunkStoreError::InvalidChunk(format!(
            "array {array_name:?} has {} dimension(s) but {} index range(s) were given",
            array_shape.len(),
            ranges.len()
        )));
    }
    if let Some((range, extent)) = ranges
        .iter()
        .zip(array_shape)
        .find(|&(range, &extent)| range.end > extent)
    {
        return Err(ChunkStoreError::InvalidChunk(format!(
            "array {array_name:?}: index range {range:?} is out of bounds of extent {extent}"
        )));
    }
    chunk_metadata(array_name, ranges, source)
}

/// Verify that a retrieved chunk has the expected data type and shape.
///
/// # Errors
/// Returns [`ChunkStoreError::BadChunk`] on a mismatch.
pub fn check_chunk(
    chunk_name: &str,
    chunk: &ChunkArray,
    data_type: &DataType,
    shape: &[u64],
) -> Result<(), ChunkStoreError> {
    if chunk.data_type() == data_type && chunk.shape() == shape {
        Ok(())
    } else {
        Err(ChunkStoreError::BadChunk(format!(
            "Chunk {chunk_name:?}: dtype {} and/or shape {:?} in store differs from expected dtype {data_type} and shape {shape:?}",
            chunk.data_type(),
            chunk.shape(),
        )))
    }
}
