//! A store of chunks of N-dimensional arrays.
//!
//! Large N-dimensional arrays are decomposed into independently addressable rectangular chunks,
//! each stored as a single NPY encoded object.
//! A chunk is addressed by the name of its array (e.g. `"<bucket>/<path>"`) and one index range per dimension.
//!
//! This crate defines
//!  - the [`ChunkStore`] trait, retrieving, storing and enumerating chunks,
//!  - the [`ChunkStoreError`] taxonomy, and an [`ErrorMap`] for translating backend errors into it,
//!  - chunk naming and metadata derivation ([`naming`]),
//!  - the [`DataType`] and [`ChunkArray`] in-memory representation of chunks,
//!  - an [`npy`] codec that refuses object arrays, and
//!  - an in-memory store ([`store::MemoryChunkStore`]).
//!
//! See the `chunkstore_s3` crate for a store backed by an S3 compatible object store.
//!
//! ## Example
//! ```rust
//! # use chunkstore::{ChunkArray, ChunkStore, DataType, store::MemoryChunkStore};
//! let store = MemoryChunkStore::new();
//! let chunk = ChunkArray::from_elements(vec![2, 2], vec![1.0f32, 2.0, 3.0, 4.0])?;
//! store.put_chunk("bucket/array", &[0..2, 4..6], &chunk)?;
//! assert_eq!(store.list_chunk_ids("bucket/array")?, vec!["00000_00004"]);
//! let chunk = store.get_chunk("bucket/array", &[0..2, 4..6], &DataType::FLOAT32)?;
//! assert_eq!(chunk.to_elements::<f32>()?, vec![1.0, 2.0, 3.0, 4.0]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Licence
//! `chunkstore` is licensed under either of
//! - the Apache License, Version 2.0 <http://www.apache.org/licenses/LICENSE-2.0> or
//! - the MIT license <http://opensource.org/licenses/MIT>, at your option.
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

mod chunk_array;
mod chunk_store;
mod data_type;
mod error;
pub mod naming;
pub mod npy;
pub mod store;


pub use chunk_array::{ArrayShape, ChunkArray, ChunkArrayError, Element};
pub use chunk_store::ChunkStore;
pub use data_type::{ByteOrder, DataType, DataTypeError, TypeKind};
pub use error::{ChunkStoreError, ErrorKind, ErrorMap, ErrorPredicate};
pub use naming::ChunkSource;

/// The type for bytes used by chunk arrays.
///
/// An alias for [`bytes::Bytes`].
pub type Bytes = bytes::Bytes;
