use chunkstore::{npy::NpyError, ErrorKind, ErrorMap};
use thiserror::Error;

use crate::transport::TransportError;

/// An S3 backend error, translated into a [`ChunkStoreError`](chunkstore::ChunkStoreError) by [`s3_error_map`].
#[derive(Debug, Error)]
pub enum S3Error {
    /// A request failed or returned an unsuccessful status.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// A chunk could not be encoded or decoded.
    #[error(transparent)]
    Npy(#[from] NpyError),
    /// A listing document could not be parsed.
    #[error("invalid listing document: {0}")]
    Listing(#[from] roxmltree::Error),
    /// A listing document is not valid UTF-8.
    #[error("listing document is not valid UTF-8")]
    ListingEncoding,
}

impl S3Error {
    /// Returns the status code of an unsuccessful response.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transport(err) => err.status(),
            _ => None,
        }
    }
}

/// Returns the error map of the S3 chunk store.
///
/// | error                                    | kind               |
/// |------------------------------------------|--------------------|
/// | status 404                               | `ChunkNotFound`    |
/// | any other status or transport failure    | `StoreUnavailable` |
/// | an IO error while streaming a chunk      | `StoreUnavailable` |
/// | an invalid NPY chunk                     | `BadChunk`         |
/// | an invalid listing document              | `StoreUnavailable` |
#[must_use]
pub fn s3_error_map() -> ErrorMap<S3Error> {
    ErrorMap::<S3Error>::new()
        .with(|err| err.status() == Some(404), ErrorKind::ChunkNotFound)
        .with(
            |err| matches!(err, S3Error::Transport(_) | S3Error::Npy(NpyError::Io(_))),
            ErrorKind::StoreUnavailable,
        )
        .with(
            |err| matches!(err, S3Error::Npy(NpyError::Format(_))),
            ErrorKind::BadChunk,
        )
        .with(
            |err| matches!(err, S3Error::Listing(_) | S3Error::ListingEncoding),
            ErrorKind::StoreUnavailable,
        )
}
