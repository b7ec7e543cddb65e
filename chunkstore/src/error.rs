//! The chunk store error taxonomy and the mapping of backend errors onto it.

use std::{error::Error, sync::Arc};

use thiserror::Error;

/// A chunk store error.
#[derive(Debug, Clone, Error)]
pub enum ChunkStoreError {
    /// The store is unreachable, refused the connection, or returned an inconsistent response.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
    /// The requested chunk does not exist in the store.
    #[error("chunk not found: {0}")]
    ChunkNotFound(String),
    /// The chunk exists but could not be decoded, or its data type / shape is not as expected.
    #[error("bad chunk: {0}")]
    BadChunk(String),
    /// The chunk request was malformed, detected before any I/O.
    #[error("invalid chunk: {0}")]
    InvalidChunk(String),
    /// A backend error without an entry in the error map of the store.
    #[error(transparent)]
    Unmapped(Arc<dyn Error + Send + Sync>),
}

/// The kind of a [`ChunkStoreError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`ChunkStoreError::StoreUnavailable`].
    StoreUnavailable,
    /// See [`ChunkStoreError::ChunkNotFound`].
    ChunkNotFound,
    /// See [`ChunkStoreError::BadChunk`].
    BadChunk,
    /// See [`ChunkStoreError::InvalidChunk`].
    InvalidChunk,
}

impl ErrorKind {
    /// Create an error of this kind with `message`.
    #[must_use]
    pub fn error(self, message: impl Into<String>) -> ChunkStoreError {
        let message = message.into();
        match self {
            Self::StoreUnavailable => ChunkStoreError::StoreUnavailable(message),
            Self::ChunkNotFound => ChunkStoreError::ChunkNotFound(message),
            Self::BadChunk => ChunkStoreError::BadChunk(message),
            Self::InvalidChunk => ChunkStoreError::InvalidChunk(message),
        }
    }
}

impl ChunkStoreError {
    /// Returns the error kind, or [`None`] for an [`Unmapped`](ChunkStoreError::Unmapped) error.
    #[must_use]
    pub const fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::StoreUnavailable(_) => Some(ErrorKind::StoreUnavailable),
            Self::ChunkNotFound(_) => Some(ErrorKind::ChunkNotFound),
            Self::BadChunk(_) => Some(ErrorKind::BadChunk),
            Self::InvalidChunk(_) => Some(ErrorKind::InvalidChunk),
            Self::Unmapped(_) => None,
        }
    }

    /// Returns true if this is a [`ChunkNotFound`](ChunkStoreError::ChunkNotFound) error.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::ChunkNotFound(_))
    }
}

/// The message prefix identifying a chunk.
pub(crate) fn chunk_prefix(chunk_name: Option<&str>) -> String {
    chunk_name.map_or_else(String::new, |name| format!("Chunk {name:?}: "))
}

/// A predicate on a backend error.
pub type ErrorPredicate<E> = fn(&E) -> bool;

/// An ordered table mapping backend errors of type `E` onto [`ErrorKind`]s.
///
/// Entries are evaluated in insertion order and the first matching entry wins,
/// so more specific predicates must be added before more general ones.
/// Errors that match no entry are propagated as [`ChunkStoreError::Unmapped`].
///
/// ### Example
/// ```rust
/// # use chunkstore::{ErrorKind, ErrorMap, ChunkStoreError};
/// let error_map = ErrorMap::<std::io::Error>::new()
///     .with(|e| e.kind() == std::io::ErrorKind::NotFound, ErrorKind::ChunkNotFound)
///     .with(|e| e.kind() == std::io::ErrorKind::ConnectionRefused, ErrorKind::StoreUnavailable);
/// let error = error_map.translate(std::io::ErrorKind::NotFound.into(), Some("a/b/00000"));
/// assert!(error.is_not_found());
/// ```
pub struct ErrorMap<E> {
    entries: Vec<(ErrorPredicate<E>, ErrorKind)>,
}

impl<E> Default for ErrorMap<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Clone for ErrorMap<E> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
        }
    }
}

impl<E> std::fmt::Debug for ErrorMap<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|(_, kind)| kind))
            .finish()
    }
}

impl<E> ErrorMap<E> {
    /// Create an empty error map.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Append an entry mapping errors matching `predicate` to `kind`.
    #[must_use]
    pub fn with(mut self, predicate: ErrorPredicate<E>, kind: ErrorKind) -> Self {
        self.entries.push((predicate, kind));
        self
    }

    /// Returns the kind of the first entry matching `error`.
    #[must_use]
    pub fn kind_of(&self, error: &E) -> Option<ErrorKind> {
        self.entries
            .iter()
            .find(|(predicate, _)| predicate(error))
            .map(|(_, kind)| *kind)
    }
}

impl<E: Error + Send + Sync + 'static> ErrorMap<E> {
    /// Translate a backend error into a [`ChunkStoreError`].
    ///
    /// The message of a mapped error is prefixed by the chunk name, if any.
    #[must_use]
    pub fn translate(&self, error: E, chunk_name: Option<&str>) -> ChunkStoreError {
        match self.kind_of(&error) {
            Some(kind) => kind.error(format!("{}{error}", chunk_prefix(chunk_name))),
            None => ChunkStoreError::Unmapped(Arc::new(error)),
        }
    }

    /// Run a unit of work, translating any error it returns.
    ///
    /// # Errors
    /// Returns the translated error of `f`.
    pub fn scope<T>(
        &self,
        chunk_name: Option<&str>,
        f: impl FnOnce() -> Result<T, E>,
    ) -> Result<T, ChunkStoreError> {
        f().map_err(|error| self.translate(error, chunk_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    enum BackendError {
        #[error("no such key")]
        Missing,
        #[error("connection reset")]
        Reset,
        #[error("status {0}")]
        Status(u16),
        #[error("programming error")]
        Bug,
    }

    fn error_map() -> ErrorMap<BackendError> {
        ErrorMap::new()
            .with(
                |e| matches!(e, BackendError::Missing | BackendError::Status(404)),
                ErrorKind::ChunkNotFound,
            )
            .with(
                |e| matches!(e, BackendError::Reset | BackendError::Status(_)),
                ErrorKind::StoreUnavailable,
            )
    }

    #[test]
    fn error_map_first_match() {
        let error_map = error_map();
        assert_eq!(
            error_map.kind_of(&BackendError::Status(404)),
            Some(ErrorKind::ChunkNotFound)
        );
        assert_eq!(
            error_map.kind_of(&BackendError::Status(503)),
            Some(ErrorKind::StoreUnavailable)
        );
        assert_eq!(error_map.kind_of(&BackendError::Bug), None);
    }

    #[test]
    fn error_map_translate() {
        let error_map = error_map();
        let error = error_map.translate(BackendError::Missing, Some("bucket/array/00000"));
        assert!(error.is_not_found());
        assert_eq!(
            error.to_string(),
            "chunk not found: Chunk \"bucket/array/00000\": no such key"
        );
        let error = error_map.translate(BackendError::Reset, None);
        assert_eq!(error.kind(), Some(ErrorKind::StoreUnavailable));
        assert_eq!(error.to_string(), "store unavailable: connection reset");
    }

    #[test]
    fn error_map_unmapped() {
        let error = error_map().translate(BackendError::Bug, Some("a/b/00000"));
        assert!(error.kind().is_none());
        let ChunkStoreError::Unmapped(source) = error else {
            panic!("expected an unmapped error");
        };
        assert_eq!(source.to_string(), "programming error");
    }

    #[test]
    fn error_map_scope() {
        let error_map = error_map();
        assert_eq!(error_map.scope(None, || Ok(1)).unwrap(), 1);
        let result: Result<(), _> = error_map.scope(None, || Err(BackendError::Status(500)));
        assert_eq!(result.unwrap_err().kind(), Some(ErrorKind::StoreUnavailable));
    }
}
