//! An S3 chunk store for the [`chunkstore`] crate.
//!
//! Each chunk is stored as an NPY object with the key `"<array name>/<index string>.npy"`, where the first
//! component of the array name is the bucket. Requests are path-style and unsigned, so authentication,
//! if required, must be handled externally (e.g. by a proxy).
//!
//! ```no_run
//! # use chunkstore::{ChunkArray, ChunkStore, DataType};
//! # use chunkstore_s3::{S3ChunkStore, S3ChunkStoreOptions};
//! let store = S3ChunkStore::from_url("http://127.0.0.1:9000", &S3ChunkStoreOptions::default())?;
//! store.create_array("bucket/array")?;
//! let chunk = ChunkArray::from_elements(vec![2], vec![1.0f64, 2.0])?;
//! store.put_chunk("bucket/array", &[4..6], &chunk)?;
//! let chunk = store.get_chunk("bucket/array", &[4..6], &DataType::FLOAT64)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Licence
//! `chunkstore_s3` is licensed under either of
//!  - the Apache License, Version 2.0 <http://www.apache.org/licenses/LICENSE-2.0> or
//!  - the MIT license <http://opensource.org/licenses/MIT>, at your option.

mod error;
pub mod listing;
pub mod pool;
pub mod transport;

use std::{
    ops::Range,
    sync::mpsc::{self, RecvTimeoutError},
    time::Duration,
};

use base64::{prelude::BASE64_STANDARD, Engine};
use chunkstore::{
    naming::{self, ChunkSource, NAME_SEP},
    npy, ChunkArray, ChunkStore, ChunkStoreError, DataType, ErrorMap,
};
use itertools::Itertools;
use url::Url;

pub use error::{s3_error_map, S3Error};
use pool::SessionPool;
use transport::{
    BoundedSession, HttpSession, Method, ReqwestSession, Request, TransportError,
    DEFAULT_MAX_RETRIES,
};

/// The file extension of stored chunks.
const CHUNK_SUFFIX: &str = ".npy";

/// Options for use with [`S3ChunkStore`].
#[non_exhaustive]
#[derive(Debug, Clone)]
pub struct S3ChunkStoreOptions {
    timeout: Option<Duration>,
    extra_timeout: Duration,
    max_retries: usize,
    list_max_keys: usize,
}

impl Default for S3ChunkStoreOptions {
    fn default() -> Self {
        Self {
            timeout: Some(Duration::from_secs(10)),
            extra_timeout: Duration::from_secs(1),
            max_retries: DEFAULT_MAX_RETRIES,
            list_max_keys: 100_000,
        }
    }
}

impl S3ChunkStoreOptions {
    /// Set the connect and read timeout of requests (default 10 seconds).
    ///
    /// [`None`] leaves requests unbounded.
    pub fn timeout(&mut self, timeout: Option<Duration>) -> &mut Self {
        self.timeout = timeout;
        self
    }

    /// Set the additional time allowed for [`S3ChunkStore::new_with_deadline`] to complete (default 1 second).
    ///
    /// This bounds stalls (e.g. slow DNS lookups) not covered by the request timeout,
    /// without masking connect and read failures. It is ignored if the timeout is [`None`].
    pub fn extra_timeout(&mut self, extra_timeout: Duration) -> &mut Self {
        self.extra_timeout = extra_timeout;
        self
    }

    /// Set the number of retries of `GET` and `HEAD` requests after a connection failure (default 2).
    pub fn max_retries(&mut self, max_retries: usize) -> &mut Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the maximum number of keys per listing request (default 100000).
    pub fn list_max_keys(&mut self, list_max_keys: usize) -> &mut Self {
        self.list_max_keys = list_max_keys;
        self
    }

    /// Returns the request timeout.
    #[must_use]
    pub const fn get_timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Returns the construction deadline of [`S3ChunkStore::new_with_deadline`]: the timeout plus the extra timeout.
    #[must_use]
    pub fn deadline(&self) -> Option<Duration> {
        self.timeout.map(|timeout| timeout + self.extra_timeout)
    }
}

/// A chunk store backed by an S3 compatible object store.
///
/// Requests are sent with sessions from a [`SessionPool`], so concurrent operations never share a session.
pub struct S3ChunkStore<S = BoundedSession<ReqwestSession>> {
    url: Url,
    pool: SessionPool<S>,
    error_map: ErrorMap<S3Error>,
    list_max_keys: usize,
}

impl<S> std::fmt::Debug for S3ChunkStore<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3ChunkStore")
            .field("url", &self.url.as_str())
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}

impl S3ChunkStore {
    /// Create a new S3 chunk store with the endpoint `url`, e.g. `"http://127.0.0.1:9000"`.
    ///
    /// Requests are sent by [`ReqwestSession`]s bounded by the timeout and retries of `options`.
    /// The store is constructed with [`S3ChunkStore::new_with_deadline`].
    ///
    /// # Errors
    /// Returns [`ChunkStoreError::StoreUnavailable`] if
    ///  - `url` is invalid,
    ///  - the endpoint is unavailable (see [`S3ChunkStore::new`]), or
    ///  - construction did not complete in time, e.g. due to a DNS lookup stalling.
    pub fn from_url(url: &str, options: &S3ChunkStoreOptions) -> Result<Self, ChunkStoreError> {
        let url = Url::parse(url).map_err(|err| {
            ChunkStoreError::StoreUnavailable(format!("invalid URL {url:?}: {err}"))
        })?;
        let timeout = options.timeout;
        let max_retries = options.max_retries;
        Self::new_with_deadline(
            move || {
                Ok(BoundedSession::new(
                    ReqwestSession::new()?,
                    timeout,
                    max_retries,
                ))
            },
            url,
            options.clone(),
        )
    }
}

impl<S: HttpSession + 'static> S3ChunkStore<S> {
    /// Create a new S3 chunk store like [`S3ChunkStore::new_with_options`], but on a separate thread.
    ///
    /// The thread is abandoned if construction does not complete within the timeout plus the extra timeout
    /// of `options`. Without a timeout, construction is awaited indefinitely.
    ///
    /// # Errors
    /// Returns [`ChunkStoreError::StoreUnavailable`] if
    ///  - the endpoint is unavailable (see [`S3ChunkStore::new`]), or
    ///  - construction did not complete in time, e.g. due to a DNS lookup stalling.
    pub fn new_with_deadline(
        session_factory: impl Fn() -> Result<S, TransportError> + Send + Sync + 'static,
        url: Url,
        options: S3ChunkStoreOptions,
    ) -> Result<Self, ChunkStoreError> {
        let host = url.host_str().unwrap_or_default().to_string();
        let deadline = options.deadline();

        let (sender, receiver) = mpsc::channel();
        std::thread::Builder::new()
            .name("chunkstore_s3_construction".to_string())
            .spawn(move || {
                let store = Self::new_with_options(session_factory, url, options);
                // The receiver is gone if the deadline has passed
                let _ = sender.send(store);
            })
            .map_err(|err| ChunkStoreError::StoreUnavailable(err.to_string()))?;

        match deadline {
            Some(deadline) => receiver.recv_timeout(deadline).map_err(|err| match err {
                RecvTimeoutError::Timeout => ChunkStoreError::StoreUnavailable(format!(
                    "Timed out, possibly due to DNS lookup of {host} stalling"
                )),
                RecvTimeoutError::Disconnected => construction_failed(),
            })?,
            None => receiver.recv().map_err(|_| construction_failed())?,
        }
    }
}

fn construction_failed() -> ChunkStoreError {
    ChunkStoreError::StoreUnavailable("S3 chunk store construction failed".to_string())
}

impl<S: HttpSession> S3ChunkStore<S> {
    /// Create a new S3 chunk store with the endpoint `url` and sessions created by `session_factory`.
    ///
    /// The endpoint is probed by listing its buckets.
    ///
    /// # Errors
    /// Returns [`ChunkStoreError::StoreUnavailable`] if the probe fails for any reason.
    pub fn new(
        session_factory: impl Fn() -> Result<S, TransportError> + Send + Sync + 'static,
        url: Url,
    ) -> Result<Self, ChunkStoreError> {
        Self::new_with_options(session_factory, url, S3ChunkStoreOptions::default())
    }

    /// Create a new S3 chunk store with the endpoint `url`, sessions created by `session_factory`, and `options`.
    ///
    /// Only the listing options apply: the sessions created by `session_factory` determine timeouts and retries.
    ///
    /// # Errors
    /// Returns [`ChunkStoreError::StoreUnavailable`] if the probe fails for any reason.
    pub fn new_with_options(
        session_factory: impl Fn() -> Result<S, TransportError> + Send + Sync + 'static,
        url: Url,
        options: S3ChunkStoreOptions,
    ) -> Result<Self, ChunkStoreError> {
        let store = Self {
            url,
            pool: SessionPool::new(session_factory),
            error_map: s3_error_map(),
            list_max_keys: options.list_max_keys,
        };
        store.probe().map_err(|err| {
            ChunkStoreError::StoreUnavailable(format!("{} is unavailable: {err}", store.url))
        })?;
        Ok(store)
    }

    fn probe(&self) -> Result<(), S3Error> {
        let session = self.pool.acquire()?;
        session
            .send(&Request::new(Method::Get, self.url.clone()))?
            .error_for_status()?;
        Ok(())
    }

    /// Returns the endpoint URL.
    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    /// Returns the session pool.
    #[must_use]
    pub const fn session_pool(&self) -> &SessionPool<S> {
        &self.pool
    }

    /// Returns the URL of `name`, with each `/` separated component percent-encoded.
    fn object_url(&self, name: &str) -> Url {
        let path = name
            .split(NAME_SEP)
            .map(urlencoding::encode)
            .join("/");
        let mut url = self.url.clone();
        url.set_path(&format!("{}/{path}", self.url.path().trim_end_matches('/')));
        url
    }

    fn chunk_url(&self, chunk_name: &str) -> Url {
        self.object_url(&format!("{chunk_name}{CHUNK_SUFFIX}"))
    }

    /// Send `request` on a pooled session, failing on an unsuccessful status.
    fn send(&self, request: &Request) -> Result<transport::Response, S3Error> {
        let session = self.pool.acquire()?;
        Ok(session.send(request)?.error_for_status()?)
    }
}

impl<S: HttpSession> ChunkStore for S3ChunkStore<S> {
    fn get_chunk(
        &self,
        array_name: &str,
        ranges: &[Range<u64>],
        data_type: &DataType,
    ) -> Result<ChunkArray, ChunkStoreError> {
        let (chunk_name, shape) =
            naming::chunk_metadata(array_name, ranges, ChunkSource::DataType(data_type))?;
        let request = Request::new(Method::Get, self.chunk_url(&chunk_name));
        let chunk = self.error_map.scope(Some(&chunk_name), || {
            let session = self.pool.acquire()?;
            let response = session.send(&request)?.error_for_status()?;
            Ok(npy::read_chunk(&mut response.into_reader())?)
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
        let body = self
            .error_map
            .scope(Some(&chunk_name), || Ok(npy::encode_chunk(chunk)?))?;
        let content_md5 = BASE64_STANDARD.encode(md5::compute(&body).0);
        let request = Request::new(Method::Put, self.chunk_url(&chunk_name))
            .with_header("Content-MD5", content_md5)
            .with_body(body);
        self.error_map
            .scope(Some(&chunk_name), || self.send(&request).map(drop))
    }

    fn has_chunk(
        &self,
        array_name: &str,
        ranges: &[Range<u64>],
        data_type: &DataType,
    ) -> Result<bool, ChunkStoreError> {
        let (chunk_name, _) =
            naming::chunk_metadata(array_name, ranges, ChunkSource::DataType(data_type))?;
        let request = Request::new(Method::Head, self.chunk_url(&chunk_name));
        match self
            .error_map
            .scope(Some(&chunk_name), || self.send(&request).map(drop))
        {
            Ok(()) => Ok(true),
            Err(ChunkStoreError::ChunkNotFound(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }

    fn list_chunk_ids(&self, array_name: &str) -> Result<Vec<String>, ChunkStoreError> {
        let (bucket, path) = naming::split(array_name, 1)?;
        let bucket_url = self.object_url(&bucket.concat());
        let prefix = format!("{path}{NAME_SEP}");
        let keys = self.error_map.scope(None, || {
            let session = self.pool.acquire()?;
            listing::list_keys(&*session, &bucket_url, &prefix, self.list_max_keys)
        })?;
        Ok(keys
            .iter()
            .filter_map(|key| key.strip_prefix(&prefix)?.strip_suffix(CHUNK_SUFFIX))
            .filter(|chunk_id| !chunk_id.is_empty() && !chunk_id.contains(NAME_SEP))
            .map(str::to_string)
            .collect())
    }

    fn delete_chunk(&self, array_name: &str, ranges: &[Range<u64>]) -> Result<(), ChunkStoreError> {
        let chunk_name = naming::chunk_name(array_name, ranges)?;
        let request = Request::new(Method::Delete, self.chunk_url(&chunk_name));
        self.error_map
            .scope(Some(&chunk_name), || self.send(&request).map(drop))
    }

    fn create_array(&self, array_name: &str) -> Result<(), ChunkStoreError> {
        let (bucket, _) = naming::split(array_name, 1)?;
        let request = Request::new(Method::Put, self.object_url(&bucket.concat()));
        self.error_map.scope(None, || {
            let session = self.pool.acquire()?;
            let response = session.send(&request)?;
            // The bucket already exists
            if response.status() == 409 {
                return Ok(());
            }
            response.error_for_status()?;
            Ok(())
        })
    }
}
