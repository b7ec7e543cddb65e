#![allow(dead_code)]

use std::{
    collections::{BTreeMap, BTreeSet},
    io::Cursor,
    sync::Arc,
};

use base64::{prelude::BASE64_STANDARD, Engine};
use bytes::Bytes;
use chunkstore_s3::{
    transport::{HttpSession, Method, Request, Response, TransportError},
    S3ChunkStore, S3ChunkStoreOptions,
};
use parking_lot::Mutex;
use url::Url;

pub const MOCK_URL: &str = "http://s3.mock:9000";

#[derive(Default)]
struct State {
    buckets: BTreeSet<String>,
    objects: BTreeMap<(String, String), Bytes>,
}

/// An in-process S3 service.
pub struct MockS3 {
    state: Mutex<State>,
    requests: Mutex<Vec<(Method, Url)>>,
    page_size: usize,
    next_marker: bool,
    status_override: Mutex<Option<u16>>,
}

impl MockS3 {
    pub fn new() -> Arc<Self> {
        Self::with_pages(usize::MAX, false)
    }

    /// Listing pages hold at most `page_size` keys, with a `NextMarker` if `next_marker`.
    pub fn with_pages(page_size: usize, next_marker: bool) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::default(),
            requests: Mutex::default(),
            page_size,
            next_marker,
            status_override: Mutex::default(),
        })
    }

    pub fn session(self: &Arc<Self>) -> MockSession {
        MockSession(self.clone())
    }

    pub fn store(self: &Arc<Self>) -> S3ChunkStore<MockSession> {
        self.store_with_options(S3ChunkStoreOptions::default())
    }

    pub fn store_with_options(
        self: &Arc<Self>,
        options: S3ChunkStoreOptions,
    ) -> S3ChunkStore<MockSession> {
        let s3 = self.clone();
        S3ChunkStore::new_with_options(
            move || Ok(s3.session()),
            Url::parse(MOCK_URL).unwrap(),
            options,
        )
        .unwrap()
    }

    /// Respond to every request with `status`.
    pub fn set_status_override(&self, status: Option<u16>) {
        *self.status_override.lock() = status;
    }

    pub fn create_bucket(&self, bucket: &str) {
        self.state.lock().buckets.insert(bucket.to_string());
    }

    pub fn insert_object(&self, bucket: &str, key: &str, bytes: impl Into<Bytes>) {
        let mut state = self.state.lock();
        state.buckets.insert(bucket.to_string());
        state
            .objects
            .insert((bucket.to_string(), key.to_string()), bytes.into());
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<Bytes> {
        self.state
            .lock()
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    pub fn requests(&self) -> Vec<(Method, Url)> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Returns the number of listing requests of `bucket`.
    pub fn list_request_count(&self, bucket: &str) -> usize {
        self.requests()
            .iter()
            .filter(|(method, url)| {
                *method == Method::Get && url.path() == format!("/{bucket}") && url.query().is_some()
            })
            .count()
    }

    fn handle(&self, request: &Request) -> (u16, Bytes) {
        self.requests
            .lock()
            .push((request.method(), request.url().clone()));
        if let Some(status) = *self.status_override.lock() {
            return (status, Bytes::new());
        }

        let segments: Vec<String> = request
            .url()
            .path_segments()
            .map(|segments| {
                segments
                    .filter(|segment| !segment.is_empty())
                    .map(|segment| urlencoding::decode(segment).unwrap().into_owned())
                    .collect()
            })
            .unwrap_or_default();
        let mut state = self.state.lock();
        match (request.method(), segments.as_slice()) {
            (Method::Get, []) => (
                200,
                Bytes::from_static(b"<ListAllMyBucketsResult></ListAllMyBucketsResult>"),
            ),
            (Method::Put, [bucket]) => {
                if state.buckets.insert(bucket.clone()) {
                    (200, Bytes::new())
                } else {
                    (409, Bytes::from_static(b"BucketAlreadyOwnedByYou"))
                }
            }
            (Method::Get, [bucket]) => {
                if state.buckets.contains(bucket) {
                    (200, self.list(&state, bucket, request.url()).into())
                } else {
                    (404, Bytes::from_static(b"NoSuchBucket"))
                }
            }
            (method, [bucket, key @ ..]) if !key.is_empty() => {
                let id = (bucket.clone(), key.join("/"));
                match method {
                    Method::Get | Method::Head => match state.objects.get(&id) {
                        Some(bytes) if method == Method::Get => (200, bytes.clone()),
                        Some(_) => (200, Bytes::new()),
                        None => (404, Bytes::from_static(b"NoSuchKey")),
                    },
                    Method::Put => {
                        let body = request.body().cloned().unwrap_or_default();
                        let content_md5 = BASE64_STANDARD.encode(md5::compute(&body).0);
                        if !state.buckets.contains(bucket) {
                            (404, Bytes::from_static(b"NoSuchBucket"))
                        } else if request.header("Content-MD5") != Some(content_md5.as_str()) {
                            (400, Bytes::from_static(b"BadDigest"))
                        } else {
                            state.objects.insert(id, body);
                            (200, Bytes::new())
                        }
                    }
                    Method::Delete => {
                        state.objects.remove(&id);
                        (204, Bytes::new())
                    }
                }
            }
            _ => (400, Bytes::from_static(b"InvalidRequest")),
        }
    }

    fn list(&self, state: &State, bucket: &str, url: &Url) -> String {
        let query: BTreeMap<String, String> = url.query_pairs().into_owned().collect();
        let prefix = query.get("prefix").cloned().unwrap_or_default();
        let marker = query.get("marker").cloned().unwrap_or_default();
        let max_keys = query
            .get("max-keys")
            .and_then(|max_keys| max_keys.parse::<usize>().ok())
            .unwrap_or(1000)
            .min(self.page_size);

        let mut keys = state
            .objects
            .keys()
            .filter(|(b, key)| b == bucket && key.starts_with(&prefix) && *key > marker)
            .map(|(_, key)| key.clone());
        let page: Vec<String> = keys.by_ref().take(max_keys).collect();
        let is_truncated = keys.next().is_some();

        let mut xml = String::new();
        for key in &page {
            xml.push_str(&format!(
                "    <Contents>\n        <Key>{key}</Key>\n        <Size>0</Size>\n    </Contents>\n"
            ));
        }
        let next_marker = match page.last() {
            Some(last) if is_truncated && self.next_marker => {
                format!("    <NextMarker>{last}</NextMarker>\n")
            }
            _ => String::new(),
        };
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<ListBucketResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">
    <Name>{bucket}</Name>
    <Prefix>{prefix}</Prefix>
    <Marker>{marker}</Marker>
    <MaxKeys>{max_keys}</MaxKeys>
    <IsTruncated>{is_truncated}</IsTruncated>
{next_marker}{xml}</ListBucketResult>"#
        )
    }
}

/// A session of a [`MockS3`].
pub struct MockSession(Arc<MockS3>);

impl HttpSession for MockSession {
    fn send(&self, request: &Request) -> Result<Response, TransportError> {
        let (status, body) = self.0.handle(request);
        Ok(Response::new(
            request.method(),
            request.url().clone(),
            status,
            Cursor::new(body),
        ))
    }
}
