//! The HTTP transport of the S3 chunk store.
//!
//! An [`HttpSession`] sends one [`Request`] at a time and returns a [`Response`] with a streaming body.
//! [`ReqwestSession`] sends requests with blocking [`reqwest`] clients, and a [`BoundedSession`] wraps
//! any session with a default timeout and retries of idempotent requests.

mod bounded_session;
mod reqwest_session;

use std::{fmt::Display, io::Read, time::Duration};

use auto_impl::auto_impl;
use bytes::Bytes;
use thiserror::Error;
use url::Url;

pub use bounded_session::{BoundedSession, DEFAULT_MAX_RETRIES};
pub use reqwest_session::ReqwestSession;

/// An HTTP request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// `GET`.
    Get,
    /// `HEAD`.
    Head,
    /// `PUT`.
    Put,
    /// `DELETE`.
    Delete,
}

impl Method {
    /// Returns true if a request with this method can be repeated after a connection failure.
    ///
    /// Only reads are retried. A write may have been applied before the connection failed.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::Get | Self::Head)
    }

    /// Returns the method name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

impl Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An HTTP request.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    url: Url,
    headers: Vec<(String, String)>,
    body: Option<Bytes>,
    timeout: Option<Duration>,
}

impl Request {
    /// Create a new request without headers, body or timeout.
    #[must_use]
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: Vec::new(),
            body: None,
            timeout: None,
        }
    }

    /// Append a query parameter to the URL.
    #[must_use]
    pub fn with_query(mut self, key: &str, value: &str) -> Self {
        self.url.query_pairs_mut().append_pair(key, value);
        self
    }

    /// Add a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Set the timeout of connecting, waiting for the response and each read of its body,
    /// overriding any session default.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Returns the method.
    #[must_use]
    pub const fn method(&self) -> Method {
        self.method
    }

    /// Returns the URL, including any query.
    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    /// Returns the headers.
    #[must_use]
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Returns the value of the first header named `name` (case-insensitive).
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(header, _)| header.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Returns the body.
    #[must_use]
    pub const fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Returns the timeout.
    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

/// An HTTP response with a streaming body.
pub struct Response {
    method: Method,
    url: Url,
    status: u16,
    body: Box<dyn Read + Send>,
}

impl std::fmt::Debug for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Response")
            .field("method", &self.method)
            .field("url", &self.url.as_str())
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

impl Response {
    /// Create a new response to a `method` request of `url`.
    #[must_use]
    pub fn new(method: Method, url: Url, status: u16, body: impl Read + Send + 'static) -> Self {
        Self {
            method,
            url,
            status,
            body: Box::new(body),
        }
    }

    /// Returns the status code.
    #[must_use]
    pub const fn status(&self) -> u16 {
        self.status
    }

    /// Returns true if the status code is 2xx.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Returns the final URL of the response.
    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    /// Returns the response if the status code is 2xx.
    ///
    /// # Errors
    /// Returns [`TransportError::Status`] otherwise.
    pub fn error_for_status(self) -> Result<Self, TransportError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(TransportError::Status {
                method: self.method,
                url: self.url,
                status: self.status,
            })
        }
    }

    /// Convert the response into a reader of the body.
    #[must_use]
    pub fn into_reader(self) -> Box<dyn Read + Send> {
        self.body
    }

    /// Read the whole body.
    ///
    /// # Errors
    /// Returns [`TransportError::Io`] if reading the body fails.
    pub fn bytes(mut self) -> Result<Bytes, TransportError> {
        let mut bytes = Vec::new();
        self.body.read_to_end(&mut bytes)?;
        Ok(bytes.into())
    }
}

/// An HTTP transport error.
#[derive(Debug, Error)]
pub enum TransportError {
    /// A [`reqwest`] error.
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    /// A connection could not be established.
    #[error("connection failed: {0}")]
    Connect(String),
    /// An IO error reading a response body.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// The response has an unsuccessful status code.
    #[error("{method} {url} returned status {status}")]
    Status {
        /// The request method.
        method: Method,
        /// The URL of the response.
        url: Url,
        /// The status code.
        status: u16,
    },
}

impl TransportError {
    /// Returns true if the request failed to connect, so it was not received by the server.
    #[must_use]
    pub fn is_connect(&self) -> bool {
        match self {
            Self::Http(err) => err.is_connect(),
            Self::Connect(_) => true,
            _ => false,
        }
    }

    /// Returns the status code of an unsuccessful response.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http(err) => err.status().map(|status| status.as_u16()),
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// A session sending HTTP requests.
///
/// A session is used by at most one thread at a time.
#[auto_impl(Box)]
pub trait HttpSession: Send {
    /// Send `request` and return the response, whatever its status.
    ///
    /// # Errors
    /// Returns a [`TransportError`] if no response is received.
    fn send(&self, request: &Request) -> Result<Response, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_builder() {
        let url = Url::parse("http://127.0.0.1:9000/bucket").unwrap();
        let request = Request::new(Method::Get, url)
            .with_query("prefix", "path/to array/")
            .with_query("max-keys", "10")
            .with_header("Content-MD5", "abc=")
            .with_timeout(Duration::from_secs(3));
        assert_eq!(
            request.url().as_str(),
            "http://127.0.0.1:9000/bucket?prefix=path%2Fto+array%2F&max-keys=10"
        );
        assert_eq!(request.header("content-md5"), Some("abc="));
        assert_eq!(request.header("Content-Length"), None);
        assert_eq!(request.timeout(), Some(Duration::from_secs(3)));
        assert!(request.body().is_none());
    }

    #[test]
    fn response_status() {
        let url = Url::parse("http://127.0.0.1:9000/bucket/key.npy").unwrap();
        let response = Response::new(Method::Get, url.clone(), 200, &b"data"[..]);
        assert_eq!(response.error_for_status().unwrap().bytes().unwrap(), &b"data"[..]);

        let response = Response::new(Method::Head, url, 404, std::io::empty());
        let err = response.error_for_status().unwrap_err();
        assert_eq!(err.status(), Some(404));
        assert!(!err.is_connect());
        assert_eq!(
            err.to_string(),
            "HEAD http://127.0.0.1:9000/bucket/key.npy returned status 404"
        );
    }

    #[test]
    fn method_retryable() {
        assert!(Method::Get.is_retryable());
        assert!(Method::Head.is_retryable());
        assert!(!Method::Put.is_retryable());
        assert!(!Method::Delete.is_retryable());
    }
}
