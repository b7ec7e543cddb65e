use std::time::Duration;

use super::{HttpSession, Request, Response, TransportError};

/// The default number of retries of an idempotent request after a connection failure.
pub const DEFAULT_MAX_RETRIES: usize = 2;

/// A session with a default timeout and limited retries.
///
/// Requests without a timeout are sent with the default timeout of the session, if any.
/// `GET` and `HEAD` requests that fail to connect are retried up to `max_retries` times.
/// Other requests and requests that received a response are never retried.
#[derive(Debug)]
pub struct BoundedSession<S> {
    inner: S,
    timeout: Option<Duration>,
    max_retries: usize,
}

impl<S: HttpSession> BoundedSession<S> {
    /// Create a new bounded session wrapping `inner`.
    ///
    /// A `timeout` of [`None`] leaves requests without a timeout unbounded.
    #[must_use]
    pub const fn new(inner: S, timeout: Option<Duration>, max_retries: usize) -> Self {
        Self {
            inner,
            timeout,
            max_retries,
        }
    }

    /// Returns the default timeout.
    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Returns the maximum number of retries.
    #[must_use]
    pub const fn max_retries(&self) -> usize {
        self.max_retries
    }

    /// Returns the wrapped session.
    #[must_use]
    pub const fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: HttpSession> HttpSession for BoundedSession<S> {
    fn send(&self, request: &Request) -> Result<Response, TransportError> {
        let bounded;
        let request = match (request.timeout(), self.timeout) {
            (None, Some(timeout)) => {
                bounded = request.clone().with_timeout(timeout);
                &bounded
            }
            _ => request,
        };
        let max_retries = if request.method().is_retryable() {
            self.max_retries
        } else {
            0
        };

        let mut retries = 0;
        loop {
            match self.inner.send(request) {
                Err(err) if err.is_connect() && retries < max_retries => {
                    retries += 1;
                    log::debug!(
                        "retrying {} {} ({retries}/{max_retries}) after connection failure: {err}",
                        request.method(),
                        request.url()
                    );
                }
                result => return result,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use url::Url;

    use super::*;
    use crate::transport::Method;

    /// Fails to connect `failures` times, then responds with 200.
    struct FlakySession {
        failures: usize,
        attempts: AtomicUsize,
        timeouts: parking_lot::Mutex<Vec<Option<Duration>>>,
    }

    impl FlakySession {
        fn new(failures: usize) -> Self {
            Self {
                failures,
                attempts: AtomicUsize::new(0),
                timeouts: parking_lot::Mutex::default(),
            }
        }

        fn attempts(&self) -> usize {
            self.attempts.load(Ordering::SeqCst)
        }
    }

    impl HttpSession for FlakySession {
        fn send(&self, request: &Request) -> Result<Response, TransportError> {
            self.timeouts.lock().push(request.timeout());
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
            if attempt < self.failures {
                Err(TransportError::Connect("connection refused".to_string()))
            } else {
                Ok(Response::new(
                    request.method(),
                    request.url().clone(),
                    200,
                    std::io::empty(),
                ))
            }
        }
    }

    fn request(method: Method) -> Request {
        Request::new(method, Url::parse("http://127.0.0.1:9000/bucket/key.npy").unwrap())
    }

    #[test]
    fn bounded_session_default_timeout() {
        let session = BoundedSession::new(FlakySession::new(0), Some(Duration::from_secs(10)), 2);
        session.send(&request(Method::Get)).unwrap();
        session
            .send(&request(Method::Get).with_timeout(Duration::from_secs(1)))
            .unwrap();
        assert_eq!(
            *session.inner().timeouts.lock(),
            vec![Some(Duration::from_secs(10)), Some(Duration::from_secs(1))]
        );

        let session = BoundedSession::new(FlakySession::new(0), None, 2);
        session.send(&request(Method::Head)).unwrap();
        assert_eq!(*session.inner().timeouts.lock(), vec![None]);
    }

    #[test]
    fn bounded_session_retries_reads() {
        for method in [Method::Get, Method::Head] {
            let session = BoundedSession::new(FlakySession::new(2), None, DEFAULT_MAX_RETRIES);
            assert!(session.send(&request(method)).is_ok());
            assert_eq!(session.inner().attempts(), 3);

            let session = BoundedSession::new(FlakySession::new(3), None, DEFAULT_MAX_RETRIES);
            assert!(session.send(&request(method)).unwrap_err().is_connect());
            assert_eq!(session.inner().attempts(), 3);
        }
    }

    #[test]
    fn bounded_session_never_retries_writes() {
        for method in [Method::Put, Method::Delete] {
            let session = BoundedSession::new(FlakySession::new(1), None, DEFAULT_MAX_RETRIES);
            assert!(session.send(&request(method)).unwrap_err().is_connect());
            assert_eq!(session.inner().attempts(), 1);
        }
    }

    #[test]
    fn bounded_session_never_retries_responses() {
        struct Unavailable(AtomicUsize);
        impl HttpSession for Unavailable {
            fn send(&self, request: &Request) -> Result<Response, TransportError> {
                self.0.fetch_add(1, Ordering::SeqCst);
                Ok(Response::new(
                    request.method(),
                    request.url().clone(),
                    503,
                    std::io::empty(),
                ))
            }
        }
        let session = BoundedSession::new(Unavailable(AtomicUsize::new(0)), None, 2);
        let response = session.send(&request(Method::Get)).unwrap();
        assert_eq!(response.status(), 503);
        assert_eq!(session.inner().0.load(Ordering::SeqCst), 1);
    }
}
