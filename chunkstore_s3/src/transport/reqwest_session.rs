use std::{collections::HashMap, time::Duration};

use parking_lot::Mutex;
use reqwest::blocking::Client;

use super::{HttpSession, Method, Request, Response, TransportError};

/// A session sending requests with blocking [`reqwest`] clients.
///
/// The timeout of a request bounds connecting, waiting for the response, and each read of the
/// response body. It is not a deadline for the whole exchange, so a large chunk that keeps
/// arriving is never cut off.
///
/// Blocking clients only support such a timeout client-wide, so the session keeps one client per
/// distinct request timeout. Each client keeps its connections alive between requests.
#[derive(Debug)]
pub struct ReqwestSession {
    clients: Mutex<HashMap<Option<Duration>, Client>>,
}

impl ReqwestSession {
    /// Create a new session.
    ///
    /// # Errors
    /// Returns a [`TransportError`] if the client for requests without a timeout cannot be initialised.
    pub fn new() -> Result<Self, TransportError> {
        let client = build_client(None)?;
        Ok(Self {
            clients: Mutex::new(HashMap::from([(None, client)])),
        })
    }

    /// Returns the client for requests with `timeout`.
    fn client(&self, timeout: Option<Duration>) -> Result<Client, TransportError> {
        let mut clients = self.clients.lock();
        if let Some(client) = clients.get(&timeout) {
            return Ok(client.clone());
        }
        let client = build_client(timeout)?;
        clients.insert(timeout, client.clone());
        Ok(client)
    }
}

fn build_client(timeout: Option<Duration>) -> Result<Client, TransportError> {
    // A blocking client applies its timeout to each wait rather than to the whole request
    let mut builder = Client::builder().timeout(timeout);
    if let Some(timeout) = timeout {
        builder = builder.connect_timeout(timeout);
    }
    Ok(builder.build()?)
}

impl HttpSession for ReqwestSession {
    fn send(&self, request: &Request) -> Result<Response, TransportError> {
        let method = match request.method() {
            Method::Get => reqwest::Method::GET,
            Method::Head => reqwest::Method::HEAD,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        };
        let mut builder = self
            .client(request.timeout())?
            .request(method, request.url().clone());
        for (name, value) in request.headers() {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body() {
            builder = builder.body(body.clone());
        }
        let response = builder.send()?;
        log::debug!(
            "{} {} returned status {}",
            request.method(),
            request.url(),
            response.status()
        );
        Ok(Response::new(
            request.method(),
            response.url().clone(),
            response.status().as_u16(),
            response,
        ))
    }
}
