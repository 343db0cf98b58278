// src/transport.rs

use bytes::Bytes;
use reqwest::Client;
use std::collections::HashMap;
use url::Url;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

use crate::error::{Error, Result};

/// Raw network boundary: one GET, one result, never blocking the caller's
/// thread of control. Everything above this trait is network-free, which is
/// also what makes the pipeline testable without a server.
#[allow(async_fn_in_trait)]
pub trait Transport {
    async fn fetch(&self, url: &str) -> Result<Bytes>;
}

/// `reqwest`-backed transport. Non-success HTTP statuses are transport errors
/// carrying the original error text.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing client, e.g. one configured with timeouts or proxies.
    pub fn from_client(client: Client) -> Self {
        HttpTransport { client }
    }
}

impl Transport for HttpTransport {
    async fn fetch(&self, url: &str) -> Result<Bytes> {
        let parsed = Url::parse(url).map_err(|e| Error::transport(url, e))?;
        debug!(%url, "GET");
        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| Error::transport(url, e))?
            .error_for_status()
            .map_err(|e| Error::transport(url, e))?;
        response.bytes().await.map_err(|e| Error::transport(url, e))
    }
}

/// In-memory transport serving canned responses by exact URL. Used by the
/// crate's own tests; exported because embedders stub the network the same way.
#[derive(Debug, Default)]
pub struct StaticTransport {
    responses: HashMap<String, std::result::Result<Bytes, String>>,
    hits: AtomicUsize,
}

impl StaticTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` for `url`.
    pub fn ok(mut self, url: impl Into<String>, body: impl Into<Bytes>) -> Self {
        self.responses.insert(url.into(), Ok(body.into()));
        self
    }

    /// Fail `url` with a transport error carrying `message`.
    pub fn err(mut self, url: impl Into<String>, message: impl Into<String>) -> Self {
        self.responses.insert(url.into(), Err(message.into()));
        self
    }

    /// Total fetches served so far, successful or not.
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

impl Transport for StaticTransport {
    async fn fetch(&self, url: &str) -> Result<Bytes> {
        self.hits.fetch_add(1, Ordering::SeqCst);
        match self.responses.get(url) {
            Some(Ok(body)) => Ok(body.clone()),
            Some(Err(message)) => Err(Error::transport(url, message)),
            None => Err(Error::transport(url, "no response configured")),
        }
    }
}
