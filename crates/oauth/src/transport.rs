//! Outbound HTTP transport and its decorators.
//!
//! Every request the broker and the authorized client make goes through a
//! [`Transport`]. Decorators wrap another transport, so callers can stack an
//! API key, request logging and fault injection in any order.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use {
    async_trait::async_trait,
    reqwest::{Request, Response},
    secrecy::{ExposeSecret, Secret},
    tracing::debug,
};

use crate::error::{Error, Result};

#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: Request) -> Result<Response>;
}

pub type SharedTransport = Arc<dyn Transport>;

#[async_trait]
impl Transport for reqwest::Client {
    async fn execute(&self, request: Request) -> Result<Response> {
        Ok(reqwest::Client::execute(self, request).await?)
    }
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn execute(&self, request: Request) -> Result<Response> {
        (**self).execute(request).await
    }
}

/// Appends `key=<api key>` to every request URL.
pub struct ApiKeyTransport<T> {
    inner: T,
    key: Secret<String>,
}

impl<T> ApiKeyTransport<T> {
    pub fn new(inner: T, key: Secret<String>) -> Self {
        Self { inner, key }
    }
}

#[async_trait]
impl<T: Transport> Transport for ApiKeyTransport<T> {
    async fn execute(&self, mut request: Request) -> Result<Response> {
        request
            .url_mut()
            .query_pairs_mut()
            .append_pair("key", self.key.expose_secret());
        self.inner.execute(request).await
    }
}

/// Logs each request and response at debug level.
///
/// Output goes through the process-wide redacting writer like every other
/// log line.
pub struct LoggingTransport<T> {
    inner: T,
}

impl<T> LoggingTransport<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<T: Transport> Transport for LoggingTransport<T> {
    async fn execute(&self, request: Request) -> Result<Response> {
        let method = request.method().clone();
        let url = request.url().to_string();
        debug!(
            %method,
            %url,
            headers = ?request.headers(),
            body_len = request.body().and_then(|b| b.as_bytes()).map(<[u8]>::len),
            "http request"
        );

        match self.inner.execute(request).await {
            Ok(response) => {
                debug!(
                    %method,
                    %url,
                    status = response.status().as_u16(),
                    headers = ?response.headers(),
                    "http response"
                );
                Ok(response)
            },
            Err(e) => {
                debug!(%method, %url, error = %e, "http request failed");
                Err(e)
            },
        }
    }
}

/// Fails every `every`-th request with an injected error. Used to exercise
/// error paths against real endpoints.
pub struct FlakyTransport<T> {
    inner: T,
    every: u64,
    count: AtomicU64,
}

impl<T> FlakyTransport<T> {
    pub fn new(inner: T, every: u64) -> Self {
        Self {
            inner,
            every: every.max(1),
            count: AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl<T: Transport> Transport for FlakyTransport<T> {
    async fn execute(&self, request: Request) -> Result<Response> {
        let n = self.count.fetch_add(1, Ordering::Relaxed) + 1;
        if n % self.every == 0 {
            debug!(url = %request.url(), attempt = n, "injecting transport failure");
            return Err(Error::message(format!(
                "injected transport failure (request {n})"
            )));
        }
        self.inner.execute(request).await
    }
}
