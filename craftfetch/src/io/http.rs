//! HTTP fetcher backed by reqwest.

use std::time::Duration;

use reqwest::Client;
use tracing::trace;

use super::{BoxFuture, FetchError, FetchResponse, Fetcher};

/// Production [`Fetcher`] using a shared `reqwest::Client`.
///
/// The client pools connections, so one instance should be shared by all
/// workers of a run.
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    client: Client,
}

impl ReqwestFetcher {
    /// Create a fetcher without a request timeout.
    pub fn new() -> Result<Self, FetchError> {
        Self::build(None)
    }

    /// Create a fetcher whose requests fail after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Result<Self, FetchError> {
        Self::build(Some(timeout))
    }

    fn build(timeout: Option<Duration>) -> Result<Self, FetchError> {
        let mut builder = Client::builder().user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| FetchError::new(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

impl Fetcher for ReqwestFetcher {
    fn fetch(&self, url: &str) -> BoxFuture<'_, Result<FetchResponse, FetchError>> {
        let url = url.to_string();
        Box::pin(async move {
            trace!(url = %url, "GET");
            let response = self
                .client
                .get(&url)
                .send()
                .await
                .map_err(|e| FetchError::new(e.to_string()))?;

            let status = response.status().as_u16();
            let body = response
                .bytes()
                .await
                .map_err(|e| FetchError::new(e.to_string()))?;

            Ok(FetchResponse { status, body })
        })
    }
}
