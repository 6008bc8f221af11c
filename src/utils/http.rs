//! HTTP client utilities.

use reqwest::Client;
use std::sync::Arc;
use tracing::debug;

use crate::config::HttpSettings;
use crate::models::PageRequest;
use crate::Error;

/// HTTP client owned by one batch.
///
/// Cloning is cheap and shares the connection pool, so concurrent tasks of a
/// batch reuse connections. The pool is released when the last clone drops.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Arc<Client>,
}

impl HttpClient {
    /// Create a new HTTP client with default settings
    pub fn new() -> Result<Self, Error> {
        Self::with_settings(&HttpSettings::default())
    }

    /// Create a client with the given timeouts and user agent
    pub fn with_settings(settings: &HttpSettings) -> Result<Self, Error> {
        let client = Client::builder()
            .user_agent(settings.user_agent.as_str())
            .timeout(settings.timeout())
            .connect_timeout(settings.connect_timeout())
            .cookie_store(true)
            .build()
            .map_err(|e| Error::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client: Arc::new(client),
        })
    }

    /// Create from an existing reqwest Client
    pub fn from_client(client: Arc<Client>) -> Self {
        Self { client }
    }

    /// Get the underlying client
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// GET a page and return its body as text.
    ///
    /// Non-success statuses are reported as [`Error::Api`]; deadline overruns
    /// as [`Error::Timeout`].
    pub async fn fetch_text(&self, request: &PageRequest) -> Result<String, Error> {
        debug!(url = %request.url, params = ?request.params, "GET page");

        let response = self
            .client
            .get(&request.url)
            .query(&request.params)
            .header("Accept", "text/html")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Api(format!(
                "{} returned status: {}",
                request.url, status
            )));
        }

        Ok(response.text().await?)
    }

    /// GET a binary resource
    pub async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, Error> {
        debug!(url, "GET binary");

        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Api(format!("{} returned status: {}", url, status)));
        }

        Ok(response.bytes().await?.to_vec())
    }
}
