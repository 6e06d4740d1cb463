//! HTTP client for the music platform

use crate::config::{ClientConfig, ClientIdentity};
use crate::error::RytmError;
use rand::Rng;
use reqwest::{Client, ClientBuilder, RequestBuilder, Response, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Shared HTTP client. Cheap to clone; all clones share one connection pool
/// and cookie store.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    config: Arc<ClientConfig>,
}

impl HttpClient {
    /// Create a new HTTP client from configuration
    pub fn new(config: &ClientConfig) -> Result<Self, RytmError> {
        let client = ClientBuilder::new()
            .timeout(config.timeout)
            .gzip(true)
            .brotli(true)
            .cookie_store(true)
            .build()?;

        Ok(Self {
            client,
            config: Arc::new(config.clone()),
        })
    }

    /// Get the underlying HTTP client
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Get client configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Create a GET request with browser headers (landing page, player script)
    pub fn browser_request(&self, url: &str) -> RequestBuilder {
        self.client
            .get(url)
            .header("User-Agent", &self.config.browser_user_agent)
            .header("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
            .header("Accept-Language", &self.config.accept_language)
            .header("Cache-Control", "no-cache")
    }

    /// Create a JSON API request whose headers match the declared identity
    pub fn api_request(&self, endpoint: &str, identity: &ClientIdentity) -> RequestBuilder {
        let url = format!(
            "{}/youtubei/v1/{}?prettyPrint=false",
            self.config.api_base, endpoint
        );

        self.client
            .post(url)
            .header("Content-Type", "application/json")
            .header("Accept", "*/*")
            .header("Accept-Language", &self.config.accept_language)
            .header("User-Agent", &identity.user_agent)
            .header("Origin", &self.config.web_base)
            .header("X-YouTube-Client-Name", &identity.client_id)
            .header("X-YouTube-Client-Version", &identity.version)
            .header("X-Goog-Api-Format-Version", &identity.api_format_version)
    }

    /// Send a request, retrying transient failures with exponential backoff.
    ///
    /// Network errors, 429 and 5xx are retried. Any other non-success status
    /// fails immediately with a fetch error tagged with `stage`.
    pub async fn send_with_retry(
        &self,
        request: RequestBuilder,
        stage: &'static str,
    ) -> Result<Response, RytmError> {
        let max_retries = self.config.max_retries.max(1);
        let mut last_error = None;

        for attempt in 0..max_retries {
            debug!("{} request attempt {}/{}", stage, attempt + 1, max_retries);

            let attempt_request = request
                .try_clone()
                .ok_or_else(|| RytmError::fetch(stage, "request body is not cloneable"))?;

            match attempt_request.send().await {
                Ok(response) if response.status().is_success() => {
                    debug!("{} request successful", stage);
                    return Ok(response);
                }
                Ok(response) => {
                    let status = response.status();
                    if !is_retryable_status(status) {
                        warn!("{} request failed with status: {}", stage, status);
                        return Err(RytmError::fetch(stage, format!("HTTP {}", status)));
                    }
                    warn!("{} request failed with status: {}, retrying", stage, status);
                    last_error = Some(RytmError::fetch(stage, format!("HTTP {}", status)));
                }
                Err(e) if e.is_timeout() || e.is_connect() || e.is_request() => {
                    warn!("{} request error: {}", stage, e);
                    last_error = Some(RytmError::fetch(stage, e));
                }
                Err(e) => return Err(RytmError::fetch(stage, e)),
            }

            if attempt + 1 < max_retries {
                let jitter = rand::thread_rng().gen_range(0..100);
                let delay = Duration::from_millis(200 * (1 << attempt) + jitter);
                debug!("Retrying in {:?}", delay);
                tokio::time::sleep(delay).await;
            }
        }

        error!("All {} attempts failed", stage);
        Err(last_error.unwrap_or_else(|| RytmError::fetch(stage, "request failed")))
    }

    /// Execute request with retry logic and decode the JSON body
    pub async fn execute_with_retry<T>(
        &self,
        request: RequestBuilder,
        stage: &'static str,
    ) -> Result<T, RytmError>
    where
        T: serde::de::DeserializeOwned,
    {
        let response = self.send_with_retry(request, stage).await?;
        let body = response
            .text()
            .await
            .map_err(|e| RytmError::fetch(stage, e))?;
        serde_json::from_str(&body).map_err(|e| RytmError::Parse(format!("{}: {}", stage, e)))
    }

    /// Fetch a text document with browser headers
    pub async fn fetch_text(&self, url: &str, stage: &'static str) -> Result<String, RytmError> {
        let response = self.send_with_retry(self.browser_request(url), stage).await?;
        response.text().await.map_err(|e| RytmError::fetch(stage, e))
    }
}

fn is_retryable_status(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}
