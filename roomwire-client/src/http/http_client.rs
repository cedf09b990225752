use crate::config::ClientConfig;
use reqwest::Method;
use reqwest::StatusCode;
use reqwest::header::{CONTENT_TYPE, ORIGIN};
use roomwire_core::SignalingError;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Thin wrapper over `reqwest` that speaks the room server's conventions:
/// text bodies, an `origin` header, and "anything but 200 is an error".
#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    origin: String,
    timeout: Duration,
}

impl HttpClient {
    pub fn new(config: &ClientConfig) -> Result<Self, SignalingError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| SignalingError::network(format!("HTTP client setup failed: {e}")))?;

        Ok(Self {
            client,
            origin: config.http_origin.clone(),
            timeout: config.http_timeout,
        })
    }

    pub async fn post(&self, url: &str, body: Option<String>) -> Result<String, SignalingError> {
        self.request(Method::POST, url, body, self.timeout).await
    }

    pub async fn delete(&self, url: &str) -> Result<String, SignalingError> {
        self.request(Method::DELETE, url, None, self.timeout).await
    }

    pub async fn get(&self, url: &str, timeout: Duration) -> Result<String, SignalingError> {
        self.request(Method::GET, url, None, timeout).await
    }

    async fn request(
        &self,
        method: Method,
        url: &str,
        body: Option<String>,
        timeout: Duration,
    ) -> Result<String, SignalingError> {
        let parsed = Url::parse(url)
            .map_err(|e| SignalingError::parse(format!("Invalid URL {url}: {e}")))?;

        debug!("HTTP {} {}", method, url);
        let mut request = self
            .client
            .request(method.clone(), parsed)
            .timeout(timeout)
            .header(ORIGIN, &self.origin)
            .header(CONTENT_TYPE, "text/plain; charset=utf-8");
        if let Some(body) = body {
            request = request.body(body);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                SignalingError::network(format!("HTTP {method} to {url} timeout"))
            } else {
                SignalingError::network(format!("HTTP {method} to {url} error: {e}"))
            }
        })?;

        if response.status() != StatusCode::OK {
            return Err(SignalingError::HttpStatus {
                status: response.status().as_u16(),
                url: url.to_owned(),
            });
        }

        response
            .text()
            .await
            .map_err(|e| SignalingError::network(format!("HTTP {method} to {url} error: {e}")))
    }
}
