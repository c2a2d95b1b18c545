//! HTTPS transport for single objects

use crate::error::{FetchError, FetchResult};
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone)]
pub struct HttpsTransport {
    client: reqwest::Client,
}

impl HttpsTransport {
    pub fn new(timeout: Duration) -> FetchResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("rpki-validator/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::new("", format!("cannot build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    pub async fn get(&self, uri: &Url) -> FetchResult<Vec<u8>> {
        tracing::debug!(uri = %uri, "HTTP GET");

        let response = self
            .client
            .get(uri.clone())
            .send()
            .await
            .map_err(|e| FetchError::new(uri.as_str(), e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::new(uri.as_str(), format!("HTTP status {}", status)));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::new(uri.as_str(), format!("cannot read response body: {}", e)))?;
        Ok(body.to_vec())
    }
}
