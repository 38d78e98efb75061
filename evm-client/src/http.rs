//! HTTP transport (spec §4.11): one JSON-RPC request per POST over a
//! shared `reqwest` connection pool.

use std::time::Duration;

use serde_json::Value;
use url::Url;

use crate::error::{JsonRpcError, ProviderError, ProviderResult};
use crate::jsonrpc::Request;

#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub url: Url,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
}

impl HttpClientConfig {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }
}

/// A plain request/response JSON-RPC client. No slot table is needed: the
/// HTTP response is naturally correlated to its request by the underlying
/// connection (spec §4.11).
#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    url: Url,
    next_id: std::sync::Arc<std::sync::atomic::AtomicU64>,
}

impl HttpClient {
    pub fn new(config: HttpClientConfig) -> ProviderResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.read_timeout)
            .build()
            .map_err(|e| ProviderError::TransportError(e.to_string()))?;
        Ok(Self {
            client,
            url: config.url,
            next_id: std::sync::Arc::new(std::sync::atomic::AtomicU64::new(1)),
        })
    }

    /// Issues a single JSON-RPC call as a POST. Concurrency is left to the
    /// caller spawning multiple calls on lightweight tasks; this method
    /// itself is a single request/response round trip.
    pub async fn call(&self, method: &str, params: Value) -> ProviderResult<Value> {
        let id = self.next_id.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let request = Request::new(id, method, params);

        let response = self
            .client
            .post(self.url.clone())
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::TransportError(e.to_string()))?;

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ProviderError::ProtocolError(e.to_string()))?;

        if let Some(error) = body.get("error") {
            let error: JsonRpcError = serde_json::from_value(error.clone())
                .map_err(|e| ProviderError::ProtocolError(e.to_string()))?;
            return Err(error.into());
        }
        body.get("result")
            .cloned()
            .ok_or_else(|| ProviderError::ProtocolError("response has no result field".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_builder_overrides_defaults() {
        let url = Url::parse("https://example.org/rpc").unwrap();
        let config = HttpClientConfig::new(url)
            .with_connect_timeout(Duration::from_secs(1))
            .with_read_timeout(Duration::from_secs(2));
        assert_eq!(config.connect_timeout, Duration::from_secs(1));
        assert_eq!(config.read_timeout, Duration::from_secs(2));
    }
}
