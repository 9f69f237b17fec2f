use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Map, Value};
use std::time::Duration;

use super::{envelope, AnalyticsService, Mode};
use crate::config::Config;

/// Analytics service reached over HTTP.
pub struct HttpService {
    client: Client,
    endpoint: String,
}

impl HttpService {
    pub fn new(cfg: &Config) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(secs) = cfg.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        Ok(Self {
            client: builder.build()?,
            endpoint: cfg.brain_url.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl AnalyticsService for HttpService {
    async fn call(&self, mode: Mode, payload: Map<String, Value>) -> Result<Value> {
        let body = envelope(mode, payload);
        let resp = self.client.post(&self.endpoint).json(&body).send().await?;
        // Error statuses still carry a JSON body ({"error": ...}); the decoder
        // treats it as malformed rather than failing the transport.
        let status = resp.status();
        let value = resp
            .json::<Value>()
            .await
            .map_err(|e| anyhow!("{} response (status {}) is not JSON: {}", mode.as_str(), status, e))?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builds_with_and_without_timeout() {
        let svc = HttpService::new(&Config::default()).unwrap();
        assert_eq!(svc.endpoint(), "http://localhost:3000/api");

        let cfg = Config { request_timeout_secs: Some(5), ..Default::default() };
        assert!(HttpService::new(&cfg).is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transport_error() {
        // Port 9 (discard) on loopback is closed in test environments.
        let cfg = Config {
            brain_url: "http://127.0.0.1:9/api".to_string(),
            request_timeout_secs: Some(2),
            ..Default::default()
        };
        let svc = HttpService::new(&cfg).unwrap();
        assert!(svc.call(Mode::Search, Map::new()).await.is_err());
    }
}
