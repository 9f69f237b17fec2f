//! Boundary to the external analytics service.
//!
//! Every request is one JSON envelope `{"mode": MODE, ...payload}`; every
//! response is free-form JSON that [`decode`] turns into a typed outcome.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::logging::{log_request, log_transport_failure, ProfileScope};

pub mod decode;
mod http;

pub use decode::Decoded;
pub use http::HttpService;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Mode {
    Search,
    Context,
    Risk,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Search => "SEARCH",
            Mode::Context => "CONTEXT",
            Mode::Risk => "RISK",
        }
    }
}

/// Request body: the mode tag merged with the mode-specific fields
pub fn envelope(mode: Mode, payload: Map<String, Value>) -> Value {
    let mut body = Map::new();
    body.insert("mode".to_string(), Value::String(mode.as_str().to_string()));
    for (k, v) in payload {
        if k != "mode" {
            body.insert(k, v);
        }
    }
    Value::Object(body)
}

#[async_trait]
pub trait AnalyticsService: Send + Sync {
    /// Send one request. `Err` means transport or parse failure.
    async fn call(&self, mode: Mode, payload: Map<String, Value>) -> Result<Value>;
}

/// One request: the raw response, or `None` after logging the failure.
pub async fn dispatch<S>(service: &S, mode: Mode, ticket: u64, payload: Map<String, Value>) -> Option<Value>
where
    S: AnalyticsService + ?Sized,
{
    log_request(mode.as_str(), ticket);
    let _scope = ProfileScope::with_context(mode.as_str(), &[("ticket", serde_json::json!(ticket))]);
    match service.call(mode, payload).await {
        Ok(value) => Some(value),
        Err(err) => {
            log_transport_failure(mode.as_str(), ticket, &err);
            None
        }
    }
}
