//! JSON transport
//!
//! `JsonFetcher` is the only capability the resolver needs from the
//! network. `HttpFetcher` is the reqwest implementation; `InMemoryFetcher`
//! serves registered documents and records every request.

use crate::error::FetchError;
use async_trait::async_trait;
use reqwest::{header, Client};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

const ACCEPT_JSON_LD: &str = "application/ld+json, application/json;q=0.9, */*;q=0.1";

#[async_trait]
pub trait JsonFetcher: Send + Sync {
    /// Fetch and parse the JSON document at `uri`
    async fn fetch_json(&self, uri: &str) -> Result<Value, FetchError>;
}

/// reqwest-backed transport
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Transport {
                uri: String::new(),
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl JsonFetcher for HttpFetcher {
    async fn fetch_json(&self, uri: &str) -> Result<Value, FetchError> {
        let url = url::Url::parse(uri).map_err(|e| FetchError::InvalidUri {
            uri: uri.to_string(),
            reason: e.to_string(),
        })?;

        let response = self
            .client
            .get(url)
            .header(header::ACCEPT, ACCEPT_JSON_LD)
            .send()
            .await
            .map_err(|e| FetchError::Transport {
                uri: uri.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                uri: uri.to_string(),
                status: status.as_u16(),
            });
        }

        let text = response.text().await.map_err(|e| FetchError::Transport {
            uri: uri.to_string(),
            message: e.to_string(),
        })?;

        serde_json::from_str(&text).map_err(|e| FetchError::Decode {
            uri: uri.to_string(),
            message: format!(
                "{} (first 200 chars: {})",
                e,
                text.chars().take(200).collect::<String>()
            ),
        })
    }
}

/// Transport over a fixed set of documents
///
/// Unregistered URIs fail with `FetchError::NotFound`. Registered failures
/// can simulate HTTP errors.
#[derive(Debug, Default)]
pub struct InMemoryFetcher {
    documents: HashMap<String, Value>,
    failures: HashMap<String, u16>,
    requests: Mutex<Vec<String>>,
}

impl InMemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` for exactly `uri`
    pub fn with_document(mut self, uri: impl Into<String>, body: Value) -> Self {
        self.documents.insert(uri.into(), body);
        self
    }

    /// Answer `uri` with an HTTP error status
    pub fn with_status(mut self, uri: impl Into<String>, status: u16) -> Self {
        self.failures.insert(uri.into(), status);
        self
    }

    /// Every URI requested so far, in request order
    pub fn requests(&self) -> Vec<String> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    /// Number of requests made for `uri`
    pub fn request_count(&self, uri: &str) -> usize {
        self.requests().iter().filter(|r| r.as_str() == uri).count()
    }
}

#[async_trait]
impl JsonFetcher for InMemoryFetcher {
    async fn fetch_json(&self, uri: &str) -> Result<Value, FetchError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(uri.to_string());
        }
        if let Some(status) = self.failures.get(uri) {
            return Err(FetchError::Status {
                uri: uri.to_string(),
                status: *status,
            });
        }
        self.documents
            .get(uri)
            .cloned()
            .ok_or_else(|| FetchError::NotFound(uri.to_string()))
    }
}
