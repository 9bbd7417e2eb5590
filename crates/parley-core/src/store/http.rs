//! Hosted realtime-database REST backend
//!
//! Speaks the `GET`/`PUT {base_url}/{key}.json` surface a hosted realtime
//! document store exposes. A `null` body on read means the node is absent.
//! Every request carries a bounded timeout so a hung store call cannot hang
//! the caller with it.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde_json::Value;
use tracing::debug;

use super::DocumentStore;
use crate::{Error, Result};

/// Default request timeout in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// REST-backed [`DocumentStore`] for a hosted realtime database
#[derive(Debug, Clone)]
pub struct HttpStore {
    http_client: HttpClient,
    base_url: String,
    timeout_secs: u64,
}

impl HttpStore {
    /// Create a store against the given base URL with the default timeout
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT_SECS)
    }

    /// Create a store with an explicit per-request timeout
    pub fn with_timeout(base_url: impl Into<String>, timeout_secs: u64) -> Result<Self> {
        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout_secs,
        })
    }

    /// The configured base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// URL for a top-level node
    fn node_url(&self, key: &str) -> String {
        format!("{}/{}.json", self.base_url, key)
    }

    fn map_timeout(&self, err: reqwest::Error) -> Error {
        if err.is_timeout() {
            Error::Timeout(self.timeout_secs)
        } else {
            Error::Network(err)
        }
    }
}

#[async_trait]
impl DocumentStore for HttpStore {
    async fn load(&self, key: &str) -> Result<Option<Value>> {
        let url = self.node_url(key);
        debug!(%url, "loading document");

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.map_timeout(e))?
            .error_for_status()
            .map_err(Error::Network)?;

        let value: Value = response.json().await.map_err(|e| self.map_timeout(e))?;
        if value.is_null() {
            Ok(None)
        } else {
            Ok(Some(value))
        }
    }

    async fn save(&self, key: &str, value: Value) -> Result<()> {
        let url = self.node_url(key);
        debug!(%url, "saving document");

        let response = self
            .http_client
            .put(&url)
            .json(&value)
            .send()
            .await
            .map_err(|e| self.map_timeout(e))?;

        if !response.status().is_success() {
            return Err(Error::WriteFailure(format!(
                "{} returned {}",
                url,
                response.status()
            )));
        }

        Ok(())
    }
}
