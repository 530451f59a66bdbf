//! HTTP config store client
//!
//! Reads values from a key-value config service.
//! Plain values live under /api/config/{name}, secrets under /api/secrets/{name}.

use crate::error::StoreError;
use crate::store_trait::{non_empty, ConfigStore};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Body returned by the config service for a single key
#[derive(Debug, Deserialize)]
struct ValueResponse {
    value: String,
}

/// HTTP config store client
pub struct HttpConfigStore {
    client: Client,
    base_url: String,
    token: String,
}

impl std::fmt::Debug for HttpConfigStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpConfigStore")
            .field("base_url", &self.base_url)
            .field("token", &"<redacted>")
            .finish_non_exhaustive()
    }
}

impl HttpConfigStore {
    /// Create a new HTTP config store client
    ///
    /// # Arguments
    /// * `base_url` - Config service base URL (e.g., "http://config-store:8080")
    /// * `token` - API token for authentication
    pub fn new(base_url: String, token: String) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(StoreError::Http)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build the URL for a key in the given collection
    fn key_url(&self, collection: &str, name: &str) -> String {
        format!(
            "{}/api/{}/{}",
            self.base_url,
            collection,
            urlencoding::encode(name)
        )
    }

    /// Fetch a single key from a collection ("config" or "secrets")
    async fn fetch(&self, collection: &str, name: &str) -> Result<String, StoreError> {
        let url = self.key_url(collection, name);
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Token {}", self.token))
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound(name.to_string()));
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Authentication(format!("{} - {}", status, body)));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Api(format!(
                "Failed to fetch {}: {} - {}",
                name, status, body
            )));
        }

        let response_text = response.text().await?;
        let parsed: ValueResponse = serde_json::from_str(&response_text)?;
        non_empty(name, parsed.value)
    }
}

#[async_trait::async_trait]
impl ConfigStore for HttpConfigStore {
    fn describe(&self) -> String {
        format!("http config store at {}", self.base_url)
    }

    async fn get(&self, name: &str) -> Result<String, StoreError> {
        self.fetch("config", name).await
    }

    async fn get_secret(&self, name: &str) -> Result<String, StoreError> {
        self.fetch("secrets", name).await
    }
}
