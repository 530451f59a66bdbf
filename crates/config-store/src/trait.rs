//! ConfigStore trait for mocking
//!
//! This trait abstracts the configuration backends so the secret resolver can be
//! driven by the HTTP client, a stack file, or an in-memory mock in unit tests.

use crate::error::StoreError;

/// Trait for configuration and secret lookups
///
/// All async methods must be `Send` to work with Tokio's work-stealing runtime,
/// since lookups for several keys run concurrently.
#[async_trait::async_trait]
pub trait ConfigStore: Send + Sync {
    /// Short human-readable description of the backend, used in logs
    fn describe(&self) -> String;

    /// Look up a plain configuration value
    async fn get(&self, name: &str) -> Result<String, StoreError>;

    /// Look up a secret value
    async fn get_secret(&self, name: &str) -> Result<String, StoreError>;
}

#[async_trait::async_trait]
impl<T: ConfigStore + ?Sized> ConfigStore for std::sync::Arc<T> {
    fn describe(&self) -> String {
        (**self).describe()
    }

    async fn get(&self, name: &str) -> Result<String, StoreError> {
        (**self).get(name).await
    }

    async fn get_secret(&self, name: &str) -> Result<String, StoreError> {
        (**self).get_secret(name).await
    }
}

/// Reject empty values the same way as missing ones
///
/// An unset stack value and an empty one are indistinguishable upstream, so
/// both surface as [`StoreError::NotFound`].
pub(crate) fn non_empty(name: &str, value: String) -> Result<String, StoreError> {
    if value.is_empty() {
        Err(StoreError::NotFound(name.to_string()))
    } else {
        Ok(value)
    }
}
