//! Mock ConfigStore for unit testing
//!
//! This module provides an in-memory implementation of [`ConfigStore`] that can be
//! used in unit tests without a running config service or stack file.
//! Lookups can be configured to fail or to complete after a delay, which lets
//! tests exercise out-of-order completion of concurrent fetches.

use crate::error::StoreError;
use crate::store_trait::{non_empty, ConfigStore};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Mock ConfigStore for testing
#[derive(Clone, Debug, Default)]
pub struct MockConfigStore {
    config: Arc<Mutex<HashMap<String, String>>>,
    secrets: Arc<Mutex<HashMap<String, String>>>,
    failures: Arc<Mutex<HashMap<String, String>>>,
    delays: Arc<Mutex<HashMap<String, Duration>>>,
    // Keys in the order their lookups completed
    completed: Arc<Mutex<Vec<String>>>,
}

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockConfigStore {
    /// Create an empty mock store
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a plain config value (for test setup)
    pub fn set_config(&self, name: impl Into<String>, value: impl Into<String>) -> &Self {
        locked(&self.config).insert(name.into(), value.into());
        self
    }

    /// Add a secret value (for test setup)
    pub fn set_secret(&self, name: impl Into<String>, value: impl Into<String>) -> &Self {
        locked(&self.secrets).insert(name.into(), value.into());
        self
    }

    /// Remove a key from both maps
    pub fn remove(&self, name: &str) -> &Self {
        locked(&self.config).remove(name);
        locked(&self.secrets).remove(name);
        self
    }

    /// Make every lookup of `name` fail with an API error
    pub fn fail_with(&self, name: impl Into<String>, message: impl Into<String>) -> &Self {
        locked(&self.failures).insert(name.into(), message.into());
        self
    }

    /// Delay every lookup of `name`
    pub fn delay(&self, name: impl Into<String>, delay: Duration) -> &Self {
        locked(&self.delays).insert(name.into(), delay);
        self
    }

    /// Keys in the order their lookups completed
    pub fn completion_order(&self) -> Vec<String> {
        locked(&self.completed).clone()
    }

    /// Number of lookups performed so far
    pub fn lookup_count(&self) -> usize {
        locked(&self.completed).len()
    }

    async fn lookup(&self, secret: bool, name: &str) -> Result<String, StoreError> {
        let delay = locked(&self.delays).get(name).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        locked(&self.completed).push(name.to_string());

        if let Some(message) = locked(&self.failures).get(name) {
            return Err(StoreError::Api(message.clone()));
        }

        let map = if secret { &self.secrets } else { &self.config };
        let value = locked(map).get(name).cloned();
        match value {
            Some(value) => non_empty(name, value),
            None => Err(StoreError::NotFound(name.to_string())),
        }
    }
}

#[async_trait::async_trait]
impl ConfigStore for MockConfigStore {
    fn describe(&self) -> String {
        "mock config store".to_string()
    }

    async fn get(&self, name: &str) -> Result<String, StoreError> {
        self.lookup(false, name).await
    }

    async fn get_secret(&self, name: &str) -> Result<String, StoreError> {
        self.lookup(true, name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_lookups() {
        let store = MockConfigStore::new();
        store.set_config("server", "https://api").set_secret("token", "abc");

        assert_eq!(store.get("server").await.unwrap(), "https://api");
        assert_eq!(store.get_secret("token").await.unwrap(), "abc");
        assert!(store.get("token").await.unwrap_err().is_not_found());
        assert_eq!(store.lookup_count(), 3);
    }

    #[tokio::test]
    async fn test_mock_failure_injection() {
        let store = MockConfigStore::new();
        store.set_secret("token", "abc").fail_with("token", "backend unavailable");

        let err = store.get_secret("token").await.unwrap_err();
        assert!(matches!(err, StoreError::Api(ref m) if m == "backend unavailable"));
    }

    #[tokio::test]
    async fn test_mock_delay_reorders_completion() {
        let store = MockConfigStore::new();
        store
            .set_secret("slow", "1")
            .set_secret("fast", "2")
            .delay("slow", Duration::from_millis(50));

        let (slow, fast) = tokio::join!(store.get_secret("slow"), store.get_secret("fast"));
        assert_eq!(slow.unwrap(), "1");
        assert_eq!(fast.unwrap(), "2");
        assert_eq!(store.completion_order(), vec!["fast", "slow"]);
    }
}
