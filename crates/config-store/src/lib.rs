//! Stack configuration and secret store clients
//!
//! Resolves the named configuration values and secrets that feed boot-config
//! rendering. Every backend implements [`ConfigStore`], which exposes the two
//! lookups the infrastructure stack offers: plain configuration (`get`) and
//! secrets (`get_secret`).
//!
//! # Example
//!
//! ```no_run
//! use config_store::{ConfigStore, HttpConfigStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = HttpConfigStore::new(
//!     "http://config-store:8080".to_string(),
//!     "your-api-token".to_string(),
//! )?;
//!
//! let server = store.get("LSITClusterServer").await?;
//! let token = store.get_secret("LSITClusterToken").await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Backends
//!
//! - **HTTP**: [`HttpConfigStore`] talks to a key-value config service
//! - **File**: [`FileConfigStore`] reads a YAML stack file with `config` and `secrets` maps
//! - **Mock**: `MockConfigStore` (feature `test-util`) for unit tests

pub mod client;
pub mod error;
pub mod file;
#[path = "trait.rs"]
pub mod store_trait;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;

pub use client::HttpConfigStore;
pub use error::StoreError;
pub use file::FileConfigStore;
pub use store_trait::ConfigStore;
#[cfg(any(test, feature = "test-util"))]
pub use mock::MockConfigStore;
