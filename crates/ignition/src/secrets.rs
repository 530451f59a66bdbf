//! Secret resolution.
//!
//! Fetches every value the boot template needs from the config store. All
//! lookups are started together and joined; rendering never starts until every
//! lookup has reported. A failed lookup is reported by key name.

use crate::error::ConfigurationMissing;
use config_store::{ConfigStore, StoreError};
use futures::future::join_all;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Which store lookup a value is read through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    /// Plain configuration value
    Config,
    /// Secret value
    Secret,
}

/// A value the boot template requires from the config store
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SecretField {
    /// OIDC client identifier
    OidcClientId,
    /// OIDC client secret
    OidcClientSecret,
    /// Cluster API server address
    ClusterServer,
    /// Cluster join token
    ClusterToken,
    /// Secondary cluster join token
    OuterRimToken,
}

impl SecretField {
    /// Every required field, in lookup order
    pub const ALL: [SecretField; 5] = [
        SecretField::OidcClientId,
        SecretField::OidcClientSecret,
        SecretField::ClusterServer,
        SecretField::ClusterToken,
        SecretField::OuterRimToken,
    ];

    /// Store key for this field
    pub fn key(self) -> &'static str {
        match self {
            SecretField::OidcClientId => "googleOAuth2ClientID",
            SecretField::OidcClientSecret => "googleOAuth2ClientSecret",
            SecretField::ClusterServer => "LSITClusterServer",
            SecretField::ClusterToken => "LSITClusterToken",
            SecretField::OuterRimToken => "LSITOuterRimToken",
        }
    }

    /// Lookup used for this field
    pub fn lookup(self) -> Lookup {
        match self {
            SecretField::ClusterServer => Lookup::Config,
            _ => Lookup::Secret,
        }
    }
}

/// Values resolved from the config store
#[derive(Clone, PartialEq, Eq)]
pub struct ResolvedSecrets {
    /// OIDC client identifier
    pub oidc_client_id: String,
    /// OIDC client secret
    pub oidc_client_secret: String,
    /// Cluster API server address
    pub cluster_server: String,
    /// Cluster join token
    pub cluster_token: String,
    /// Secondary cluster join token
    pub outer_rim_token: String,
}

impl std::fmt::Debug for ResolvedSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSecrets")
            .field("oidc_client_id", &self.oidc_client_id)
            .field("cluster_server", &self.cluster_server)
            .finish_non_exhaustive()
    }
}

async fn fetch<S: ConfigStore + ?Sized>(
    store: &S,
    field: SecretField,
) -> (SecretField, Result<String, StoreError>) {
    let result = match field.lookup() {
        Lookup::Config => store.get(field.key()).await,
        Lookup::Secret => store.get_secret(field.key()).await,
    };
    (field, result)
}

/// Resolve every required value from the store.
///
/// Lookups run concurrently and are all awaited before any result is
/// inspected. When several lookups fail, each failure is logged and the first
/// one in lookup order is returned.
pub async fn resolve_secrets<S: ConfigStore + ?Sized>(
    store: &S,
) -> Result<ResolvedSecrets, ConfigurationMissing> {
    debug!("Resolving {} values from {}", SecretField::ALL.len(), store.describe());

    let results = join_all(SecretField::ALL.iter().map(|field| fetch(store, *field))).await;

    let mut values = BTreeMap::new();
    let mut first_failure: Option<ConfigurationMissing> = None;
    for (field, result) in results {
        match result {
            Ok(value) => {
                values.insert(field, value);
            }
            Err(e) => {
                warn!("Failed to resolve {}: {}", field.key(), e);
                if first_failure.is_none() {
                    first_failure = Some(ConfigurationMissing {
                        key: field.key(),
                        source: e,
                    });
                }
            }
        }
    }
    if let Some(failure) = first_failure {
        return Err(failure);
    }

    let mut take = |field: SecretField| {
        values.remove(&field).ok_or_else(|| ConfigurationMissing {
            key: field.key(),
            source: StoreError::NotFound(field.key().to_string()),
        })
    };

    Ok(ResolvedSecrets {
        oidc_client_id: take(SecretField::OidcClientId)?,
        oidc_client_secret: take(SecretField::OidcClientSecret)?,
        cluster_server: take(SecretField::ClusterServer)?,
        cluster_token: take(SecretField::ClusterToken)?,
        outer_rim_token: take(SecretField::OuterRimToken)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use config_store::MockConfigStore;
    use std::time::Duration;

    fn populated_store() -> MockConfigStore {
        let store = MockConfigStore::new();
        store
            .set_secret("googleOAuth2ClientID", "client-id")
            .set_secret("googleOAuth2ClientSecret", "client-secret")
            .set_config("LSITClusterServer", "https://lsit.example.edu:6443")
            .set_secret("LSITClusterToken", "cluster-token")
            .set_secret("LSITOuterRimToken", "outer-rim-token");
        store
    }

    #[tokio::test]
    async fn test_resolves_every_field_by_name() {
        let store = populated_store();
        let secrets = resolve_secrets(&store).await.unwrap();

        assert_eq!(secrets.oidc_client_id, "client-id");
        assert_eq!(secrets.oidc_client_secret, "client-secret");
        assert_eq!(secrets.cluster_server, "https://lsit.example.edu:6443");
        assert_eq!(secrets.cluster_token, "cluster-token");
        assert_eq!(secrets.outer_rim_token, "outer-rim-token");
    }

    #[tokio::test]
    async fn test_cluster_server_is_plain_config() {
        let store = populated_store();
        store.remove("LSITClusterServer");
        store.set_secret("LSITClusterServer", "https://wrong-lookup");

        let err = resolve_secrets(&store).await.unwrap_err();
        assert_eq!(err.key, "LSITClusterServer");
        assert!(err.source.is_not_found());
    }

    #[tokio::test]
    async fn test_each_missing_key_is_named() {
        for field in SecretField::ALL {
            let store = populated_store();
            store.remove(field.key());

            let err = resolve_secrets(&store).await.unwrap_err();
            assert_eq!(err.key, field.key());
            assert!(err.to_string().contains(field.key()));
        }
    }

    #[tokio::test]
    async fn test_store_failure_is_configuration_missing() {
        let store = populated_store();
        store.fail_with("LSITClusterToken", "connection reset");

        let err = resolve_secrets(&store).await.unwrap_err();
        assert_eq!(err.key, "LSITClusterToken");
        assert!(matches!(err.source, StoreError::Api(_)));
    }

    #[tokio::test]
    async fn test_waits_for_all_lookups_even_after_failure() {
        let store = populated_store();
        store
            .remove("googleOAuth2ClientID")
            .delay("LSITOuterRimToken", Duration::from_millis(30));

        let err = resolve_secrets(&store).await.unwrap_err();
        assert_eq!(err.key, "googleOAuth2ClientID");
        // Every lookup reported before the resolver returned
        assert_eq!(store.lookup_count(), 5);
    }

    #[tokio::test]
    async fn test_out_of_order_completion() {
        let store = populated_store();
        store
            .delay("googleOAuth2ClientID", Duration::from_millis(40))
            .delay("googleOAuth2ClientSecret", Duration::from_millis(20));

        let secrets = resolve_secrets(&store).await.unwrap();
        assert_eq!(secrets.oidc_client_id, "client-id");
        assert_eq!(secrets.oidc_client_secret, "client-secret");

        let order = store.completion_order();
        assert_eq!(order.last().map(String::as_str), Some("googleOAuth2ClientID"));
    }

    #[tokio::test]
    async fn test_first_failure_in_lookup_order_wins() {
        let store = populated_store();
        store
            .remove("LSITOuterRimToken")
            .remove("googleOAuth2ClientSecret")
            .delay("googleOAuth2ClientSecret", Duration::from_millis(30));

        let err = resolve_secrets(&store).await.unwrap_err();
        assert_eq!(err.key, "googleOAuth2ClientSecret");
    }

    #[test]
    fn test_debug_hides_tokens() {
        let secrets = ResolvedSecrets {
            oidc_client_id: "id".to_string(),
            oidc_client_secret: "s3cr3t".to_string(),
            cluster_server: "https://lsit".to_string(),
            cluster_token: "tok".to_string(),
            outer_rim_token: "rim".to_string(),
        };
        let rendered = format!("{:?}", secrets);
        assert!(!rendered.contains("s3cr3t"));
        assert!(!rendered.contains("rim\""));
    }
}
