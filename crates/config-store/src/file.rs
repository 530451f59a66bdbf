//! Stack file config store
//!
//! Reads configuration from a YAML stack file:
//!
//! ```yaml
//! config:
//!   dreamlab:LSITClusterServer: https://lsit.example.edu:6443
//! secrets:
//!   googleOAuth2ClientID: 1234.apps.googleusercontent.com
//! ```
//!
//! Keys may carry a `project:` namespace. A lookup tries the bare key first and
//! then `{project}:{key}` when a project is configured.

use crate::error::StoreError;
use crate::store_trait::{non_empty, ConfigStore};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct StackFile {
    #[serde(default)]
    config: BTreeMap<String, serde_yaml::Value>,
    #[serde(default)]
    secrets: BTreeMap<String, serde_yaml::Value>,
}

/// Config store backed by a YAML stack file
pub struct FileConfigStore {
    source: Option<PathBuf>,
    project: Option<String>,
    config: BTreeMap<String, String>,
    secrets: BTreeMap<String, String>,
}

impl std::fmt::Debug for FileConfigStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileConfigStore")
            .field("source", &self.source)
            .field("project", &self.project)
            .field("config_keys", &self.config.keys().collect::<Vec<_>>())
            .field("secret_keys", &self.secrets.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl FileConfigStore {
    /// Load a stack file from disk
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        debug!("Loading stack config from {}", path.display());
        let raw = tokio::fs::read_to_string(path).await?;
        let mut store = Self::from_yaml_str(&raw)?;
        store.source = Some(path.to_path_buf());
        Ok(store)
    }

    /// Parse a stack file from YAML text
    pub fn from_yaml_str(raw: &str) -> Result<Self, StoreError> {
        let stack: StackFile = if raw.trim().is_empty() {
            StackFile::default()
        } else {
            serde_yaml::from_str(raw)?
        };

        Ok(Self {
            source: None,
            project: None,
            config: scalars_to_strings(stack.config)?,
            secrets: scalars_to_strings(stack.secrets)?,
        })
    }

    /// Set the project namespace used for `project:key` lookups
    #[must_use]
    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    fn lookup(&self, map: &BTreeMap<String, String>, name: &str) -> Result<String, StoreError> {
        let value = map.get(name).or_else(|| {
            self.project
                .as_ref()
                .and_then(|project| map.get(&format!("{}:{}", project, name)))
        });
        match value {
            Some(value) => non_empty(name, value.clone()),
            None => Err(StoreError::NotFound(name.to_string())),
        }
    }
}

/// Stack values may be written as YAML numbers or booleans; the store hands
/// every value out as a string.
fn scalars_to_strings(
    raw: BTreeMap<String, serde_yaml::Value>,
) -> Result<BTreeMap<String, String>, StoreError> {
    raw.into_iter()
        .map(|(key, value)| {
            let value = match value {
                serde_yaml::Value::String(s) => s,
                serde_yaml::Value::Number(n) => n.to_string(),
                serde_yaml::Value::Bool(b) => b.to_string(),
                serde_yaml::Value::Null => String::new(),
                _ => {
                    return Err(StoreError::InvalidStackFile(format!(
                        "stack value for {} must be a scalar",
                        key
                    )));
                }
            };
            Ok((key, value))
        })
        .collect()
}

#[async_trait::async_trait]
impl ConfigStore for FileConfigStore {
    fn describe(&self) -> String {
        match &self.source {
            Some(path) => format!("stack file {}", path.display()),
            None => "inline stack config".to_string(),
        }
    }

    async fn get(&self, name: &str) -> Result<String, StoreError> {
        self.lookup(&self.config, name)
    }

    async fn get_secret(&self, name: &str) -> Result<String, StoreError> {
        self.lookup(&self.secrets, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STACK: &str = r#"
config:
  dreamlab:LSITClusterServer: https://lsit.example.edu:6443
  coder_instance_type: t4g.large
  replicas: 3
secrets:
  googleOAuth2ClientID: client-id
  googleOAuth2ClientSecret: ""
"#;

    #[tokio::test]
    async fn test_plain_and_secret_lookups_are_separate() {
        let store = FileConfigStore::from_yaml_str(STACK).unwrap();
        assert_eq!(store.get("coder_instance_type").await.unwrap(), "t4g.large");
        assert_eq!(store.get_secret("googleOAuth2ClientID").await.unwrap(), "client-id");
        // A secret is not visible through the plain lookup
        assert!(store.get("googleOAuth2ClientID").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_project_namespace_lookup() {
        let store = FileConfigStore::from_yaml_str(STACK).unwrap();
        assert!(store.get("LSITClusterServer").await.is_err());

        let store = store.with_project("dreamlab");
        assert_eq!(
            store.get("LSITClusterServer").await.unwrap(),
            "https://lsit.example.edu:6443"
        );
    }

    #[tokio::test]
    async fn test_empty_value_is_not_found() {
        let store = FileConfigStore::from_yaml_str(STACK).unwrap();
        let err = store.get_secret("googleOAuth2ClientSecret").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(ref k) if k == "googleOAuth2ClientSecret"));
    }

    #[tokio::test]
    async fn test_numbers_are_stringified() {
        let store = FileConfigStore::from_yaml_str(STACK).unwrap();
        assert_eq!(store.get("replicas").await.unwrap(), "3");
    }

    #[test]
    fn test_nested_value_rejected() {
        let err = FileConfigStore::from_yaml_str("config:\n  key:\n    nested: true\n").unwrap_err();
        assert!(matches!(err, StoreError::InvalidStackFile(_)));
        assert_eq!(
            err.to_string(),
            "Invalid stack file: stack value for key must be a scalar"
        );
    }

    #[test]
    fn test_unknown_section_rejected() {
        assert!(FileConfigStore::from_yaml_str("values:\n  a: b\n").is_err());
    }

    #[tokio::test]
    async fn test_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Pulumi.dev.yaml");
        std::fs::write(&path, STACK).unwrap();

        let store = FileConfigStore::load(&path).await.unwrap();
        assert!(store.describe().contains("Pulumi.dev.yaml"));
        assert_eq!(store.get_secret("googleOAuth2ClientID").await.unwrap(), "client-id");
    }
}
