//! Settings loaded from environment variables

use crate::error::ToolError;
use ignition::HostSettings;
use std::path::PathBuf;

const DEFAULT_TEMPLATE: &str = "assets/coder/butane.yml";
const DEFAULT_HOSTNAME: &str = "coder";

/// Where config and secret values come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreSettings {
    /// HTTP config service
    Http { url: String, token: String },
    /// YAML stack file, optionally namespaced by project
    File { path: PathBuf, project: Option<String> },
}

impl std::fmt::Display for StoreSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreSettings::Http { url, .. } => write!(f, "{}", url),
            StoreSettings::File { path, .. } => write!(f, "{}", path.display()),
        }
    }
}

/// Tool settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub template: PathBuf,
    /// `None` uses the template's directory
    pub files_dir: Option<PathBuf>,
    pub host: HostSettings,
    pub strict: bool,
    pub pretty: bool,
    pub store: StoreSettings,
}

fn parse_flag(name: &str, value: Option<String>) -> Result<bool, ToolError> {
    match value.as_deref().map(str::trim) {
        None | Some("") => Ok(false),
        Some("1" | "true" | "yes") => Ok(true),
        Some("0" | "false" | "no") => Ok(false),
        Some(other) => Err(ToolError::InvalidConfig(format!(
            "{} must be true or false, got {:?}",
            name, other
        ))),
    }
}

impl Settings {
    /// Load settings from the process environment
    pub fn from_env() -> Result<Self, ToolError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings through an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ToolError> {
        let var = |key: &str| lookup(key).filter(|value| !value.is_empty());

        let domain = var("IGNITION_DOMAIN").ok_or_else(|| {
            ToolError::InvalidConfig("IGNITION_DOMAIN environment variable is required".to_string())
        })?;
        let hostname = var("IGNITION_HOSTNAME").unwrap_or_else(|| DEFAULT_HOSTNAME.to_string());

        let store = match (var("CONFIG_STORE_URL"), var("CONFIG_STORE_TOKEN"), var("STACK_CONFIG")) {
            (Some(url), Some(token), _) => StoreSettings::Http { url, token },
            (Some(_), None, _) => {
                return Err(ToolError::InvalidConfig(
                    "CONFIG_STORE_TOKEN environment variable is required when CONFIG_STORE_URL is set"
                        .to_string(),
                ));
            }
            (None, _, Some(path)) => StoreSettings::File {
                path: PathBuf::from(path),
                project: var("STACK_PROJECT"),
            },
            (None, _, None) => {
                return Err(ToolError::InvalidConfig(
                    "either CONFIG_STORE_URL or STACK_CONFIG must be set".to_string(),
                ));
            }
        };

        Ok(Self {
            template: PathBuf::from(var("IGNITION_TEMPLATE").unwrap_or_else(|| DEFAULT_TEMPLATE.to_string())),
            files_dir: var("IGNITION_FILES_DIR").map(PathBuf::from),
            host: HostSettings::new(hostname, domain),
            strict: parse_flag("IGNITION_STRICT", var("IGNITION_STRICT"))?,
            pretty: parse_flag("IGNITION_PRETTY", var("IGNITION_PRETTY"))?,
            store,
        })
    }
}
