//! Boot document output

use serde::Serialize;

/// Final Ignition JSON, handed opaquely to the provisioning layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootDocument {
    contents: String,
}

impl BootDocument {
    pub(crate) fn new(contents: String) -> Self {
        Self { contents }
    }

    /// Ignition JSON text
    pub fn as_str(&self) -> &str {
        &self.contents
    }

    /// Take the Ignition JSON text
    pub fn into_string(self) -> String {
        self.contents
    }

    /// Package as instance user data.
    ///
    /// Any change to the document must replace the instance, since Ignition
    /// only runs on first boot.
    pub fn into_user_data(self) -> InstanceUserData {
        InstanceUserData {
            user_data: self.contents,
            replace_on_change: true,
        }
    }
}

/// Boot document as delivered to the instance provisioner
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceUserData {
    /// Ignition JSON
    pub user_data: String,
    /// Recreate the instance when `user_data` changes
    pub replace_on_change: bool,
}
