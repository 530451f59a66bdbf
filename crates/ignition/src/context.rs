//! Render context
//!
//! Strongly typed substitution values for the boot template. Each field is
//! populated from a named lookup, never by position.

use crate::secrets::ResolvedSecrets;
use serde::Serialize;
use std::fmt;

/// Per-deployment values that do not come from the config store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostSettings {
    /// Short hostname, e.g. "coder"
    pub hostname: String,
    /// DNS suffix, e.g. "dreamlab.ucsb.edu"
    pub domain: String,
}

impl HostSettings {
    /// Create host settings
    pub fn new(hostname: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            domain: domain.into(),
        }
    }

    /// Fully qualified host name
    pub fn fqdn(&self) -> String {
        format!("{}.{}", self.hostname, self.domain)
    }
}

/// All values the boot template can reference
///
/// Field names are the placeholder names used in the template, e.g.
/// `{{ oidc_client_id }}`.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct RenderContext {
    /// OIDC client identifier
    pub oidc_client_id: String,
    /// OIDC client secret
    pub oidc_client_secret: String,
    /// Cluster API server address
    pub cluster_server: String,
    /// Cluster join token
    pub cluster_token: String,
    /// Join token for the secondary (outer rim) cluster
    pub outer_rim_token: String,
    /// Target hostname
    pub hostname: String,
    /// Target domain
    pub domain: String,
}

impl RenderContext {
    /// Combine resolved secrets with host settings
    pub fn new(secrets: ResolvedSecrets, host: &HostSettings) -> Self {
        Self {
            oidc_client_id: secrets.oidc_client_id,
            oidc_client_secret: secrets.oidc_client_secret,
            cluster_server: secrets.cluster_server,
            cluster_token: secrets.cluster_token,
            outer_rim_token: secrets.outer_rim_token,
            hostname: host.hostname.clone(),
            domain: host.domain.clone(),
        }
    }
}

impl fmt::Debug for RenderContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderContext")
            .field("oidc_client_id", &self.oidc_client_id)
            .field("oidc_client_secret", &"<redacted>")
            .field("cluster_server", &self.cluster_server)
            .field("cluster_token", &"<redacted>")
            .field("outer_rim_token", &"<redacted>")
            .field("hostname", &self.hostname)
            .field("domain", &self.domain)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secrets() -> ResolvedSecrets {
        ResolvedSecrets {
            oidc_client_id: "client-id".to_string(),
            oidc_client_secret: "client-secret".to_string(),
            cluster_server: "https://lsit:6443".to_string(),
            cluster_token: "cluster-token".to_string(),
            outer_rim_token: "outer-rim-token".to_string(),
        }
    }

    #[test]
    fn test_fields_populated_by_name() {
        let ctx = RenderContext::new(secrets(), &HostSettings::new("coder", "dreamlab.ucsb.edu"));
        assert_eq!(ctx.oidc_client_id, "client-id");
        assert_eq!(ctx.outer_rim_token, "outer-rim-token");
        assert_eq!(ctx.hostname, "coder");
        assert_eq!(ctx.domain, "dreamlab.ucsb.edu");
    }

    #[test]
    fn test_debug_redacts_credentials() {
        let ctx = RenderContext::new(secrets(), &HostSettings::new("coder", "example.org"));
        let rendered = format!("{:?}", ctx);
        assert!(!rendered.contains("client-secret"));
        assert!(!rendered.contains("cluster-token"));
        assert!(!rendered.contains("outer-rim-token"));
        assert!(rendered.contains("https://lsit:6443"));
    }

    #[test]
    fn test_fqdn() {
        assert_eq!(HostSettings::new("coder", "a.b.edu").fqdn(), "coder.a.b.edu");
    }
}
