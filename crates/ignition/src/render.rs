//! Template rendering
//!
//! Substitutes a [`RenderContext`] into a [`BootTemplate`] using minijinja with
//! strict undefined handling, so a placeholder that names a field the context
//! does not have is an error rather than an empty string.
//!
//! Helpers:
//! - `domain_escape` escapes every literal dot, for domains placed inside
//!   regular expressions (`{{ domain | domain_escape }}` or
//!   `{{ domain_escape(domain) }}`)

use crate::context::RenderContext;
use crate::error::RenderError;
use crate::template::BootTemplate;
use minijinja::{Environment, ErrorKind, UndefinedBehavior};
use tracing::debug;

/// Butane text produced by rendering a template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDocument {
    text: String,
}

impl RenderedDocument {
    /// Wrap already-rendered Butane text
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Rendered text
    pub fn as_str(&self) -> &str {
        &self.text
    }
}

/// Escape literal dots for use inside a regular expression
///
/// `example.org` becomes `example\.org`. No other character is altered.
pub fn domain_escape(domain: &str) -> String {
    domain.replace('.', "\\.")
}

/// Renders boot templates
#[derive(Debug)]
pub struct TemplateRenderer {
    env: Environment<'static>,
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateRenderer {
    /// Create a renderer with strict undefined handling and the boot helpers
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_keep_trailing_newline(true);

        env.add_filter("domain_escape", |value: String| domain_escape(&value));
        env.add_function("domain_escape", |value: String| domain_escape(&value));

        Self { env }
    }

    /// Render a template with the given context
    ///
    /// # Errors
    ///
    /// Returns `RenderError::Syntax` for malformed template syntax and
    /// `RenderError::Execution` when rendering fails, e.g. on an undefined field.
    pub fn render(
        &self,
        template: &BootTemplate,
        ctx: &RenderContext,
    ) -> Result<RenderedDocument, RenderError> {
        debug!("Rendering template {}", template.name());
        self.env
            .render_named_str(template.name(), template.source(), ctx)
            .map(RenderedDocument::new)
            .map_err(|source| {
                let name = template.name().to_string();
                if source.kind() == ErrorKind::SyntaxError {
                    RenderError::Syntax { name, source }
                } else {
                    RenderError::Execution { name, source }
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::HostSettings;
    use crate::secrets::ResolvedSecrets;

    fn context(domain: &str) -> RenderContext {
        RenderContext::new(
            ResolvedSecrets {
                oidc_client_id: "client-id".to_string(),
                oidc_client_secret: "client-secret".to_string(),
                cluster_server: "https://lsit.example.edu:6443".to_string(),
                cluster_token: "cluster-token".to_string(),
                outer_rim_token: "outer-rim-token".to_string(),
            },
            &HostSettings::new("coder", domain),
        )
    }

    fn template(source: &str) -> BootTemplate {
        BootTemplate::new("test", source, "/nonexistent")
    }

    #[test]
    fn test_domain_escape() {
        assert_eq!(domain_escape("a.b.edu"), "a\\.b\\.edu");
        assert_eq!(domain_escape("localhost"), "localhost");
        assert_eq!(domain_escape("x-y_z.io"), "x-y_z\\.io");
        assert_eq!(domain_escape(""), "");
    }

    #[test]
    fn test_domain_escape_filter_and_function() {
        let renderer = TemplateRenderer::new();
        let ctx = context("a.b.edu");

        let filtered = renderer
            .render(&template("{{ domain | domain_escape }}"), &ctx)
            .unwrap();
        assert_eq!(filtered.as_str(), r"a\.b\.edu");

        let called = renderer
            .render(&template("{{ domain_escape(domain) }}"), &ctx)
            .unwrap();
        assert_eq!(called.as_str(), r"a\.b\.edu");
    }

    #[test]
    fn test_all_fields_available() {
        let renderer = TemplateRenderer::new();
        let source = "{{ oidc_client_id }} {{ oidc_client_secret }} {{ cluster_server }} \
                      {{ cluster_token }} {{ outer_rim_token }} {{ hostname }}.{{ domain }}";
        let rendered = renderer.render(&template(source), &context("example.org")).unwrap();
        assert_eq!(
            rendered.as_str(),
            "client-id client-secret https://lsit.example.edu:6443 cluster-token outer-rim-token coder.example.org"
        );
    }

    #[test]
    fn test_undefined_field_is_execution_error() {
        let renderer = TemplateRenderer::new();
        let err = renderer
            .render(&template("token: {{ LSITClusterToken }}"), &context("example.org"))
            .unwrap_err();
        assert!(matches!(err, RenderError::Execution { .. }));
    }

    #[test]
    fn test_malformed_placeholder_is_syntax_error() {
        let renderer = TemplateRenderer::new();
        let err = renderer
            .render(&template("hostname: {{ hostname "), &context("example.org"))
            .unwrap_err();
        assert!(matches!(err, RenderError::Syntax { ref name, .. } if name == "test"));
    }

    #[test]
    fn test_unknown_helper_is_an_error() {
        let renderer = TemplateRenderer::new();
        assert!(renderer
            .render(&template("{{ domain | shout }}"), &context("example.org"))
            .is_err());
    }

    #[test]
    fn test_render_is_deterministic() {
        let renderer = TemplateRenderer::new();
        let tpl = BootTemplate::coder("/nonexistent");
        let ctx = context("dreamlab.ucsb.edu");

        let first = renderer.render(&tpl, &ctx).unwrap();
        let second = renderer.render(&tpl, &ctx).unwrap();
        assert_eq!(first.as_str().as_bytes(), second.as_str().as_bytes());
    }

    #[test]
    fn test_trailing_newline_kept() {
        let renderer = TemplateRenderer::new();
        let rendered = renderer
            .render(&template("variant: fcos\n"), &context("example.org"))
            .unwrap();
        assert_eq!(rendered.as_str(), "variant: fcos\n");
    }
}
