//! Ignition boot document generation
//!
//! Turns a templated Butane config into an Ignition document for one host:
//!
//! 1. resolve every required config and secret value from a [`ConfigStore`]
//!    concurrently ([`resolve_secrets`])
//! 2. render the template with those values and the host settings
//!    ([`TemplateRenderer`])
//! 3. translate the rendered Butane into Ignition JSON, collecting every
//!    structural problem ([`translate()`])
//! 4. fold a fatal diagnostics report into one compound error ([`aggregate`])
//!
//! [`IgnitionPipeline`] runs the stages in order and tags failures with the
//! stage they happened in.
//!
//! # Example
//!
//! ```no_run
//! use config_store::FileConfigStore;
//! use ignition::{BootTemplate, HostSettings, IgnitionPipeline};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = FileConfigStore::load("Pulumi.dreamlab.yaml").await?;
//! let template = BootTemplate::load("assets/coder/butane.yml", None)?;
//! let host = HostSettings::new("coder", "dreamlab.ucsb.edu");
//!
//! let document = IgnitionPipeline::new(&template).generate(&store, &host).await?;
//! println!("{}", document.as_str());
//! # Ok(())
//! # }
//! ```
//!
//! [`ConfigStore`]: config_store::ConfigStore

pub mod context;
pub mod diagnostics;
pub mod document;
pub mod error;
pub mod pipeline;
pub mod render;
pub mod secrets;
pub mod template;
pub mod translate;

pub use context::{HostSettings, RenderContext};
pub use diagnostics::{
    DiagnosticKind, TranslationDiagnostic, TranslationFailure, TranslationReport, aggregate,
};
pub use document::{BootDocument, InstanceUserData};
pub use error::{ConfigurationMissing, PipelineError, RenderError, TranslateError};
pub use pipeline::{IgnitionPipeline, PipelineOutcome, Stage};
pub use render::{RenderedDocument, TemplateRenderer, domain_escape};
pub use secrets::{ResolvedSecrets, SecretField, resolve_secrets};
pub use template::BootTemplate;
pub use translate::{TranslateOptions, Translation, translate};
