//! Ignition pipeline error types.
//!
//! Every failure is tagged with the pipeline stage it happened in so the caller
//! can tell a missing secret apart from a broken template or a broken document.

use crate::diagnostics::TranslationFailure;
use crate::pipeline::Stage;
use config_store::StoreError;
use thiserror::Error;

/// A required config or secret value could not be resolved
#[derive(Debug, Error)]
#[error("configuration missing: {key}: {source}")]
pub struct ConfigurationMissing {
    /// Store key that failed
    pub key: &'static str,
    /// Underlying store failure
    #[source]
    pub source: StoreError,
}

/// Template parse or execution failure
#[derive(Debug, Error)]
pub enum RenderError {
    /// Malformed template syntax
    #[error("template {name} failed to parse: {source}")]
    Syntax {
        /// Template name
        name: String,
        /// Underlying cause
        #[source]
        source: minijinja::Error,
    },

    /// Template referenced an undefined field or a helper failed
    #[error("template {name} failed to render: {source}")]
    Execution {
        /// Template name
        name: String,
        /// Underlying cause
        #[source]
        source: minijinja::Error,
    },
}

/// Hard translator failures that prevent a report from being produced
#[derive(Debug, Error)]
pub enum TranslateError {
    /// Ignition output could not be serialized
    #[error("failed to serialize ignition config: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Translator task was cancelled or panicked
    #[error("translation aborted: {0}")]
    Aborted(String),

    /// Translation succeeded without producing a document
    #[error("translation produced no document")]
    NoOutput,
}

/// Errors that can occur in the ignition pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Secret or config value missing
    #[error(transparent)]
    ConfigurationMissing(#[from] ConfigurationMissing),

    /// Template rendering failed
    #[error("render error: {0}")]
    Render(#[from] RenderError),

    /// Translator could not run
    #[error("translate error: {0}")]
    Translate(#[from] TranslateError),

    /// Translation reported one or more fatal diagnostics
    #[error(transparent)]
    TranslationFailure(#[from] TranslationFailure),
}

impl PipelineError {
    /// Stage the failure occurred in
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::ConfigurationMissing(_) => Stage::ResolvingSecrets,
            PipelineError::Render(_) => Stage::Rendering,
            PipelineError::Translate(_) | PipelineError::TranslationFailure(_) => {
                Stage::Translating
            }
        }
    }
}
