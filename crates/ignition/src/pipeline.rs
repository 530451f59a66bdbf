//! Boot document pipeline.
//!
//! One run moves strictly forward through
//! `Idle → ResolvingSecrets → Rendering → Translating → {Succeeded | Failed}`.
//! The first failing stage ends the run; its error carries the stage it
//! happened in. Nothing is retried and nothing durable is written, so dropping
//! the run future discards all partial state.

use crate::context::{HostSettings, RenderContext};
use crate::diagnostics::{DiagnosticKind, TranslationDiagnostic, aggregate};
use crate::document::BootDocument;
use crate::error::{PipelineError, TranslateError};
use crate::render::TemplateRenderer;
use crate::secrets::resolve_secrets;
use crate::template::BootTemplate;
use crate::translate::{TranslateOptions, Translation, translate};
use config_store::ConfigStore;
use serde::Serialize;
use std::fmt;
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

/// Pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Stage {
    /// Not started
    Idle,
    /// Fetching config and secret values
    ResolvingSecrets,
    /// Rendering the template
    Rendering,
    /// Translating to Ignition
    Translating,
    /// Boot document produced
    Succeeded,
    /// A stage failed
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Idle => "idle",
            Stage::ResolvingSecrets => "resolving secrets",
            Stage::Rendering => "rendering",
            Stage::Translating => "translating",
            Stage::Succeeded => "succeeded",
            Stage::Failed => "failed",
        })
    }
}

struct RunState {
    stage: Stage,
    transitions: Vec<Stage>,
}

impl RunState {
    fn new() -> Self {
        Self {
            stage: Stage::Idle,
            transitions: vec![Stage::Idle],
        }
    }

    fn advance(&mut self, next: Stage) {
        debug!("Stage {} -> {}", self.stage, next);
        self.stage = next;
        self.transitions.push(next);
    }
}

/// Result of one pipeline run
#[derive(Debug)]
pub struct PipelineOutcome {
    /// Identifier attached to every log line of the run
    pub run_id: Uuid,
    /// Every stage the run entered, starting with `Idle`
    pub transitions: Vec<Stage>,
    /// Translation diagnostics, fatal or not (empty if translation never ran)
    pub diagnostics: Vec<TranslationDiagnostic>,
    /// Boot document, or the error that ended the run
    pub result: Result<BootDocument, PipelineError>,
}

impl PipelineOutcome {
    /// Terminal stage
    pub fn stage(&self) -> Stage {
        self.transitions.last().copied().unwrap_or(Stage::Idle)
    }

    /// Whether the run produced a boot document
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    /// Boot document, or the error that ended the run
    ///
    /// # Errors
    ///
    /// Returns the stage-tagged error of the failing stage.
    pub fn into_result(self) -> Result<BootDocument, PipelineError> {
        self.result
    }
}

/// Generates boot documents from one shared template
#[derive(Debug)]
pub struct IgnitionPipeline<'t> {
    template: &'t BootTemplate,
    renderer: TemplateRenderer,
    strict: bool,
    pretty: bool,
}

impl<'t> IgnitionPipeline<'t> {
    /// Pipeline over `template`, lenient and compact by default
    pub fn new(template: &'t BootTemplate) -> Self {
        Self {
            template,
            renderer: TemplateRenderer::new(),
            strict: false,
            pretty: false,
        }
    }

    /// Treat translation warnings as fatal
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Pretty-print the boot document
    pub fn pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    /// Run the pipeline for one host and return the full outcome
    pub async fn run<S: ConfigStore + ?Sized>(&self, store: &S, host: &HostSettings) -> PipelineOutcome {
        let run_id = Uuid::new_v4();
        let span = info_span!("ignition", %run_id, hostname = %host.hostname);

        async move {
            let mut state = RunState::new();
            let mut diagnostics = Vec::new();
            let result = self.execute(store, host, &mut state, &mut diagnostics).await;

            match &result {
                Ok(document) => {
                    state.advance(Stage::Succeeded);
                    info!(
                        "Generated boot document for {} ({} bytes)",
                        host.fqdn(),
                        document.as_str().len()
                    );
                }
                Err(e) => {
                    state.advance(Stage::Failed);
                    error!("Boot document generation failed while {}: {}", e.stage(), e);
                }
            }

            PipelineOutcome {
                run_id,
                transitions: state.transitions,
                diagnostics,
                result,
            }
        }
        .instrument(span)
        .await
    }

    /// Run the pipeline for one host, returning only the boot document
    ///
    /// # Errors
    ///
    /// Returns the stage-tagged error of the first failing stage.
    pub async fn generate<S: ConfigStore + ?Sized>(
        &self,
        store: &S,
        host: &HostSettings,
    ) -> Result<BootDocument, PipelineError> {
        self.run(store, host).await.into_result()
    }

    async fn execute<S: ConfigStore + ?Sized>(
        &self,
        store: &S,
        host: &HostSettings,
        state: &mut RunState,
        diagnostics: &mut Vec<TranslationDiagnostic>,
    ) -> Result<BootDocument, PipelineError> {
        state.advance(Stage::ResolvingSecrets);
        let secrets = resolve_secrets(store).await?;

        state.advance(Stage::Rendering);
        let ctx = RenderContext::new(secrets, host);
        let rendered = self.renderer.render(self.template, &ctx)?;

        state.advance(Stage::Translating);
        let options = TranslateOptions {
            files_dir: Some(self.template.files_dir().to_path_buf()),
            strict: self.strict,
            pretty: self.pretty,
        };
        let Translation { document, report } =
            tokio::task::spawn_blocking(move || translate(&rendered, &options))
                .await
                .map_err(|e| TranslateError::Aborted(e.to_string()))??;

        diagnostics.extend(report.entries().iter().cloned());
        let report = aggregate(report).inspect_err(|failure| {
            for diagnostic in failure.diagnostics() {
                error!("{}", diagnostic);
            }
        })?;
        for diagnostic in report.entries() {
            match diagnostic.kind {
                DiagnosticKind::Info => info!("{}", diagnostic),
                _ => warn!("{}", diagnostic),
            }
        }

        Ok(document.ok_or(TranslateError::NoOutput)?)
    }
}
