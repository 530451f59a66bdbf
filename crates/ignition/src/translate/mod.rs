//! Butane to Ignition translation.
//!
//! Converts a rendered Butane document (fcos or flatcar variant) into an
//! Ignition JSON document. Problems are recorded in a [`TranslationReport`]
//! with their document path instead of aborting, so one pass finds every
//! defect. The caller decides what a fatal report means; [`translate`] only
//! fails outright when it cannot run at all.
//!
//! Sections:
//! - `ignition`: config merge/replace, timeouts, TLS certificate authorities
//! - `kernel_arguments`
//! - `passwd`: users and groups
//! - `storage`: disks, filesystems, files, directories, links, local trees
//! - `systemd`: units and drop-ins, plus units generated by `with_mount_unit`

mod node;
mod output;
mod passwd;
mod resource;
mod storage;
mod systemd;
mod version;

pub use resource::{data_url, resolve_local};
pub use systemd::systemd_escape_path;
pub use version::{Feature, SpecVersion, Variant};

use crate::diagnostics::TranslationReport;
use crate::document::BootDocument;
use crate::error::TranslateError;
use crate::render::RenderedDocument;
use node::MapNode;
use output::{Config, IgnitionConfig, KernelArguments, Security, Timeouts, Tls};
use resource::{resource_field, resource_list};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Translator settings
#[derive(Debug, Clone, Default)]
pub struct TranslateOptions {
    /// Directory `local:` references resolve against
    pub files_dir: Option<PathBuf>,
    /// Treat warnings as fatal
    pub strict: bool,
    /// Pretty-print the output JSON
    pub pretty: bool,
}

/// Result of translating one document
#[derive(Debug)]
pub struct Translation {
    /// Ignition document, absent when the source could not be parsed
    pub document: Option<BootDocument>,
    /// Every diagnostic recorded, in order
    pub report: TranslationReport,
}

/// Per-translation settings shared by the section translators
pub(crate) struct Ctx<'a> {
    spec: SpecVersion,
    files_dir: Option<&'a Path>,
}

fn spec_version(root: &mut MapNode<'_>, report: &mut TranslationReport) -> SpecVersion {
    let variant_path = root.key_path("variant");
    let version_path = root.key_path("version");
    let variant = root.required_string("variant", report);
    let version = root.required_string("version", report);

    let (Some(variant), Some(version)) = (variant, version) else {
        return SpecVersion::latest(Variant::Fcos);
    };
    match SpecVersion::resolve(&variant, &version) {
        Ok(spec) => spec,
        Err(message) => {
            let at = if message.starts_with("unknown variant") {
                variant_path
            } else {
                version_path
            };
            report.error(&at, message);
            // Keep walking so later sections are still checked
            let fallback = if variant == "flatcar" {
                Variant::Flatcar
            } else {
                Variant::Fcos
            };
            SpecVersion::latest(fallback)
        }
    }
}

fn ignition_section(
    mut node: MapNode<'_>,
    ctx: &Ctx<'_>,
    report: &mut TranslationReport,
) -> (Option<IgnitionConfig>, Option<Security>, Option<Timeouts>) {
    let config = node.map("config", report).map(|mut config| {
        let merge = resource_list(&mut config, "merge", ctx, report);
        let replace = resource_field(&mut config, "replace", ctx, report);
        if !merge.is_empty() && replace.is_some() {
            report.error(config.path(), "config.merge and config.replace are mutually exclusive");
        }
        config.finish(report);
        IgnitionConfig { merge, replace }
    });

    let security = node.map("security", report).map(|mut security| {
        let certificate_authorities = match security.map("tls", report) {
            Some(mut tls) => {
                let cas = resource_list(&mut tls, "certificate_authorities", ctx, report);
                tls.finish(report);
                cas
            }
            None => Vec::new(),
        };
        security.finish(report);
        Security {
            tls: Tls {
                certificate_authorities,
            },
        }
    });

    let timeouts = node.map("timeouts", report).map(|mut timeouts| {
        let result = Timeouts {
            http_response_headers: timeouts.int("http_response_headers", report),
            http_total: timeouts.int("http_total", report),
        };
        timeouts.finish(report);
        result
    });

    node.finish(report);
    (config, security, timeouts)
}

fn kernel_arguments(
    mut node: MapNode<'_>,
    ctx: &Ctx<'_>,
    report: &mut TranslationReport,
) -> KernelArguments {
    let at = node.path().to_string();
    let args = KernelArguments {
        should_exist: node.string_list("should_exist", report),
        should_not_exist: node.string_list("should_not_exist", report),
    };
    node.finish(report);
    if ctx.spec.require(Feature::KernelArguments, &at, report) {
        args
    } else {
        KernelArguments::default()
    }
}

fn translate_value(
    value: &serde_yaml::Value,
    files_dir: Option<&Path>,
    report: &mut TranslationReport,
) -> Option<Config> {
    if value.is_null() {
        report.error("$", "document is empty");
        return None;
    }
    let mut root = MapNode::new(value, "$", report)?;
    let ctx = Ctx {
        spec: spec_version(&mut root, report),
        files_dir,
    };
    debug!(
        "Translating {} config to ignition {}",
        ctx.spec.variant(),
        ctx.spec.ignition_version()
    );

    let mut config = Config::default();
    config.ignition.version = ctx.spec.ignition_version().to_string();

    if let Some(node) = root.map("ignition", report) {
        let (merge, security, timeouts) = ignition_section(node, &ctx, report);
        config.ignition.config = merge;
        config.ignition.security = security;
        config.ignition.timeouts = timeouts;
    }
    if let Some(node) = root.map("kernel_arguments", report) {
        config.kernel_arguments = kernel_arguments(node, &ctx, report);
    }
    if let Some(node) = root.map("passwd", report) {
        config.passwd = passwd::translate_passwd(node, &ctx, report);
    }
    let mut generated = Vec::new();
    if let Some(node) = root.map("storage", report) {
        let (storage, units) = storage::translate_storage(node, &ctx, report);
        config.storage = storage;
        generated = units;
    }
    let systemd_node = root.map("systemd", report);
    config.systemd = systemd::translate_systemd(systemd_node, generated, &ctx, report);

    root.finish(report);
    Some(config)
}

/// Translate rendered Butane text into an Ignition document.
///
/// Diagnostics never fail this call; inspect `report` (or pass it to
/// [`crate::diagnostics::aggregate`]) before using the document. The document
/// is absent only when the text is not parseable YAML or not a mapping.
///
/// # Errors
///
/// Returns an error when the output cannot be serialized. A files directory
/// that is missing is only reported when a `local` reference needs it.
pub fn translate(
    rendered: &RenderedDocument,
    options: &TranslateOptions,
) -> Result<Translation, TranslateError> {
    let mut report = if options.strict {
        TranslationReport::strict()
    } else {
        TranslationReport::new()
    };

    if rendered.as_str().trim().is_empty() {
        report.error("$", "document is empty");
        return Ok(Translation {
            document: None,
            report,
        });
    }

    let value: serde_yaml::Value = match serde_yaml::from_str(rendered.as_str()) {
        Ok(value) => value,
        Err(e) => {
            let path = e
                .location()
                .map(|loc| format!("line {} column {}", loc.line(), loc.column()));
            report.push(
                crate::diagnostics::DiagnosticKind::Error,
                path,
                format!("invalid YAML: {}", e),
            );
            return Ok(Translation {
                document: None,
                report,
            });
        }
    };

    let Some(config) = translate_value(&value, options.files_dir.as_deref(), &mut report) else {
        return Ok(Translation {
            document: None,
            report,
        });
    };

    let json = if options.pretty {
        serde_json::to_string_pretty(&config)?
    } else {
        serde_json::to_string(&config)?
    };
    debug!(
        "Translation produced {} bytes with {} diagnostics",
        json.len(),
        report.entries().len()
    );

    Ok(Translation {
        document: Some(BootDocument::new(json)),
        report,
    })
}
