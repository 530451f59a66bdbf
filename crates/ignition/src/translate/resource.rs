//! Resources: inline text, local files and remote sources
//!
//! Inline and local contents are embedded as `data:` URLs using whichever of
//! percent-encoding and base64 is shorter.

use super::node::MapNode;
use super::output::{HttpHeader, Resource, Verification};
use super::version::Feature;
use super::Ctx;
use crate::diagnostics::TranslationReport;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::path::{Component, Path, PathBuf};

/// Encode bytes as a `data:` URL
pub fn data_url(bytes: &[u8]) -> String {
    let base64 = format!("data:;base64,{}", STANDARD.encode(bytes));
    match std::str::from_utf8(bytes) {
        Ok(text) => {
            let percent = format!("data:,{}", urlencoding::encode(text));
            if percent.len() <= base64.len() {
                percent
            } else {
                base64
            }
        }
        Err(_) => base64,
    }
}

/// Resolve a `local:` path against the files directory.
///
/// The result never leaves `files_dir`: absolute paths and `..` components
/// that climb above it are rejected.
pub fn resolve_local(files_dir: &Path, relative: &str) -> Result<PathBuf, String> {
    let mut resolved = files_dir.to_path_buf();
    let mut depth = 0usize;
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(part) => {
                resolved.push(part);
                depth += 1;
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if depth == 0 {
                    return Err(format!("local path {} escapes the files directory", relative));
                }
                resolved.pop();
                depth -= 1;
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(format!(
                    "local path {} must be relative to the files directory",
                    relative
                ));
            }
        }
    }
    Ok(resolved)
}

/// Read a local file, recording an error at `at` on failure
pub(super) fn read_local(
    ctx: &Ctx<'_>,
    relative: &str,
    at: &str,
    report: &mut TranslationReport,
) -> Option<Vec<u8>> {
    let Some(files_dir) = ctx.files_dir else {
        report.error(at, "local paths require a files directory");
        return None;
    };
    let path = match resolve_local(files_dir, relative) {
        Ok(path) => path,
        Err(message) => {
            report.error(at, message);
            return None;
        }
    };
    match std::fs::read(&path) {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            report.error(at, format!("failed to read local file {}: {}", relative, e));
            None
        }
    }
}

/// Read a local file that must be UTF-8 text
pub(super) fn read_local_text(
    ctx: &Ctx<'_>,
    relative: &str,
    at: &str,
    report: &mut TranslationReport,
) -> Option<String> {
    let bytes = read_local(ctx, relative, at, report)?;
    match String::from_utf8(bytes) {
        Ok(text) => Some(text),
        Err(_) => {
            report.error(at, format!("local file {} is not valid UTF-8", relative));
            None
        }
    }
}

fn valid_hash(hash: &str) -> bool {
    let Some((function, digest)) = hash.split_once('-') else {
        return false;
    };
    let expected = match function {
        "sha512" => 128,
        "sha256" => 64,
        _ => return false,
    };
    digest.len() == expected && digest.chars().all(|c| c.is_ascii_hexdigit())
}

fn translate_verification(mut node: MapNode<'_>, report: &mut TranslationReport) -> Option<Verification> {
    let hash_path = node.key_path("hash");
    let hash = node.string("hash", report);
    node.finish(report);
    let hash = hash?;
    if !valid_hash(&hash) {
        report.error(&hash_path, format!("invalid verification hash {}", hash));
    }
    Some(Verification { hash })
}

fn translate_http_headers(node: &mut MapNode<'_>, ctx: &Ctx<'_>, report: &mut TranslationReport) -> Vec<HttpHeader> {
    let at = node.key_path("http_headers");
    let items = node.seq("http_headers", report);
    if items.is_empty() || !ctx.spec.require(Feature::HttpHeaders, &at, report) {
        return Vec::new();
    }
    items
        .into_iter()
        .filter_map(|(path, value)| {
            let mut header = MapNode::new(value, path, report)?;
            let name = header.required_string("name", report);
            let value = header.string("value", report);
            header.finish(report);
            Some(HttpHeader { name: name?, value })
        })
        .collect()
}

/// Translate one resource mapping
pub(super) fn resource(mut node: MapNode<'_>, ctx: &Ctx<'_>, report: &mut TranslationReport) -> Resource {
    let at = node.path().to_string();
    let local_path = node.key_path("local");
    let compression_path = node.key_path("compression");

    let inline = node.string("inline", report);
    let local = node.string("local", report);
    let source = node.string("source", report);
    let compression = node.string("compression", report);
    let verification = node
        .map("verification", report)
        .and_then(|v| translate_verification(v, report));
    let http_headers = translate_http_headers(&mut node, ctx, report);
    node.finish(report);

    let specified = [inline.is_some(), local.is_some(), source.is_some()]
        .into_iter()
        .filter(|set| *set)
        .count();
    if specified > 1 {
        report.error(&at, "only one of inline, local or source may be specified");
    }

    let embedded = inline.is_some() || local.is_some();
    match compression.as_deref() {
        None | Some("") => {}
        Some("gzip") if embedded => {
            report.error(&compression_path, "compression is only supported with source");
        }
        Some("gzip") => {}
        Some(other) => {
            report.error(&compression_path, format!("unsupported compression {}", other));
        }
    }

    let source = if let Some(text) = inline {
        Some(data_url(text.as_bytes()))
    } else if let Some(relative) = local {
        if ctx.spec.require(Feature::LocalFiles, &local_path, report) {
            read_local(ctx, &relative, &local_path, report).map(|bytes| data_url(&bytes))
        } else {
            None
        }
    } else {
        source
    };

    Resource {
        compression,
        http_headers,
        source,
        verification,
    }
}

/// Translate an optional resource field of `parent`
pub(super) fn resource_field(
    parent: &mut MapNode<'_>,
    key: &str,
    ctx: &Ctx<'_>,
    report: &mut TranslationReport,
) -> Option<Resource> {
    let node = parent.map(key, report)?;
    Some(resource(node, ctx, report))
}

/// Translate a list of resources under `parent`
pub(super) fn resource_list(
    parent: &mut MapNode<'_>,
    key: &str,
    ctx: &Ctx<'_>,
    report: &mut TranslationReport,
) -> Vec<Resource> {
    parent
        .seq(key, report)
        .into_iter()
        .filter_map(|(path, value)| {
            let node = MapNode::new(value, path, report)?;
            Some(resource(node, ctx, report))
        })
        .collect()
}
