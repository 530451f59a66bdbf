//! Boot template loading.
//!
//! A [`BootTemplate`] pairs the templated Butane source with the directory that
//! `local:` references inside it resolve against. It is loaded once and passed
//! by reference into every pipeline run, so several hosts can be rendered from
//! the same template concurrently.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Canonical coder VM template shipped with the workspace
pub const CODER_BUTANE: &str = include_str!("../../../assets/coder/butane.yml");

/// Immutable templated Butane source plus its files directory
#[derive(Debug, Clone)]
pub struct BootTemplate {
    name: Arc<str>,
    source: Arc<str>,
    files_dir: PathBuf,
}

impl BootTemplate {
    /// Create a template from source text
    pub fn new(name: impl Into<String>, source: impl Into<String>, files_dir: impl Into<PathBuf>) -> Self {
        Self {
            name: Arc::from(name.into()),
            source: Arc::from(source.into()),
            files_dir: files_dir.into(),
        }
    }

    /// The canonical coder template, resolving local files against `files_dir`
    pub fn coder(files_dir: impl Into<PathBuf>) -> Self {
        Self::new("butane", CODER_BUTANE, files_dir)
    }

    /// Load a template from disk
    ///
    /// When `files_dir` is `None` the template's parent directory is used.
    pub fn load(path: impl AsRef<Path>, files_dir: Option<PathBuf>) -> std::io::Result<Self> {
        let path = path.as_ref();
        debug!("Loading boot template from {}", path.display());
        let source = std::fs::read_to_string(path)?;
        let files_dir = files_dir.unwrap_or_else(|| {
            path.parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."))
        });
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "butane".to_string());
        Ok(Self::new(name, source, files_dir))
    }

    /// Template name, used in error messages
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raw templated source
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Directory `local:` references resolve against
    pub fn files_dir(&self) -> &Path {
        &self.files_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_defaults_files_dir_to_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("butane.yml");
        std::fs::write(&path, "variant: fcos\nversion: 1.5.0\n").unwrap();

        let template = BootTemplate::load(&path, None).unwrap();
        assert_eq!(template.name(), "butane");
        assert_eq!(template.files_dir(), dir.path());
        assert!(template.source().starts_with("variant: fcos"));
    }

    #[test]
    fn test_load_explicit_files_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("node.bu");
        std::fs::write(&path, "variant: fcos\n").unwrap();

        let template = BootTemplate::load(&path, Some(PathBuf::from("/srv/files"))).unwrap();
        assert_eq!(template.name(), "node");
        assert_eq!(template.files_dir(), Path::new("/srv/files"));
    }

    #[test]
    fn test_load_missing_file() {
        assert!(BootTemplate::load("/nonexistent/butane.yml", None).is_err());
    }

    #[test]
    fn test_clones_share_source() {
        let template = BootTemplate::coder("assets/coder");
        let clone = template.clone();
        assert!(std::ptr::eq(template.source(), clone.source()));
        assert!(template.source().contains("domain_escape"));
    }
}
