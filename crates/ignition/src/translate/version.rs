//! Config variants and versions, and the features each one unlocks

use crate::diagnostics::TranslationReport;
use std::fmt;

/// Butane config variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    /// Fedora CoreOS
    Fcos,
    /// Flatcar Container Linux
    Flatcar,
}

impl Variant {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "fcos" => Some(Variant::Fcos),
            "flatcar" => Some(Variant::Flatcar),
            _ => None,
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Variant::Fcos => "fcos",
            Variant::Flatcar => "flatcar",
        })
    }
}

type Version = (u32, u32, u32);

/// (variant, config version, emitted ignition version)
const SUPPORTED: &[(Variant, Version, &str)] = &[
    (Variant::Fcos, (1, 0, 0), "3.0.0"),
    (Variant::Fcos, (1, 1, 0), "3.1.0"),
    (Variant::Fcos, (1, 2, 0), "3.2.0"),
    (Variant::Fcos, (1, 3, 0), "3.2.0"),
    (Variant::Fcos, (1, 4, 0), "3.3.0"),
    (Variant::Fcos, (1, 5, 0), "3.4.0"),
    (Variant::Flatcar, (1, 0, 0), "3.3.0"),
    (Variant::Flatcar, (1, 1, 0), "3.4.0"),
];

fn parse_version(text: &str) -> Option<Version> {
    let mut parts = text.split('.').map(|part| part.parse::<u32>().ok());
    let version = (parts.next()??, parts.next()??, parts.next()??);
    match parts.next() {
        None => Some(version),
        Some(_) => None,
    }
}

/// Optional source features gated on config version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    /// `local:` file contents
    LocalFiles,
    /// `storage.trees`
    Trees,
    /// `http_headers` on resources
    HttpHeaders,
    /// `resize` on partitions
    PartitionResize,
    /// `with_mount_unit` on filesystems
    MountUnits,
    /// `ssh_authorized_keys_local` on users
    SshKeysLocal,
    /// `kernel_arguments`
    KernelArguments,
    /// `contents_local` on units and dropins
    UnitContentsLocal,
}

impl Feature {
    fn name(self) -> &'static str {
        match self {
            Feature::LocalFiles => "local",
            Feature::Trees => "trees",
            Feature::HttpHeaders => "http_headers",
            Feature::PartitionResize => "resize",
            Feature::MountUnits => "with_mount_unit",
            Feature::SshKeysLocal => "ssh_authorized_keys_local",
            Feature::KernelArguments => "kernel_arguments",
            Feature::UnitContentsLocal => "contents_local",
        }
    }

    fn minimum(self, variant: Variant) -> Version {
        match (variant, self) {
            (Variant::Fcos, Feature::LocalFiles | Feature::Trees) => (1, 1, 0),
            (Variant::Fcos, Feature::HttpHeaders | Feature::PartitionResize) => (1, 2, 0),
            (Variant::Fcos, Feature::MountUnits) => (1, 3, 0),
            (Variant::Fcos, Feature::SshKeysLocal | Feature::KernelArguments) => (1, 4, 0),
            (Variant::Fcos, Feature::UnitContentsLocal) => (1, 5, 0),
            (Variant::Flatcar, Feature::UnitContentsLocal) => (1, 1, 0),
            (Variant::Flatcar, _) => (1, 0, 0),
        }
    }
}

/// Resolved variant and version of a source document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecVersion {
    variant: Variant,
    version: Version,
    ignition: &'static str,
}

impl SpecVersion {
    /// Look up a supported variant/version pair
    pub fn resolve(variant: &str, version: &str) -> Result<Self, String> {
        let parsed_variant =
            Variant::parse(variant).ok_or_else(|| format!("unknown variant {:?}", variant))?;
        let parsed_version = parse_version(version)
            .ok_or_else(|| format!("invalid version {:?}", version))?;
        SUPPORTED
            .iter()
            .find(|(v, ver, _)| *v == parsed_variant && *ver == parsed_version)
            .map(|(variant, version, ignition)| SpecVersion {
                variant: *variant,
                version: *version,
                ignition: *ignition,
            })
            .ok_or_else(|| format!("unsupported version {} for variant {}", version, variant))
    }

    /// Newest supported version of a variant
    pub fn latest(variant: Variant) -> Self {
        let (variant, version, ignition) = SUPPORTED
            .iter()
            .rev()
            .find(|(v, _, _)| *v == variant)
            .copied()
            .unwrap_or(SUPPORTED[SUPPORTED.len() - 1]);
        SpecVersion {
            variant,
            version,
            ignition,
        }
    }

    /// Config variant
    pub fn variant(&self) -> Variant {
        self.variant
    }

    /// Ignition spec version the output declares
    pub fn ignition_version(&self) -> &'static str {
        self.ignition
    }

    /// Whether this version accepts `feature`
    pub fn supports(&self, feature: Feature) -> bool {
        self.version >= feature.minimum(self.variant)
    }

    /// Check a feature, recording an error at `path` when unsupported
    pub fn require(&self, feature: Feature, path: &str, report: &mut TranslationReport) -> bool {
        if self.supports(feature) {
            return true;
        }
        let (major, minor, patch) = feature.minimum(self.variant);
        report.error(
            path,
            format!(
                "{} requires {} config version {}.{}.{} or later",
                feature.name(),
                self.variant,
                major,
                minor,
                patch
            ),
        );
        false
    }
}
