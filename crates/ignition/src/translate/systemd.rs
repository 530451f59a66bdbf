//! systemd units, drop-ins and generated mount units

use super::Ctx;
use super::node::MapNode;
use super::output::{Dropin, Filesystem, Systemd, Unit};
use super::resource::read_local_text;
use super::version::Feature;
use crate::diagnostics::TranslationReport;
use std::collections::BTreeMap;

const UNIT_TYPES: &[&str] = &[
    "service", "socket", "device", "mount", "automount", "swap", "target", "path", "timer",
    "slice", "scope",
];

/// A unit synthesized from another section, e.g. `with_mount_unit`
#[derive(Debug)]
pub(super) struct GeneratedUnit {
    pub unit: Unit,
    /// Document path of the entry that produced it
    pub origin: String,
}

/// Escape a path the way `systemd-escape --path` does
pub fn systemd_escape_path(path: &str) -> String {
    let mut escaped = String::new();
    for (i, segment) in path.split('/').filter(|s| !s.is_empty()).enumerate() {
        if i > 0 {
            escaped.push('-');
        }
        for (j, byte) in segment.bytes().enumerate() {
            match byte {
                b'.' if i == 0 && j == 0 => escaped.push_str("\\x2e"),
                b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b':' | b'_' | b'.' => {
                    escaped.push(byte as char)
                }
                other => escaped.push_str(&format!("\\x{:02x}", other)),
            }
        }
    }
    if escaped.is_empty() {
        escaped.push('-');
    }
    escaped
}

/// Build the mount (or swap) unit for a filesystem
pub(super) fn mount_unit(fs: &Filesystem) -> Result<Unit, String> {
    let format = fs
        .format
        .as_deref()
        .ok_or_else(|| "format is required with with_mount_unit".to_string())?;
    let options = fs.mount_options.join(",");

    let mut contents = String::from("# Generated by Butane\n");
    let name = if format == "swap" {
        contents.push_str("[Swap]\n");
        contents.push_str(&format!("What={}\n", fs.device));
        if !options.is_empty() {
            contents.push_str(&format!("Options={}\n", options));
        }
        contents.push_str("\n[Install]\nRequiredBy=swap.target\n");
        format!("{}.swap", systemd_escape_path(&fs.device))
    } else {
        let path = fs
            .path
            .as_deref()
            .ok_or_else(|| "path is required with with_mount_unit".to_string())?;
        let device = systemd_escape_path(&fs.device);
        contents.push_str(&format!(
            "[Unit]\nRequires=systemd-fsck@{device}.service\nAfter=systemd-fsck@{device}.service\n"
        ));
        contents.push_str(&format!(
            "\n[Mount]\nWhere={}\nWhat={}\nType={}\n",
            path, fs.device, format
        ));
        if !options.is_empty() {
            contents.push_str(&format!("Options={}\n", options));
        }
        contents.push_str("\n[Install]\nRequiredBy=local-fs.target\n");
        format!("{}.mount", systemd_escape_path(path))
    };

    Ok(Unit {
        contents: Some(contents),
        enabled: Some(true),
        name,
        ..Default::default()
    })
}

fn check_unit_name(name: &str, at: &str, report: &mut TranslationReport) {
    let valid = !name.contains('/')
        && name
            .rsplit_once('.')
            .is_some_and(|(stem, suffix)| !stem.is_empty() && UNIT_TYPES.contains(&suffix));
    if !valid {
        report.error(at, format!("invalid unit name {}", name));
    }
}

/// `contents` or `contents_local`, never both
fn unit_contents(
    node: &mut MapNode<'_>,
    ctx: &Ctx<'_>,
    report: &mut TranslationReport,
) -> Option<String> {
    let at = node.path().to_string();
    let local_path = node.key_path("contents_local");
    let contents = node.string("contents", report);
    let local = node.string("contents_local", report);
    match (contents, local) {
        (Some(_), Some(_)) => {
            report.error(&at, "only one of contents or contents_local may be specified");
            None
        }
        (Some(contents), None) => Some(contents),
        (None, Some(relative)) => {
            if ctx.spec.require(Feature::UnitContentsLocal, &local_path, report) {
                read_local_text(ctx, &relative, &local_path, report)
            } else {
                None
            }
        }
        (None, None) => None,
    }
}

fn dropin(mut node: MapNode<'_>, ctx: &Ctx<'_>, report: &mut TranslationReport) -> Option<Dropin> {
    let name_path = node.key_path("name");
    let name = node.required_string("name", report);
    if let Some(name) = &name {
        if !name.ends_with(".conf") || name.contains('/') {
            report.error(&name_path, format!("invalid drop-in name {}", name));
        }
    }
    let contents = unit_contents(&mut node, ctx, report);
    node.finish(report);
    Some(Dropin {
        contents,
        name: name?,
    })
}

fn unit(mut node: MapNode<'_>, ctx: &Ctx<'_>, report: &mut TranslationReport) -> Option<Unit> {
    let name_path = node.key_path("name");
    let name = node.required_string("name", report);
    if let Some(name) = &name {
        check_unit_name(name, &name_path, report);
    }
    let enabled = node.bool("enabled", report);
    let mask = node.bool("mask", report);
    let contents = unit_contents(&mut node, ctx, report);

    let mut dropins = Vec::new();
    let mut seen = BTreeMap::new();
    for (path, value) in node.seq("dropins", report) {
        let Some(dropin_node) = MapNode::new(value, path.clone(), report) else {
            continue;
        };
        if let Some(dropin) = dropin(dropin_node, ctx, report) {
            if let Some(first) = seen.insert(dropin.name.clone(), path.clone()) {
                report.error(
                    &path,
                    format!("duplicate drop-in {} (first defined at {})", dropin.name, first),
                );
            }
            dropins.push(dropin);
        }
    }
    node.finish(report);

    Some(Unit {
        contents,
        dropins,
        enabled,
        mask,
        name: name?,
    })
}

/// Translate `systemd` and append generated units
pub(super) fn translate_systemd(
    node: Option<MapNode<'_>>,
    generated: Vec<GeneratedUnit>,
    ctx: &Ctx<'_>,
    report: &mut TranslationReport,
) -> Systemd {
    let mut systemd = Systemd::default();
    let mut seen: BTreeMap<String, String> = BTreeMap::new();

    if let Some(mut node) = node {
        for (path, value) in node.seq("units", report) {
            let Some(unit_node) = MapNode::new(value, path.clone(), report) else {
                continue;
            };
            if let Some(unit) = unit(unit_node, ctx, report) {
                if let Some(first) = seen.insert(unit.name.clone(), path.clone()) {
                    report.error(
                        &path,
                        format!("duplicate unit {} (first defined at {})", unit.name, first),
                    );
                }
                systemd.units.push(unit);
            }
        }
        node.finish(report);
    }

    for GeneratedUnit { unit, origin } in generated {
        if let Some(first) = seen.insert(unit.name.clone(), origin.clone()) {
            report.error(
                &origin,
                format!("generated unit {} conflicts with unit defined at {}", unit.name, first),
            );
        }
        systemd.units.push(unit);
    }

    systemd
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translate::version::SpecVersion;
    use std::path::Path;

    fn run(yaml: &str, version: &str, files_dir: Option<&Path>) -> (Systemd, TranslationReport) {
        let value: serde_yaml::Value = serde_yaml::from_str(yaml).unwrap();
        let ctx = Ctx {
            spec: SpecVersion::resolve("fcos", version).unwrap(),
            files_dir,
        };
        let mut report = TranslationReport::new();
        let node = MapNode::new(&value, "$.systemd", &mut report);
        (translate_systemd(node, Vec::new(), &ctx, &mut report), report)
    }

    #[test]
    fn test_escape_path() {
        assert_eq!(systemd_escape_path("/"), "-");
        assert_eq!(systemd_escape_path("/var"), "var");
        assert_eq!(systemd_escape_path("/var/lib/coder"), "var-lib-coder");
        assert_eq!(
            systemd_escape_path("/dev/disk/by-label/var"),
            "dev-disk-by\\x2dlabel-var"
        );
        assert_eq!(systemd_escape_path("/.hidden/x y"), "\\x2ehidden-x\\x20y");
    }

    #[test]
    fn test_mount_unit() {
        let fs = Filesystem {
            device: "/dev/disk/by-label/var".to_string(),
            format: Some("xfs".to_string()),
            path: Some("/var".to_string()),
            mount_options: vec!["noatime".to_string(), "nodev".to_string()],
            ..Default::default()
        };
        let unit = mount_unit(&fs).unwrap();
        assert_eq!(unit.name, "var.mount");
        assert_eq!(unit.enabled, Some(true));
        assert_eq!(
            unit.contents.unwrap(),
            "# Generated by Butane\n\
             [Unit]\n\
             Requires=systemd-fsck@dev-disk-by\\x2dlabel-var.service\n\
             After=systemd-fsck@dev-disk-by\\x2dlabel-var.service\n\
             \n\
             [Mount]\n\
             Where=/var\n\
             What=/dev/disk/by-label/var\n\
             Type=xfs\n\
             Options=noatime,nodev\n\
             \n\
             [Install]\n\
             RequiredBy=local-fs.target\n"
        );
    }

    #[test]
    fn test_swap_unit() {
        let fs = Filesystem {
            device: "/dev/vdb".to_string(),
            format: Some("swap".to_string()),
            mount_options: vec!["pri=10".to_string()],
            ..Default::default()
        };
        let unit = mount_unit(&fs).unwrap();
        assert_eq!(unit.name, "dev-vdb.swap");
        assert_eq!(
            unit.contents.unwrap(),
            "# Generated by Butane\n\
             [Swap]\n\
             What=/dev/vdb\n\
             Options=pri=10\n\
             \n\
             [Install]\n\
             RequiredBy=swap.target\n"
        );
    }

    #[test]
    fn test_mount_unit_requirements() {
        let mut fs = Filesystem {
            device: "/dev/vdb".to_string(),
            ..Default::default()
        };
        assert_eq!(mount_unit(&fs).unwrap_err(), "format is required with with_mount_unit");
        fs.format = Some("ext4".to_string());
        assert_eq!(mount_unit(&fs).unwrap_err(), "path is required with with_mount_unit");
    }

    #[test]
    fn test_units_and_dropins() {
        let (systemd, report) = run(
            "units:\n  - name: coder.service\n    enabled: true\n    contents: |\n      [Service]\n      ExecStart=/usr/bin/coder\n    dropins:\n      - name: env.conf\n        contents: \"[Service]\\nEnvironment=A=1\\n\"\n",
            "1.5.0",
            None,
        );
        assert!(report.is_empty(), "{:?}", report);
        let unit = &systemd.units[0];
        assert_eq!(unit.name, "coder.service");
        assert_eq!(unit.enabled, Some(true));
        assert_eq!(
            unit.contents.as_deref(),
            Some("[Service]\nExecStart=/usr/bin/coder\n")
        );
        assert_eq!(unit.dropins[0].name, "env.conf");
    }

    #[test]
    fn test_contents_local() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("coder.service"), "[Unit]\n").unwrap();

        let (systemd, report) = run(
            "units:\n  - name: coder.service\n    contents_local: coder.service\n",
            "1.5.0",
            Some(dir.path()),
        );
        assert!(report.is_empty(), "{:?}", report);
        assert_eq!(systemd.units[0].contents.as_deref(), Some("[Unit]\n"));

        let (_, report) = run(
            "units:\n  - name: coder.service\n    contents_local: coder.service\n",
            "1.4.0",
            Some(dir.path()),
        );
        assert_eq!(
            report.entries()[0].message,
            "contents_local requires fcos config version 1.5.0 or later"
        );
    }

    #[test]
    fn test_invalid_and_duplicate_units() {
        let (_, report) = run(
            "units:\n  - name: coder\n  - name: a.service\n  - name: a.service\n    dropins:\n      - name: override\n",
            "1.5.0",
            None,
        );
        let rendered: Vec<String> = report.entries().iter().map(|e| e.to_string()).collect();
        assert_eq!(
            rendered,
            vec![
                "error at $.systemd.units.0.name: invalid unit name coder",
                "error at $.systemd.units.2.dropins.0.name: invalid drop-in name override",
                "error at $.systemd.units.2: duplicate unit a.service (first defined at $.systemd.units.1)",
            ]
        );
    }

    #[test]
    fn test_generated_unit_conflict() {
        let value: serde_yaml::Value =
            serde_yaml::from_str("units:\n  - name: var.mount\n    contents: x\n").unwrap();
        let ctx = Ctx {
            spec: SpecVersion::resolve("fcos", "1.5.0").unwrap(),
            files_dir: None,
        };
        let mut report = TranslationReport::new();
        let node = MapNode::new(&value, "$.systemd", &mut report);
        let generated = vec![GeneratedUnit {
            unit: Unit {
                name: "var.mount".to_string(),
                ..Default::default()
            },
            origin: "$.storage.filesystems.0".to_string(),
        }];

        let systemd = translate_systemd(node, generated, &ctx, &mut report);
        assert_eq!(systemd.units.len(), 2);
        assert_eq!(
            report.entries()[0].path.as_deref(),
            Some("$.storage.filesystems.0")
        );
    }
}
