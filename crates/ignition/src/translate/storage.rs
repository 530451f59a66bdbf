//! Disks, filesystems, files, directories, links and local trees

use super::Ctx;
use super::node::MapNode;
use super::output::{Directory, Disk, File, Filesystem, Link, NodeUser, Partition, Resource, Storage};
use super::resource::{data_url, resolve_local, resource_field, resource_list};
use super::systemd::{GeneratedUnit, mount_unit};
use super::version::Feature;
use crate::diagnostics::TranslationReport;
use std::collections::BTreeMap;
use std::fs::Metadata;
use std::path::{Path, PathBuf};

/// Tracks which document entry first claimed each filesystem path
#[derive(Default)]
struct PathClaims {
    seen: BTreeMap<String, String>,
}

impl PathClaims {
    fn claim(&mut self, path: &str, at: &str, report: &mut TranslationReport) -> bool {
        if let Some(first) = self.seen.get(path) {
            report.error(at, format!("duplicate entry for path {} (first defined at {})", path, first));
            return false;
        }
        self.seen.insert(path.to_string(), at.to_string());
        true
    }
}

fn check_absolute(path: &str, at: &str, report: &mut TranslationReport) {
    if !path.starts_with('/') {
        report.error(at, format!("path {} must be absolute", path));
    }
}

fn node_user(parent: &mut MapNode<'_>, key: &str, report: &mut TranslationReport) -> Option<NodeUser> {
    let mut node = parent.map(key, report)?;
    let id = node.int("id", report);
    let name = node.string("name", report);
    if id.is_some() && name.is_some() {
        report.error(node.path(), "only one of id or name may be specified");
    }
    node.finish(report);
    Some(NodeUser { id, name })
}

/// Read `path`, validate it and claim it
fn entry_path(
    node: &mut MapNode<'_>,
    claims: &mut PathClaims,
    report: &mut TranslationReport,
) -> Option<String> {
    let at = node.key_path("path");
    let path = node.required_string("path", report)?;
    check_absolute(&path, &at, report);
    claims.claim(&path, node.path(), report);
    Some(path)
}

fn file(
    mut node: MapNode<'_>,
    ctx: &Ctx<'_>,
    claims: &mut PathClaims,
    report: &mut TranslationReport,
) -> Option<File> {
    let path = entry_path(&mut node, claims, report);
    let mode_path = node.key_path("mode");
    let file = File {
        overwrite: node.bool("overwrite", report),
        mode: node.mode("mode", report),
        user: node_user(&mut node, "user", report),
        group: node_user(&mut node, "group", report),
        contents: resource_field(&mut node, "contents", ctx, report),
        append: resource_list(&mut node, "append", ctx, report),
        path: String::new(),
    };
    if file.mode.is_none() && (file.contents.is_some() || !file.append.is_empty()) {
        report.warning(&mode_path, "permissions unset, defaulting to 0644");
    }
    node.finish(report);
    Some(File { path: path?, ..file })
}

fn directory(
    mut node: MapNode<'_>,
    claims: &mut PathClaims,
    report: &mut TranslationReport,
) -> Option<Directory> {
    let path = entry_path(&mut node, claims, report);
    let mode_path = node.key_path("mode");
    let overwrite = node.bool("overwrite", report);
    let mode = node.mode("mode", report);
    let user = node_user(&mut node, "user", report);
    let group = node_user(&mut node, "group", report);
    if mode.is_none() {
        report.warning(&mode_path, "permissions unset, defaulting to 0755");
    }
    node.finish(report);
    Some(Directory {
        group,
        mode,
        overwrite,
        path: path?,
        user,
    })
}

fn link(mut node: MapNode<'_>, claims: &mut PathClaims, report: &mut TranslationReport) -> Option<Link> {
    let path = entry_path(&mut node, claims, report);
    let target = node.required_string("target", report);
    let hard = node.bool("hard", report);
    let overwrite = node.bool("overwrite", report);
    let user = node_user(&mut node, "user", report);
    let group = node_user(&mut node, "group", report);
    node.finish(report);
    Some(Link {
        group,
        hard,
        overwrite,
        path: path?,
        target: target?,
        user,
    })
}

enum TreeEntry {
    File { contents: Vec<u8>, executable: bool },
    Symlink { target: String },
}

#[cfg(unix)]
fn is_executable(metadata: &Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_metadata: &Metadata) -> bool {
    false
}

/// Collect every file and symlink under `dir`, depth first in name order
fn walk_tree(dir: &Path, relative: &Path, out: &mut Vec<(PathBuf, TreeEntry)>) -> std::io::Result<()> {
    let mut children = std::fs::read_dir(dir)?.collect::<Result<Vec<_>, _>>()?;
    children.sort_by_key(|child| child.file_name());
    for child in children {
        let file_type = child.file_type()?;
        let child_relative = relative.join(child.file_name());
        if file_type.is_dir() {
            walk_tree(&child.path(), &child_relative, out)?;
        } else if file_type.is_symlink() {
            let target = std::fs::read_link(child.path())?;
            let target = target.to_string_lossy().into_owned();
            out.push((child_relative, TreeEntry::Symlink { target }));
        } else if file_type.is_file() {
            let contents = std::fs::read(child.path())?;
            let executable = is_executable(&child.metadata()?);
            out.push((child_relative, TreeEntry::File { contents, executable }));
        }
    }
    Ok(())
}

fn destination(prefix: &str, relative: &Path) -> String {
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    format!("{}/{}", prefix.trim_end_matches('/'), parts.join("/"))
}

fn tree(
    mut node: MapNode<'_>,
    ctx: &Ctx<'_>,
    claims: &mut PathClaims,
    storage: &mut Storage,
    report: &mut TranslationReport,
) {
    let at = node.path().to_string();
    let local_path = node.key_path("local");
    let target_path = node.key_path("path");
    let local = node.required_string("local", report);
    let prefix = node.string("path", report);
    node.finish(report);

    if let Some(prefix) = &prefix {
        check_absolute(prefix, &target_path, report);
    }
    let Some(local) = local else { return };
    if !ctx.spec.require(Feature::Trees, &at, report) {
        return;
    }
    let Some(files_dir) = ctx.files_dir else {
        report.error(&local_path, "local paths require a files directory");
        return;
    };
    let root = match resolve_local(files_dir, &local) {
        Ok(root) => root,
        Err(message) => {
            report.error(&local_path, message);
            return;
        }
    };
    if !root.is_dir() {
        report.error(&local_path, format!("local tree {} is not a directory", local));
        return;
    }

    let mut entries = Vec::new();
    if let Err(e) = walk_tree(&root, Path::new(""), &mut entries) {
        report.error(&local_path, format!("failed to read local tree {}: {}", local, e));
        return;
    }

    let prefix = prefix.unwrap_or_else(|| "/".to_string());
    for (relative, entry) in entries {
        let path = destination(&prefix, &relative);
        if !claims.claim(&path, &at, report) {
            continue;
        }
        match entry {
            TreeEntry::File { contents, executable } => storage.files.push(File {
                contents: Some(Resource {
                    source: Some(data_url(&contents)),
                    ..Default::default()
                }),
                mode: Some(if executable { 0o755 } else { 0o644 }),
                path,
                ..Default::default()
            }),
            TreeEntry::Symlink { target } => storage.links.push(Link {
                path,
                target,
                ..Default::default()
            }),
        }
    }
}

fn partition(mut node: MapNode<'_>, ctx: &Ctx<'_>, report: &mut TranslationReport) -> Partition {
    let resize_path = node.key_path("resize");
    let resize = node
        .bool("resize", report)
        .filter(|_| ctx.spec.require(Feature::PartitionResize, &resize_path, report));
    let partition = Partition {
        label: node.string("label", report),
        number: node.int("number", report),
        resize,
        should_exist: node.bool("should_exist", report),
        size_mib: node.int("size_mib", report),
        start_mib: node.int("start_mib", report),
        type_guid: node.string("type_guid", report),
        wipe_partition_entry: node.bool("wipe_partition_entry", report),
    };
    node.finish(report);
    partition
}

fn disk(mut node: MapNode<'_>, ctx: &Ctx<'_>, report: &mut TranslationReport) -> Option<Disk> {
    let device = node.required_string("device", report);
    let wipe_table = node.bool("wipe_table", report);
    let partitions = node
        .seq("partitions", report)
        .into_iter()
        .filter_map(|(path, value)| MapNode::new(value, path, report).map(|p| partition(p, ctx, report)))
        .collect();
    node.finish(report);
    Some(Disk {
        device: device?,
        partitions,
        wipe_table,
    })
}

fn filesystem(
    mut node: MapNode<'_>,
    ctx: &Ctx<'_>,
    generated: &mut Vec<GeneratedUnit>,
    report: &mut TranslationReport,
) -> Option<Filesystem> {
    let at = node.path().to_string();
    let path_at = node.key_path("path");
    let mount_unit_at = node.key_path("with_mount_unit");

    let device = node.required_string("device", report);
    let filesystem = Filesystem {
        device: String::new(),
        format: node.string("format", report),
        label: node.string("label", report),
        mount_options: node.string_list("mount_options", report),
        options: node.string_list("options", report),
        path: node.string("path", report),
        uuid: node.string("uuid", report),
        wipe_filesystem: node.bool("wipe_filesystem", report),
    };
    let with_mount_unit = node.bool("with_mount_unit", report).unwrap_or(false);
    node.finish(report);

    if let Some(path) = &filesystem.path {
        check_absolute(path, &path_at, report);
    }
    let filesystem = Filesystem {
        device: device?,
        ..filesystem
    };

    if with_mount_unit && ctx.spec.require(Feature::MountUnits, &mount_unit_at, report) {
        match mount_unit(&filesystem) {
            Ok(unit) => generated.push(GeneratedUnit { unit, origin: at }),
            Err(message) => report.error(&mount_unit_at, message),
        }
    }
    Some(filesystem)
}

/// Translate `storage`, returning the units its filesystems asked for
pub(super) fn translate_storage(
    mut node: MapNode<'_>,
    ctx: &Ctx<'_>,
    report: &mut TranslationReport,
) -> (Storage, Vec<GeneratedUnit>) {
    let mut storage = Storage::default();
    let mut generated = Vec::new();
    let mut claims = PathClaims::default();

    for (path, value) in node.seq("disks", report) {
        if let Some(disk) = MapNode::new(value, path, report).and_then(|n| disk(n, ctx, report)) {
            storage.disks.push(disk);
        }
    }
    for (path, value) in node.seq("filesystems", report) {
        if let Some(fs) =
            MapNode::new(value, path, report).and_then(|n| filesystem(n, ctx, &mut generated, report))
        {
            storage.filesystems.push(fs);
        }
    }
    for (path, value) in node.seq("files", report) {
        if let Some(file) =
            MapNode::new(value, path, report).and_then(|n| file(n, ctx, &mut claims, report))
        {
            storage.files.push(file);
        }
    }
    for (path, value) in node.seq("directories", report) {
        if let Some(dir) =
            MapNode::new(value, path, report).and_then(|n| directory(n, &mut claims, report))
        {
            storage.directories.push(dir);
        }
    }
    for (path, value) in node.seq("links", report) {
        if let Some(link) = MapNode::new(value, path, report).and_then(|n| link(n, &mut claims, report)) {
            storage.links.push(link);
        }
    }
    for (path, value) in node.seq("trees", report) {
        if let Some(tree_node) = MapNode::new(value, path, report) {
            tree(tree_node, ctx, &mut claims, &mut storage, report);
        }
    }
    node.finish(report);

    (storage, generated)
}
