//! Users and groups

use super::Ctx;
use super::node::MapNode;
use super::output::{Group, Passwd, User};
use super::resource::read_local_text;
use super::version::Feature;
use crate::diagnostics::TranslationReport;
use std::collections::BTreeSet;

pub(super) fn translate_passwd(
    mut node: MapNode<'_>,
    ctx: &Ctx<'_>,
    report: &mut TranslationReport,
) -> Passwd {
    let mut passwd = Passwd::default();

    let mut names = BTreeSet::new();
    for (path, value) in node.seq("users", report) {
        let Some(user_node) = MapNode::new(value, path.clone(), report) else {
            continue;
        };
        if let Some(user) = user(user_node, ctx, report) {
            if !names.insert(user.name.clone()) {
                report.error(&path, format!("duplicate user {}", user.name));
            }
            passwd.users.push(user);
        }
    }

    let mut names = BTreeSet::new();
    for (path, value) in node.seq("groups", report) {
        let Some(mut group) = MapNode::new(value, path.clone(), report) else {
            continue;
        };
        let name = group.required_string("name", report);
        let gid = group.int("gid", report);
        let password_hash = group.string("password_hash", report);
        let system = group.bool("system", report);
        group.finish(report);

        if let Some(name) = name {
            if !names.insert(name.clone()) {
                report.error(&path, format!("duplicate group {}", name));
            }
            passwd.groups.push(Group {
                gid,
                name,
                password_hash,
                system,
            });
        }
    }

    node.finish(report);
    passwd
}

fn user(mut node: MapNode<'_>, ctx: &Ctx<'_>, report: &mut TranslationReport) -> Option<User> {
    let name = node.required_string("name", report);
    let mut ssh_authorized_keys = node.string_list("ssh_authorized_keys", report);

    let local_path = node.key_path("ssh_authorized_keys_local");
    let local_keys = node.string_list("ssh_authorized_keys_local", report);
    if !local_keys.is_empty() && ctx.spec.require(Feature::SshKeysLocal, &local_path, report) {
        for relative in &local_keys {
            if let Some(text) = read_local_text(ctx, relative, &local_path, report) {
                ssh_authorized_keys.extend(
                    text.lines()
                        .map(str::trim)
                        .filter(|line| !line.is_empty() && !line.starts_with('#'))
                        .map(str::to_string),
                );
            }
        }
    }

    let user = User {
        gecos: node.string("gecos", report),
        groups: node.string_list("groups", report),
        home_dir: node.string("home_dir", report),
        name: String::new(),
        no_create_home: node.bool("no_create_home", report),
        password_hash: node.string("password_hash", report),
        primary_group: node.string("primary_group", report),
        shell: node.string("shell", report),
        ssh_authorized_keys,
        system: node.bool("system", report),
        uid: node.int("uid", report),
    };
    node.finish(report);

    Some(User { name: name?, ..user })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translate::version::SpecVersion;
    use std::path::Path;

    fn run(yaml: &str, version: &str, files_dir: Option<&Path>) -> (Passwd, TranslationReport) {
        let value: serde_yaml::Value = serde_yaml::from_str(yaml).unwrap();
        let ctx = Ctx {
            spec: SpecVersion::resolve("fcos", version).unwrap(),
            files_dir,
        };
        let mut report = TranslationReport::new();
        let node = MapNode::new(&value, "$.passwd", &mut report).unwrap();
        (translate_passwd(node, &ctx, &mut report), report)
    }

    #[test]
    fn test_users_and_groups() {
        let (passwd, report) = run(
            "users:\n  - name: core\n    ssh_authorized_keys: [ssh-ed25519 AAAA]\n    groups: [wheel]\ngroups:\n  - name: coder\n    gid: 1001\n",
            "1.5.0",
            None,
        );
        assert!(report.is_empty(), "{:?}", report);
        assert_eq!(passwd.users[0].name, "core");
        assert_eq!(passwd.users[0].ssh_authorized_keys, vec!["ssh-ed25519 AAAA"]);
        assert_eq!(passwd.users[0].groups, vec!["wheel"]);
        assert_eq!(passwd.groups[0].gid, Some(1001));
    }

    #[test]
    fn test_local_ssh_keys() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("keys"),
            "# admins\nssh-ed25519 AAAA one\n\nssh-rsa BBBB two\n",
        )
        .unwrap();

        let (passwd, report) = run(
            "users:\n  - name: core\n    ssh_authorized_keys: [ssh-ed25519 CCCC inline]\n    ssh_authorized_keys_local: [keys]\n",
            "1.5.0",
            Some(dir.path()),
        );
        assert!(report.is_empty(), "{:?}", report);
        assert_eq!(
            passwd.users[0].ssh_authorized_keys,
            vec!["ssh-ed25519 CCCC inline", "ssh-ed25519 AAAA one", "ssh-rsa BBBB two"]
        );
    }

    #[test]
    fn test_local_ssh_keys_gated() {
        let (_, report) = run(
            "users:\n  - name: core\n    ssh_authorized_keys_local: [keys]\n",
            "1.3.0",
            None,
        );
        assert_eq!(
            report.entries()[0].path.as_deref(),
            Some("$.passwd.users.0.ssh_authorized_keys_local")
        );
    }

    #[test]
    fn test_duplicate_and_nameless_users() {
        let (passwd, report) = run(
            "users:\n  - name: core\n  - name: core\n  - shell: /bin/sh\n",
            "1.5.0",
            None,
        );
        assert_eq!(passwd.users.len(), 2);
        let rendered: Vec<String> = report.entries().iter().map(|e| e.to_string()).collect();
        assert_eq!(
            rendered,
            vec![
                "error at $.passwd.users.1: duplicate user core",
                "error at $.passwd.users.2.name: missing required field name",
            ]
        );
    }
}
