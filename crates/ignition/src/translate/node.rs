//! Diagnostic-recording accessors over parsed YAML.
//!
//! Typed field access never fails outright: a missing or mistyped field is
//! recorded in the report at its document path and reads as `None`, so the
//! translator can keep walking and find every other problem too.

use crate::diagnostics::TranslationReport;
use serde_yaml::{Mapping, Value};
use std::collections::BTreeSet;

/// Document path of a mapping key
pub(crate) fn child_path(path: &str, key: &str) -> String {
    format!("{}.{}", path, key)
}

/// Document path of a sequence element
pub(crate) fn index_path(path: &str, index: usize) -> String {
    format!("{}.{}", path, index)
}

pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "list",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged value",
    }
}

/// A mapping in the source document, tracking which keys were read
pub(crate) struct MapNode<'v> {
    path: String,
    map: &'v Mapping,
    used: BTreeSet<String>,
}

impl<'v> MapNode<'v> {
    /// Wrap a value that must be a mapping.
    ///
    /// `null` reads as absent; any other non-mapping is an error.
    pub(crate) fn new(
        value: &'v Value,
        path: impl Into<String>,
        report: &mut TranslationReport,
    ) -> Option<Self> {
        let path = path.into();
        match value {
            Value::Mapping(map) => Some(Self {
                path,
                map,
                used: BTreeSet::new(),
            }),
            Value::Null => None,
            other => {
                report.error(&path, format!("expected a mapping, found {}", type_name(other)));
                None
            }
        }
    }

    pub(crate) fn path(&self) -> &str {
        &self.path
    }

    pub(crate) fn key_path(&self, key: &str) -> String {
        child_path(&self.path, key)
    }

    /// Whether a key is present with a non-null value (does not mark it read)
    pub(crate) fn has(&self, key: &str) -> bool {
        !matches!(self.map.get(key), None | Some(Value::Null))
    }

    fn take(&mut self, key: &str) -> Option<&'v Value> {
        self.used.insert(key.to_string());
        match self.map.get(key) {
            None | Some(Value::Null) => None,
            Some(value) => Some(value),
        }
    }

    fn mistyped(&self, key: &str, expected: &str, found: &Value, report: &mut TranslationReport) {
        report.error(
            &self.key_path(key),
            format!("expected {}, found {}", expected, type_name(found)),
        );
    }

    pub(crate) fn string(&mut self, key: &str, report: &mut TranslationReport) -> Option<String> {
        match self.take(key)? {
            Value::String(s) => Some(s.clone()),
            other => {
                self.mistyped(key, "a string", other, report);
                None
            }
        }
    }

    pub(crate) fn required_string(
        &mut self,
        key: &str,
        report: &mut TranslationReport,
    ) -> Option<String> {
        if !self.has(key) {
            self.used.insert(key.to_string());
            report.error(&self.key_path(key), format!("missing required field {}", key));
            return None;
        }
        self.string(key, report)
    }

    pub(crate) fn bool(&mut self, key: &str, report: &mut TranslationReport) -> Option<bool> {
        match self.take(key)? {
            Value::Bool(b) => Some(*b),
            other => {
                self.mistyped(key, "a boolean", other, report);
                None
            }
        }
    }

    pub(crate) fn int(&mut self, key: &str, report: &mut TranslationReport) -> Option<i64> {
        match self.take(key)? {
            Value::Number(n) if n.as_i64().is_some() => n.as_i64(),
            other => {
                self.mistyped(key, "an integer", other, report);
                None
            }
        }
    }

    /// File mode: a YAML integer, or a leading-zero octal string such as `0644`.
    ///
    /// serde_yaml follows YAML 1.2 and hands a plain `0644` back as a string,
    /// with no record of whether it was quoted. Both `0644` and `"0644"`
    /// therefore read as octal; other strings are a type error.
    pub(crate) fn mode(&mut self, key: &str, report: &mut TranslationReport) -> Option<u32> {
        let parsed = match self.take(key)? {
            Value::Number(n) => n.as_u64().and_then(|m| u32::try_from(m).ok()),
            Value::String(s) if s.starts_with('0') && s.len() > 1 => {
                u32::from_str_radix(&s[1..], 8).ok()
            }
            other => {
                self.mistyped(key, "a file mode", other, report);
                return None;
            }
        };
        match parsed {
            Some(mode) if mode <= 0o7777 => Some(mode),
            _ => {
                report.error(&self.key_path(key), "invalid file mode");
                None
            }
        }
    }

    /// Sequence elements paired with their document paths
    pub(crate) fn seq(&mut self, key: &str, report: &mut TranslationReport) -> Vec<(String, &'v Value)> {
        let path = self.key_path(key);
        match self.take(key) {
            None => Vec::new(),
            Some(Value::Sequence(items)) => items
                .iter()
                .enumerate()
                .map(|(i, item)| (index_path(&path, i), item))
                .collect(),
            Some(other) => {
                self.mistyped(key, "a list", other, report);
                Vec::new()
            }
        }
    }

    pub(crate) fn string_list(&mut self, key: &str, report: &mut TranslationReport) -> Vec<String> {
        self.seq(key, report)
            .into_iter()
            .filter_map(|(path, item)| match item {
                Value::String(s) => Some(s.clone()),
                other => {
                    report.error(&path, format!("expected a string, found {}", type_name(other)));
                    None
                }
            })
            .collect()
    }

    pub(crate) fn map(&mut self, key: &str, report: &mut TranslationReport) -> Option<MapNode<'v>> {
        let path = self.key_path(key);
        let value = self.take(key)?;
        MapNode::new(value, path, report)
    }

    /// Warn about every key that was never read
    pub(crate) fn finish(self, report: &mut TranslationReport) {
        for key in self.map.keys() {
            match key {
                Value::String(k) if self.used.contains(k) => {}
                Value::String(k) => report.warning(&self.key_path(k), format!("Unused key {}", k)),
                other => report.warning(&self.path, format!("Unused key {:?}", other)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::DiagnosticKind;

    fn parse(yaml: &str) -> Value {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_typed_access_records_errors() {
        let value = parse("name: 5\nenabled: yes-please\ncount: 3\n");
        let mut report = TranslationReport::new();
        let mut node = MapNode::new(&value, "$", &mut report).unwrap();

        assert_eq!(node.string("name", &mut report), None);
        assert_eq!(node.bool("enabled", &mut report), None);
        assert_eq!(node.int("count", &mut report), Some(3));
        node.finish(&mut report);

        let entries = report.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].path.as_deref(), Some("$.name"));
        assert_eq!(entries[0].message, "expected a string, found number");
        assert_eq!(entries[1].path.as_deref(), Some("$.enabled"));
    }

    #[test]
    fn test_unused_keys_warn() {
        let value = parse("used: a\nextra: b\n");
        let mut report = TranslationReport::new();
        let mut node = MapNode::new(&value, "$.storage", &mut report).unwrap();
        node.string("used", &mut report);
        node.finish(&mut report);

        assert_eq!(report.entries().len(), 1);
        let entry = &report.entries()[0];
        assert_eq!(entry.kind, DiagnosticKind::Warning);
        assert_eq!(entry.path.as_deref(), Some("$.storage.extra"));
        assert_eq!(entry.message, "Unused key extra");
    }

    #[test]
    fn test_required_string_missing() {
        let value = parse("other: x\n");
        let mut report = TranslationReport::new();
        let mut node = MapNode::new(&value, "$.passwd.users.0", &mut report).unwrap();
        assert_eq!(node.required_string("name", &mut report), None);
        assert_eq!(
            report.entries()[0].to_string(),
            "error at $.passwd.users.0.name: missing required field name"
        );
    }

    #[test]
    fn test_mode_forms() {
        let value = parse("a: 0644\nb: 420\nc: 0o755\nd: 99999\ne: \"0899\"\n");
        let mut report = TranslationReport::new();
        let mut node = MapNode::new(&value, "$", &mut report).unwrap();

        assert_eq!(node.mode("a", &mut report), Some(0o644));
        assert_eq!(node.mode("b", &mut report), Some(0o644));
        assert_eq!(node.mode("c", &mut report), Some(0o755));
        assert_eq!(node.mode("d", &mut report), None);
        assert_eq!(node.mode("e", &mut report), None);
        assert_eq!(report.entries().len(), 2);
    }

    #[test]
    fn test_mode_quoted_octal_matches_plain() {
        let value = parse("plain: 0600
quoted: \"0600\"\nword: rw\n");
        let mut report = TranslationReport::new();
        let mut node = MapNode::new(&value, "$", &mut report).unwrap();

        assert_eq!(node.mode("plain", &mut report), Some(0o600));
        assert_eq!(node.mode("quoted", &mut report), Some(0o600));
        assert!(report.is_empty(), "{:?}", report);

        assert_eq!(node.mode("word", &mut report), None);
        assert_eq!(report.entries()[0].path.as_deref(), Some("$.word"));
    }

    #[test]
    fn test_seq_paths() {
        let value = parse("keys: [a, 1, c]\n");
        let mut report = TranslationReport::new();
        let mut node = MapNode::new(&value, "$", &mut report).unwrap();

        assert_eq!(node.string_list("keys", &mut report), vec!["a", "c"]);
        assert_eq!(report.entries()[0].path.as_deref(), Some("$.keys.1"));
    }

    #[test]
    fn test_null_is_absent() {
        let value = parse("storage:\nname: ~\n");
        let mut report = TranslationReport::new();
        let mut node = MapNode::new(&value, "$", &mut report).unwrap();

        assert!(node.map("storage", &mut report).is_none());
        assert_eq!(node.string("name", &mut report), None);
        assert!(report.is_empty());
    }

    #[test]
    fn test_non_mapping_rejected() {
        let value = parse("- a\n- b\n");
        let mut report = TranslationReport::new();
        assert!(MapNode::new(&value, "$", &mut report).is_none());
        assert_eq!(report.entries()[0].message, "expected a mapping, found list");
    }
}
