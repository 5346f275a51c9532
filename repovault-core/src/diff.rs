//! Structural comparison of save trees.
//!
//! Used to audit pending edits before a write and to confirm that a freshly
//! written container decodes back to the intended document. Mapping nodes
//! are walked per key; scalars and sequences compare by value. A sequence is
//! never diffed element by element.

use serde_json::{Map, Value};
use std::fmt;

use crate::raw::RawDocument;

/// One side of a difference: either a value, or nothing at all. Absence is
/// distinct from JSON `null`.
#[derive(Debug, Clone, PartialEq)]
pub enum DiffValue {
    Absent,
    Present(Value),
}

impl DiffValue {
    #[must_use]
    pub const fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }
}

impl fmt::Display for DiffValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absent => f.write_str("<absent>"),
            Self::Present(value) => write!(f, "{value}"),
        }
    }
}

/// A single difference at a dotted path, e.g.
/// `dictionaryOfDictionaries.value.playerHealth.76561198000000001`.
#[derive(Debug, Clone, PartialEq)]
pub struct DiffEntry {
    pub path: String,
    pub old: DiffValue,
    pub new: DiffValue,
}

/// Compare two structured values. Returns no entries iff the values are
/// deeply equal; otherwise one entry per differing leaf or per key present
/// on only one side.
#[must_use]
pub fn structural_diff(old: &Value, new: &Value) -> Vec<DiffEntry> {
    let mut entries = Vec::new();
    walk("", old, new, &mut entries);
    entries
}

/// Compare two raw saves top-down.
#[must_use]
pub fn diff_documents(old: &RawDocument, new: &RawDocument) -> Vec<DiffEntry> {
    let mut entries = Vec::new();
    walk_maps("", old.as_map(), new.as_map(), &mut entries);
    entries
}

fn walk(path: &str, old: &Value, new: &Value, entries: &mut Vec<DiffEntry>) {
    match (old, new) {
        (Value::Object(old_map), Value::Object(new_map)) => {
            walk_maps(path, old_map, new_map, entries);
        }
        _ => {
            if old != new {
                entries.push(DiffEntry {
                    path: path.to_string(),
                    old: DiffValue::Present(old.clone()),
                    new: DiffValue::Present(new.clone()),
                });
            }
        }
    }
}

fn walk_maps(
    path: &str,
    old: &Map<String, Value>,
    new: &Map<String, Value>,
    entries: &mut Vec<DiffEntry>,
) {
    for (key, old_value) in old {
        let child = join(path, key);
        match new.get(key) {
            Some(new_value) => walk(&child, old_value, new_value, entries),
            None => entries.push(DiffEntry {
                path: child,
                old: DiffValue::Present(old_value.clone()),
                new: DiffValue::Absent,
            }),
        }
    }
    for (key, new_value) in new {
        if old.contains_key(key) {
            continue;
        }
        entries.push(DiffEntry {
            path: join(path, key),
            old: DiffValue::Absent,
            new: DiffValue::Present(new_value.clone()),
        });
    }
}

fn join(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn equal_values_produce_no_entries() {
        let value = json!({
            "a": {"b": [1, 2, 3], "c": null},
            "d": "text"
        });
        assert!(structural_diff(&value, &value).is_empty());
    }

    #[test]
    fn differing_leaves_get_one_entry_each() {
        let old = json!({"stats": {"level": 1, "lives": 3}, "team": "A"});
        let new = json!({"stats": {"level": 2, "lives": 3}, "team": "B"});
        let mut entries = structural_diff(&old, &new);
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].path, "stats.level");
        assert_eq!(entries[0].old, DiffValue::Present(json!(1)));
        assert_eq!(entries[0].new, DiffValue::Present(json!(2)));
        assert_eq!(entries[1].path, "team");
    }

    #[test]
    fn missing_keys_are_marked_absent_not_null() {
        let old = json!({"kept": 1, "removed": {"x": 1}});
        let new = json!({"kept": 1, "added": null});
        let entries = structural_diff(&old, &new);
        assert_eq!(entries.len(), 2);
        let removed = entries.iter().find(|e| e.path == "removed").unwrap();
        assert!(removed.new.is_absent());
        let added = entries.iter().find(|e| e.path == "added").unwrap();
        assert!(added.old.is_absent());
        assert_eq!(added.new, DiffValue::Present(Value::Null));
    }

    #[test]
    fn sequences_compare_wholesale() {
        let old = json!({"list": [1, 2, 3]});
        let new = json!({"list": [1, 9, 3]});
        let entries = structural_diff(&old, &new);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path, "list");
        assert_eq!(entries[0].old, DiffValue::Present(json!([1, 2, 3])));
    }

    #[test]
    fn type_changes_are_a_single_difference() {
        let old = json!({"slot": {"nested": 1}});
        let new = json!({"slot": 5});
        let entries = structural_diff(&old, &new);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path, "slot");
    }
}
