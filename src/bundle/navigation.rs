//! Dotted-path navigation over JSON resource trees.
//!
//! Repeating fields are flattened while walking, so `name.given` on a
//! resource with two names yields the given names of both. A segment ending
//! in `[x]` matches any typed choice key (`effective[x]` matches
//! `effectiveDateTime`, `effectivePeriod`, ...).

use serde_json::Value;

/// Collect every value reached by `path`, starting at `root`.
///
/// An empty path yields `root` itself.
pub fn collect_values<'a>(root: &'a Value, path: &str) -> Vec<&'a Value> {
    let mut current = vec![root];

    for segment in path.split('.').filter(|s| !s.is_empty()) {
        let mut next = Vec::new();
        for value in current {
            for child in child_values(value, segment) {
                match child {
                    Value::Array(items) => next.extend(items.iter()),
                    other => next.push(other),
                }
            }
        }
        if next.is_empty() {
            return next;
        }
        current = next;
    }

    current
}

/// True when `path` reaches at least one present value.
pub fn has_value_at(root: &Value, path: &str) -> bool {
    collect_values(root, path).into_iter().any(is_present)
}

/// Presence test shared by spec hints and instance conditions.
///
/// Nulls, empty strings, empty arrays and empty objects count as absent.
pub fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => items.iter().any(is_present),
        Value::Object(map) => !map.is_empty(),
        _ => true,
    }
}

/// Returns true if `key` is a typed variant of the choice element `base`
/// (`valueQuantity` for base `value`).
pub fn is_choice_variant(base: &str, key: &str) -> bool {
    key.strip_prefix(base)
        .and_then(|suffix| suffix.chars().next())
        .is_some_and(|c| c.is_ascii_uppercase())
}

fn child_values<'a>(value: &'a Value, segment: &str) -> Vec<&'a Value> {
    let Value::Object(map) = value else {
        return Vec::new();
    };

    match segment.strip_suffix("[x]") {
        Some(base) => map
            .iter()
            .filter(|(key, _)| is_choice_variant(base, key))
            .map(|(_, child)| child)
            .collect(),
        None => map.get(segment).into_iter().collect(),
    }
}
