//! Attribute-level comparison of two instances.
//!
//! Comparison never fails: an unresolvable path is treated as absent, so one malformed attribute
//! cannot abort the comparison of a whole resource. Empty lists and maps are absent too.

use std::collections::BTreeSet;

use serde_json::{Map, Value};

use crate::drift::{AttributeDrift, DriftMap};
use crate::instance::Instance;

/// Depth bound used by [`compare_deep`] callers that have no stronger opinion.
pub const DEFAULT_MAX_DEPTH: usize = 10;

/// Compares `source` and `target` at each of `paths`.
///
/// Paths are evaluated independently. A path absent on both sides produces no entry.
pub fn compare(source: &Instance, target: &Instance, paths: &[String]) -> DriftMap {
    let mut drifts = DriftMap::new();

    for path in paths {
        let source_value = present(source.attribute(path));
        let target_value = present(target.attribute(path));

        if let Some(drift) = compare_values(path, source_value, target_value) {
            drifts.insert(path.clone(), drift);
        }
    }

    drifts
}

fn compare_values(path: &str, source: Option<&Value>, target: Option<&Value>) -> Option<AttributeDrift> {
    match (source, target) {
        (None, None) => None,
        (Some(s), Some(t)) if values_equal(s, t) => None,
        (s, t) => Some(AttributeDrift::new(path, s.cloned(), t.cloned())),
    }
}

/// Value equality used for drift decisions.
///
/// Lists compare as sets (order and duplicates ignored), maps compare key by key with `null` or
/// empty entries treated as missing, and scalars compare exactly with no type coercion.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Array(x), Value::Array(y)) => as_set(x) == as_set(y),
        (Value::Object(x), Value::Object(y)) => maps_equal(x, y),
        _ => a == b,
    }
}

fn as_set(items: &[Value]) -> BTreeSet<String> {
    // serde_json maps are key-ordered, so the rendered form is canonical
    items.iter().map(Value::to_string).collect()
}

fn maps_equal(x: &Map<String, Value>, y: &Map<String, Value>) -> bool {
    x.keys().chain(y.keys()).all(|key| {
        match (present(x.get(key)), present(y.get(key))) {
            (None, None) => true,
            (Some(a), Some(b)) => values_equal(a, b),
            _ => false,
        }
    })
}

/// `null`, `{}` and `[]` all count as absent.
fn present(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| match v {
        Value::Null => false,
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        _ => true,
    })
}

/// Structural diff of two attribute maps without a predefined path list.
///
/// Recurses into keys that hold maps on both sides and reports the first non-map divergence at its
/// full dot path. Descent silently stops at `max_depth`.
pub fn compare_deep(
    source: &Map<String, Value>,
    target: &Map<String, Value>,
    max_depth: usize,
) -> DriftMap {
    let mut drifts = DriftMap::new();
    diff_maps(source, target, "", 0, max_depth, &mut drifts);
    drifts
}

fn diff_maps(
    source: &Map<String, Value>,
    target: &Map<String, Value>,
    prefix: &str,
    depth: usize,
    max_depth: usize,
    drifts: &mut DriftMap,
) {
    if depth >= max_depth {
        return;
    }

    let keys: BTreeSet<&String> = source.keys().chain(target.keys()).collect();

    for key in keys {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };

        match (present(source.get(key)), present(target.get(key))) {
            (Some(Value::Object(s)), Some(Value::Object(t))) => {
                diff_maps(s, t, &path, depth + 1, max_depth, drifts);
            }
            (s, t) => {
                if let Some(drift) = compare_values(&path, s, t) {
                    drifts.insert(path, drift);
                }
            }
        }
    }
}

/// Deep comparison of two instances' full attribute sets.
pub fn compare_instances_deep(source: &Instance, target: &Instance, max_depth: usize) -> DriftMap {
    compare_deep(source.attributes(), target.attributes(), max_depth)
}
