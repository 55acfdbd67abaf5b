//! Reading and writing values at a path inside a JSON tree.

use super::path::StatePath;
use serde_json::{Map, Value};

/// Read the value at `path`.
///
/// Returns `None` when any segment along the way is missing. Arrays can be
/// indexed by numeric segments; any other scalar ends the walk.
pub fn get<'a>(root: &'a Value, path: &StatePath) -> Option<&'a Value> {
    let mut node = root;
    for segment in path.segments() {
        node = match node {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(node)
}

/// Write `value` at `path`, creating intermediate objects as needed.
///
/// An intermediate segment that holds anything other than an object is
/// replaced by an empty object. Returns the previous leaf value, if any.
pub fn set(root: &mut Value, path: &StatePath, value: Value) -> Option<Value> {
    let mut node = root;
    let leaf = path.leaf();
    let depth = path.depth();

    for segment in path.segments().take(depth - 1) {
        let map = ensure_object(node);
        node = map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }

    ensure_object(node).insert(leaf.to_string(), value)
}

fn ensure_object(node: &mut Value) -> &mut Map<String, Value> {
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    match node {
        Value::Object(map) => map,
        _ => unreachable!("node was just replaced with an object"),
    }
}
