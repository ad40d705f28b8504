//! Deep merge of raw trees.
//!
//! Used to build the "defaults visible but overridable" view: the defaults
//! tree is the base and the primary tree is the overlay. Merging happens in
//! place so keys keep the position they have in the base.

use serde_json::{Map, Value};

/// Deep merge two values, with `overlay` taking precedence over `base`.
///
/// - Objects are merged recursively: keys in overlay override keys in base
/// - Arrays, strings, numbers, booleans are replaced entirely
/// - If overlay is null, the base value is preserved (null means "not specified")
/// - Keys already present in base keep their position; new keys are appended
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            merge_maps(&mut base_map, overlay_map);
            Value::Object(base_map)
        }
        (base, Value::Null) => base,
        (_, overlay) => overlay,
    }
}

/// Merge `overlay` into `base` key by key.
pub fn merge_maps(base: &mut Map<String, Value>, overlay: Map<String, Value>) {
    for (key, overlay_value) in overlay {
        match base.get_mut(&key) {
            Some(base_value) => {
                let merged = deep_merge(std::mem::take(base_value), overlay_value);
                *base_value = merged;
            }
            None => {
                if !overlay_value.is_null() {
                    base.insert(key, overlay_value);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_primary_overrides_defaults() {
        let defaults = json!({"server": {"host": "0.0.0.0", "port": 80}, "debug": false});
        let primary = json!({"server": {"port": 8080}});
        assert_eq!(
            deep_merge(defaults, primary),
            json!({"server": {"host": "0.0.0.0", "port": 8080}, "debug": false})
        );
    }

    #[test]
    fn test_sequences_and_scalars_replace() {
        let merged = deep_merge(
            json!({"hosts": ["a", "b"], "mode": {"fast": true}}),
            json!({"hosts": ["c"], "mode": "slow"}),
        );
        assert_eq!(merged, json!({"hosts": ["c"], "mode": "slow"}));
        assert_eq!(
            deep_merge(json!({"limit": 1}), json!({"limit": {"max": 2}})),
            json!({"limit": {"max": 2}})
        );
    }

    #[test]
    fn test_null_overlay_keeps_base() {
        let merged = deep_merge(
            json!({"a": 1, "b": {"c": 2}}),
            json!({"a": null, "b": {"c": null}, "d": null}),
        );
        assert_eq!(merged, json!({"a": 1, "b": {"c": 2}}));
    }

    #[test]
    fn test_defaults_order_comes_first() {
        let mut base = json!({"first": 1, "second": 2, "third": 3})
            .as_object()
            .cloned()
            .unwrap();
        let overlay = json!({"extra": 4, "second": {"x": 1}})
            .as_object()
            .cloned()
            .unwrap();
        merge_maps(&mut base, overlay);
        let keys: Vec<&String> = base.keys().collect();
        assert_eq!(keys, ["first", "second", "third", "extra"]);
        assert_eq!(base["second"], json!({"x": 1}));
    }
}
