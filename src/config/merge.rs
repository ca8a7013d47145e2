use serde_json::Value;

/// Recursive dictionary merge (spec §4.4): on conflict at any non-object
/// node, `override_` replaces `base`. Arrays are never merged element-wise
/// — they are replaced wholesale.
pub fn deep_merge(base: Value, override_: Value) -> Value {
    match (base, override_) {
        (Value::Object(mut base_map), Value::Object(override_map)) => {
            for (key, override_value) in override_map {
                let merged = match base_map.remove(&key) {
                    Some(base_value) => deep_merge(base_value, override_value),
                    None => override_value,
                };
                base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }
        (_, Value::Null) => Value::Null,
        (_, override_) => override_,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn nested_objects_merge_recursively() {
        let base = json!({"a": {"x": 1, "y": 2}, "b": "base"});
        let over = json!({"a": {"y": 99}});
        let merged = deep_merge(base, over);
        assert_eq!(merged, json!({"a": {"x": 1, "y": 99}, "b": "base"}));
    }

    #[test]
    fn arrays_are_replaced_wholesale_not_merged() {
        let base = json!({"list": [1, 2, 3]});
        let over = json!({"list": [9]});
        assert_eq!(deep_merge(base, over), json!({"list": [9]}));
    }

    #[test]
    fn three_layer_merge_is_associative() {
        let catalog = json!({"verification": {"method": "digest"}, "icon": {"method": "extraction"}});
        let state = json!({"verification": {"passed": true}});
        let overrides = json!({"icon": {"method": "download"}});

        let left = deep_merge(deep_merge(catalog.clone(), state.clone()), overrides.clone());
        let right_inner = deep_merge(state, overrides);
        let right = deep_merge(catalog, right_inner);

        assert_eq!(left, right);
    }

    #[test]
    fn missing_override_keys_keep_base_values() {
        let base = json!({"a": 1, "b": 2});
        let over = json!({"b": 3});
        assert_eq!(deep_merge(base, over), json!({"a": 1, "b": 3}));
    }
}
