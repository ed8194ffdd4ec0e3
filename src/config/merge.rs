//! Configuration layer merging
//!
//! - Objects: deep-merge by key
//! - Arrays: REPLACE (last wins), so a layer that sets `retention.tiers`
//!   supplies the whole tier list
//! - Scalars: override (last wins)

use serde_json::Value;

/// Deep merge `overlay` onto `base`.
///
/// Arrays are replaced whole: a file or CLI layer that sets
/// `retention.tiers` discards the builtin tiers rather than appending to
/// them. Null in the overlay overrides any base value.
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                let merged = match base_map.remove(&key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => overlay_value,
                };
                base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }

        // Arrays and scalars: overlay wins
        (_, overlay) => overlay,
    }
}

/// Merge config layers in order (first is base, last has highest precedence)
pub fn merge_layers(layers: Vec<Value>) -> Value {
    layers.into_iter().fold(Value::Null, deep_merge)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalar_override() {
        let base = json!({"redeploy": {"max_age_seconds": 86400}});
        let overlay = json!({"redeploy": {"max_age_seconds": 3600}});
        let result = deep_merge(base, overlay);
        assert_eq!(result["redeploy"]["max_age_seconds"], 3600);
    }

    #[test]
    fn test_object_deep_merge() {
        let base = json!({
            "archive": {
                "max_latest_age_hours": 24,
                "dry_run": false
            }
        });
        let overlay = json!({
            "archive": {
                "dry_run": true
            }
        });
        let result = deep_merge(base, overlay);

        assert_eq!(result["archive"]["dry_run"], true);
        assert_eq!(result["archive"]["max_latest_age_hours"], 24);
    }

    #[test]
    fn test_tier_array_replaced_not_concatenated() {
        let base = json!({
            "retention": {
                "tiers": [
                    {"max_age_days": 7, "required_gap_days": 1},
                    {"max_age_days": 30, "required_gap_days": 7}
                ],
                "default_gap_days": 90
            }
        });
        let overlay = json!({
            "retention": {
                "tiers": [{"max_age_days": 14, "required_gap_days": 2}]
            }
        });
        let result = deep_merge(base, overlay);

        let tiers = result["retention"]["tiers"].as_array().unwrap();
        assert_eq!(tiers.len(), 1);
        assert_eq!(tiers[0]["max_age_days"], 14);
        assert_eq!(result["retention"]["default_gap_days"], 90);
    }

    #[test]
    fn test_null_override() {
        let base = json!({"region": "us-west-2"});
        let overlay = json!({"region": null});
        let result = deep_merge(base, overlay);

        assert!(result["region"].is_null());
    }

    #[test]
    fn test_merge_layers_precedence() {
        let builtin = json!({"redeploy": {"max_age_seconds": 86400}, "region": "us-east-1"});
        let file = json!({"redeploy": {"max_age_seconds": 7200}});
        let env = json!({"region": "us-west-2"});
        let cli = json!({"redeploy": {"max_age_seconds": 60}});

        let result = merge_layers(vec![builtin, file, env, cli]);

        assert_eq!(result["redeploy"]["max_age_seconds"], 60);
        assert_eq!(result["region"], "us-west-2");
    }
}
