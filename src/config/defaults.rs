//! Built-in defaults (layer 1)

use serde_json::Value;

use super::ArchivistConfig;

/// Config file read when `--config` is not given, if it exists
pub const DEFAULT_CONFIG_PATH: &str = "archivist.toml";

/// Latest automated snapshot must be at most this old to be archived
pub const DEFAULT_MAX_LATEST_AGE_HOURS: u64 = 24;

/// Primary deployment age that triggers a redeploy (1 day)
pub const DEFAULT_REDEPLOY_MAX_AGE_SECONDS: u64 = 86_400;

/// Built-in defaults as a mergeable JSON layer
pub fn builtin_layer() -> Value {
    // Plain fields only, serialization cannot fail.
    serde_json::to_value(ArchivistConfig::default()).unwrap_or(Value::Null)
}
