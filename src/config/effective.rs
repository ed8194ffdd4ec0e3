//! Effective configuration with full provenance
//!
//! Captures the merged configuration plus where each contributing layer
//! came from, so a scheduled run can log exactly what policy it applied.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;

use super::defaults::builtin_layer;
use super::merge::merge_layers;
use super::settings::ArchivistConfig;

/// Schema version for effective_config
pub const SCHEMA_VERSION: u32 = 1;

/// Schema identifier
pub const SCHEMA_ID: &str = "archivist/effective_config@1";

/// Environment variables recognised by the env layer, with the config key
/// path each one sets.
pub const ENV_VARS: &[(&str, &str)] = &[
    ("ARCHIVIST_REGION", "region"),
    ("ARCHIVIST_DB", "archive.db_identifier"),
    ("ARCHIVIST_DRY_RUN", "archive.dry_run"),
    ("ARCHIVIST_CLUSTER", "ecs.cluster"),
    ("ARCHIVIST_SERVICE", "ecs.service"),
    ("ARCHIVIST_REDEPLOY_SECONDS", "redeploy.max_age_seconds"),
    ("ARCHIVIST_METRIC_NAMESPACE", "health.metric_namespace"),
];

/// Origin of a configuration source
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ConfigOrigin {
    Builtin,
    File,
    Env,
    Cli,
}

/// A contributing config source with provenance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSource {
    pub origin: ConfigOrigin,

    /// File path (None for builtin/env/cli)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// SHA-256 digest of raw file bytes (None for builtin/env/cli)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,

    /// Keys set by this layer (env layer only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keys: Vec<String>,
}

impl ConfigSource {
    fn bare(origin: ConfigOrigin) -> Self {
        Self {
            origin,
            path: None,
            digest: None,
            keys: Vec::new(),
        }
    }
}

/// Effective configuration with full provenance
#[derive(Debug, Clone, Serialize)]
pub struct EffectiveConfig {
    pub schema_version: u32,

    pub schema_id: String,

    /// When this config was computed
    pub created_at: DateTime<Utc>,

    /// The merged configuration object
    pub config: Value,

    /// Contributing sources in precedence order
    pub sources: Vec<ConfigSource>,

    #[serde(skip)]
    settings: ArchivistConfig,
}

impl EffectiveConfig {
    /// Build effective config from layers.
    ///
    /// `env` is the process environment (or a stand-in); only the variables
    /// in [`ENV_VARS`] are read from it.
    pub fn build<I, K, V>(
        config_path: Option<&Path>,
        env: I,
        cli_overrides: Option<Value>,
    ) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut layers = vec![builtin_layer()];
        let mut sources = vec![ConfigSource::bare(ConfigOrigin::Builtin)];

        if let Some(path) = config_path {
            let (value, digest) = Self::load_toml_file(path)?;
            layers.push(value);
            sources.push(ConfigSource {
                path: Some(path.to_string_lossy().to_string()),
                digest: Some(digest),
                ..ConfigSource::bare(ConfigOrigin::File)
            });
        }

        let (env_value, env_keys) = Self::env_layer(env)?;
        if !env_keys.is_empty() {
            layers.push(env_value);
            sources.push(ConfigSource {
                keys: env_keys,
                ..ConfigSource::bare(ConfigOrigin::Env)
            });
        }

        if let Some(cli) = cli_overrides {
            layers.push(cli);
            sources.push(ConfigSource::bare(ConfigOrigin::Cli));
        }

        let merged = merge_layers(layers);

        let settings: ArchivistConfig = serde_json::from_value(merged.clone())
            .map_err(|e| ConfigError::ParseError(format!("invalid configuration: {}", e)))?;
        settings.validate()?;

        Ok(Self {
            schema_version: SCHEMA_VERSION,
            schema_id: SCHEMA_ID.to_string(),
            created_at: Utc::now(),
            config: merged,
            sources,
            settings,
        })
    }

    /// Typed settings
    pub fn settings(&self) -> &ArchivistConfig {
        &self.settings
    }

    /// Load and parse a TOML file, returning the value and digest
    fn load_toml_file(path: &Path) -> Result<(Value, String), ConfigError> {
        let bytes = fs::read(path)
            .map_err(|e| ConfigError::IoError(format!("{}: {}", path.display(), e)))?;

        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        let digest = hex::encode(hasher.finalize());

        let contents = String::from_utf8(bytes)
            .map_err(|e| ConfigError::ParseError(format!("Invalid UTF-8: {}", e)))?;

        let toml_value: toml::Value = toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(format!("TOML parse error: {}", e)))?;

        Ok((Self::toml_to_json(toml_value), digest))
    }

    /// Convert TOML Value to JSON Value
    fn toml_to_json(toml: toml::Value) -> Value {
        match toml {
            toml::Value::String(s) => Value::String(s),
            toml::Value::Integer(i) => Value::Number(i.into()),
            toml::Value::Float(f) => serde_json::Number::from_f64(f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            toml::Value::Boolean(b) => Value::Bool(b),
            toml::Value::Datetime(dt) => Value::String(dt.to_string()),
            toml::Value::Array(arr) => {
                Value::Array(arr.into_iter().map(Self::toml_to_json).collect())
            }
            toml::Value::Table(table) => Value::Object(
                table
                    .into_iter()
                    .map(|(k, v)| (k, Self::toml_to_json(v)))
                    .collect(),
            ),
        }
    }

    /// Build the env layer, returning it with the variable names that set it
    fn env_layer<I, K, V>(env: I) -> Result<(Value, Vec<String>), ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut layer = Map::new();
        let mut keys = Vec::new();

        for (name, raw) in env {
            let name = name.as_ref();
            let Some((_, path)) = ENV_VARS.iter().find(|(var, _)| *var == name) else {
                continue;
            };
            let raw = raw.as_ref();

            let value = match *path {
                "redeploy.max_age_seconds" => raw
                    .parse::<u64>()
                    .map(Value::from)
                    .map_err(|e| ConfigError::ParseError(format!("{}: {}", name, e)))?,
                "archive.dry_run" => raw
                    .parse::<bool>()
                    .map(Value::Bool)
                    .map_err(|e| ConfigError::ParseError(format!("{}: {}", name, e)))?,
                _ => Value::String(raw.to_string()),
            };

            set_path(&mut layer, path, value);
            keys.push(name.to_string());
        }

        keys.sort();
        Ok((Value::Object(layer), keys))
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Get a config value by path (dot-separated)
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut current = &self.config;
        for part in path.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    pub fn get_u64(&self, path: &str) -> Option<u64> {
        self.get(path).and_then(|v| v.as_u64())
    }

    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(|v| v.as_str())
    }
}

/// Set a dot-separated path inside a JSON object, creating objects on the way
fn set_path(map: &mut Map<String, Value>, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            map.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let child = map
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !child.is_object() {
                *child = Value::Object(Map::new());
            }
            if let Value::Object(child_map) = child {
                set_path(child_map, rest, value);
            }
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}
