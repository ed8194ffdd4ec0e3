//! Configuration merge system
//!
//! Layers, lowest precedence first:
//! 1. Built-in defaults
//! 2. Config file (`--config`, or ./archivist.toml when present)
//! 3. Environment (`ARCHIVIST_*`)
//! 4. CLI flags

mod defaults;
mod effective;
mod merge;
mod settings;

pub use defaults::{
    builtin_layer, DEFAULT_CONFIG_PATH, DEFAULT_MAX_LATEST_AGE_HOURS,
    DEFAULT_REDEPLOY_MAX_AGE_SECONDS,
};
pub use effective::{ConfigError, ConfigOrigin, ConfigSource, EffectiveConfig, ENV_VARS};
pub use merge::{deep_merge, merge_layers};
pub use settings::{
    ArchiveSettings, ArchivistConfig, EcsSettings, HealthSettings, RedeploySettings,
};
