use crate::observability::logging::{LogLevel, LogRotationPolicy, LogTarget};
use crate::observation_model::{PointSpec, DEFAULT_BUFFER_CAPACITY, DEFAULT_CHECKPOINT_INTERVAL};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

type ConfigMap = Map<String, Value>;

/// Store configuration, loaded once at startup and partially patchable at runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// Ring capacity of the sequence buffer.
    pub buffer_capacity: usize,
    /// Appends between periodic checkpoints; `None` disables them.
    pub checkpoint_interval: Option<u64>,
    /// How far behind the last sequence an "as of" query may reach.
    pub max_as_of_depth: Option<u64>,
    pub log_level: LogLevel,
    pub log_target: LogTarget,
    /// Applies to file targets only.
    pub log_rotation: LogRotationPolicy,
    /// Points registered when the store opens.
    pub points: Vec<PointSpec>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            checkpoint_interval: Some(DEFAULT_CHECKPOINT_INTERVAL),
            max_as_of_depth: None,
            log_level: LogLevel::Info,
            log_target: LogTarget::Stderr,
            log_rotation: LogRotationPolicy::default(),
            points: Vec::new(),
        }
    }
}

impl StoreConfig {
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: StoreConfig = serde_json::from_str(raw).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.buffer_capacity == 0 {
            return Err(ConfigError::Invalid("buffer_capacity must be > 0".into()));
        }
        if self.checkpoint_interval == Some(0) {
            return Err(ConfigError::Invalid(
                "checkpoint_interval must be > 0 (omit it to disable checkpoints)".into(),
            ));
        }
        if self.log_rotation.max_bytes == 0 || self.log_rotation.max_files == 0 {
            return Err(ConfigError::Invalid("log_rotation limits must be > 0".into()));
        }
        let mut seen = BTreeSet::new();
        for point in &self.points {
            if !seen.insert(&point.id) {
                return Err(ConfigError::Invalid(format!(
                    "point {} is listed more than once",
                    point.id
                )));
            }
        }
        Ok(())
    }

    /// Applies a JSON merge patch of hot knobs, returning the sorted keys that
    /// changed. The config is left untouched when the patch is rejected.
    pub fn patch(&mut self, patch: &Value) -> Result<Vec<String>, ConfigError> {
        let patch_map = patch
            .as_object()
            .ok_or_else(|| ConfigError::InvalidPatch("patch must be a JSON object".into()))?;
        let mut next = match serde_json::to_value(&*self).map_err(ConfigError::Parse)? {
            Value::Object(map) => map,
            _ => return Err(ConfigError::InvalidPatch("config is not a JSON object".into())),
        };
        let changed = merge_map(&mut next, patch_map);
        if changed.is_empty() {
            return Ok(changed);
        }
        for key in &changed {
            match knob_class(key) {
                Some(ConfigKnobClass::Hot) => {}
                Some(ConfigKnobClass::Restart) => {
                    return Err(ConfigError::RequiresRestart(key.clone()))
                }
                None => return Err(ConfigError::UnknownKnob(key.clone())),
            }
        }
        let candidate: StoreConfig = serde_json::from_value(Value::Object(next))
            .map_err(|err| ConfigError::InvalidPatch(err.to_string()))?;
        candidate.validate()?;
        *self = candidate;
        Ok(changed)
    }
}

/// Class of configuration knob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, PartialOrd, Ord)]
pub enum ConfigKnobClass {
    /// Applied to a running store.
    Hot = 0,
    /// Only takes effect when the store is reopened.
    Restart = 1,
}

/// Class of a known knob, `None` for keys the store does not recognise.
pub fn knob_class(key: &str) -> Option<ConfigKnobClass> {
    match key {
        "log_level" | "max_as_of_depth" => Some(ConfigKnobClass::Hot),
        "buffer_capacity" | "checkpoint_interval" | "log_target" | "log_rotation" | "points" => {
            Some(ConfigKnobClass::Restart)
        }
        _ => None,
    }
}

fn merge_map(base: &mut ConfigMap, patch: &ConfigMap) -> Vec<String> {
    let mut changed = Vec::new();
    for (key, value) in patch {
        let entry = base.entry(key.clone()).or_insert(Value::Null);
        if entry != value {
            *entry = value.clone();
            changed.push(key.clone());
        }
    }
    changed.sort();
    changed
}

/// Result of a successful runtime patch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigPatchResult {
    pub version: u64,
    pub impact: ConfigKnobClass,
    pub changed_keys: Vec<String>,
}

/// Errors surfaced while loading or patching configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[source] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
    #[error("invalid config patch: {0}")]
    InvalidPatch(String),
    #[error("config knob '{0}' only takes effect after a restart")]
    RequiresRestart(String),
    #[error("unknown config knob '{0}'")]
    UnknownKnob(String),
}
