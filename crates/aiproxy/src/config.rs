//! YAML configuration document and its on-disk store.
//!
//! ```yaml
//! default_profile: prod
//! env:
//!   OPENAI_API_KEY: sk-...
//! tracer:
//!   enabled: true
//!   project_name: aiproxy
//!   endpoint: http://localhost:6006/v1/traces
//! profiles:
//!   prod:
//!     description: Shared proxy
//!     litellm-config: litellm.yaml
//!     host: 0.0.0.0
//!     port: 4000
//! ```

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_yaml::{Mapping, Value};
use thiserror::Error;

use crate::paths;

/// Tool-specific config path override
pub const CONFIG_ENV: &str = "AIPROXY_CONFIG";
/// Legacy override still set by older package wrappers
pub const LEGACY_CONFIG_ENV: &str = "SCRIPT_CONFIG";

/// Bundled templates written on first run
pub const CONFIG_TEMPLATE: &str = include_str!("../etc/config.yaml");
pub const EXAMPLE_TEMPLATE: &str = include_str!("../etc/example.yaml");

const EXAMPLE_FILE_NAME: &str = "example.yaml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {}", .path.display())]
    NotFound { path: PathBuf },
    #[error("Could not read config at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Could not parse config at {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("Could not serialize config: {0}")]
    Serialize(#[source] serde_yaml::Error),
    #[error("Profile '{name}' not found")]
    UnknownProfile { name: String, available: Vec<String> },
    #[error("Invalid config at {}: {reason}", .path.display())]
    Invalid { path: PathBuf, reason: String },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Root configuration document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigDocument {
    /// Profile used when `--profile` is not given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_profile: Option<String>,

    /// Environment passed to the proxy server process
    #[serde(default, deserialize_with = "null_as_default")]
    pub env: IndexMap<String, Option<EnvValue>>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub tracer: TracerConfig,

    /// Named launch profiles, in file order
    #[serde(default, deserialize_with = "lenient_profiles")]
    pub profiles: IndexMap<String, ProfileConfig>,
}

/// A single launch profile.
///
/// Launch fields are optional and loosely typed here so that one bad profile
/// never hides the others; validation happens when a profile is selected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileConfig {
    /// LiteLLM router config, absolute or relative to the config directory
    #[serde(
        rename = "litellm-config",
        alias = "litellm_config",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub litellm_config: Option<Field<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<Field<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<Field<u16>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<Field<String>>,

    /// Set when the profile entry is not a mapping at all
    #[serde(skip)]
    pub malformed: Option<String>,
}

/// A profile value that either has the expected type or is kept as written
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Field<T> {
    Valid(T),
    Invalid(Value),
}

impl<T> Field<T> {
    pub fn valid(&self) -> Option<&T> {
        match self {
            Field::Valid(value) => Some(value),
            Field::Invalid(_) => None,
        }
    }
}

impl<T> From<T> for Field<T> {
    fn from(value: T) -> Self {
        Field::Valid(value)
    }
}

impl<T: fmt::Display> fmt::Display for Field<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Valid(value) => value.fmt(f),
            Field::Invalid(value) => f.write_str(&render_value(value)),
        }
    }
}

/// Render a raw YAML value on one line
pub fn render_value(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        other => serde_yaml::to_string(other)
            .map(|yaml| yaml.trim().replace('\n', " "))
            .unwrap_or_else(|_| "<unprintable>".to_string()),
    }
}

fn lenient_profiles<'de, D>(
    deserializer: D,
) -> std::result::Result<IndexMap<String, ProfileConfig>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: IndexMap<String, Value> = null_as_default(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(name, value)| {
            let profile = ProfileConfig::from_value(&name, value);
            (name, profile)
        })
        .collect())
}

impl ProfileConfig {
    fn from_value(name: &str, value: Value) -> Self {
        if value.is_null() {
            return Self::default();
        }
        serde_yaml::from_value(value).unwrap_or_else(|e| {
            log::warn!("Profile '{}' is not a valid mapping: {}", name, e);
            Self {
                malformed: Some(e.to_string()),
                ..Self::default()
            }
        })
    }
}

/// Optional tracing export settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TracerConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

/// Environment values can be strings, booleans, or numbers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnvValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl EnvValue {
    /// String form handed to the child process
    pub fn as_str(&self) -> String {
        match self {
            EnvValue::Bool(b) => b.to_string(),
            EnvValue::Int(i) => i.to_string(),
            // Keep a fractional part so `1.0` is not passed on as `1`
            EnvValue::Float(f) => format!("{:?}", f),
            EnvValue::String(s) => s.clone(),
        }
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl ConfigDocument {
    /// Load the document at `path`.
    ///
    /// A missing file is always `NotFound`; an empty file is an empty document.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            });
        }
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse a document from a YAML string
    pub fn parse(yaml: &str) -> std::result::Result<Self, serde_yaml::Error> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let value: Value = serde_yaml::from_str(yaml)?;
        if value.is_null() {
            return Ok(Self::default());
        }
        if value.get("aiproxy").is_some() {
            log::warn!(
                "Legacy 'aiproxy' configuration section found; migrate it to the profile-based \
                 format (see example.yaml next to your config)"
            );
        }
        serde_yaml::from_value(value)
    }

    /// Profile names in file order
    pub fn profile_names(&self) -> Vec<String> {
        self.profiles.keys().cloned().collect()
    }

    /// Non-empty environment entries as plain strings
    pub fn env_vars(&self) -> IndexMap<String, String> {
        self.env
            .iter()
            .filter_map(|(key, value)| {
                let value = value.as_ref()?.as_str();
                (!value.is_empty()).then(|| (key.clone(), value))
            })
            .collect()
    }
}

/// Default config file location.
///
/// Resolution order:
/// 1. `AIPROXY_CONFIG`
/// 2. `SCRIPT_CONFIG` (legacy)
/// 3. `<user config dir>/aiproxy/config.yaml`
///
/// Environment values may use `~` and `$VAR` references.
pub fn locate_default_path() -> paths::Result<PathBuf> {
    locate_with(|key| std::env::var(key).ok())
}

fn locate_with(lookup: impl Fn(&str) -> Option<String>) -> paths::Result<PathBuf> {
    let from_env = [CONFIG_ENV, LEGACY_CONFIG_ENV]
        .into_iter()
        .filter_map(|key| lookup(key))
        .find(|value| !value.trim().is_empty());
    match from_env {
        Some(value) => paths::expand_path(value.trim()),
        None => Ok(paths::app_config_dir()?.join("config.yaml")),
    }
}

/// Files created by [`ensure_exists`]
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Bootstrap {
    pub config: Option<PathBuf>,
    pub example: Option<PathBuf>,
}

impl Bootstrap {
    pub fn created_anything(&self) -> bool {
        self.config.is_some() || self.example.is_some()
    }
}

/// Write `contents` to `path` only if it does not exist yet
fn write_new(path: &Path, contents: &str) -> std::io::Result<()> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    file.write_all(contents.as_bytes())
}

/// First-run bootstrap: copy the bundled templates into place.
///
/// Never overwrites and never fails; problems are logged and left for
/// [`ConfigDocument::load`] to report.
pub fn ensure_exists(path: &Path) -> Bootstrap {
    let mut created = Bootstrap::default();
    if path.exists() {
        return created;
    }

    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    log::info!("First run detected, initializing configuration at {}", dir.display());

    if let Err(e) = fs::create_dir_all(&dir) {
        log::warn!("Could not create config directory {}: {}", dir.display(), e);
        return created;
    }

    match write_new(path, CONFIG_TEMPLATE) {
        Ok(()) => created.config = Some(path.to_path_buf()),
        Err(e) => log::warn!("Could not write default config {}: {}", path.display(), e),
    }

    let example = dir.join(EXAMPLE_FILE_NAME);
    if example != path && !example.exists() {
        match write_new(&example, EXAMPLE_TEMPLATE) {
            Ok(()) => created.example = Some(example),
            Err(e) => log::warn!("Could not write example config {}: {}", example.display(), e),
        }
    }

    created
}

/// Set `default_profile` and rewrite the whole file.
///
/// The file is re-read as plain YAML so keys this crate does not model are
/// kept. Nothing is written when `name` is not a known profile.
pub fn set_default_profile(path: &Path, name: &str) -> Result<()> {
    if !path.exists() {
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut value: Value = if contents.trim().is_empty() {
        Value::Null
    } else {
        serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?
    };
    if value.is_null() {
        value = Value::Mapping(Mapping::new());
    }
    let root = value.as_mapping_mut().ok_or_else(|| ConfigError::Invalid {
        path: path.to_path_buf(),
        reason: "top level must be a mapping".to_string(),
    })?;

    let available: Vec<String> = root
        .get("profiles")
        .and_then(Value::as_mapping)
        .map(|profiles| {
            profiles
                .keys()
                .filter_map(|k| k.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();
    if !available.iter().any(|p| p == name) {
        return Err(ConfigError::UnknownProfile {
            name: name.to_string(),
            available,
        });
    }

    root.insert(Value::from("default_profile"), Value::from(name));
    let yaml = serde_yaml::to_string(&value).map_err(ConfigError::Serialize)?;
    fs::write(path, yaml).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    log::debug!("Default profile in {} set to {}", path.display(), name);
    Ok(())
}
