//! Provider options and the sources they can be loaded from.
//!
//! Every behavioural switch of the container lives on [`ProviderOptions`],
//! passed to [`ServiceCollection::build_with_options`](crate::ServiceCollection::build_with_options)
//! or set with [`ServiceCollection::with_options`](crate::ServiceCollection::with_options).
//! Options can be written in code, read from environment variables, or (with
//! the `config` feature) deserialized from JSON.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::str::FromStr;

#[cfg(feature = "config")]
use serde::{Deserialize, Serialize};

use crate::error::{DiError, DiResult};

/// Prefix used by [`ProviderOptions::from_default_env`].
pub const DEFAULT_ENV_PREFIX: &str = "CALLSITE_DI";

/// A raw configuration value.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(untagged))]
pub enum ConfigValue {
    String(String),
    Integer(i64),
    Boolean(bool),
}

impl ConfigValue {
    /// Parses an untyped string the way environment variables are read:
    /// integers first, then booleans, then plain strings.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if let Ok(int_val) = raw.parse::<i64>() {
            ConfigValue::Integer(int_val)
        } else if let Ok(bool_val) = raw.to_ascii_lowercase().parse::<bool>() {
            ConfigValue::Boolean(bool_val)
        } else {
            ConfigValue::String(raw.to_string())
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Booleans, and the integers `0` / `1`.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigValue::Boolean(b) => Some(*b),
            ConfigValue::Integer(0) => Some(false),
            ConfigValue::Integer(1) => Some(true),
            _ => None,
        }
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::String(s) => f.write_str(s),
            ConfigValue::Integer(i) => write!(f, "{i}"),
            ConfigValue::Boolean(b) => write!(f, "{b}"),
        }
    }
}

/// Somewhere option values can be looked up by key.
pub trait ConfigSource: Send + Sync + fmt::Debug {
    fn get(&self, key: &str) -> Option<ConfigValue>;
}

/// Environment variables, optionally namespaced by a prefix.
///
/// With prefix `APP`, key `validate_scopes` reads `APP_VALIDATE_SCOPES`.
#[derive(Debug, Default, Clone)]
pub struct EnvironmentConfigSource {
    prefix: Option<String>,
}

impl EnvironmentConfigSource {
    pub fn new() -> Self {
        Self { prefix: None }
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
        }
    }

    fn variable(&self, key: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}_{}", prefix.to_uppercase(), key.to_uppercase()),
            None => key.to_uppercase(),
        }
    }
}

impl ConfigSource for EnvironmentConfigSource {
    fn get(&self, key: &str) -> Option<ConfigValue> {
        env::var(self.variable(key)).ok().map(|value| ConfigValue::parse(&value))
    }
}

/// In-memory source, handy for tests and for options assembled elsewhere.
#[derive(Debug, Default, Clone)]
pub struct MapConfigSource {
    values: HashMap<String, ConfigValue>,
}

impl MapConfigSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: impl Into<String>, value: ConfigValue) -> Self {
        self.values.insert(key.into(), value);
        self
    }
}

impl ConfigSource for MapConfigSource {
    fn get(&self, key: &str) -> Option<ConfigValue> {
        self.values.get(key).cloned()
    }
}

/// Whether the built-in `Optional<T>` override is installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(rename_all = "snake_case"))]
pub enum ResolveMode {
    /// Only registrations and caller-supplied overrides.
    Default,
    /// Additionally resolve `Optional<T>` for any `T`, registered or not.
    #[default]
    EnableOptional,
}

impl FromStr for ResolveMode {
    type Err = DiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "default" => Ok(ResolveMode::Default),
            "enable_optional" | "enableoptional" | "optional" => Ok(ResolveMode::EnableOptional),
            other => Err(DiError::InvalidOption {
                key: "resolve_mode".to_string(),
                message: format!("unknown resolve mode '{other}'"),
            }),
        }
    }
}

/// Behavioural switches of a built container.
///
/// # Examples
///
/// ```
/// use callsite_di::{ProviderOptions, ResolveMode, ServiceCollection};
///
/// let options = ProviderOptions::default()
///     .validate_scopes(true)
///     .validate_on_build(true)
///     .resolve_mode(ResolveMode::Default);
///
/// let provider = ServiceCollection::new().build_with_options(options).unwrap();
/// assert!(provider.options().validate_scopes);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct ProviderOptions {
    /// Reject scoped services reachable from the root scope or a singleton.
    pub validate_scopes: bool,
    /// Compile every registration when the container is built and report
    /// all failures at once.
    pub validate_on_build: bool,
    pub resolve_mode: ResolveMode,
}

impl Default for ProviderOptions {
    fn default() -> Self {
        Self {
            validate_scopes: false,
            validate_on_build: false,
            resolve_mode: ResolveMode::EnableOptional,
        }
    }
}

impl ProviderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Both validations on, the usual choice for development builds.
    pub fn strict() -> Self {
        Self::default().validate_scopes(true).validate_on_build(true)
    }

    pub fn validate_scopes(mut self, enabled: bool) -> Self {
        self.validate_scopes = enabled;
        self
    }

    pub fn validate_on_build(mut self, enabled: bool) -> Self {
        self.validate_on_build = enabled;
        self
    }

    pub fn resolve_mode(mut self, mode: ResolveMode) -> Self {
        self.resolve_mode = mode;
        self
    }

    /// Reads `<PREFIX>_VALIDATE_SCOPES`, `<PREFIX>_VALIDATE_ON_BUILD` and
    /// `<PREFIX>_RESOLVE_MODE`. Unset variables keep their defaults.
    pub fn from_env(prefix: &str) -> DiResult<Self> {
        Self::from_source(&EnvironmentConfigSource::with_prefix(prefix))
    }

    /// [`from_env`](Self::from_env) with [`DEFAULT_ENV_PREFIX`].
    pub fn from_default_env() -> DiResult<Self> {
        Self::from_env(DEFAULT_ENV_PREFIX)
    }

    /// Reads the options from any [`ConfigSource`].
    pub fn from_source(source: &dyn ConfigSource) -> DiResult<Self> {
        let mut options = Self::default();
        if let Some(value) = read_bool(source, "validate_scopes")? {
            options.validate_scopes = value;
        }
        if let Some(value) = read_bool(source, "validate_on_build")? {
            options.validate_on_build = value;
        }
        if let Some(value) = source.get("resolve_mode") {
            options.resolve_mode = value.to_string().parse()?;
        }
        Ok(options)
    }

    /// Deserializes options from a JSON object. Missing fields keep their
    /// defaults.
    #[cfg(feature = "config")]
    pub fn from_json(json: &str) -> DiResult<Self> {
        serde_json::from_str(json).map_err(|e| DiError::InvalidOption {
            key: "json".to_string(),
            message: e.to_string(),
        })
    }
}

fn read_bool(source: &dyn ConfigSource, key: &str) -> DiResult<Option<bool>> {
    match source.get(key) {
        None => Ok(None),
        Some(value) => value.as_bool().map(Some).ok_or_else(|| DiError::InvalidOption {
            key: key.to_string(),
            message: format!("expected a boolean, got '{value}'"),
        }),
    }
}
