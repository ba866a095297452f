//! Application configuration.
//!
//! A [`Config`] is an explicit value built at start-up and handed to the
//! application, never a process-wide global. Keys are dot-separated paths into
//! a JSON tree (`app.debug`, `database.pool.size`).

use crate::error::{Result, TrellisError};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::path::Path;

const ENV_SEPARATOR: &str = "__";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    root: Value,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Self {
            root: Value::Object(Map::new()),
        }
    }

    /// Wrap a JSON object.
    pub fn from_value(root: Value) -> Result<Self> {
        if !root.is_object() {
            return Err(TrellisError::Config(
                "configuration root must be a JSON object".to_string(),
            ));
        }
        Ok(Self { root })
    }

    pub fn from_json_str(source: &str) -> Result<Self> {
        let root = serde_json::from_str(source)
            .map_err(|err| TrellisError::Config(format!("invalid JSON: {err}")))?;
        Self::from_value(root)
    }

    /// Read a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|err| {
            TrellisError::Config(format!("cannot read {}: {err}", path.display()))
        })?;
        tracing::debug!(path = %path.display(), "Loading configuration file");
        Self::from_json_str(&source)
    }

    /// Build from `PREFIX__SECTION__KEY=value` pairs.
    ///
    /// Segments after the prefix are lowercased and joined with dots. Values are
    /// parsed as JSON when they parse, and kept as strings otherwise.
    pub fn from_vars<I, K, V>(prefix: &str, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut config = Self::new();
        let lead = format!("{prefix}{ENV_SEPARATOR}");
        for (key, value) in vars {
            let Some(rest) = key.as_ref().strip_prefix(&lead) else {
                continue;
            };
            let path = rest
                .split(ENV_SEPARATOR)
                .map(str::to_lowercase)
                .collect::<Vec<_>>()
                .join(".");
            if path.is_empty() {
                continue;
            }
            let raw = value.as_ref();
            let parsed = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
            config.set(&path, parsed);
        }
        config
    }

    /// Build from the process environment.
    pub fn from_env(prefix: &str) -> Self {
        Self::from_vars(prefix, std::env::vars())
    }

    /// Deep-merge `other` into this configuration. Values in `other` win.
    pub fn merge(&mut self, other: Config) -> &mut Self {
        merge_values(&mut self.root, other.root);
        self
    }

    /// Raw JSON at `key`.
    pub fn value(&self, key: &str) -> Option<&Value> {
        key.split('.')
            .try_fold(&self.root, |node, segment| node.as_object()?.get(segment))
    }

    /// Typed value at `key`. `None` when missing or of another shape.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.value(key)
            .and_then(|value| T::deserialize(value).ok())
    }

    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.get(key).unwrap_or(default)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.value(key).is_some()
    }

    /// Set `key`, creating intermediate sections. Non-object intermediates are replaced.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> &mut Self {
        let segments = key.split('.').collect::<Vec<_>>();
        insert_path(&mut self.root, &segments, value.into());
        self
    }

    /// `app.debug`, false when unset.
    pub fn is_debug(&self) -> bool {
        self.get_or("app.debug", false)
    }

    pub fn as_value(&self) -> &Value {
        &self.root
    }
}

fn insert_path(node: &mut Value, segments: &[&str], value: Value) {
    let Some((first, rest)) = segments.split_first() else {
        *node = value;
        return;
    };
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    if let Value::Object(map) = node {
        let child = map.entry(first.to_string()).or_insert(Value::Null);
        insert_path(child, rest, value);
    }
}

fn merge_values(target: &mut Value, incoming: Value) {
    match (target, incoming) {
        (Value::Object(target), Value::Object(incoming)) => {
            for (key, value) in incoming {
                match target.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        target.insert(key, value);
                    }
                }
            }
        }
        (target, incoming) => *target = incoming,
    }
}
