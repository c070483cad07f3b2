//! Command-line overrides in `dotted.key=value` form.
//!
//! Values are read as YAML scalars, so `true`, `0.7`, `20043` and `null`
//! keep their types while anything else stays a string.

use serde_json::{Map, Value};

use super::ConfigError;

/// A parsed `key=value` override.
#[derive(Debug, Clone, PartialEq)]
pub struct Override {
    pub path: Vec<String>,
    pub value: Value,
}

impl Override {
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let (key, value) = raw
            .split_once('=')
            .ok_or_else(|| ConfigError::InvalidOverride(format!("'{}' is not key=value", raw)))?;

        let path: Vec<String> = key.trim().split('.').map(str::to_string).collect();
        if path.iter().any(String::is_empty) {
            return Err(ConfigError::InvalidOverride(format!(
                "'{}' has an empty key segment",
                raw
            )));
        }

        let value = if value.trim().is_empty() {
            Value::String(String::new())
        } else {
            serde_yaml::from_str::<Value>(value).map_err(|e| {
                ConfigError::InvalidOverride(format!("'{}': {}", raw, e))
            })?
        };

        Ok(Self { path, value })
    }

    /// Set the value in `document`, creating intermediate objects.
    pub fn apply(&self, document: &mut Value) -> Result<(), ConfigError> {
        let Some((last, parents)) = self.path.split_last() else {
            return Ok(());
        };

        let mut node = document;
        for segment in parents {
            let object = as_object(node, &self.path)?;
            node = object
                .entry(segment.clone())
                .or_insert_with(|| Value::Object(Map::new()));
        }

        as_object(node, &self.path)?.insert(last.clone(), self.value.clone());
        Ok(())
    }
}

fn as_object<'a>(node: &'a mut Value, path: &[String]) -> Result<&'a mut Map<String, Value>, ConfigError> {
    if node.is_null() {
        *node = Value::Object(Map::new());
    }
    node.as_object_mut().ok_or_else(|| {
        ConfigError::InvalidOverride(format!(
            "cannot set '{}': parent is not a mapping",
            path.join(".")
        ))
    })
}

/// Parse and apply overrides in order; later ones win.
pub fn apply_overrides<S: AsRef<str>>(document: &mut Value, overrides: &[S]) -> Result<(), ConfigError> {
    for raw in overrides {
        let parsed = Override::parse(raw.as_ref())?;
        tracing::debug!(key = %parsed.path.join("."), "Applying config override");
        parsed.apply(document)?;
    }
    Ok(())
}
