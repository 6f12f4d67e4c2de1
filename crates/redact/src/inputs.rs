//! Redaction of structured step inputs.
//!
//! A step input is a JSON object with exactly one value key, optionally
//! accompanied by an `opts` object. Every string inside the value is run
//! through the redaction filter; other scalars are kept as they are.

use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

use crate::batch::redact_string;
use crate::error::{FilterError, Result};
use crate::secrets::SecretSet;

/// Key that carries input options rather than a value.
pub const OPTIONS_KEY: &str = "opts";

/// Options of a single input that affect how its value is reported.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
pub struct InputOptions {
    /// Expand `$NAME` and `${NAME}` references against the environment.
    #[serde(default)]
    pub is_expand: bool,
}

/// Redacts step inputs before they are reported.
#[derive(Debug, Clone)]
pub struct InputRedactor {
    secrets: Arc<SecretSet>,
    environment: HashMap<String, String>,
}

impl InputRedactor {
    /// Create a redactor for `secrets`
    #[must_use]
    pub fn new(secrets: Arc<SecretSet>) -> Self {
        Self {
            secrets,
            environment: HashMap::new(),
        }
    }

    /// Environment used by inputs with `is_expand` set
    #[must_use]
    pub fn with_environment(mut self, environment: HashMap<String, String>) -> Self {
        self.environment = environment;
        self
    }

    /// Redact `inputs` into `{key: {"value": redacted}}`.
    ///
    /// When expansion changes an input, the redacted unexpanded value is kept
    /// under `original_value`.
    ///
    /// # Errors
    /// Returns [`FilterError::InvalidInput`] for inputs without exactly one
    /// value key, or with malformed options.
    pub fn redact(&self, inputs: &[Value]) -> Result<Map<String, Value>> {
        let mut result = Map::new();
        for input in inputs {
            let (key, value, options) = split_input(input)?;

            let raw = self.redact_value(value, false)?;
            let mut entry = Map::new();
            if options.is_expand {
                let expanded = self.redact_value(value, true)?;
                let changed = expanded != raw;
                entry.insert("value".to_string(), expanded);
                if changed {
                    entry.insert("original_value".to_string(), raw);
                }
            } else {
                entry.insert("value".to_string(), raw);
            }
            result.insert(key.to_string(), Value::Object(entry));
        }
        Ok(result)
    }

    fn redact_value(&self, value: &Value, expand: bool) -> Result<Value> {
        Ok(match value {
            Value::String(s) => {
                let s = if expand {
                    expand_env(s, &self.environment)
                } else {
                    s.clone()
                };
                Value::String(redact_string(&s, &self.secrets)?)
            }
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| self.redact_value(item, expand))
                    .collect::<Result<_>>()?,
            ),
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| Ok((k.clone(), self.redact_value(v, expand)?)))
                    .collect::<Result<_>>()?,
            ),
            other => other.clone(),
        })
    }
}

fn split_input(input: &Value) -> Result<(&str, &Value, InputOptions)> {
    let Value::Object(map) = input else {
        return Err(FilterError::invalid_input("input is not an object"));
    };

    let keys: Vec<&str> = map.keys().map(String::as_str).collect();
    let mut value_keys = keys.iter().filter(|k| **k != OPTIONS_KEY);
    let (Some(key), None) = (value_keys.next(), value_keys.next()) else {
        return Err(FilterError::invalid_input(match keys.len() {
            0 => "no input key specified".to_string(),
            _ => format!("expected exactly one input key, found: {keys:?}"),
        }));
    };

    let options = match map.get(OPTIONS_KEY) {
        Some(opts) => serde_json::from_value::<InputOptions>(opts.clone())
            .map_err(|e| FilterError::invalid_input(format!("invalid options for {key}: {e}")))?,
        None => InputOptions::default(),
    };

    let value = map
        .get(*key)
        .ok_or_else(|| FilterError::internal("input key disappeared"))?;
    Ok((*key, value, options))
}

/// Expand `$NAME` and `${NAME}`; unknown names expand to nothing.
fn expand_env(value: &str, environment: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(idx) = rest.find('$') {
        out.push_str(&rest[..idx]);
        let after = &rest[idx + 1..];

        let (name, consumed) = if let Some(braced) = after.strip_prefix('{') {
            match braced.find('}') {
                Some(end) => (&braced[..end], end + 2),
                None => {
                    out.push('$');
                    rest = after;
                    continue;
                }
            }
        } else {
            let end = after
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(after.len());
            (&after[..end], end)
        };

        if name.is_empty() {
            out.push('$');
        } else if let Some(v) = environment.get(name) {
            out.push_str(v);
        }
        rest = &after[consumed..];
    }

    out.push_str(rest);
    out
}
