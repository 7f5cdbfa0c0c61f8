//! Context: the record carried down each path of a scrape
//!
//! A context is an ordered map of field name to JSON value. Two fields are
//! reserved for navigation:
//!
//! - `url` - the page to visit next
//! - `processor` - the handler that should process that page
//!
//! Contexts are never mutated in place; every operation returns a new one.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

pub const URL_FIELD: &str = "url";
pub const PROCESSOR_FIELD: &str = "processor";

/// Decides when a context is a leaf of the traversal
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalRule {
    /// Leaf iff `processor` is absent
    #[default]
    MissingProcessor,
    /// Leaf iff `processor` or `url` is absent
    MissingProcessorOrUrl,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Context {
    fields: BTreeMap<String, Value>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    pub fn url(&self) -> Option<&str> {
        self.fields.get(URL_FIELD).and_then(Value::as_str)
    }

    pub fn processor(&self) -> Option<&str> {
        self.fields.get(PROCESSOR_FIELD).and_then(Value::as_str)
    }

    pub fn is_terminal(&self, rule: TerminalRule) -> bool {
        match rule {
            TerminalRule::MissingProcessor => self.processor().is_none(),
            TerminalRule::MissingProcessorOrUrl => {
                self.processor().is_none() || self.url().is_none()
            }
        }
    }

    /// Union of `self` and `child`, child fields winning on collision.
    ///
    /// The parent's `url` and `processor` are not inherited: they describe
    /// the step that produced `child`, not the next one.
    pub fn merge(&self, child: &Context) -> Context {
        let mut fields: BTreeMap<String, Value> = self
            .fields
            .iter()
            .filter(|(name, _)| !is_reserved(name))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        fields.extend(child.fields.iter().map(|(k, v)| (k.clone(), v.clone())));
        Context { fields }
    }

    /// String form of a field as used inside cache keys
    pub fn key_part(&self, field: &str) -> Option<String> {
        self.fields.get(field).map(|value| match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.fields.into_iter().collect())
    }
}

pub fn is_reserved(field: &str) -> bool {
    field == URL_FIELD || field == PROCESSOR_FIELD
}

impl From<Map<String, Value>> for Context {
    fn from(map: Map<String, Value>) -> Self {
        Self {
            fields: map.into_iter().collect(),
        }
    }
}

impl TryFrom<Value> for Context {
    type Error = Value;

    /// Only JSON objects are contexts; anything else is handed back
    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(map.into()),
            other => Err(other),
        }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Context {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(&self.fields) {
            Ok(s) => f.write_str(&s),
            Err(_) => Err(fmt::Error),
        }
    }
}
