//! State / Action - the two maps that cross the wire.
//!
//! Both are ordered (`IndexMap`) so a state serializes with its fields in the
//! order the plant produced them, and an action keeps the order the policy
//! server returned.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One observation field value.
///
/// Serialized untagged, so a `State` is a plain JSON object on the wire:
/// `{"ball_x": 0.01, "mode": "tracking", "halted": false}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StateValue {
    Number(f64),
    Flag(bool),
    Category(String),
}

impl StateValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<f64> for StateValue {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<bool> for StateValue {
    fn from(v: bool) -> Self {
        Self::Flag(v)
    }
}

impl From<String> for StateValue {
    fn from(v: String) -> Self {
        Self::Category(v)
    }
}

impl From<&str> for StateValue {
    fn from(v: &str) -> Self {
        Self::Category(v.to_string())
    }
}

/// The plant's observable condition at one control step.
///
/// Read-only for predictors; a new `State` is produced every step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct State {
    fields: IndexMap<String, StateValue>,
}

impl State {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    ///
    /// ```ignore
    /// let state = State::new().with("ball_x", 0.01).with("ball_y", -0.02);
    /// ```
    pub fn with(mut self, field: impl Into<String>, value: impl Into<StateValue>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<StateValue>) {
        self.fields.insert(field.into(), value.into());
    }

    pub fn get(&self, field: &str) -> Option<&StateValue> {
        self.fields.get(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &StateValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>, V: Into<StateValue>> FromIterator<(K, V)> for State {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Commanded actuation returned by a concept policy.
///
/// The plant applies the fields it recognizes and keeps its own prior value
/// for anything absent; that merge is not done here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Action {
    fields: IndexMap<String, f64>,
}

impl Action {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: impl Into<String>, value: f64) -> Self {
        self.fields.insert(field.into(), value);
        self
    }

    pub fn get(&self, field: &str) -> Option<f64> {
        self.fields.get(field).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Decode a policy server response body.
    ///
    /// The body must be a JSON object whose values are all numbers.
    pub fn from_json_slice(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(body)
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for Action {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}
