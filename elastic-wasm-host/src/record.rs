//! Host-side record the guest reads and writes through the field capabilities

use elastic_wasm_api::FieldValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// The event a guest operates on during one `process` call.
///
/// `elastic_get_field` calls [`Record::lookup`]; `elastic_put_field` calls
/// [`Record::apply`]. Storage and indexing are up to the implementor.
pub trait Record: 'static {
    /// Value of a field, `None` when the field is absent
    fn lookup(&self, name: &str) -> Option<FieldValue>;

    /// Set a field, replacing any previous value
    fn apply(&mut self, key: &str, value: FieldValue);
}

/// Errors for loading events
#[derive(Debug, Error)]
pub enum EventError {
    #[error("Failed to read event file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid event JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid field assignment '{0}', expected KEY=VALUE")]
    InvalidAssignment(String),
}

/// A flat map of field names to values.
///
/// Lookups accept dotted paths (`"source.ip"`): an exact key wins, otherwise
/// the path is resolved through nested mappings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Event {
    fields: BTreeMap<String, FieldValue>,
}

impl Event {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<FieldValue>,
    ) -> Option<FieldValue> {
        self.fields.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key).or_else(|| self.get_path(key))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.fields.iter()
    }

    /// Parse an event from a JSON object
    pub fn from_json_str(json: &str) -> Result<Self, EventError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load an event from a file holding a JSON object
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, EventError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| EventError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&contents)
    }

    /// Render as pretty JSON. Byte fields become arrays of numbers.
    pub fn to_json_pretty(&self) -> Result<String, EventError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    fn get_path(&self, path: &str) -> Option<&FieldValue> {
        let mut segments = path.split('.');
        let mut current = self.fields.get(segments.next()?)?;
        for segment in segments {
            current = current.get(segment)?;
        }
        Some(current)
    }
}

impl Record for Event {
    fn lookup(&self, name: &str) -> Option<FieldValue> {
        self.get(name).cloned()
    }

    fn apply(&mut self, key: &str, value: FieldValue) {
        self.fields.insert(key.to_owned(), value);
    }
}

impl FromIterator<(String, FieldValue)> for Event {
    fn from_iter<I: IntoIterator<Item = (String, FieldValue)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

impl Extend<(String, FieldValue)> for Event {
    fn extend<I: IntoIterator<Item = (String, FieldValue)>>(&mut self, iter: I) {
        self.fields.extend(iter);
    }
}

/// Parse a `KEY=VALUE` assignment.
///
/// The value is read as JSON when possible (`count=3`, `tags=["a"]`) and
/// taken verbatim as a string otherwise (`message=hello world`).
pub fn parse_field_assignment(input: &str) -> Result<(String, FieldValue), EventError> {
    let (key, raw) = input
        .split_once('=')
        .filter(|(key, _)| !key.is_empty())
        .ok_or_else(|| EventError::InvalidAssignment(input.to_owned()))?;
    let value = serde_json::from_str::<FieldValue>(raw).unwrap_or_else(|_| FieldValue::from(raw));
    Ok((key.to_owned(), value))
}
