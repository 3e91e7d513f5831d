use crate::error::{ErrorKind, Result};
use exn::OptionExt;
use serde::Deserialize;
use serde_json::{Map, Value};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Year the catalog stores for "no date set".
const UNDEFINED_YEAR: i32 = 101;

/// One object from a `list --for-machine` JSON array.
///
/// The tool's output is loosely typed (the same field can be a string, a
/// list or absent depending on the column), so fields are validated on
/// access rather than up front.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct Row(Map<String, Value>);

impl Row {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|v| !v.is_null())
    }

    /// The book id. Every row the tool emits carries one.
    pub fn id(&self) -> Result<u64> {
        let value = self.get("id").ok_or_raise(|| ErrorKind::MissingField("id"))?;
        value.as_u64().ok_or_raise(|| ErrorKind::InvalidData {
            field: "id".to_string(),
            value: value.to_string(),
        })
    }

    /// A scalar field as text. Blank strings are treated as absent.
    pub fn string(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            Value::String(s) if s.trim().is_empty() => None,
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// A multi-valued field. Accepts a JSON array, or a single string split
    /// on `separator`.
    pub fn strings(&self, key: &str, separator: &str) -> Vec<String> {
        let items: Vec<String> = match self.get(key) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| match v {
                    Value::String(s) => Some(s.clone()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .collect(),
            Some(Value::String(s)) => s.split(separator).map(str::to_string).collect(),
            _ => Vec::new(),
        };
        items.into_iter().map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect()
    }

    pub fn number(&self, key: &str) -> Result<Option<f64>> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::Number(n)) => Ok(n.as_f64()),
            Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
            Some(other) => {
                let text = match other {
                    Value::String(s) => s.trim().to_string(),
                    v => v.to_string(),
                };
                text.parse::<f64>().map(Some).ok().ok_or_raise(|| ErrorKind::InvalidData {
                    field: key.to_string(),
                    value: text.clone(),
                })
            },
        }
    }

    /// An RFC 3339 timestamp. The catalog's placeholder for "undefined"
    /// (year 101) reads as `None`.
    pub fn timestamp(&self, key: &str) -> Result<Option<OffsetDateTime>> {
        let Some(text) = self.string(key) else {
            return Ok(None);
        };
        let parsed = OffsetDateTime::parse(text.trim(), &Rfc3339).ok().ok_or_raise(|| ErrorKind::InvalidData {
            field: key.to_string(),
            value: text.clone(),
        })?;
        Ok((parsed.year() > UNDEFINED_YEAR).then_some(parsed))
    }

    /// A JSON object of string values, e.g. `identifiers`.
    pub fn map(&self, key: &str) -> Vec<(String, String)> {
        match self.get(key) {
            Some(Value::Object(map)) => map
                .iter()
                .filter_map(|(k, v)| match v {
                    Value::String(s) => Some((k.clone(), s.clone())),
                    Value::Number(n) => Some((k.clone(), n.to_string())),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

impl From<Map<String, Value>> for Row {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}
