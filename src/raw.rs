//! Raw tag bag as reported by an extraction tool
//!
//! Values are either text or integers. A tag that the tool did not report is
//! simply not present; an empty string is a present (empty) value.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::error::{MetadataError, Result};

/// A single raw tag value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Integer(i64),
    Text(String),
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        RawValue::Text(s.to_string())
    }
}

impl From<String> for RawValue {
    fn from(s: String) -> Self {
        RawValue::Text(s)
    }
}

impl From<i64> for RawValue {
    fn from(n: i64) -> Self {
        RawValue::Integer(n)
    }
}

impl From<i32> for RawValue {
    fn from(n: i32) -> Self {
        RawValue::Integer(n as i64)
    }
}

impl From<u32> for RawValue {
    fn from(n: u32) -> Self {
        RawValue::Integer(n as i64)
    }
}

/// Flat tag-name to value mapping for one item
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawMetadata {
    tags: HashMap<String, RawValue>,
}

impl RawMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, tag: impl Into<String>, value: impl Into<RawValue>) {
        self.tags.insert(tag.into(), value.into());
    }

    /// Builder-style insert, handy for tests and callers assembling tags by hand.
    pub fn with(mut self, tag: impl Into<String>, value: impl Into<RawValue>) -> Self {
        self.insert(tag, value);
        self
    }

    pub fn get(&self, tag: &str) -> Option<&RawValue> {
        self.tags.get(tag)
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.tags.contains_key(tag)
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Read a tag as an integer. Text values are trimmed and parsed.
    ///
    /// Returns `None` when the tag is absent, `Some(Err(text))` when present
    /// but not an integer.
    pub fn get_int(&self, tag: &str) -> Option<std::result::Result<i64, String>> {
        self.tags.get(tag).map(|v| match v {
            RawValue::Integer(n) => Ok(*n),
            RawValue::Text(s) => s.trim().parse::<i64>().map_err(|_| s.clone()),
        })
    }

    /// Read a tag as a string. Integers are rendered in decimal.
    pub fn get_string(&self, tag: &str) -> Option<String> {
        self.tags.get(tag).map(|v| match v {
            RawValue::Integer(n) => n.to_string(),
            RawValue::Text(s) => s.clone(),
        })
    }

    /// Build a tag bag from a JSON object.
    ///
    /// Integral numbers become integers, other scalars become text, nulls are
    /// dropped, arrays are comma-joined and nested objects are skipped.
    pub fn from_json(value: &Value) -> Result<Self> {
        let obj = value.as_object().ok_or_else(|| {
            MetadataError::ExtractionError("Expected a JSON object of tags".to_string())
        })?;

        let mut raw = RawMetadata::new();
        for (key, v) in obj {
            if let Some(converted) = convert_json_value(v) {
                raw.tags.insert(key.clone(), converted);
            }
        }
        Ok(raw)
    }

    /// Parse `exiftool -j` output, which is an array with one object per file.
    pub fn from_exiftool_json(bytes: &[u8]) -> Result<Self> {
        let parsed: Vec<Value> = serde_json::from_slice(bytes)?;
        let first = parsed
            .first()
            .ok_or_else(|| MetadataError::ExtractionError("No metadata found".to_string()))?;
        Self::from_json(first)
    }
}

fn convert_json_value(v: &Value) -> Option<RawValue> {
    match v {
        Value::Null => None,
        Value::Bool(b) => Some(RawValue::Text(b.to_string())),
        Value::Number(n) => Some(match n.as_i64() {
            Some(i) => RawValue::Integer(i),
            None => RawValue::Text(n.to_string()),
        }),
        Value::String(s) => Some(RawValue::Text(s.clone())),
        Value::Array(items) => {
            let joined = items
                .iter()
                .filter_map(convert_json_value)
                .map(|item| match item {
                    RawValue::Integer(n) => n.to_string(),
                    RawValue::Text(s) => s,
                })
                .collect::<Vec<_>>()
                .join(", ");
            Some(RawValue::Text(joined))
        }
        Value::Object(_) => None,
    }
}
