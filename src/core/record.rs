//! Log record structure and its field values

use super::severity::Severity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One value in a record's positional data or context fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl FieldValue {
    /// Bridge into `serde_json` for the JSON sink.
    ///
    /// Non-finite floats have no JSON representation and collapse to null.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            FieldValue::Str(s) => s.as_str().into(),
            FieldValue::Int(i) => (*i).into(),
            FieldValue::Float(f) => serde_json::Number::from_f64(*f)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            FieldValue::Bool(b) => (*b).into(),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Str(s) => write!(f, "{}", s),
            FieldValue::Int(i) => write!(f, "{}", i),
            FieldValue::Float(fl) => write!(f, "{}", fl),
            FieldValue::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Str(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Str(s)
    }
}

impl From<i32> for FieldValue {
    fn from(i: i32) -> Self {
        FieldValue::Int(i64::from(i))
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        FieldValue::Int(i)
    }
}

impl From<f64> for FieldValue {
    fn from(f: f64) -> Self {
        FieldValue::Float(f)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

/// Key-value fields attached to a record.
///
/// Fields are kept sorted by key, so rendered lines and JSON objects come
/// out in a deterministic order regardless of insertion order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogContext {
    fields: Vec<(String, FieldValue)>,
}

impl LogContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field, replacing any previous value under the same key.
    #[must_use]
    pub fn with_field<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<FieldValue>,
    {
        let key = key.into();
        match self.fields.binary_search_by(|(k, _)| k.as_str().cmp(&key)) {
            Ok(pos) => self.fields[pos].1 = value.into(),
            Err(pos) => self.fields.insert(pos, (key, value.into())),
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields
            .binary_search_by(|(k, _)| k.as_str().cmp(key))
            .ok()
            .map(|pos| &self.fields[pos].1)
    }

    /// Fields in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl fmt::Display for LogContext {
    /// `key=value` pairs separated by single spaces.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (key, value) in self.iter() {
            if !first {
                write!(f, " ")?;
            }
            write!(f, "{}={}", key, value)?;
            first = false;
        }
        Ok(())
    }
}

/// A single log emission, tagged with the routing triple
/// `(severity, application, module)` that conditions match on.
///
/// `format` plus `data` are handed to writers as-is; [`LogRecord::render`]
/// produces the substituted message for text-oriented writers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
    pub severity: Severity,
    pub application: String,
    pub module: String,
    pub timestamp: DateTime<Utc>,
    pub format: String,
    pub data: Vec<FieldValue>,
    #[serde(default, skip_serializing_if = "LogContext::is_empty")]
    pub context: LogContext,
}

impl LogRecord {
    /// Sanitize the format string to prevent log injection attacks
    ///
    /// Replaces newlines, carriage returns, and tabs with escape sequences
    /// so a crafted message cannot fabricate additional log lines.
    fn sanitize(format: &str) -> String {
        format
            .replace('\n', "\\n")
            .replace('\r', "\\r")
            .replace('\t', "\\t")
    }

    pub fn new(
        severity: Severity,
        application: impl Into<String>,
        module: impl Into<String>,
        format: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            application: application.into(),
            module: module.into(),
            timestamp: Utc::now(),
            format: Self::sanitize(&format.into()),
            data: Vec::new(),
            context: LogContext::new(),
        }
    }

    pub fn with_data(mut self, data: Vec<FieldValue>) -> Self {
        self.data = data;
        self
    }

    pub fn with_context(mut self, context: LogContext) -> Self {
        self.context = context;
        self
    }

    /// Substitute `{}` placeholders in `format` with `data` values in order.
    ///
    /// Placeholders beyond the data run out stay literal; surplus data is
    /// ignored.
    pub fn render(&self) -> String {
        if self.data.is_empty() {
            return self.format.clone();
        }

        let mut out = String::with_capacity(self.format.len() + self.data.len() * 8);
        let mut rest = self.format.as_str();
        let mut next = 0;

        while let Some(pos) = rest.find("{}") {
            if next >= self.data.len() {
                break;
            }
            out.push_str(&rest[..pos]);
            out.push_str(&self.data[next].to_string());
            next += 1;
            rest = &rest[pos + 2..];
        }
        out.push_str(rest);
        out
    }
}
