//! JSON-lines writer for structured output

use crate::core::{LogRecord, Result, Writer};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write as IoWrite};
use std::path::PathBuf;

/// Writes each record as a single-line JSON object (JSONL format),
/// compatible with log aggregation tools like ELK and Loki.
pub struct JsonWriter {
    path: PathBuf,
    file: Mutex<BufWriter<File>>,
}

impl JsonWriter {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(BufWriter::new(file)),
        })
    }

    fn to_json(record: &LogRecord) -> Result<String> {
        let mut object = serde_json::Map::new();
        object.insert(
            "timestamp".to_string(),
            serde_json::Value::String(record.timestamp.to_rfc3339()),
        );
        object.insert(
            "severity".to_string(),
            serde_json::Value::String(record.severity.to_str().to_string()),
        );
        object.insert(
            "application".to_string(),
            serde_json::Value::String(record.application.clone()),
        );
        object.insert(
            "module".to_string(),
            serde_json::Value::String(record.module.clone()),
        );
        object.insert(
            "message".to_string(),
            serde_json::Value::String(record.render()),
        );
        for (key, value) in record.context.iter() {
            object.insert(key.to_string(), value.to_json());
        }

        Ok(serde_json::to_string(&serde_json::Value::Object(object))?)
    }
}

impl Writer for JsonWriter {
    fn write(&self, record: &LogRecord) -> Result<String> {
        let json = Self::to_json(record)?;

        let mut file = self.file.lock();
        writeln!(file, "{}", json)?;
        file.flush()?;
        Ok(json)
    }

    fn writee(&self) -> Option<String> {
        Some(self.path.display().to_string())
    }
}
