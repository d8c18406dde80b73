//! In-memory capture writer

use crate::core::{LogRecord, Result, Writer};
use parking_lot::RwLock;
use std::sync::Arc;

/// Collects written lines in memory.
///
/// Cloning shares the underlying buffer, so a test can keep one clone and
/// hand the other to a sink.
#[derive(Clone, Default)]
pub struct MemoryWriter {
    lines: Arc<RwLock<Vec<String>>>,
}

impl MemoryWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.read().clone()
    }

    pub fn clear(&self) {
        self.lines.write().clear();
    }
}

impl Writer for MemoryWriter {
    fn write(&self, record: &LogRecord) -> Result<String> {
        let mut line = format!(
            "[{:9}] [{}/{}] {}",
            record.severity.to_str(),
            record.application,
            record.module,
            record.render()
        );
        if !record.context.is_empty() {
            line.push_str(" | ");
            line.push_str(&record.context.to_string());
        }
        self.lines.write().push(line.clone());
        Ok(line)
    }

    fn writee(&self) -> Option<String> {
        Some("memory".to_string())
    }
}
