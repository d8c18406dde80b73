//! File writer implementation

use crate::core::{LogRecord, Result, Writer};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write as IoWrite};
use std::path::PathBuf;

/// Append-only line-oriented file writer.
///
/// Shared between emitters, so the buffered handle sits behind a mutex;
/// each write flushes so the file is readable immediately after dispatch.
pub struct FileWriter {
    path: PathBuf,
    file: Mutex<BufWriter<File>>,
}

impl FileWriter {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(BufWriter::new(file)),
        })
    }
}

impl Writer for FileWriter {
    fn write(&self, record: &LogRecord) -> Result<String> {
        let mut line = format!(
            "[{}] [{:9}] [{}/{}] {}",
            record.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
            record.severity.to_str(),
            record.application,
            record.module,
            record.render()
        );
        if !record.context.is_empty() {
            line.push_str(" | ");
            line.push_str(&record.context.to_string());
        }

        let mut file = self.file.lock();
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;
        file.flush()?;
        Ok(line)
    }

    fn writee(&self) -> Option<String> {
        Some(self.path.display().to_string())
    }
}
