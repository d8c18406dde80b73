//! Console writer implementation

use crate::core::{LogRecord, Result, Severity, Writer};
use colored::Colorize;

pub struct ConsoleWriter {
    use_colors: bool,
}

impl ConsoleWriter {
    pub fn new() -> Self {
        Self { use_colors: true }
    }

    pub fn with_colors(use_colors: bool) -> Self {
        Self { use_colors }
    }
}

impl Default for ConsoleWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl Writer for ConsoleWriter {
    fn write(&self, record: &LogRecord) -> Result<String> {
        let severity_str = if self.use_colors {
            format!("{:9}", record.severity.to_str())
                .color(record.severity.color_code())
                .to_string()
        } else {
            format!("{:9}", record.severity.to_str())
        };

        let mut output = format!(
            "[{}] [{}] [{}/{}] {}",
            record.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
            severity_str,
            record.application,
            record.module,
            record.render()
        );
        if !record.context.is_empty() {
            output.push_str(" | ");
            output.push_str(&record.context.to_string());
        }

        // Error and above go to stderr, the rest to stdout
        if record.severity >= Severity::Error {
            eprintln!("{}", output);
        } else {
            println!("{}", output);
        }
        Ok(output)
    }

    fn writee(&self) -> Option<String> {
        Some("console".to_string())
    }
}
