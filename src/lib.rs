//! # Log Router System
//!
//! A channel-based log routing core: named channels carry log records
//! tagged with `(severity, application, module)` to every installed sink
//! whose condition matches, through a condition-indexed dispatch table.
//!
//! ## Features
//!
//! - **Near-constant-time matching**: per-record selection against a keyed
//!   index with descendant-count short-circuiting
//! - **Non-blocking hot path**: emitters only read; all mutations are
//!   serialised through a per-channel actor
//! - **Sink lifecycle**: infinite, timed, and external-task-bound
//!   lifetimes with automatic deregistration
//! - **Composite sinks**: supervised child sinks with a hot-swappable
//!   active writer
//!
//! ## Example
//!
//! ```no_run
//! use log_router_system::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let hub = Arc::new(ChannelHub::new());
//!     hub.create("app")?;
//!
//!     hub.install_sink(
//!         "app",
//!         SinkHandle::with_writer("console", Condition::Severity(Severity::Info), ConsoleWriter::new()),
//!         InstallOptions::new(),
//!     )
//!     .await?;
//!
//!     let dispatcher = Dispatcher::new(hub);
//!     let record = LogRecord::new(Severity::Warning, "web", "auth", "login failed");
//!     dispatcher.dispatch("app", &record);
//!     Ok(())
//! }
//! ```

pub mod core;
pub mod macros;
pub mod sinks;

pub mod prelude {
    pub use crate::core::{
        ChannelHub, Condition, Diagnostic, Dispatcher, FieldValue, HubConfig, IfExists,
        InstallOptions, Lifetime, LogContext, LogRecord, Result, RouterError, Severity,
        SeverityFilter, SinkHandle, SinkTask, Writer, WriterPublisher,
    };
    pub use crate::sinks::{
        CompositeConfig, CompositeHandle, CompositeSink, ConsoleWriter, FileWriter, JsonWriter,
        MemoryWriter,
    };
}

pub use crate::core::{
    ChannelHub, Condition, Diagnostic, Dispatcher, FieldValue, HubConfig, IfExists,
    InstallOptions, Lifetime, LogContext, LogRecord, Result, RouterError, Severity,
    SeverityFilter, SinkHandle, SinkTask, Writer, WriterPublisher,
};
pub use crate::sinks::{
    CompositeConfig, CompositeHandle, CompositeSink, ConsoleWriter, FileWriter, JsonWriter,
    MemoryWriter,
};
