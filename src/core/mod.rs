//! Core routing types and traits

pub mod channel;
pub mod condition;
pub mod dispatcher;
pub mod error;
pub mod index;
pub mod lifetime;
pub mod record;
pub mod registry;
pub mod severity;
pub mod sink;

pub use channel::{ChannelHub, HubConfig};
pub use condition::{diff, Condition, ConditionDiff, MatchKey, SeverityFilter};
pub use dispatcher::{Diagnostic, Dispatcher};
pub use error::{Result, RouterError};
pub use index::{IndexEntry, IndexTable};
pub use lifetime::Lifetime;
pub use record::{FieldValue, LogContext, LogRecord};
pub use registry::{IfExists, InstallOptions};
pub use severity::Severity;
pub use sink::{SinkHandle, SinkTask, Writer, WriterPublisher, WriterSlot, WriterSource};
