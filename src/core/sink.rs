//! Sink handles, writer trait, and the writer publish protocol

use super::condition::Condition;
use super::error::{Result, RouterError};
use super::record::LogRecord;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Output side of a sink.
///
/// Writers are shared between concurrent emitters, so `write` takes `&self`;
/// implementations that buffer use interior mutability. Errors are returned,
/// never raised past the dispatcher, which absorbs and reports them.
pub trait Writer: Send + Sync {
    /// Write one record; returns the data actually written.
    fn write(&self, record: &LogRecord) -> Result<String>;

    /// The ultimate write target, for introspection.
    fn writee(&self) -> Option<String> {
        None
    }
}

/// Replaceable cell holding a sink's current writer.
///
/// The index table resolves sink ids through these cells on every `select`,
/// so publishing a new writer here hot-swaps the sink's output without
/// touching the registration.
#[derive(Clone, Default)]
pub struct WriterSlot {
    current: Arc<RwLock<Option<Arc<dyn Writer>>>>,
}

impl WriterSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_writer(writer: Arc<dyn Writer>) -> Self {
        let slot = Self::new();
        slot.store(Some(writer));
        slot
    }

    pub fn load(&self) -> Option<Arc<dyn Writer>> {
        self.current.read().clone()
    }

    pub fn store(&self, writer: Option<Arc<dyn Writer>>) {
        *self.current.write() = writer;
    }
}

/// Per-child update stream of a composite coordinator.
pub(crate) type ChildUpdateSender = mpsc::UnboundedSender<(usize, Option<Arc<dyn Writer>>)>;

#[derive(Clone)]
enum PublisherInner {
    /// Publishes straight into the sink's writer slot.
    Slot(WriterSlot),
    /// Routes updates into a composite coordinator, tagged with the child index.
    Child { tx: ChildUpdateSender, index: usize },
}

/// Handle a spawned sink task uses to publish writers to its parent.
///
/// For a top-level sink the parent is the channel's writer slot; for a child
/// of a composite it is the coordinator, which caches the writer and
/// re-publishes upward when the child is active.
#[derive(Clone)]
pub struct WriterPublisher {
    inner: PublisherInner,
}

impl WriterPublisher {
    pub(crate) fn for_slot(slot: WriterSlot) -> Self {
        Self {
            inner: PublisherInner::Slot(slot),
        }
    }

    pub(crate) fn for_child(tx: ChildUpdateSender, index: usize) -> Self {
        Self {
            inner: PublisherInner::Child { tx, index },
        }
    }

    /// Publish the current writer upward; `None` retracts it.
    pub fn publish(&self, writer: Option<Arc<dyn Writer>>) {
        match &self.inner {
            PublisherInner::Slot(slot) => slot.store(writer),
            PublisherInner::Child { tx, index } => {
                // Coordinator may already be gone during teardown.
                let _ = tx.send((*index, writer));
            }
        }
    }
}

/// A supervised subordinate that produces writers asynchronously.
///
/// The task runs until `shutdown` fires and publishes every new writer
/// through the given publisher.
#[async_trait]
pub trait SinkTask: Send + Sync + 'static {
    async fn run(self: Arc<Self>, publisher: WriterPublisher, shutdown: CancellationToken);
}

/// How a sink obtains its writer.
#[derive(Clone)]
pub enum WriterSource {
    /// An immediate writer, available at install time.
    Static(Arc<dyn Writer>),
    /// A task spawned at install time that publishes writers upward.
    Task(Arc<dyn SinkTask>),
}

/// Immutable descriptor of an installable sink.
#[derive(Clone)]
pub struct SinkHandle {
    id: String,
    condition: Condition,
    source: WriterSource,
}

impl SinkHandle {
    pub fn with_writer<W: Writer + 'static>(
        id: impl Into<String>,
        condition: Condition,
        writer: W,
    ) -> Self {
        Self::with_shared_writer(id, condition, Arc::new(writer))
    }

    pub fn with_shared_writer(
        id: impl Into<String>,
        condition: Condition,
        writer: Arc<dyn Writer>,
    ) -> Self {
        Self {
            id: id.into(),
            condition,
            source: WriterSource::Static(writer),
        }
    }

    pub fn with_task(
        id: impl Into<String>,
        condition: Condition,
        task: Arc<dyn SinkTask>,
    ) -> Self {
        Self {
            id: id.into(),
            condition,
            source: WriterSource::Task(task),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn condition(&self) -> &Condition {
        &self.condition
    }

    pub fn source(&self) -> &WriterSource {
        &self.source
    }

    /// Replace the condition, keeping id and writer source.
    pub(crate) fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = condition;
        self
    }

    /// Ids are symbolic: non-empty, no whitespace or control characters.
    pub(crate) fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(RouterError::invalid("sink id", "must not be empty"));
        }
        if self
            .id
            .chars()
            .any(|c| c.is_whitespace() || c.is_control())
        {
            return Err(RouterError::invalid(
                "sink id",
                format!("'{}' contains whitespace or control characters", self.id),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for SinkHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SinkHandle")
            .field("id", &self.id)
            .field("condition", &self.condition)
            .field(
                "source",
                &match self.source {
                    WriterSource::Static(_) => "static",
                    WriterSource::Task(_) => "task",
                },
            )
            .finish()
    }
}
