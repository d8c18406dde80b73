//! Composite sink coordinator
//!
//! A composite groups an ordered collection of child sinks under a single
//! sink id. Children run as supervised subordinates and publish their
//! writers to the coordinator, which caches one writer per child and
//! exposes the *active* child's writer upward. Switching the active child
//! or receiving a writer update from it hot-swaps the composite's writer in
//! place; the channel registration is untouched.

use crate::core::error::{Result, RouterError};
use crate::core::sink::{
    ChildUpdateSender, SinkHandle, SinkTask, Writer, WriterPublisher, WriterSource,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

/// Coordinator configuration.
#[derive(Debug, Clone)]
pub struct CompositeConfig {
    /// How long start-up waits for spawned children to publish their first
    /// writer. One shared window; children that miss it stay writer-less
    /// until they publish.
    pub initial_writer_wait: Duration,
}

impl Default for CompositeConfig {
    fn default() -> Self {
        Self {
            initial_writer_wait: Duration::from_millis(100),
        }
    }
}

enum Control {
    GetChildren {
        reply: oneshot::Sender<Vec<SinkHandle>>,
    },
    SetActive {
        // 1-indexed child position
        index: usize,
        reply: oneshot::Sender<Result<()>>,
    },
    UnsetActive {
        reply: oneshot::Sender<()>,
    },
}

/// Control handle to a running coordinator.
#[derive(Clone)]
pub struct CompositeHandle {
    id: String,
    control: mpsc::Sender<Control>,
}

impl CompositeHandle {
    /// Read-only snapshot of the child collection.
    pub async fn get_children(&self) -> Result<Vec<SinkHandle>> {
        let (tx, rx) = oneshot::channel();
        self.send(Control::GetChildren { reply: tx }).await?;
        rx.await.map_err(|_| self.stopped())
    }

    /// Make the n-th child (1-indexed) active and publish its current
    /// writer upward, even if that writer is still absent.
    pub async fn set_active(&self, n: usize) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send(Control::SetActive { index: n, reply: tx }).await?;
        rx.await.map_err(|_| self.stopped())?
    }

    /// Retract the composite's writer: no child is active.
    pub async fn unset_active(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send(Control::UnsetActive { reply: tx }).await?;
        rx.await.map_err(|_| self.stopped())
    }

    async fn send(&self, control: Control) -> Result<()> {
        self.control
            .send(control)
            .await
            .map_err(|_| self.stopped())
    }

    fn stopped(&self) -> RouterError {
        RouterError::CompositeStopped {
            id: self.id.clone(),
        }
    }
}

/// The composite sink itself; install it with
/// [`SinkHandle::with_task`](crate::core::SinkHandle::with_task).
pub struct CompositeSink {
    id: String,
    children: Vec<SinkHandle>,
    config: CompositeConfig,
    control_rx: Mutex<Option<mpsc::Receiver<Control>>>,
    // Keeps the control channel open while the coordinator runs, so a
    // dropped handle does not stop it.
    _control_tx: mpsc::Sender<Control>,
}

impl CompositeSink {
    pub fn new(
        id: impl Into<String>,
        children: Vec<SinkHandle>,
    ) -> Result<(Arc<Self>, CompositeHandle)> {
        Self::with_config(id, children, CompositeConfig::default())
    }

    pub fn with_config(
        id: impl Into<String>,
        children: Vec<SinkHandle>,
        config: CompositeConfig,
    ) -> Result<(Arc<Self>, CompositeHandle)> {
        let id = id.into();
        if children.is_empty() {
            return Err(RouterError::invalid(
                "composite sink",
                "requires at least one child",
            ));
        }

        let (control_tx, control_rx) = mpsc::channel(16);
        let handle = CompositeHandle {
            id: id.clone(),
            control: control_tx.clone(),
        };
        let composite = Arc::new(Self {
            id,
            children,
            config,
            control_rx: Mutex::new(Some(control_rx)),
            _control_tx: control_tx,
        });
        Ok((composite, handle))
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

#[async_trait]
impl SinkTask for CompositeSink {
    async fn run(self: Arc<Self>, publisher: WriterPublisher, shutdown: CancellationToken) {
        let mut control = match self.control_rx.lock().take() {
            Some(rx) => rx,
            // Already started once; a second start has nothing to serve.
            None => return,
        };

        let (updates_tx, mut updates_rx): (ChildUpdateSender, _) = mpsc::unbounded_channel();
        let mut writers: Vec<Option<Arc<dyn Writer>>> = vec![None; self.children.len()];
        let mut child_tokens = Vec::new();
        let mut pending: HashSet<usize> = HashSet::new();

        for (index, child) in self.children.iter().enumerate() {
            match child.source() {
                WriterSource::Static(writer) => writers[index] = Some(Arc::clone(writer)),
                WriterSource::Task(task) => {
                    let token = shutdown.child_token();
                    tokio::spawn(Arc::clone(task).run(
                        WriterPublisher::for_child(updates_tx.clone(), index),
                        token.clone(),
                    ));
                    child_tokens.push(token);
                    pending.insert(index);
                }
            }
        }

        // Bounded gather of the children's initial writers; absentees stay
        // writer-less and can still publish later.
        if !pending.is_empty() {
            let deadline = tokio::time::Instant::now() + self.config.initial_writer_wait;
            while !pending.is_empty() {
                match tokio::time::timeout_at(deadline, updates_rx.recv()).await {
                    Ok(Some((index, writer))) => {
                        writers[index] = writer;
                        pending.remove(&index);
                    }
                    Ok(None) | Err(_) => break,
                }
            }
        }

        // Last child is active by default.
        let mut active: Option<usize> = Some(self.children.len() - 1);
        publisher.publish(active.and_then(|i| writers[i].clone()));

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                Some((index, writer)) = updates_rx.recv() => {
                    writers[index] = writer;
                    if active == Some(index) {
                        publisher.publish(writers[index].clone());
                    }
                }
                command = control.recv() => match command {
                    Some(Control::GetChildren { reply }) => {
                        let _ = reply.send(self.children.clone());
                    }
                    Some(Control::SetActive { index, reply }) => {
                        if index == 0 || index > self.children.len() {
                            let _ = reply.send(Err(RouterError::invalid(
                                "active child",
                                format!(
                                    "index {} out of range 1..={}",
                                    index,
                                    self.children.len()
                                ),
                            )));
                        } else {
                            active = Some(index - 1);
                            publisher.publish(writers[index - 1].clone());
                            let _ = reply.send(Ok(()));
                        }
                    }
                    Some(Control::UnsetActive { reply }) => {
                        active = None;
                        publisher.publish(None);
                        let _ = reply.send(());
                    }
                    None => break,
                }
            }
        }

        for token in child_tokens {
            token.cancel();
        }
    }
}
