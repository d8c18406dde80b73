//! Per-channel registry actor
//!
//! All administrative mutations for a channel run inside one task, giving a
//! total order over installs, uninstalls, condition changes, and lifetime
//! expiries. The actor is the index table's single writer; emitters only
//! ever read it.

use super::condition::{Condition, MatchKey};
use super::error::{Result, RouterError};
use super::index::IndexTable;
use super::lifetime::{self, Expiry, Lifetime, LifetimeHandle};
use super::sink::{SinkHandle, WriterPublisher, WriterSlot, WriterSource};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Collision policy for [`install`](crate::core::channel::ChannelHub::install_sink).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IfExists {
    /// Fail with `AlreadyInstalled`, state unchanged.
    #[default]
    Error,
    /// Keep the existing registration, return it.
    Ignore,
    /// Cancel the existing registration and replace it atomically.
    Supersede,
}

/// Options accepted by install.
#[derive(Debug, Clone, Default)]
pub struct InstallOptions {
    pub lifetime: Lifetime,
    pub if_exists: IfExists,
}

impl InstallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn lifetime(mut self, lifetime: Lifetime) -> Self {
        self.lifetime = lifetime;
        self
    }

    #[must_use]
    pub fn if_exists(mut self, if_exists: IfExists) -> Self {
        self.if_exists = if_exists;
        self
    }
}

pub(crate) enum Command {
    Install {
        sink: SinkHandle,
        options: InstallOptions,
        reply: oneshot::Sender<Result<Option<SinkHandle>>>,
    },
    Uninstall {
        sink_id: String,
        reply: oneshot::Sender<Result<SinkHandle>>,
    },
    Find {
        sink_id: String,
        reply: oneshot::Sender<Result<SinkHandle>>,
    },
    List {
        reply: oneshot::Sender<Vec<SinkHandle>>,
    },
    SetCondition {
        sink_id: String,
        condition: Condition,
        reply: oneshot::Sender<Result<Condition>>,
    },
}

/// Registry entry, private to the actor.
struct Registration {
    sink: SinkHandle,
    keys: Vec<MatchKey>,
    lifetime: LifetimeHandle,
    lifetime_token: u64,
    task_shutdown: Option<CancellationToken>,
}

pub(crate) struct ChannelActor {
    entries: HashMap<String, Registration>,
    index: Arc<RwLock<IndexTable>>,
    expiries_tx: mpsc::Sender<Expiry>,
    next_token: u64,
    shutdown: CancellationToken,
}

pub(crate) struct SpawnedChannel {
    pub commands: mpsc::Sender<Command>,
    pub index: Arc<RwLock<IndexTable>>,
    pub shutdown: CancellationToken,
    pub join: JoinHandle<()>,
}

impl ChannelActor {
    /// Start the actor task for one channel.
    pub fn spawn(queue_depth: usize) -> SpawnedChannel {
        let (commands_tx, commands_rx) = mpsc::channel(queue_depth.max(1));
        let (expiries_tx, expiries_rx) = mpsc::channel(queue_depth.max(1));
        let index = Arc::new(RwLock::new(IndexTable::new()));
        let shutdown = CancellationToken::new();

        let actor = ChannelActor {
            entries: HashMap::new(),
            index: Arc::clone(&index),
            expiries_tx,
            next_token: 0,
            shutdown: shutdown.clone(),
        };
        let join = tokio::spawn(actor.run(commands_rx, expiries_rx));

        SpawnedChannel {
            commands: commands_tx,
            index,
            shutdown,
            join,
        }
    }

    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut expiries: mpsc::Receiver<Expiry>,
    ) {
        let shutdown = self.shutdown.clone();
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                Some(expiry) = expiries.recv() => self.handle_expiry(expiry),
                cmd = commands.recv() => match cmd {
                    Some(cmd) => self.handle(cmd),
                    None => break,
                },
            }
        }
        self.teardown();
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Install {
                sink,
                options,
                reply,
            } => {
                let _ = reply.send(self.install(sink, options));
            }
            Command::Uninstall { sink_id, reply } => {
                let _ = reply.send(self.uninstall(&sink_id));
            }
            Command::Find { sink_id, reply } => {
                let _ = reply.send(
                    self.entries
                        .get(&sink_id)
                        .map(|r| r.sink.clone())
                        .ok_or_else(|| RouterError::sink_not_found(&sink_id)),
                );
            }
            Command::List { reply } => {
                let mut sinks: Vec<SinkHandle> =
                    self.entries.values().map(|r| r.sink.clone()).collect();
                sinks.sort_by(|a, b| a.id().cmp(b.id()));
                let _ = reply.send(sinks);
            }
            Command::SetCondition {
                sink_id,
                condition,
                reply,
            } => {
                let _ = reply.send(self.set_condition(&sink_id, condition));
            }
        }
    }

    fn install(
        &mut self,
        sink: SinkHandle,
        options: InstallOptions,
    ) -> Result<Option<SinkHandle>> {
        sink.validate()?;
        options.lifetime.validate()?;
        let new_keys = sink.condition().normalise()?;

        if let Some(existing) = self.entries.get(sink.id()) {
            match options.if_exists {
                IfExists::Error => {
                    return Err(RouterError::AlreadyInstalled {
                        previous: existing.sink.clone(),
                    });
                }
                IfExists::Ignore => return Ok(Some(existing.sink.clone())),
                IfExists::Supersede => {}
            }
        }

        let previous = self.entries.remove(sink.id());
        let old_keys = previous
            .as_ref()
            .map(|r| r.keys.clone())
            .unwrap_or_default();
        if let Some(prev) = &previous {
            prev.lifetime.cancel();
            if let Some(token) = &prev.task_shutdown {
                token.cancel();
            }
        }

        let slot = WriterSlot::new();
        let task_shutdown = match sink.source() {
            WriterSource::Static(writer) => {
                slot.store(Some(Arc::clone(writer)));
                None
            }
            WriterSource::Task(task) => {
                let token = self.shutdown.child_token();
                let publisher = WriterPublisher::for_slot(slot.clone());
                tokio::spawn(Arc::clone(task).run(publisher, token.clone()));
                Some(token)
            }
        };

        // Single write guard: emitters see the old registration or the new
        // one, never a half-applied diff.
        self.index
            .write()
            .register(sink.id(), slot, &new_keys, &old_keys);

        self.next_token += 1;
        let lifetime_token = self.next_token;
        let lifetime = lifetime::watch(
            &options.lifetime,
            sink.id(),
            lifetime_token,
            self.expiries_tx.clone(),
        );

        self.entries.insert(
            sink.id().to_string(),
            Registration {
                sink,
                keys: new_keys,
                lifetime,
                lifetime_token,
                task_shutdown,
            },
        );

        Ok(previous.map(|r| r.sink))
    }

    fn uninstall(&mut self, sink_id: &str) -> Result<SinkHandle> {
        let registration = self
            .entries
            .remove(sink_id)
            .ok_or_else(|| RouterError::sink_not_found(sink_id))?;

        registration.lifetime.cancel();
        if let Some(token) = &registration.task_shutdown {
            token.cancel();
        }
        self.index.write().deregister(sink_id, &registration.keys);

        Ok(registration.sink)
    }

    fn set_condition(&mut self, sink_id: &str, condition: Condition) -> Result<Condition> {
        let new_keys = condition.normalise()?;
        let registration = self
            .entries
            .get_mut(sink_id)
            .ok_or_else(|| RouterError::sink_not_found(sink_id))?;

        self.index
            .write()
            .reindex(sink_id, &new_keys, &registration.keys);

        let previous = registration.sink.condition().clone();
        registration.sink = registration.sink.clone().with_condition(condition);
        registration.keys = new_keys;
        Ok(previous)
    }

    /// Expiries are matched by token identity; a token left over from a
    /// replaced or uninstalled registration is dropped silently.
    fn handle_expiry(&mut self, expiry: Expiry) {
        let matched = self
            .entries
            .get(&expiry.sink_id)
            .is_some_and(|r| r.lifetime_token == expiry.token);
        if matched {
            let _ = self.uninstall(&expiry.sink_id);
        }
    }

    fn teardown(&mut self) {
        for (_, registration) in self.entries.drain() {
            registration.lifetime.cancel();
            if let Some(token) = &registration.task_shutdown {
                token.cancel();
            }
        }
        self.index.write().clear();
    }
}
