//! Process-wide channel table and administrative surface
//!
//! A [`ChannelHub`] owns every channel in the process. Administrative calls
//! are forwarded to the channel's registry actor; the emitter-facing
//! [`select_sinks`](ChannelHub::select_sinks) path reads the channel's index
//! directly and never errors, so emitters can keep logging during shutdown.

use super::condition::Condition;
use super::error::{Result, RouterError};
use super::index::IndexTable;
use super::registry::{ChannelActor, Command, InstallOptions};
use super::severity::Severity;
use super::sink::{SinkHandle, Writer};
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Hub configuration.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Capacity of each channel actor's command inbox.
    pub command_queue: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self { command_queue: 64 }
    }
}

#[derive(Clone)]
struct ChannelClient {
    commands: tokio::sync::mpsc::Sender<Command>,
    index: Arc<RwLock<IndexTable>>,
    shutdown: tokio_util::sync::CancellationToken,
    join: Arc<Mutex<Option<JoinHandle<()>>>>,
}

/// Named channels and the operations on them.
///
/// Channel creation spawns the registry actor, so the hub must be used from
/// within a Tokio runtime.
pub struct ChannelHub {
    channels: DashMap<String, ChannelClient>,
    config: HubConfig,
}

impl ChannelHub {
    pub fn new() -> Self {
        Self::with_config(HubConfig::default())
    }

    pub fn with_config(config: HubConfig) -> Self {
        Self {
            channels: DashMap::new(),
            config,
        }
    }

    /// Create a channel.
    pub fn create(&self, channel: &str) -> Result<()> {
        if channel.is_empty() || channel.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(RouterError::invalid(
                "channel id",
                format!("'{}' is not a symbolic name", channel),
            ));
        }

        use dashmap::mapref::entry::Entry;
        match self.channels.entry(channel.to_string()) {
            Entry::Occupied(_) => Err(RouterError::ChannelAlreadyExists {
                channel: channel.to_string(),
            }),
            Entry::Vacant(slot) => {
                let spawned = ChannelActor::spawn(self.config.command_queue);
                slot.insert(ChannelClient {
                    commands: spawned.commands,
                    index: spawned.index,
                    shutdown: spawned.shutdown,
                    join: Arc::new(Mutex::new(Some(spawned.join))),
                });
                Ok(())
            }
        }
    }

    /// Delete a channel: the actor tears down every registration (cancelling
    /// lifetimes and sink tasks) and clears the index.
    pub async fn delete(&self, channel: &str) -> Result<()> {
        let (_, client) = self
            .channels
            .remove(channel)
            .ok_or_else(|| RouterError::not_running(channel))?;

        client.shutdown.cancel();
        let join = client.join.lock().take();
        if let Some(join) = join {
            let _ = join.await;
        }
        Ok(())
    }

    pub fn list_channels(&self) -> Vec<String> {
        let mut names: Vec<String> = self.channels.iter().map(|c| c.key().clone()).collect();
        names.sort_unstable();
        names
    }

    pub async fn install_sink(
        &self,
        channel: &str,
        sink: SinkHandle,
        options: InstallOptions,
    ) -> Result<Option<SinkHandle>> {
        self.request(channel, |reply| Command::Install {
            sink,
            options,
            reply,
        })
        .await?
    }

    pub async fn uninstall_sink(&self, channel: &str, sink_id: &str) -> Result<SinkHandle> {
        self.request(channel, |reply| Command::Uninstall {
            sink_id: sink_id.to_string(),
            reply,
        })
        .await?
    }

    pub async fn find_sink(&self, channel: &str, sink_id: &str) -> Result<SinkHandle> {
        self.request(channel, |reply| Command::Find {
            sink_id: sink_id.to_string(),
            reply,
        })
        .await?
    }

    pub async fn list_sinks(&self, channel: &str) -> Result<Vec<SinkHandle>> {
        self.request(channel, |reply| Command::List { reply }).await
    }

    /// Replace a sink's condition, returning the previous one.
    pub async fn set_condition(
        &self,
        channel: &str,
        sink_id: &str,
        condition: Condition,
    ) -> Result<Condition> {
        self.request(channel, |reply| Command::SetCondition {
            sink_id: sink_id.to_string(),
            condition,
            reply,
        })
        .await?
    }

    /// Writers matching `(severity, application, module)` on this channel.
    ///
    /// Never errors: an unknown or already-deleted channel yields an empty
    /// list.
    pub fn select_sinks(
        &self,
        channel: &str,
        severity: Severity,
        application: &str,
        module: &str,
    ) -> Vec<Arc<dyn Writer>> {
        self.select_entries(channel, severity, application, module)
            .into_iter()
            .map(|(_, writer)| writer)
            .collect()
    }

    /// Sink ids matching `(severity, application, module)`, sorted.
    pub fn matching_sink_ids(
        &self,
        channel: &str,
        severity: Severity,
        application: &str,
        module: &str,
    ) -> Vec<String> {
        self.select_entries(channel, severity, application, module)
            .into_iter()
            .map(|(id, _)| id)
            .collect()
    }

    pub(crate) fn select_entries(
        &self,
        channel: &str,
        severity: Severity,
        application: &str,
        module: &str,
    ) -> Vec<(String, Arc<dyn Writer>)> {
        let index = match self.channels.get(channel) {
            Some(client) => Arc::clone(&client.index),
            None => return Vec::new(),
        };
        let guard = index.read();
        guard.select(severity, application, module)
    }

    /// Send a command to the channel actor and await its reply.
    ///
    /// Transport failures (inbox closed, actor gone mid-shutdown) map to
    /// `ChannelNotRunning`.
    async fn request<T>(
        &self,
        channel: &str,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T> {
        let commands = self
            .channels
            .get(channel)
            .map(|client| client.commands.clone())
            .ok_or_else(|| RouterError::not_running(channel))?;

        let (tx, rx) = oneshot::channel();
        commands
            .send(make(tx))
            .await
            .map_err(|_| RouterError::not_running(channel))?;
        rx.await.map_err(|_| RouterError::not_running(channel))
    }
}

impl Default for ChannelHub {
    fn default() -> Self {
        Self::new()
    }
}
