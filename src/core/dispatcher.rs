//! Emission fan-out
//!
//! One call per log record: match against the channel's index, then invoke
//! each resolved writer. Writer failures are isolated per sink and reported
//! out-of-band; emitters never see them.

use super::channel::ChannelHub;
use super::record::LogRecord;
use crossbeam_channel::{bounded, Receiver, Sender};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Out-of-band report of a failed or panicked writer.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub channel: String,
    pub sink_id: String,
    pub message: String,
}

pub struct Dispatcher {
    hub: Arc<ChannelHub>,
    dispatched: AtomicU64,
    failed_writes: AtomicU64,
    diagnostics: Option<Sender<Diagnostic>>,
}

impl Dispatcher {
    pub fn new(hub: Arc<ChannelHub>) -> Self {
        Self {
            hub,
            dispatched: AtomicU64::new(0),
            failed_writes: AtomicU64::new(0),
            diagnostics: None,
        }
    }

    /// Create a dispatcher with a bounded diagnostics stream.
    ///
    /// Reports that would overflow the stream are dropped (the failure
    /// counter still advances); diagnostics must never become backpressure
    /// on the emission path.
    pub fn with_diagnostics(hub: Arc<ChannelHub>, capacity: usize) -> (Self, Receiver<Diagnostic>) {
        let (tx, rx) = bounded(capacity);
        let mut dispatcher = Self::new(hub);
        dispatcher.diagnostics = Some(tx);
        (dispatcher, rx)
    }

    pub fn hub(&self) -> &ChannelHub {
        &self.hub
    }

    /// Route one record; returns the number of writers that wrote it.
    ///
    /// **Per-writer panic isolation**: each writer runs under `catch_unwind`
    /// so one failing sink cannot stop the rest of the fan-out.
    pub fn dispatch(&self, channel: &str, record: &LogRecord) -> usize {
        let entries =
            self.hub
                .select_entries(channel, record.severity, &record.application, &record.module);

        let mut written = 0;
        for (sink_id, writer) in entries {
            match catch_unwind(AssertUnwindSafe(|| writer.write(record))) {
                Ok(Ok(_)) => written += 1,
                Ok(Err(e)) => self.report(channel, &sink_id, e.to_string()),
                Err(panic) => self.report(channel, &sink_id, panic_message(panic)),
            }
        }

        self.dispatched.fetch_add(1, Ordering::Relaxed);
        written
    }

    fn report(&self, channel: &str, sink_id: &str, message: String) {
        self.failed_writes.fetch_add(1, Ordering::Relaxed);

        if let Some(tx) = &self.diagnostics {
            let diagnostic = Diagnostic {
                channel: channel.to_string(),
                sink_id: sink_id.to_string(),
                message,
            };
            if tx.try_send(diagnostic).is_ok() {
                return;
            }
        } else {
            eprintln!(
                "[ROUTER ERROR] writer for sink '{}' on channel '{}' failed: {}",
                sink_id, channel, message
            );
        }
    }

    /// Total records dispatched (including those that matched no sink).
    pub fn dispatched_count(&self) -> u64 {
        self.dispatched.load(Ordering::Relaxed)
    }

    /// Total writer invocations that errored or panicked.
    pub fn failed_write_count(&self) -> u64 {
        self.failed_writes.load(Ordering::Relaxed)
    }
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
