//! Error types for the routing core

use crate::core::sink::SinkHandle;

pub type Result<T> = std::result::Result<T, RouterError>;

#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    /// Malformed id, condition, lifetime, or option value
    #[error("invalid {what}: {message}")]
    InvalidArgument { what: String, message: String },

    /// Administrative operation on a channel that does not exist or is shutting down
    #[error("channel '{channel}' is not running")]
    ChannelNotRunning { channel: String },

    /// Channel creation with a name already in use
    #[error("channel '{channel}' already exists")]
    ChannelAlreadyExists { channel: String },

    /// Install collision under `IfExists::Error`; carries the sink currently installed
    #[error("sink '{}' is already installed", .previous.id())]
    AlreadyInstalled { previous: SinkHandle },

    /// Uninstall/find/set_condition on an unknown sink id
    #[error("sink '{sink_id}' not found")]
    SinkNotFound { sink_id: String },

    /// A writer errored during dispatch; reported out-of-band, never raised to emitters
    #[error("writer for sink '{sink_id}' failed: {message}")]
    WriterFailure { sink_id: String, message: String },

    /// Control operation on a composite whose coordinator has stopped
    #[error("composite sink '{id}' is not running")]
    CompositeStopped { id: String },

    /// IO error from a writer implementation
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl RouterError {
    /// Create an invalid-argument error
    pub fn invalid(what: impl Into<String>, message: impl Into<String>) -> Self {
        RouterError::InvalidArgument {
            what: what.into(),
            message: message.into(),
        }
    }

    /// Create a channel-not-running error
    pub fn not_running(channel: impl Into<String>) -> Self {
        RouterError::ChannelNotRunning {
            channel: channel.into(),
        }
    }

    /// Create a sink-not-found error
    pub fn sink_not_found(sink_id: impl Into<String>) -> Self {
        RouterError::SinkNotFound {
            sink_id: sink_id.into(),
        }
    }

    /// Create a writer-failure error
    pub fn writer(sink_id: impl Into<String>, message: impl Into<String>) -> Self {
        RouterError::WriterFailure {
            sink_id: sink_id.into(),
            message: message.into(),
        }
    }
}
