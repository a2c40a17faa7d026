use std::{error::Error, fmt::Display, future::Future, pin::Pin};

use tokio::sync::RwLock;
use tracing::debug;

/// Result type for sink operations.
pub type SinkResult<T> = Result<T, SinkError>;

/// Boxed future type for sink operations, enabling object safety.
pub type SinkFuture<'a> = Pin<Box<dyn Future<Output = SinkResult<()>> + Send + 'a>>;

/// Errors that can occur while dispatching a forwarded message.
#[derive(Debug)]
pub enum SinkError {
    /// An I/O error occurred.
    Io(String),
    /// An envelope address could not be used.
    Address(String),
    /// The transport rejected or failed to deliver the message.
    Transport(String),
}

impl Display for SinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SinkError::Io(msg) => write!(f, "I/O error: {msg}"),
            SinkError::Address(msg) => write!(f, "Address error: {msg}"),
            SinkError::Transport(msg) => write!(f, "Transport error: {msg}"),
        }
    }
}

impl Error for SinkError {}

impl From<std::io::Error> for SinkError {
    fn from(e: std::io::Error) -> Self {
        SinkError::Io(e.to_string())
    }
}

/// Trait for sinks that transmit rewritten messages to a forward target.
///
/// Only the outbound direction is covered, each call handles exactly one
/// `(raw message, target)` pair.
pub trait MessageSink: Send + Sync {
    /// Sends the raw message to the given target.
    fn send<'a>(&'a self, raw: &'a [u8], target: &'a str) -> SinkFuture<'a>;

    /// Returns the name of this sink.
    fn name(&self) -> &str;
}

/// In-memory message sink that records every message it receives.
///
/// Useful for testing and development.
#[derive(Debug, Default)]
pub struct MemorySink {
    sent: RwLock<Vec<(String, Vec<u8>)>>,
}

impl MemorySink {
    /// Creates a new empty [`MemorySink`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the `(target, raw message)` pairs sent so far,
    /// in dispatch order.
    pub async fn sent(&self) -> Vec<(String, Vec<u8>)> {
        self.sent.read().await.clone()
    }
}

impl MessageSink for MemorySink {
    fn send<'a>(&'a self, raw: &'a [u8], target: &'a str) -> SinkFuture<'a> {
        Box::pin(async move {
            debug!(forward_to = %target, length = raw.len(), "Recording email in memory");
            self.sent
                .write()
                .await
                .push((target.to_string(), raw.to_vec()));
            Ok(())
        })
    }

    fn name(&self) -> &str {
        "memory"
    }
}
