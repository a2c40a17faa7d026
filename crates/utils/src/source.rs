//! Retrieval of raw inbound messages.
//!
//! A [`MessageSource`] hands out the raw bytes of an inbound message given
//! its identifier, the way an object store keyed by message id would.

use std::{collections::HashMap, fmt::Display, future::Future, io, path::PathBuf, pin::Pin};

use tokio::{fs, sync::RwLock};
use tracing::{debug, info};

/// Result type for source operations.
pub type SourceResult<T> = Result<T, SourceError>;

/// Boxed future type for source operations, enabling object safety.
pub type SourceFuture<'a> = Pin<Box<dyn Future<Output = SourceResult<Vec<u8>>> + Send + 'a>>;

/// Errors that can occur while fetching a message.
#[derive(Debug)]
pub enum SourceError {
    /// No message exists for the given identifier.
    NotFound(String),
    /// The identifier can not be turned into a storage key.
    InvalidKey(String),
    /// An I/O error occurred.
    Io(io::Error),
}

impl Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceError::NotFound(id) => write!(f, "Message not found: {id}"),
            SourceError::InvalidKey(id) => write!(f, "Invalid message key: {id}"),
            SourceError::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for SourceError {}

impl From<io::Error> for SourceError {
    fn from(e: io::Error) -> Self {
        SourceError::Io(e)
    }
}

/// Trait for sources that supply the raw bytes of inbound messages.
pub trait MessageSource: Send + Sync {
    /// Fetches the raw message stored under the given identifier.
    fn fetch<'a>(&'a self, message_id: &'a str) -> SourceFuture<'a>;

    /// Returns the name of this source.
    fn name(&self) -> &str;
}

/// Filesystem-based message source.
///
/// Reads each message from `{base_path}/{prefix}{message_id}`, the prefix
/// may contain a sub-directory (e.g. `emails/`).
#[derive(Debug, Clone)]
pub struct FileMessageSource {
    base_path: PathBuf,
    prefix: String,
}

impl FileMessageSource {
    /// Creates a new [`FileMessageSource`] with the given base path and key prefix.
    pub fn new(base_path: PathBuf, prefix: String) -> Self {
        info!(
            path = %base_path.display(),
            prefix = %prefix,
            "File message source initialized"
        );
        Self { base_path, prefix }
    }

    /// Returns the path of the file holding the given message.
    pub fn message_path(&self, message_id: &str) -> SourceResult<PathBuf> {
        if message_id.is_empty()
            || message_id.contains(['/', '\\'])
            || message_id == "."
            || message_id == ".."
        {
            return Err(SourceError::InvalidKey(message_id.to_string()));
        }
        Ok(self
            .base_path
            .join(format!("{}{}", self.prefix, message_id)))
    }
}

impl MessageSource for FileMessageSource {
    fn fetch<'a>(&'a self, message_id: &'a str) -> SourceFuture<'a> {
        Box::pin(async move {
            let path = self.message_path(message_id)?;
            debug!(path = %path.display(), "Reading email from filesystem");
            fs::read(&path).await.map_err(|e| {
                if e.kind() == io::ErrorKind::NotFound {
                    SourceError::NotFound(message_id.to_string())
                } else {
                    SourceError::Io(e)
                }
            })
        })
    }

    fn name(&self) -> &str {
        "file_storage"
    }
}

/// In-memory message source.
///
/// Holds raw messages in a `HashMap` keyed by message id.
/// Useful for testing and development.
#[derive(Debug, Default)]
pub struct MemoryMessageSource {
    messages: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryMessageSource {
    /// Creates a new empty [`MemoryMessageSource`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a raw message under the given identifier, replacing any
    /// previous one.
    pub async fn insert(&self, message_id: &str, raw: Vec<u8>) {
        self.messages
            .write()
            .await
            .insert(message_id.to_string(), raw);
    }
}

impl MessageSource for MemoryMessageSource {
    fn fetch<'a>(&'a self, message_id: &'a str) -> SourceFuture<'a> {
        Box::pin(async move {
            self.messages
                .read()
                .await
                .get(message_id)
                .cloned()
                .ok_or_else(|| SourceError::NotFound(message_id.to_string()))
        })
    }

    fn name(&self) -> &str {
        "memory"
    }
}
