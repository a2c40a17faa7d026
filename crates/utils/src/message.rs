//! Envelope types used throughout the forwarding pipeline.
//!
//! This module defines [`Envelope`], the SMTP-level metadata that
//! accompanies a raw inbound message, as opposed to the header set
//! carried inside the message itself.

/// Separator used whenever the destination list is rendered as text,
/// in headers and in the forwarding footer.
pub const ADDRESS_SEPARATOR: &str = ", ";

/// A single resolved destination address for one outbound copy.
pub type ForwardTarget = String;

/// Represents the original SMTP envelope of an inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Identifier of the message, used as the key when fetching the
    /// raw bytes from a message source.
    pub message_id: String,

    /// Envelope sender address.
    pub source: String,

    /// Ordered list of envelope recipient addresses.
    pub destinations: Vec<String>,
}

impl Envelope {
    pub fn new(message_id: String, source: String, destinations: Vec<String>) -> Self {
        Self {
            message_id,
            source,
            destinations,
        }
    }

    pub fn from_raw(message_id: &str, source: &str, destinations: &[&str]) -> Self {
        Self::new(
            message_id.to_string(),
            source.to_string(),
            destinations.iter().map(|d| d.to_string()).collect(),
        )
    }

    /// Returns the destination list as a single comma separated string.
    pub fn joined_destinations(&self) -> String {
        self.destinations.join(ADDRESS_SEPARATOR)
    }
}
