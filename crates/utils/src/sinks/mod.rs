//! Concrete [`MessageSink`](crate::MessageSink) implementations.
//!
//! Contains [`FileStorageSink`] for writing forwarded copies to an outbox
//! directory and [`SmtpSink`] for relaying them through an SMTP server.

pub mod file_storage;
pub mod smtp;

pub use file_storage::*;
pub use smtp::*;
