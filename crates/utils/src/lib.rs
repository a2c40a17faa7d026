pub mod config;
pub mod event;
pub mod footer;
pub mod forwarder;
pub mod message;
pub mod mime;
pub mod rewriter;
pub mod router;
pub mod sink;
pub mod sinks;
pub mod source;

pub use config::*;
pub use event::*;
pub use footer::*;
pub use forwarder::*;
pub use message::*;
pub use mime::*;
pub use rewriter::*;
pub use router::*;
pub use sink::*;
pub use sinks::*;
pub use source::*;
