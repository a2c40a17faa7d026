//! SMTP relay message sink.
//!
//! Provides [`SmtpSink`], a [`MessageSink`](crate::MessageSink) that hands
//! the rewritten bytes untouched to an upstream SMTP server.

use lettre::{
    address::Envelope as SmtpEnvelope, transport::smtp::authentication::Credentials, Address,
    AsyncSmtpTransport, AsyncTransport, Tokio1Executor,
};
use tracing::{debug, error, info};

use crate::sink::{MessageSink, SinkError, SinkFuture, SinkResult};

/// Message sink that relays forwarded emails through an SMTP server.
///
/// The SMTP envelope sender is the forwarder's own from address and the
/// single envelope recipient is the forward target, the message itself is
/// sent verbatim.
pub struct SmtpSink {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    sender: Address,
}

impl std::fmt::Debug for SmtpSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpSink")
            .field("sender", &self.sender)
            .finish()
    }
}

impl SmtpSink {
    /// Creates a new [`SmtpSink`] for the given server.
    ///
    /// With `tls` the connection uses implicit TLS on the given port,
    /// otherwise a plain connection is used. Credentials are only sent
    /// when provided.
    pub fn new(
        host: &str,
        port: u16,
        tls: bool,
        credentials: Option<(String, String)>,
        sender: &str,
    ) -> SinkResult<Self> {
        let sender = parse_address(sender)?;

        let mut builder = if tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(host)
                .map_err(|e| SinkError::Transport(format!("Failed to create SMTP relay: {e}")))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
        }
        .port(port);

        if let Some((username, password)) = credentials {
            builder = builder.credentials(Credentials::new(username, password));
        }

        info!(
            host = %host,
            port = port,
            tls = tls,
            sender = %sender,
            "SMTP sink initialized"
        );
        Ok(Self {
            transport: builder.build(),
            sender,
        })
    }
}

impl MessageSink for SmtpSink {
    fn send<'a>(&'a self, raw: &'a [u8], target: &'a str) -> SinkFuture<'a> {
        Box::pin(async move {
            let envelope = envelope_for(&self.sender, target)?;
            debug!(forward_to = %target, length = raw.len(), "Relaying email over SMTP");
            let response = self
                .transport
                .send_raw(&envelope, raw)
                .await
                .map_err(|e| {
                    error!(forward_to = %target, error = %e, "Failed to relay email");
                    SinkError::Transport(e.to_string())
                })?;
            info!(
                forward_to = %target,
                code = %response.code(),
                "Relayed email over SMTP"
            );
            Ok(())
        })
    }

    fn name(&self) -> &str {
        "smtp"
    }
}

fn parse_address(address: &str) -> SinkResult<Address> {
    address
        .parse::<Address>()
        .map_err(|e| SinkError::Address(format!("{address}: {e}")))
}

/// Builds the SMTP envelope used to relay a copy to the given target.
fn envelope_for(sender: &Address, target: &str) -> SinkResult<SmtpEnvelope> {
    let recipient = parse_address(target)?;
    SmtpEnvelope::new(Some(sender.clone()), vec![recipient])
        .map_err(|e| SinkError::Address(e.to_string()))
}
