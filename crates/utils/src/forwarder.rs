//! Per-message forwarding pipeline.
//!
//! For each inbound message the [`Forwarder`] fetches the raw bytes from
//! its [`MessageSource`], resolves the forward targets once through the
//! [`RecipientRouter`] and then rewrites and dispatches one copy per
//! target through its [`MessageSink`]. A failed dispatch is logged and
//! recorded without stopping the remaining targets.

use std::{error::Error, fmt::Display, sync::Arc};

use tracing::{error, info};

use crate::{
    Envelope, FileMessageSource, FileStorageSink, ForwardTarget, ForwarderConfig, MessageRewriter,
    MessageSink, MessageSource, NotificationEvent, RecipientRouter, SinkConfig, SinkError,
    SmtpSink, SourceConfig, SourceError,
};

/// Errors that abort the processing of a message.
#[derive(Debug)]
pub enum ForwardError {
    /// The raw message could not be fetched.
    Source(SourceError),
    /// The configured sink could not be created.
    Sink(SinkError),
    /// The forwarder configuration is unusable.
    Config(String),
}

impl Display for ForwardError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ForwardError::Source(e) => write!(f, "Failed to download email: {e}"),
            ForwardError::Sink(e) => write!(f, "Failed to create sink: {e}"),
            ForwardError::Config(msg) => write!(f, "Configuration error: {msg}"),
        }
    }
}

impl Error for ForwardError {}

impl From<SourceError> for ForwardError {
    fn from(e: SourceError) -> Self {
        ForwardError::Source(e)
    }
}

impl From<SinkError> for ForwardError {
    fn from(e: SinkError) -> Self {
        ForwardError::Sink(e)
    }
}

/// Outcome of forwarding a single message.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ForwardReport {
    /// Targets the rewritten message was dispatched to.
    pub forwarded: Vec<ForwardTarget>,
    /// Targets whose dispatch failed, with the failure reason.
    pub failed: Vec<(ForwardTarget, String)>,
}

impl ForwardReport {
    /// Returns whether no target was resolved for the message.
    pub fn is_skipped(&self) -> bool {
        self.forwarded.is_empty() && self.failed.is_empty()
    }
}

/// Forwards inbound messages to the targets resolved for their envelope.
pub struct Forwarder {
    router: RecipientRouter,
    rewriter: MessageRewriter,
    source: Arc<dyn MessageSource>,
    sink: Arc<dyn MessageSink>,
}

impl std::fmt::Debug for Forwarder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Forwarder")
            .field("routes", &self.router.table().len())
            .field("source", &self.source.name())
            .field("sink", &self.sink.name())
            .finish()
    }
}

impl Forwarder {
    /// Creates a new [`Forwarder`] from its parts.
    pub fn new(
        router: RecipientRouter,
        rewriter: MessageRewriter,
        source: Arc<dyn MessageSource>,
        sink: Arc<dyn MessageSink>,
    ) -> Self {
        Self {
            router,
            rewriter,
            source,
            sink,
        }
    }

    /// Creates a new [`Forwarder`] with the source and sink described by
    /// the configuration.
    pub fn from_config(config: &ForwarderConfig) -> Result<Self, ForwardError> {
        let options = config
            .rewrite_options()
            .map_err(|e| ForwardError::Config(e.to_string()))?;

        let source: Arc<dyn MessageSource> = match &config.source {
            SourceConfig::FileStorage { path, prefix } => {
                Arc::new(FileMessageSource::new(path.into(), prefix.clone()))
            }
        };

        let sink: Arc<dyn MessageSink> = match &config.sink {
            SinkConfig::FileStorage { path } => Arc::new(FileStorageSink::new(path.into())),
            SinkConfig::Smtp {
                host,
                port,
                tls,
                username,
                password,
            } => {
                let credentials = username.clone().zip(password.clone());
                Arc::new(SmtpSink::new(
                    host,
                    *port,
                    *tls,
                    credentials,
                    &options.from_address,
                )?)
            }
        };

        info!(
            routes = config.routing.mapping.len(),
            catch_all = ?config.catch_all(),
            source = source.name(),
            sink = sink.name(),
            "Forwarder initialized"
        );
        Ok(Self::new(
            config.router(),
            MessageRewriter::new(options),
            source,
            sink,
        ))
    }

    /// Forwards the message described by the envelope.
    ///
    /// Failing to fetch the raw message aborts the message, failing to
    /// dispatch to a target is only recorded in the returned report.
    pub async fn process(&self, envelope: &Envelope) -> Result<ForwardReport, ForwardError> {
        info!(
            message_id = %envelope.message_id,
            from = %envelope.source,
            to = %envelope.joined_destinations(),
            "Processing email"
        );

        let raw = self.source.fetch(&envelope.message_id).await?;

        let targets = self.router.resolve(&envelope.destinations);
        if targets.is_empty() {
            info!(
                message_id = %envelope.message_id,
                "No matching recipients found, skipping email"
            );
            return Ok(ForwardReport::default());
        }

        let mut report = ForwardReport::default();
        for target in targets {
            let rewritten = self.rewriter.rewrite(&raw, envelope, &target);
            match self.sink.send(&rewritten, &target).await {
                Ok(()) => {
                    info!(
                        message_id = %envelope.message_id,
                        forward_to = %target,
                        "Successfully forwarded email"
                    );
                    report.forwarded.push(target);
                }
                Err(e) => {
                    error!(
                        message_id = %envelope.message_id,
                        forward_to = %target,
                        error = %e,
                        "Failed to forward email"
                    );
                    report.failed.push((target, e.to_string()));
                }
            }
        }

        Ok(report)
    }

    /// Forwards every message announced by the event, in record order.
    ///
    /// Processing stops at the first message that can not be processed.
    pub async fn process_event(
        &self,
        event: &NotificationEvent,
    ) -> Result<Vec<ForwardReport>, ForwardError> {
        let mut reports = Vec::with_capacity(event.records.len());
        for envelope in event.envelopes() {
            let report = self.process(&envelope).await.map_err(|e| {
                error!(
                    message_id = %envelope.message_id,
                    error = %e,
                    "Error processing record"
                );
                e
            })?;
            reports.push(report);
        }
        Ok(reports)
    }
}
