//! Inbound notification events.
//!
//! A [`NotificationEvent`] is the trigger payload announcing that one or
//! more messages were received, each record carrying the envelope of a
//! single message. The layout follows the receipt notifications emitted
//! by hosted inbound mail services:
//!
//! ```json
//! {"Records": [{"ses": {"mail": {
//!     "messageId": "...", "source": "...", "destination": ["..."]
//! }}}]}
//! ```

use serde::Deserialize;

use crate::Envelope;

/// Notification carrying one record per received message.
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationEvent {
    #[serde(rename = "Records", default)]
    pub records: Vec<NotificationRecord>,
}

/// A single received message announcement.
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationRecord {
    #[serde(rename = "ses")]
    pub notification: MailNotification,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MailNotification {
    pub mail: MailMetadata,
}

/// Envelope metadata of the received message.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailMetadata {
    pub message_id: String,
    pub source: String,
    #[serde(default)]
    pub destination: Vec<String>,
}

impl NotificationEvent {
    /// Parses a notification event from its JSON representation.
    pub fn from_json(data: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(data)
    }

    /// Returns the envelopes of every record, in record order.
    pub fn envelopes(&self) -> Vec<Envelope> {
        self.records.iter().map(NotificationRecord::envelope).collect()
    }
}

impl NotificationRecord {
    /// Returns the envelope described by this record.
    pub fn envelope(&self) -> Envelope {
        let mail = &self.notification.mail;
        Envelope::new(
            mail.message_id.clone(),
            mail.source.clone(),
            mail.destination.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EVENT: &str = r#"{
        "Records": [
            {
                "eventSource": "aws:ses",
                "eventVersion": "1.0",
                "ses": {
                    "mail": {
                        "messageId": "o3vrnil0e2ic28trm7dfhrc2v0clambda4nbp0g1",
                        "source": "sender@origin.com",
                        "destination": ["info@example.com", "Sales@Example.com"],
                        "timestamp": "2024-01-01T00:00:00.000Z"
                    },
                    "receipt": {"recipients": ["info@example.com"]}
                }
            },
            {
                "ses": {
                    "mail": {
                        "messageId": "second",
                        "source": "other@origin.com",
                        "destination": ["ops@example.com"]
                    }
                }
            }
        ]
    }"#;

    #[test]
    fn test_parse_event() {
        let event = NotificationEvent::from_json(EVENT.as_bytes()).unwrap();
        assert_eq!(event.records.len(), 2);

        let envelopes = event.envelopes();
        assert_eq!(
            envelopes[0],
            Envelope::from_raw(
                "o3vrnil0e2ic28trm7dfhrc2v0clambda4nbp0g1",
                "sender@origin.com",
                &["info@example.com", "Sales@Example.com"],
            )
        );
        assert_eq!(envelopes[1].message_id, "second");
    }

    #[test]
    fn test_parse_event_without_records() {
        let event = NotificationEvent::from_json(b"{}").unwrap();
        assert!(event.envelopes().is_empty());
    }

    #[test]
    fn test_parse_event_missing_message_id() {
        let result = NotificationEvent::from_json(
            br#"{"Records": [{"ses": {"mail": {"source": "a@b.com"}}}]}"#,
        );
        assert!(result.is_err());
    }
}
