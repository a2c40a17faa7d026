//! Rewriting of inbound raw messages into forwardable copies.
//!
//! The [`MessageRewriter`] takes the original bytes, strips the headers
//! that would make the copy unsendable or misleading, injects the
//! attribution headers and places the "forwarded from" footer in the body.
//! It never fails: a message that can not be framed is passed through
//! untouched.

use tracing::{debug, warn};

use crate::{split_raw_message, Envelope, Footer};

/// Header names (lower-cased) that are never copied into a forwarded copy.
pub const SKIPPED_HEADERS: [&str; 9] = [
    "return-path",
    "dkim-signature",
    "received",
    "date",
    "authentication-results",
    "reply-to",
    "from",
    "to",
    "content-length",
];

/// Default value of the `X-Forwarded-By` marker header.
pub const DEFAULT_FORWARDED_BY: &str = "fwdmail";

/// Checks whether the header with the given name is dropped on rewrite.
///
/// # Examples
///
/// ```rust
/// assert!(fwdmail_utils::is_skipped_header("DKIM-Signature"));
/// assert!(fwdmail_utils::is_skipped_header("reply-to"));
/// assert!(!fwdmail_utils::is_skipped_header("Subject"));
/// ```
pub fn is_skipped_header(name: &str) -> bool {
    SKIPPED_HEADERS
        .iter()
        .any(|skipped| skipped.eq_ignore_ascii_case(name))
}

/// Static policy controlling the header rewrite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteOptions {
    /// Address placed in the `From` header of every forwarded copy.
    pub from_address: String,

    /// Whether to add a `Reply-To` header pointing at the original sender.
    pub preserve_reply_to: bool,

    /// Value of the `X-Forwarded-By` marker header.
    pub forwarded_by: String,
}

impl RewriteOptions {
    pub fn new(from_address: String, preserve_reply_to: bool) -> Self {
        Self {
            from_address,
            preserve_reply_to,
            forwarded_by: DEFAULT_FORWARDED_BY.to_string(),
        }
    }

    pub fn with_forwarded_by(mut self, forwarded_by: String) -> Self {
        self.forwarded_by = forwarded_by;
        self
    }
}

/// Produces the raw bytes of the copy sent to a single forward target.
///
/// Stateless apart from the immutable [`RewriteOptions`], a single
/// instance can be shared across targets and tasks.
#[derive(Debug, Clone)]
pub struct MessageRewriter {
    options: RewriteOptions,
}

impl MessageRewriter {
    /// Creates a new [`MessageRewriter`] with the given options.
    pub fn new(options: RewriteOptions) -> Self {
        Self { options }
    }

    /// Returns a reference to the rewrite options.
    pub fn options(&self) -> &RewriteOptions {
        &self.options
    }

    /// Rewrites the raw message for the given target.
    ///
    /// The header section is rebuilt without the [`SKIPPED_HEADERS`],
    /// followed by the attribution headers, a blank line and the body with
    /// the footer in place. When the message can not be split into headers
    /// and body the original bytes are returned unchanged.
    pub fn rewrite(&self, raw: &[u8], envelope: &Envelope, target: &str) -> Vec<u8> {
        let Some((headers, body)) = split_raw_message(raw) else {
            warn!(
                message_id = %envelope.message_id,
                "Failed to parse email, forwarding as-is"
            );
            return raw.to_vec();
        };

        debug!(
            message_id = %envelope.message_id,
            headers = headers.len(),
            body_length = body.len(),
            "Parsed email"
        );

        let footer = Footer::from_envelope(envelope);
        let (body, placement) = footer.insert(body);
        debug!(
            message_id = %envelope.message_id,
            placement = %placement,
            body_length = body.len(),
            "Inserted forwarding footer"
        );

        let original_to = envelope.joined_destinations();
        let mut rewritten: Vec<(&str, &[u8])> = Vec::with_capacity(headers.len() + 7);

        for (key, value) in &headers {
            if is_skipped_header(key) {
                debug!(header = %key, "Skipping header");
                continue;
            }
            rewritten.push((key.as_str(), value.as_slice()));
        }

        rewritten.push(("From", self.options.from_address.as_bytes()));
        rewritten.push(("To", target.as_bytes()));
        rewritten.push(("X-Original-From", envelope.source.as_bytes()));
        rewritten.push(("X-Original-To", original_to.as_bytes()));
        rewritten.push(("X-Forwarded-By", self.options.forwarded_by.as_bytes()));
        rewritten.push(("X-Forwarded-For", original_to.as_bytes()));

        if self.options.preserve_reply_to {
            debug!(reply_to = %envelope.source, "Adding Reply-To header");
            rewritten.push(("Reply-To", envelope.source.as_bytes()));
        } else {
            debug!("Skipping Reply-To header");
        }

        let headers_len: usize = rewritten
            .iter()
            .map(|(k, v)| k.len() + 2 + v.len() + 2)
            .sum();
        let mut result = Vec::with_capacity(headers_len + 2 + body.len());

        for (key, value) in rewritten {
            result.extend_from_slice(key.as_bytes());
            result.extend_from_slice(b": ");
            result.extend_from_slice(value);
            result.extend_from_slice(b"\r\n");
        }
        result.extend_from_slice(b"\r\n");
        result.extend_from_slice(&body);

        debug!(
            message_id = %envelope.message_id,
            forward_to = %target,
            length = result.len(),
            "Email prepared"
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use crate::{LineEnding, RawHeader};

    use super::*;

    fn envelope() -> Envelope {
        Envelope::from_raw(
            "msg-1",
            "sender@origin.com",
            &["info@example.com", "sales@example.com"],
        )
    }

    fn rewriter(preserve_reply_to: bool) -> MessageRewriter {
        MessageRewriter::new(RewriteOptions::new(
            "noreply@example.com".to_string(),
            preserve_reply_to,
        ))
    }

    fn split(output: &[u8]) -> (Vec<RawHeader>, String) {
        let (headers, body) = split_raw_message(output).unwrap();
        (headers, String::from_utf8_lossy(body).into_owned())
    }

    fn values(headers: &[RawHeader], name: &str) -> Vec<String> {
        headers
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| String::from_utf8_lossy(v).into_owned())
            .collect()
    }

    const RAW: &[u8] = b"Return-Path: <bounce@origin.com>\r\n\
Received: from mx1\r\n\
Received: from mx2\r\n\
DKIM-Signature: v=1; a=rsa-sha256\r\n\
dkim-signature: v=1; a=ed25519\r\n\
Authentication-Results: mx; spf=pass\r\n\
Date: Mon, 1 Jan 2024 00:00:00 +0000\r\n\
From: Sender <sender@origin.com>\r\n\
To: info@example.com\r\n\
Reply-To: other@origin.com\r\n\
Content-Length: 42\r\n\
Subject: Hello\r\n\
X-Tag: one\r\n\
X-Tag: two\r\n\
\r\n\
Body text\r\n";

    #[test]
    fn test_skipped_headers_stripped() {
        let output = rewriter(false).rewrite(RAW, &envelope(), "alice@personal.net");
        let (headers, _) = split(&output);

        for name in [
            "return-path",
            "received",
            "dkim-signature",
            "authentication-results",
            "date",
            "content-length",
        ] {
            assert!(values(&headers, name).is_empty(), "{name} not stripped");
        }
        assert_eq!(values(&headers, "From"), vec!["noreply@example.com"]);
        assert_eq!(values(&headers, "To"), vec!["alice@personal.net"]);
    }

    #[test]
    fn test_other_headers_copied_in_order() {
        let output = rewriter(false).rewrite(RAW, &envelope(), "alice@personal.net");
        let (headers, _) = split(&output);

        assert_eq!(values(&headers, "Subject"), vec!["Hello"]);
        assert_eq!(values(&headers, "X-Tag"), vec!["one", "two"]);
        assert_eq!(headers[0].0, "Subject");
    }

    #[test]
    fn test_attribution_headers_appended_in_order() {
        let output = rewriter(true).rewrite(RAW, &envelope(), "alice@personal.net");
        let (headers, _) = split(&output);

        let tail: Vec<(&str, &str)> = headers[headers.len() - 7..]
            .iter()
            .map(|(k, v)| (k.as_str(), std::str::from_utf8(v).unwrap()))
            .collect();
        assert_eq!(
            tail,
            vec![
                ("From", "noreply@example.com"),
                ("To", "alice@personal.net"),
                ("X-Original-From", "sender@origin.com"),
                ("X-Original-To", "info@example.com, sales@example.com"),
                ("X-Forwarded-By", "fwdmail"),
                ("X-Forwarded-For", "info@example.com, sales@example.com"),
                ("Reply-To", "sender@origin.com"),
            ]
        );
    }

    #[test]
    fn test_reply_to_dropped_when_not_preserved() {
        let output = rewriter(false).rewrite(RAW, &envelope(), "alice@personal.net");
        let (headers, _) = split(&output);
        assert!(values(&headers, "Reply-To").is_empty());
    }

    #[test]
    fn test_reply_to_replaced_when_preserved() {
        let output = rewriter(true).rewrite(RAW, &envelope(), "alice@personal.net");
        let (headers, _) = split(&output);
        assert_eq!(values(&headers, "Reply-To"), vec!["sender@origin.com"]);
    }

    #[test]
    fn test_custom_forwarded_by() {
        let rewriter = MessageRewriter::new(
            RewriteOptions::new("noreply@example.com".to_string(), false)
                .with_forwarded_by("relay-01".to_string()),
        );
        let output = rewriter.rewrite(RAW, &envelope(), "alice@personal.net");
        let (headers, _) = split(&output);
        assert_eq!(values(&headers, "X-Forwarded-By"), vec!["relay-01"]);
    }

    #[test]
    fn test_plain_body_gets_footer_appended() {
        let output = rewriter(false).rewrite(RAW, &envelope(), "alice@personal.net");
        let (_, body) = split(&output);

        let footer = Footer::from_envelope(&envelope()).render(LineEnding::Lf);
        assert_eq!(body, format!("Body text\r\n{footer}"));
        assert_eq!(body.matches("Forwarded from: sender@origin.com").count(), 1);
    }

    #[test]
    fn test_multipart_body_footer_before_closing_boundary() {
        let raw = b"Subject: Multi\r\n\
Content-Type: multipart/alternative; boundary=\"b1\"\r\n\
\r\n\
--b1\r\n\
Content-Type: text/plain\r\n\
\r\n\
Hello\r\n\
--b1--\r\n";
        let output = rewriter(false).rewrite(raw, &envelope(), "alice@personal.net");
        let (headers, body) = split(&output);

        let footer = Footer::from_envelope(&envelope()).render(LineEnding::CrLf);
        assert_eq!(
            body,
            format!("--b1\r\nContent-Type: text/plain\r\n\r\nHello{footer}\r\n\r\n--b1--\r\n")
        );
        assert_eq!(
            values(&headers, "Content-Type"),
            vec!["multipart/alternative; boundary=\"b1\""]
        );
    }

    #[test]
    fn test_header_block_framing() {
        let raw = b"Subject: Hi\n\nBody";
        let output = rewriter(false).rewrite(raw, &envelope(), "alice@personal.net");
        let text = String::from_utf8(output).unwrap();

        assert!(text.starts_with("Subject: Hi\r\nFrom: noreply@example.com\r\n"));
        assert!(text.contains("X-Forwarded-For: info@example.com, sales@example.com\r\n\r\nBody"));
    }

    #[test]
    fn test_8bit_header_still_rewritten() {
        let raw = b"DKIM-Signature: v=1\r\nFrom: orig@origin.com\r\nSubject: Caf\xe9\r\n\r\nBody\r\n";
        let output = rewriter(false).rewrite(raw, &envelope(), "alice@personal.net");
        assert_ne!(output, raw.to_vec());

        let (headers, body) = split(&output);
        assert!(values(&headers, "DKIM-Signature").is_empty());
        assert_eq!(values(&headers, "From"), vec!["noreply@example.com"]);
        assert_eq!(values(&headers, "X-Forwarded-By"), vec!["fwdmail"]);
        assert_eq!(headers[0], ("Subject".to_string(), b"Caf\xe9".to_vec()));
        assert!(body.contains("Forwarded from: sender@origin.com"));

        let subject_line: &[u8] = b"Subject: Caf\xe9\r\n";
        assert!(output
            .windows(subject_line.len())
            .any(|window| window == subject_line));
    }

    #[test]
    fn test_unparsable_message_passthrough() {
        let raw = b"Subject: no separator\r\nFrom: someone@example.com";
        let output = rewriter(true).rewrite(raw, &envelope(), "alice@personal.net");
        assert_eq!(output, raw.to_vec());

        let raw = b"this is not a header line\r\n\r\nBody";
        let output = rewriter(true).rewrite(raw, &envelope(), "alice@personal.net");
        assert_eq!(output, raw.to_vec());
    }

    #[test]
    fn test_rewrite_does_not_mutate_input() {
        let raw = RAW.to_vec();
        let _ = rewriter(true).rewrite(&raw, &envelope(), "alice@personal.net");
        assert_eq!(raw, RAW);
    }

    #[test]
    fn test_rewrite_independent_per_target() {
        let rewriter = rewriter(false);
        let first = rewriter.rewrite(RAW, &envelope(), "alice@personal.net");
        let second = rewriter.rewrite(RAW, &envelope(), "bob@personal.net");

        let (first_headers, first_body) = split(&first);
        let (second_headers, second_body) = split(&second);
        assert_eq!(values(&first_headers, "To"), vec!["alice@personal.net"]);
        assert_eq!(values(&second_headers, "To"), vec!["bob@personal.net"]);
        assert_eq!(first_body, second_body);
    }

    #[test]
    fn test_is_skipped_header() {
        for name in SKIPPED_HEADERS {
            assert!(is_skipped_header(name));
            assert!(is_skipped_header(&name.to_uppercase()));
        }
        assert!(is_skipped_header("Dkim-Signature"));
        assert!(!is_skipped_header("X-Original-To"));
        assert!(!is_skipped_header("Message-ID"));
    }
}
