//! Attribution footer construction and placement.
//!
//! The footer is spliced into the body using plain byte-position
//! heuristics rather than a structural MIME model: the last line starting
//! with `--` whose trimmed form ends with `--` is taken as the closing
//! boundary of a multipart body, and the footer lands right before it so
//! that it becomes part of the last readable part. Bodies without such a
//! line get the footer appended at the very end.
//!
//! The heuristic can be fooled by body text that starts with two hyphens
//! (e.g. a `-- ` signature delimiter) and does not understand nested
//! multipart structures.

use std::fmt::{self, Display};

use tracing::debug;

use crate::Envelope;

/// Line framing used when rendering and splicing the footer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEnding {
    /// Bare `\n` line endings.
    Lf,
    /// RFC 5322 `\r\n` line endings.
    CrLf,
}

impl LineEnding {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::CrLf => "\r\n",
        }
    }

    /// Byte sequence that introduces a line starting with `--`.
    fn boundary_prefix(&self) -> &'static [u8] {
        match self {
            LineEnding::Lf => b"\n--",
            LineEnding::CrLf => b"\r\n--",
        }
    }
}

/// Where the footer ended up in the body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Before an LF framed closing boundary at the given byte offset.
    LfBoundary(usize),
    /// Before a CRLF framed closing boundary at the given byte offset.
    CrLfBoundary(usize),
    /// Appended to the end of the body.
    Appended,
}

impl Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Placement::LfBoundary(pos) => write!(f, "before LF closing boundary at {pos}"),
            Placement::CrLfBoundary(pos) => write!(f, "before CRLF closing boundary at {pos}"),
            Placement::Appended => write!(f, "appended to end of body"),
        }
    }
}

/// Human-readable attribution footer added to every forwarded message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Footer {
    source: String,
    destinations: String,
}

impl Footer {
    /// Creates a new [`Footer`] for the original sender and the already
    /// joined list of original destinations.
    pub fn new(source: &str, destinations: &str) -> Self {
        Self {
            source: source.to_string(),
            destinations: destinations.to_string(),
        }
    }

    /// Creates the footer describing the given envelope.
    pub fn from_envelope(envelope: &Envelope) -> Self {
        Self::new(&envelope.source, &envelope.joined_destinations())
    }

    /// Renders the footer: a blank line, a `---` rule and the two
    /// attribution lines, using the given line framing.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use fwdmail_utils::{Footer, LineEnding};
    ///
    /// let footer = Footer::new("alice@example.com", "info@example.org");
    /// assert_eq!(
    ///     footer.render(LineEnding::Lf),
    ///     "\n\n---\nForwarded from: alice@example.com\nOriginal to: info@example.org"
    /// );
    /// ```
    pub fn render(&self, eol: LineEnding) -> String {
        let eol = eol.as_str();
        format!(
            "{eol}{eol}---{eol}Forwarded from: {}{eol}Original to: {}",
            self.source, self.destinations
        )
    }

    /// Returns a new body with the footer inserted, together with the
    /// placement that was applied. The given body is left untouched.
    pub fn insert(&self, body: &[u8]) -> (Vec<u8>, Placement) {
        if let Some(pos) = find_closing_boundary(body, LineEnding::Lf) {
            debug!(position = pos, "Found closing MIME boundary");
            let result = self.splice(body, pos, LineEnding::Lf);
            return (result, Placement::LfBoundary(pos));
        }

        if let Some(pos) = find_closing_boundary(body, LineEnding::CrLf) {
            debug!(position = pos, "Found closing MIME boundary (CRLF)");
            let result = self.splice(body, pos, LineEnding::CrLf);
            return (result, Placement::CrLfBoundary(pos));
        }

        debug!("No closing MIME boundary found, appending footer to end");
        let footer = self.render(LineEnding::Lf);
        let mut result = Vec::with_capacity(body.len() + footer.len());
        result.extend_from_slice(body);
        result.extend_from_slice(footer.as_bytes());
        (result, Placement::Appended)
    }

    fn splice(&self, body: &[u8], pos: usize, eol: LineEnding) -> Vec<u8> {
        let footer = self.render(eol);
        let eol = eol.as_str();
        let mut result = Vec::with_capacity(body.len() + footer.len() + eol.len());
        result.extend_from_slice(&body[..pos]);
        result.extend_from_slice(footer.as_bytes());
        result.extend_from_slice(eol.as_bytes());
        result.extend_from_slice(&body[pos..]);
        result
    }
}

/// Locates the last line starting with `--` under the given framing and,
/// if its trimmed content ends with `--`, returns the offset of the line
/// break that precedes it.
///
/// Only the very last candidate is considered. Under LF framing a match
/// whose `\n` is preceded by `\r` belongs to CRLF framing and is rejected.
pub fn find_closing_boundary(body: &[u8], eol: LineEnding) -> Option<usize> {
    let prefix = eol.boundary_prefix();
    let pos = rfind(body, prefix)?;

    if eol == LineEnding::Lf && pos > 0 && body[pos - 1] == b'\r' {
        return None;
    }

    let line_start = pos + eol.as_str().len();
    let line_end = find(&body[line_start..], eol.as_str().as_bytes())
        .map(|offset| line_start + offset)
        .unwrap_or(body.len());

    let line = body[line_start..line_end].trim_ascii();
    line.ends_with(b"--").then_some(pos)
}

fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.len() > haystack.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .rposition(|window| window == needle)
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.len() > haystack.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
