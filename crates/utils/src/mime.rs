/// Extracts the local-part of an email address, the portion before
/// the first `@` sign.
///
/// No validation is performed, an address without an `@` is returned
/// as a whole.
///
/// # Examples
///
/// ```rust
/// assert_eq!(fwdmail_utils::extract_local_part("info@example.com"), "info");
/// assert_eq!(fwdmail_utils::extract_local_part("postmaster"), "postmaster");
/// ```
pub fn extract_local_part(address: &str) -> &str {
    address
        .split_once('@')
        .map(|(local, _)| local)
        .unwrap_or(address)
}

/// A single header as found in a raw message: the decoded name and the
/// value bytes exactly as they appear on the wire (unfolded and trimmed).
pub type RawHeader = (String, Vec<u8>);

/// Splits a raw email on the first blank line, returning the ordered list
/// of headers and the body that follows the separator.
///
/// Headers are preserved in their original order with case-preserved keys
/// and trimmed values, so that repeated headers (e.g. `Received`) are all
/// kept. Folded header values are unfolded, joining the continuation with
/// a single space. Values are kept as bytes, 8-bit values (e.g. a Latin-1
/// `Subject`) are carried over untouched.
///
/// Returns `None` when the message cannot be framed as RFC 5322, meaning
/// there is no blank-line separator, a header line has no colon or a
/// valid name, or a continuation line has no header to continue.
///
/// # Examples
///
/// ```rust
/// let (headers, body) = fwdmail_utils::split_raw_message(
///     b"From: alice@example.com\r\nSubject: Hello\r\n there\r\n\r\nHi!"
/// ).unwrap();
/// assert_eq!(headers.len(), 2);
/// assert_eq!(headers[0], ("From".to_string(), b"alice@example.com".to_vec()));
/// assert_eq!(headers[1], ("Subject".to_string(), b"Hello there".to_vec()));
/// assert_eq!(body, b"Hi!");
/// ```
///
/// A message without the blank-line separator can not be split:
///
/// ```rust
/// assert!(fwdmail_utils::split_raw_message(b"Subject: Hello\r\n").is_none());
/// ```
pub fn split_raw_message(raw: &[u8]) -> Option<(Vec<RawHeader>, &[u8])> {
    let mut headers: Vec<RawHeader> = Vec::new();
    let mut pos = 0;

    while pos < raw.len() {
        let end = raw[pos..]
            .iter()
            .position(|&b| b == b'\n')
            .map(|offset| pos + offset)?;
        let consumed = end + 1;
        let line = raw[pos..end].strip_suffix(b"\r").unwrap_or(&raw[pos..end]);

        if line.is_empty() {
            return Some((headers, &raw[consumed..]));
        }

        if line[0] == b' ' || line[0] == b'\t' {
            let (_, value) = headers.last_mut()?;
            let continuation = line.trim_ascii();
            if !continuation.is_empty() {
                if !value.is_empty() {
                    value.push(b' ');
                }
                value.extend_from_slice(continuation);
            }
        } else {
            let colon = line.iter().position(|&b| b == b':')?;
            let key = std::str::from_utf8(&line[..colon]).ok()?.trim();
            if key.is_empty() {
                return None;
            }
            headers.push((key.to_string(), line[colon + 1..].trim_ascii().to_vec()));
        }

        pos = consumed;
    }

    // Ran out of input before finding the blank-line separator
    None
}
