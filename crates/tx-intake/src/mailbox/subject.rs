//! Signal extraction from a mail subject.
//!
//! ```text
//! raw header ─► RFC 2047 ─► quoted-printable ─► marker split
//!            ─► HTML entities ─► zero-width strip ─► CR/LF strip ─► JSON object
//! ```

use mailparse::MailHeaderMap;
use quoted_printable::ParseMode;
use serde_json::{Map, Value};

/// What a subject line turned out to hold.
#[derive(Debug, Clone, PartialEq)]
pub enum SubjectSignal {
    /// The subject does not start with the marker; not a signal.
    NoMarker,
    /// The marker is present but the remainder is not a JSON object.
    Malformed(String),
    Payload(Map<String, Value>),
}

/// Decoded `Subject` of a raw header block, if present.
pub fn subject_from_header(raw: &[u8]) -> Option<String> {
    let (headers, _) = mailparse::parse_headers(raw).ok()?;
    headers.get_first_value("Subject")
}

fn is_zero_width(c: char) -> bool {
    matches!(c, '\u{200B}'..='\u{200D}' | '\u{FEFF}')
}

/// Undo transport encodings that mail clients and alert senders leave in
/// the subject text.
pub fn clean(fragment: &str) -> String {
    let unescaped = html_escape::decode_html_entities(fragment);
    unescaped
        .chars()
        .filter(|&c| !is_zero_width(c) && c != '\r' && c != '\n')
        .collect()
}

/// Quoted-printable decoding of the ASCII stretches of `text`.
///
/// Anything outside ASCII is already decoded text (RFC 2047 ran first) and is
/// copied through; the QP decoder would otherwise drop it.
fn decode_quoted_printable(text: &str) -> String {
    let mut out = Vec::with_capacity(text.len());
    let mut rest = text;
    while !rest.is_empty() {
        let ascii_end = rest.find(|c: char| !c.is_ascii()).unwrap_or(rest.len());
        let (ascii, tail) = rest.split_at(ascii_end);
        // The decoder treats trailing blanks as line padding.
        let body = ascii.trim_end();
        match quoted_printable::decode(body.as_bytes(), ParseMode::Robust) {
            Ok(bytes) if body.contains('=') => out.extend_from_slice(&bytes),
            _ => out.extend_from_slice(body.as_bytes()),
        }
        out.extend_from_slice(&ascii.as_bytes()[body.len()..]);
        let other_end = tail.find(|c: char| c.is_ascii()).unwrap_or(tail.len());
        let (other, next) = tail.split_at(other_end);
        out.extend_from_slice(other.as_bytes());
        rest = next;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Split `subject` at `marker` and parse the rest as a signal payload.
pub fn parse_subject(subject: &str, marker: &str) -> SubjectSignal {
    let decoded = decode_quoted_printable(subject);

    let Some(rest) = decoded.trim().strip_prefix(marker) else {
        return SubjectSignal::NoMarker;
    };

    let fragment = clean(rest);
    match serde_json::from_str::<Value>(fragment.trim()) {
        Ok(Value::Object(map)) => SubjectSignal::Payload(map),
        Ok(other) => SubjectSignal::Malformed(format!("expected a JSON object, got {other}")),
        Err(e) => SubjectSignal::Malformed(e.to_string()),
    }
}
