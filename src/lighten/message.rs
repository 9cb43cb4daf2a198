//! Per-message reduction: select a text body, strip quote blocks, and copy
//! the allow-listed outer headers onto a new single-part message.

use mail_parser::{MessageParser, MimeHeaders, PartType};
use tracing::debug;

use crate::error::Result;
use crate::lighten::html::HtmlReducer;
use crate::lighten::quotes::QuoteStripper;
use crate::model::message::{HeaderEntry, RawMessage, ReducedMessage};

/// Headers copied through from the original outer message. Everything else
/// is dropped.
const ALLOWED_HEADERS: [&str; 7] = [
    "Received",
    "Date",
    "From",
    "To",
    "Subject",
    "Message-ID",
    "User-Agent",
];

/// Reduces one raw message to a [`ReducedMessage`], or `None` when the
/// message has no retainable content.
///
/// Body selection walks the flat list of leaf parts in encounter order,
/// skipping attachments and non-textual categories: the first `text/plain`
/// leaf wins; failing that, the first HTML leaf is reduced to approximate
/// plain text. The selected text then goes through the quote stripper.
pub struct MessageLightener {
    stripper: QuoteStripper,
    html: HtmlReducer,
    trailing_only: bool,
}

impl MessageLightener {
    pub fn new(stripper: QuoteStripper) -> Self {
        Self {
            stripper,
            html: HtmlReducer::new(),
            trailing_only: false,
        }
    }

    /// Restrict quote-block deletion to a run that reaches end of body.
    pub fn trailing_only(mut self, on: bool) -> Self {
        self.trailing_only = on;
        self
    }

    /// Reduce one message. Does not mutate the input.
    pub fn lighten(&self, raw: &RawMessage) -> Result<Option<ReducedMessage>> {
        let (envelope, rest) = split_envelope(&raw.bytes);

        let Some(text) = self.select_body(rest) else {
            debug!(offset = raw.offset, "No text or HTML part, discarding");
            return Ok(None);
        };

        let body = if self.trailing_only {
            self.stripper.strip_trailing(&text)
        } else {
            self.stripper.strip(&text)
        };

        let headers = outer_headers(rest)
            .into_iter()
            .filter(|h| {
                ALLOWED_HEADERS
                    .iter()
                    .any(|a| a.eq_ignore_ascii_case(&h.name))
            })
            .collect();

        Ok(Some(ReducedMessage {
            envelope,
            headers,
            body,
        }))
    }

    /// First pass: first plain-text leaf. Second pass: first HTML leaf,
    /// reduced. Attachments and non-textual categories are never candidates.
    fn select_body(&self, rest: &[u8]) -> Option<String> {
        let parser = MessageParser::default();
        let Some(msg) = parser.parse(rest) else {
            // Unparseable as MIME; fall back to everything after the header
            // block, decoded lossily.
            debug!("MIME parse failed, using raw body fallback");
            return fallback_body(rest);
        };

        for part in &msg.parts {
            if is_attachment(part) {
                continue;
            }
            if let PartType::Text(text) = &part.body {
                if is_plain_text(part) {
                    return Some(text.to_string());
                }
            }
        }

        for part in &msg.parts {
            if is_attachment(part) {
                continue;
            }
            if let PartType::Html(html) = &part.body {
                return Some(self.html.reduce(html));
            }
        }

        None
    }
}

fn is_attachment(part: &mail_parser::MessagePart<'_>) -> bool {
    part.content_disposition()
        .is_some_and(|cd| cd.ctype().eq_ignore_ascii_case("attachment"))
}

/// A missing Content-Type defaults to text/plain per RFC 2045.
fn is_plain_text(part: &mail_parser::MessagePart<'_>) -> bool {
    match part.content_type() {
        None => true,
        Some(ct) => {
            ct.ctype().eq_ignore_ascii_case("text")
                && ct
                    .subtype()
                    .is_none_or(|s| s.eq_ignore_ascii_case("plain"))
        }
    }
}

/// Split the `From ` envelope line off the front of a raw message.
fn split_envelope(bytes: &[u8]) -> (String, &[u8]) {
    // Strip a BOM so the first message of a file behaves like the others.
    let bytes = if bytes.starts_with(&[0xEF, 0xBB, 0xBF]) {
        &bytes[3..]
    } else {
        bytes
    };

    if bytes.starts_with(b"From ") {
        if let Some(pos) = bytes.iter().position(|&b| b == b'\n') {
            let line = decode_bytes(&bytes[..pos]);
            return (line.trim_end().to_string(), &bytes[pos + 1..]);
        }
    }
    // RawMessage invariant says this does not happen; synthesize the
    // conventional marker rather than failing the message.
    ("From MAILER-DAEMON".to_string(), bytes)
}

/// Collect the outer header block as raw entries.
///
/// Names keep their original spelling; values keep their folded continuation
/// lines embedded so copy-through re-emits them verbatim. Duplicates are
/// preserved in source order.
fn outer_headers(rest: &[u8]) -> Vec<HeaderEntry> {
    let header_end = find_blank_line(rest).unwrap_or(rest.len());
    let text = decode_bytes(&rest[..header_end]);

    let mut entries: Vec<HeaderEntry> = Vec::new();
    for line in text.lines() {
        if line.starts_with(' ') || line.starts_with('\t') {
            // Folded continuation, kept verbatim on its own line.
            if let Some(last) = entries.last_mut() {
                last.value.push('\n');
                last.value.push_str(line.trim_end());
            }
        } else if let Some(colon) = line.find(':') {
            let name = line[..colon].to_string();
            let value = line[colon + 1..]
                .strip_prefix(' ')
                .unwrap_or(&line[colon + 1..])
                .trim_end()
                .to_string();
            entries.push(HeaderEntry::new(name, value));
        }
        // Lines with no colon that are not continuations are skipped.
    }
    entries
}

/// Everything after the first blank line, decoded lossily.
fn fallback_body(rest: &[u8]) -> Option<String> {
    find_blank_line(rest).map(|pos| {
        let body_start = if rest[pos..].starts_with(b"\r\n\r\n") {
            pos + 4
        } else {
            pos + 2
        };
        decode_bytes(&rest[body_start.min(rest.len())..])
    })
}

/// Offset of the blank line terminating the header block.
fn find_blank_line(bytes: &[u8]) -> Option<usize> {
    bytes
        .windows(2)
        .position(|w| w == b"\n\n")
        .or_else(|| bytes.windows(4).position(|w| w == b"\r\n\r\n"))
}

/// Decode bytes as UTF-8, falling back to Windows-1252, which accepts
/// every byte sequence.
fn decode_bytes(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            decoded.into_owned()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(bytes: &[u8]) -> RawMessage {
        RawMessage {
            offset: 0,
            bytes: bytes.to_vec(),
        }
    }

    fn lightener() -> MessageLightener {
        MessageLightener::new(QuoteStripper::new(3))
    }

    #[test]
    fn test_plain_text_stripped_and_headers_filtered() {
        let msg = raw(
            b"From alice@example.com Thu Jan 01 00:00:00 2024\n\
              Received: from mx1.example.com\n\
              Received: from mx2.example.com\n\
              Date: Thu, 04 Jan 2024 10:00:00 +0000\n\
              From: Alice <alice@example.com>\n\
              To: bob@example.com\n\
              Subject: Hi\n\
              Message-ID: <1@example.com>\n\
              X-Spam-Score: 5.0\n\
              \n\
              fresh text\n\
              > quoted one\n\
              > quoted two\n\
              > quoted three\n",
        );
        let reduced = lightener().lighten(&msg).unwrap().expect("has content");
        assert_eq!(reduced.envelope, "From alice@example.com Thu Jan 01 00:00:00 2024");
        assert_eq!(reduced.body, "fresh text");
        // Both Received headers survive, in order; X-Spam-Score does not.
        let names: Vec<&str> = reduced.headers.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(
            names,
            ["Received", "Received", "Date", "From", "To", "Subject", "Message-ID"]
        );
        assert_eq!(reduced.subject(), Some("Hi"));
    }

    #[test]
    fn test_attachment_only_message_has_no_content() {
        let msg = raw(
            b"From alice@example.com Thu Jan 01 00:00:00 2024\n\
              Subject: report\n\
              MIME-Version: 1.0\n\
              Content-Type: multipart/mixed; boundary=\"B\"\n\
              \n\
              --B\n\
              Content-Type: application/pdf\n\
              Content-Disposition: attachment; filename=\"report.pdf\"\n\
              Content-Transfer-Encoding: base64\n\
              \n\
              JVBERi0xLjQ=\n\
              --B--\n",
        );
        assert!(lightener().lighten(&msg).unwrap().is_none());
    }

    #[test]
    fn test_text_attachment_is_not_a_body() {
        let msg = raw(
            b"From alice@example.com Thu Jan 01 00:00:00 2024\n\
              Subject: log file\n\
              MIME-Version: 1.0\n\
              Content-Type: multipart/mixed; boundary=\"B\"\n\
              \n\
              --B\n\
              Content-Type: text/plain\n\
              Content-Disposition: attachment; filename=\"server.log\"\n\
              \n\
              log line\n\
              --B--\n",
        );
        assert!(lightener().lighten(&msg).unwrap().is_none());
    }

    #[test]
    fn test_html_fallback_is_reduced_and_stripped() {
        let msg = raw(
            b"From alice@example.com Thu Jan 01 00:00:00 2024\n\
              Subject: html only\n\
              MIME-Version: 1.0\n\
              Content-Type: text/html\n\
              \n\
              <p>kept line<br>&gt; q one<br>&gt; q two<br>&gt; q three</p>\n",
        );
        let reduced = lightener().lighten(&msg).unwrap().expect("has content");
        assert_eq!(reduced.body, "kept line");
    }

    #[test]
    fn test_plain_part_preferred_over_html() {
        let msg = raw(
            b"From alice@example.com Thu Jan 01 00:00:00 2024\n\
              Subject: alt\n\
              MIME-Version: 1.0\n\
              Content-Type: multipart/alternative; boundary=\"B\"\n\
              \n\
              --B\n\
              Content-Type: text/html\n\
              \n\
              <p>html body</p>\n\
              --B\n\
              Content-Type: text/plain\n\
              \n\
              plain body\n\
              --B--\n",
        );
        let reduced = lightener().lighten(&msg).unwrap().expect("has content");
        assert_eq!(reduced.body, "plain body");
    }

    #[test]
    fn test_folded_header_kept_verbatim() {
        let msg = raw(
            b"From alice@example.com Thu Jan 01 00:00:00 2024\n\
              Subject: a subject that\n\
              \tspans two lines\n\
              \n\
              body\n",
        );
        let reduced = lightener().lighten(&msg).unwrap().expect("has content");
        let subject = &reduced.headers[0];
        assert_eq!(subject.name, "Subject");
        assert_eq!(subject.value, "a subject that\n\tspans two lines");
    }

    #[test]
    fn test_trailing_only_mode() {
        let msg = raw(
            b"From alice@example.com Thu Jan 01 00:00:00 2024\n\
              Subject: t\n\
              \n\
              > early a\n\
              > early b\n\
              > early c\n\
              middle\n\
              > tail a\n\
              > tail b\n\
              > tail c\n",
        );
        let lightener = lightener().trailing_only(true);
        let reduced = lightener.lighten(&msg).unwrap().expect("has content");
        assert_eq!(reduced.body, "> early a\n> early b\n> early c\nmiddle");
    }
}
