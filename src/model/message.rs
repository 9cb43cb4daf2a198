//! Raw message buffers, header entries, and the reduced output message.

use std::fmt;

/// Mailbox dialect, detected once per input file before any parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatKind {
    /// Classic mbox: messages delimited by `From ` lines.
    Mbox,
    /// mboxcl: each message's headers declare the exact body length in a
    /// `Content-Length` header (Dovecot-style).
    Mboxcl,
    /// Neither pattern was found before end of file.
    Indeterminate,
}

impl fmt::Display for FormatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatKind::Mbox => write!(f, "mbox"),
            FormatKind::Mboxcl => write!(f, "mboxcl"),
            FormatKind::Indeterminate => write!(f, "indeterminate"),
        }
    }
}

/// One unparsed message as it appeared in the source archive, including its
/// `From ` envelope line.
///
/// Produced by one of the parsers and consumed exactly once by the lightening
/// step. The buffer is never mutated after construction.
#[derive(Debug, Clone)]
pub struct RawMessage {
    /// Byte offset of the message start inside the source file
    /// (points to the `From ` envelope line).
    pub offset: u64,

    /// Message bytes, envelope line included.
    pub bytes: Vec<u8>,
}

impl RawMessage {
    /// Total byte length of the message.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// An ordered header field as encountered in the source message.
///
/// The name keeps its original spelling and the value is kept raw: folded
/// continuation lines stay embedded so copy-through re-emits them verbatim.
/// Duplicate names are allowed and preserved in source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderEntry {
    pub name: String,
    pub value: String,
}

impl HeaderEntry {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// The output artifact: an allow-listed header sequence plus a single
/// quote-stripped plain-text body.
///
/// Immutable once built; appended to the output archive and never revisited.
#[derive(Debug, Clone)]
pub struct ReducedMessage {
    /// The original `From ` envelope line, without line terminator.
    pub envelope: String,

    /// Headers copied through from the outer message, source order preserved.
    pub headers: Vec<HeaderEntry>,

    /// Post-strip body text, lines joined with `\n`, no trailing newline.
    pub body: String,
}

impl ReducedMessage {
    /// First `Subject` header value, if any.
    ///
    /// Used by the pipeline's post-assembly policy check: messages that lost
    /// their subject during reduction are treated as noise and skipped.
    pub fn subject(&self) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case("subject"))
            .map(|h| h.value.as_str())
    }
}
