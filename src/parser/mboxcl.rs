//! Parser for mboxcl-flavor mailboxes, such as those produced by old
//! versions of Dovecot.
//!
//! In this dialect each message's header block carries a `Content-Length`
//! header declaring the exact byte count of the body that follows, and the
//! next message starts one newline after the declared body end. Length
//! values cannot be trusted: a body may itself contain text that looks like
//! a `Content-Length` header, and real headers may be wrong. The parser
//! therefore validates every candidate boundary against the `From ` envelope
//! marker and resumes scanning past false positives, which guarantees
//! forward progress on every iteration.
//!
//! The whole file is mapped read-only for the duration of a run, since
//! boundary recovery may require arbitrary forward re-scanning.

use std::fs::File;
use std::path::Path;

use memmap2::Mmap;
use regex::bytes::Regex;
use tracing::{debug, info};

use crate::error::{LightenError, Result};
use crate::model::message::RawMessage;

/// Recovers message boundaries in a Content-Length-prefixed mailbox.
///
/// Owns its compiled header pattern; reusable across files with no shared
/// mutable state.
pub struct MboxclParser {
    // Matches a Content-Length header only when it terminates the header
    // block (immediately followed by the blank line before the body).
    content_length: Regex,
}

impl MboxclParser {
    pub fn new() -> Self {
        Self {
            content_length: Regex::new(r"\nContent-Length:[ \t]*([0-9]+)\n\n")
                .expect("valid pattern"),
        }
    }

    /// Map the file at `path` read-only and parse it.
    pub fn parse_file(&self, path: impl AsRef<Path>) -> Result<Vec<RawMessage>> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                LightenError::FileNotFound(path.to_path_buf())
            } else {
                LightenError::io(path, e)
            }
        })?;
        let len = file
            .metadata()
            .map_err(|e| LightenError::io(path, e))?
            .len();
        if len == 0 {
            return Err(LightenError::NotAnMbox(path.to_path_buf()));
        }
        // SAFETY: the map is read-only and the file is not mutated during a run.
        let mmap = unsafe { Mmap::map(&file) }.map_err(|e| LightenError::io(path, e))?;
        self.parse_bytes(&mmap, path)
    }

    /// Parse the full byte content of an mboxcl mailbox into an ordered
    /// sequence of raw messages.
    ///
    /// Returns an empty vector when the Content-Length pattern never matches;
    /// callers should treat that as "no length-prefixed structure present".
    /// `path` is used for error context only.
    pub fn parse_bytes(&self, data: &[u8], path: &Path) -> Result<Vec<RawMessage>> {
        if !data.starts_with(b"From ") {
            return Err(LightenError::NotAnMbox(path.to_path_buf()));
        }

        let mut messages: Vec<RawMessage> = Vec::new();
        let mut message_start: usize = 0;
        let mut search_start: usize = 0;
        let mut matched_any = false;

        while search_start < data.len() {
            let Some(caps) = self.content_length.captures(&data[search_start..]) else {
                break;
            };
            matched_any = true;
            let whole = caps.get(0).expect("match 0 always present");
            // First byte of the declared body.
            let header_end = search_start + whole.end();

            let digits = &caps[1];
            let declared = match std::str::from_utf8(digits)
                .ok()
                .and_then(|s| s.parse::<usize>().ok())
            {
                Some(n) => n,
                None => {
                    // Digit run too large for usize, cannot be a real length.
                    debug!(offset = header_end, "Unparseable Content-Length value");
                    search_start = header_end;
                    continue;
                }
            };

            match header_end.checked_add(declared) {
                Some(candidate_end) if is_valid_boundary(data, candidate_end) => {
                    debug!(
                        start = message_start,
                        end = candidate_end,
                        declared,
                        "Valid Content-Length, emitting message"
                    );
                    messages.push(RawMessage {
                        offset: message_start as u64,
                        bytes: data[message_start..candidate_end].to_vec(),
                    });
                    // Skip the single newline separating body and next envelope.
                    message_start = candidate_end + 1;
                    search_start = message_start;
                }
                _ => {
                    debug!(
                        offset = header_end,
                        declared, "Spurious Content-Length, resuming scan past match"
                    );
                    search_start = header_end;
                }
            }
        }

        // Whatever remains after the last genuine boundary is the final
        // message (e.g. a trailing message whose declared length was wrong).
        if matched_any && message_start < data.len() {
            messages.push(RawMessage {
                offset: message_start as u64,
                bytes: data[message_start..].to_vec(),
            });
        }

        info!(count = messages.len(), "Finished mboxcl parse");
        Ok(messages)
    }
}

impl Default for MboxclParser {
    fn default() -> Self {
        Self::new()
    }
}

/// A candidate body end is genuine when it is exactly end-of-file, or a
/// newline followed by end-of-file or the next `From ` envelope marker.
fn is_valid_boundary(data: &[u8], end: usize) -> bool {
    if end == data.len() {
        return true;
    }
    if end > data.len() || data[end] != b'\n' {
        return false;
    }
    end + 1 == data.len() || data[end + 1..].starts_with(b"From ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    /// Build one correctly length-prefixed message (no trailing separator).
    fn message(sender: &str, subject: &str, body: &str) -> String {
        format!(
            "From {sender} Thu Jan 01 00:00:00 2024\n\
             From: {sender}\n\
             Subject: {subject}\n\
             Content-Length: {}\n\
             \n\
             {body}",
            body.len()
        )
    }

    fn parse(data: &str) -> Result<Vec<RawMessage>> {
        MboxclParser::new().parse_bytes(data.as_bytes(), &PathBuf::from("test.mbox"))
    }

    #[test]
    fn test_three_messages_round_trip() {
        let msgs = [
            message("a@example.com", "one", "first body\n"),
            message("b@example.com", "two", "second body, longer\n"),
            message("c@example.com", "three", "third\n"),
        ];
        let archive = msgs.join("\n");
        let parsed = parse(&archive).unwrap();
        assert_eq!(parsed.len(), 3);
        for (raw, original) in parsed.iter().zip(&msgs) {
            assert_eq!(raw.bytes, original.as_bytes());
        }
        // Ranges plus separators reconstruct the input exactly.
        let rebuilt: Vec<String> = parsed
            .iter()
            .map(|m| String::from_utf8(m.bytes.clone()).unwrap())
            .collect();
        assert_eq!(rebuilt.join("\n"), archive);
    }

    #[test]
    fn test_offsets_are_message_starts() {
        let archive = [
            message("a@example.com", "one", "x\n"),
            message("b@example.com", "two", "y\n"),
        ]
        .join("\n");
        let parsed = parse(&archive).unwrap();
        assert_eq!(parsed[0].offset, 0);
        assert_eq!(parsed[1].offset, parsed[0].len() as u64 + 1);
        assert!(archive.as_bytes()[parsed[1].offset as usize..].starts_with(b"From "));
    }

    #[test]
    fn test_false_positive_in_body_is_recovered() {
        // The second message has no usable Content-Length header, but its
        // body embeds a lookalike whose value does not lead to a valid
        // boundary. The scan must reject the lookalike, keep going, and the
        // remainder rule must still emit the message whole.
        let msg_a = message("a@example.com", "clean", "first body\n");
        let msg_b = "From b@example.com Thu Jan 01 00:00:00 2024\n\
                     Subject: trap\n\
                     \n\
                     start of body\n\
                     Content-Length: 4\n\
                     \n\
                     not really a boundary\n";
        let archive = format!("{msg_a}\n{msg_b}");
        let parsed = parse(&archive).unwrap();
        assert_eq!(parsed.len(), 2, "false positive must not split the message");
        assert_eq!(parsed[0].bytes, msg_a.as_bytes());
        assert_eq!(parsed[1].bytes, msg_b.as_bytes());
    }

    #[test]
    fn test_declared_length_too_short_recovers_remainder() {
        // Declared length 5 bytes short of the real body; no later valid
        // boundary exists, so the remainder-to-EOF rule recovers the message.
        let body = "a body that is longer than declared\n";
        let archive = format!(
            "From a@example.com Thu Jan 01 00:00:00 2024\n\
             Subject: short\n\
             Content-Length: {}\n\
             \n\
             {body}",
            body.len() - 5
        );
        let parsed = parse(&archive).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].bytes, archive.as_bytes());
    }

    #[test]
    fn test_zero_matches_yields_empty() {
        let archive = "From a@example.com Thu Jan 01 00:00:00 2024\n\
                       Subject: no length header\n\
                       \n\
                       body\n";
        let parsed = parse(archive).unwrap();
        assert!(parsed.is_empty());
    }

    #[test]
    fn test_not_an_mbox() {
        let err = parse("Subject: no envelope\n\nbody\n").unwrap_err();
        assert!(matches!(err, LightenError::NotAnMbox(_)));
    }

    #[test]
    fn test_final_message_without_trailing_newline() {
        let body = "ends without newline";
        let archive = format!(
            "From a@example.com Thu Jan 01 00:00:00 2024\n\
             Content-Length: {}\n\
             \n\
             {body}",
            body.len()
        );
        let parsed = parse(&archive).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].bytes, archive.as_bytes());
    }
}
