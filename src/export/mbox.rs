//! Boundary-delimited mbox writer.
//!
//! Appends reduced messages to the output archive in input order. Body
//! lines that would read as separators are `>From `-escaped so the output
//! survives a round trip through any classic mbox reader.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{LightenError, Result};
use crate::model::message::ReducedMessage;

/// Appends reduced messages to a classic mbox file, creating it if absent.
pub struct MboxWriter {
    path: PathBuf,
    file: File,
    needs_leading_newline: bool,
    messages_written: u64,
    bytes_written: u64,
}

impl MboxWriter {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&path)
            .map_err(|e| LightenError::io(&path, e))?;
        let existing = file
            .metadata()
            .map_err(|e| LightenError::io(&path, e))?
            .len();
        Ok(Self {
            path,
            file,
            // Appending to a pre-existing archive: make sure our first
            // envelope line starts on a fresh line.
            needs_leading_newline: existing > 0,
            messages_written: 0,
            bytes_written: 0,
        })
    }

    /// Append one reduced message.
    pub fn append(&mut self, msg: &ReducedMessage) -> Result<()> {
        let mut out = String::with_capacity(msg.body.len() + 256);

        if self.needs_leading_newline {
            out.push('\n');
            self.needs_leading_newline = false;
        }

        out.push_str(&msg.envelope);
        out.push('\n');
        for header in &msg.headers {
            // Folded values carry their continuation lines embedded.
            out.push_str(&header.name);
            out.push_str(": ");
            out.push_str(&header.value);
            out.push('\n');
        }
        out.push('\n');

        for line in msg.body.lines() {
            if line.starts_with("From ") {
                out.push('>');
            }
            out.push_str(line);
            out.push('\n');
        }
        // Blank separator before the next message.
        out.push('\n');

        self.file
            .write_all(out.as_bytes())
            .map_err(|e| LightenError::io(&self.path, e))?;
        self.messages_written += 1;
        self.bytes_written += out.len() as u64;
        debug!(path = %self.path.display(), bytes = out.len(), "Appended reduced message");
        Ok(())
    }

    pub fn messages_written(&self) -> u64 {
        self.messages_written
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::message::HeaderEntry;
    use crate::parser::mbox::MboxReader;

    fn sample(subject: &str, body: &str) -> ReducedMessage {
        ReducedMessage {
            envelope: "From alice@example.com Thu Jan 01 00:00:00 2024".into(),
            headers: vec![
                HeaderEntry::new("From", "Alice <alice@example.com>"),
                HeaderEntry::new("Subject", subject),
            ],
            body: body.into(),
        }
    }

    #[test]
    fn test_round_trips_through_classic_reader() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.mbox");
        {
            let mut writer = MboxWriter::open(&path).unwrap();
            writer.append(&sample("one", "first body")).unwrap();
            writer.append(&sample("two", "second body")).unwrap();
            assert_eq!(writer.messages_written(), 2);
        }
        let messages: Vec<_> = MboxReader::open(&path)
            .unwrap()
            .map(|m| m.unwrap())
            .collect();
        assert_eq!(messages.len(), 2);
        assert!(messages[0].bytes.starts_with(b"From alice@example.com"));
    }

    #[test]
    fn test_from_lines_in_body_are_escaped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.mbox");
        {
            let mut writer = MboxWriter::open(&path).unwrap();
            writer
                .append(&sample("tricky", "From here on, escaped\nplain line"))
                .unwrap();
        }
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("\n>From here on, escaped\n"));
        // Still exactly one message.
        assert_eq!(MboxReader::open(&path).unwrap().count(), 1);
    }

    #[test]
    fn test_appends_to_existing_archive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.mbox");
        {
            let mut writer = MboxWriter::open(&path).unwrap();
            writer.append(&sample("one", "body")).unwrap();
        }
        {
            let mut writer = MboxWriter::open(&path).unwrap();
            writer.append(&sample("two", "body")).unwrap();
        }
        assert_eq!(MboxReader::open(&path).unwrap().count(), 2);
    }

    #[test]
    fn test_folded_header_written_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.mbox");
        {
            let mut writer = MboxWriter::open(&path).unwrap();
            let mut msg = sample("folded", "body");
            msg.headers
                .push(HeaderEntry::new("Received", "from mx1\n\tby mx2"));
            writer.append(&msg).unwrap();
        }
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("Received: from mx1\n\tby mx2\n"));
    }
}
