//! Streaming reader for classic `From `-delimited mbox files.
//!
//! Reads the file line-by-line through a buffered reader and yields one
//! [`RawMessage`] per `From ` boundary. Tolerant of malformed input:
//!
//! - Mixed `\n` and `\r\n` line endings
//! - `From ` lines not preceded by a blank line (logs a warning)
//! - Truncated messages at EOF
//! - NUL bytes and other binary content in the body
//! - UTF-8 BOM at the start of the file
//!
//! `>From ` lines are body content, never separators.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::{LightenError, Result};
use crate::model::message::RawMessage;

/// Size of the internal read buffer.
const READ_BUFFER_SIZE: usize = 1024 * 1024;

/// Maximum message size in bytes (256 MB). Larger messages are truncated.
const MAX_MESSAGE_SIZE: usize = 256 * 1024 * 1024;

/// Iterator over the messages of a classic mbox file.
pub struct MboxReader {
    path: PathBuf,
    reader: BufReader<File>,
    file_size: u64,
    offset: u64,
    /// Envelope line of the next message, carried over from the previous
    /// iteration together with its starting offset.
    pending: Option<(u64, Vec<u8>)>,
    prev_blank: bool,
    at_start: bool,
    done: bool,
}

impl MboxReader {
    /// Open an mbox file for sequential reading.
    ///
    /// Verifies that the file exists and is readable, but does NOT validate
    /// that it is actually an mbox.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let metadata = std::fs::metadata(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                LightenError::FileNotFound(path.clone())
            } else {
                LightenError::io(&path, e)
            }
        })?;
        let file = File::open(&path).map_err(|e| LightenError::io(&path, e))?;
        Ok(Self {
            path,
            reader: BufReader::with_capacity(READ_BUFFER_SIZE, file),
            file_size: metadata.len(),
            offset: 0,
            pending: None,
            prev_blank: true,
            at_start: true,
            done: false,
        })
    }

    /// Total size of the underlying file in bytes.
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Bytes consumed so far, for progress reporting.
    pub fn bytes_read(&self) -> u64 {
        self.offset
    }

    /// Read one line into `buf`, returning its starting offset.
    /// `None` at end of file.
    fn read_line(&mut self, buf: &mut Vec<u8>) -> Result<Option<u64>> {
        buf.clear();
        let start = self.offset;
        let n = self
            .reader
            .read_until(b'\n', buf)
            .map_err(|e| LightenError::io(&self.path, e))?;
        if n == 0 {
            return Ok(None);
        }
        self.offset += n as u64;
        Ok(Some(start))
    }

    /// Skip forward to the first envelope line, returning it with its offset.
    fn find_first_envelope(&mut self) -> Result<Option<(u64, Vec<u8>)>> {
        let mut line: Vec<u8> = Vec::with_capacity(4096);
        loop {
            let Some(start) = self.read_line(&mut line)? else {
                return Ok(None);
            };
            if is_envelope_line(&line) {
                return Ok(Some((start, std::mem::take(&mut line))));
            }
            if !self.at_start {
                warn!(offset = start, "Skipping line before first 'From ' separator");
            }
            self.at_start = false;
            self.prev_blank = is_blank_line(&line);
        }
    }
}

impl Iterator for MboxReader {
    type Item = Result<RawMessage>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        // Start from the carried-over envelope line, or locate the first one.
        let (start, mut message) = match self.pending.take() {
            Some(carried) => carried,
            None => match self.find_first_envelope() {
                Ok(Some(found)) => found,
                Ok(None) => {
                    self.done = true;
                    return None;
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            },
        };
        self.at_start = false;
        self.prev_blank = false;

        let mut truncated = false;
        let mut line: Vec<u8> = Vec::with_capacity(4096);
        loop {
            let line_start = match self.read_line(&mut line) {
                Ok(Some(off)) => off,
                Ok(None) => {
                    // Truncated or final message at EOF.
                    self.done = true;
                    break;
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            };

            if is_envelope_line(&line) {
                if !self.prev_blank {
                    warn!(
                        offset = line_start,
                        "Found 'From ' separator without preceding blank line"
                    );
                }
                self.pending = Some((line_start, std::mem::take(&mut line)));
                break;
            }

            self.prev_blank = is_blank_line(&line);
            if message.len() + line.len() <= MAX_MESSAGE_SIZE {
                message.extend_from_slice(&line);
            } else if !truncated {
                warn!(
                    offset = start,
                    max_size = MAX_MESSAGE_SIZE,
                    "Message exceeds maximum size, truncating body"
                );
                truncated = true;
            }
        }

        Some(Ok(RawMessage {
            offset: start,
            bytes: message,
        }))
    }
}

/// Check whether a line is an mbox separator (`From ` at the start).
fn is_envelope_line(line: &[u8]) -> bool {
    // Skip BOM if present at the very start of the file.
    let line = if line.starts_with(&[0xEF, 0xBB, 0xBF]) {
        &line[3..]
    } else {
        line
    };
    line.starts_with(b"From ")
}

/// Check whether a line is blank (empty or only whitespace / CR / LF).
fn is_blank_line(line: &[u8]) -> bool {
    line.iter()
        .all(|&b| b == b'\n' || b == b'\r' || b == b' ' || b == b'\t')
}
