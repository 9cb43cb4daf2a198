//! Mailbox dialect detection.
//!
//! Inspects the first message of a mailbox file and decides whether the
//! archive is classic `From `-delimited mbox or Content-Length-prefixed
//! mboxcl. Line order is significant: an mboxcl archive's first message also
//! ends at a new `From ` line eventually, but its `Content-Length` header
//! appears before that, so the first qualifying match of either kind wins.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use regex::bytes::Regex;
use tracing::debug;

use crate::error::{LightenError, Result};
use crate::model::message::FormatKind;

/// Classifies mailbox files by dialect.
///
/// Owns its compiled header pattern; a single detector can be reused across
/// any number of files without shared mutable state.
pub struct FormatDetector {
    content_length: Regex,
}

impl FormatDetector {
    pub fn new() -> Self {
        Self {
            content_length: Regex::new(r"^Content-Length:[ \t]*[0-9]+")
                .expect("valid pattern"),
        }
    }

    /// Detect the dialect of the mailbox at `path`.
    ///
    /// Skips the first line (the first message's envelope marker, always
    /// present and uninformative), then scans until either a `From ` line
    /// (classic mbox) or a `Content-Length` header (mboxcl) appears.
    /// Returns [`FormatKind::Indeterminate`] if end of file is reached with
    /// neither; callers treat that as fatal for the run.
    pub fn detect(&self, path: impl AsRef<Path>) -> Result<FormatKind> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                LightenError::FileNotFound(path.to_path_buf())
            } else {
                LightenError::io(path, e)
            }
        })?;
        let mut reader = BufReader::new(file);

        let mut line: Vec<u8> = Vec::with_capacity(1024);
        // Skip the first line.
        let first = reader
            .read_until(b'\n', &mut line)
            .map_err(|e| LightenError::io(path, e))?;
        if first == 0 {
            debug!(path = %path.display(), "Empty file, dialect indeterminate");
            return Ok(FormatKind::Indeterminate);
        }

        loop {
            line.clear();
            let n = reader
                .read_until(b'\n', &mut line)
                .map_err(|e| LightenError::io(path, e))?;
            if n == 0 {
                debug!(
                    path = %path.display(),
                    "Reached EOF without 'From ' line or Content-Length header"
                );
                return Ok(FormatKind::Indeterminate);
            }
            if line.starts_with(b"From ") {
                debug!(path = %path.display(), "Found 'From ' line before Content-Length");
                return Ok(FormatKind::Mbox);
            }
            if self.content_length.is_match(&line) {
                debug!(path = %path.display(), "Found Content-Length header in first message");
                return Ok(FormatKind::Mboxcl);
            }
        }
    }
}

impl Default for FormatDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f
    }

    #[test]
    fn test_detect_classic_mbox() {
        let f = write_temp(
            "From a@example.com Thu Jan 01 00:00:00 2024\n\
             Subject: one\n\
             \n\
             body\n\
             From b@example.com Thu Jan 01 00:00:01 2024\n\
             Subject: two\n\
             \n\
             body\n",
        );
        let kind = FormatDetector::new().detect(f.path()).unwrap();
        assert_eq!(kind, FormatKind::Mbox);
    }

    #[test]
    fn test_detect_mboxcl() {
        let f = write_temp(
            "From a@example.com Thu Jan 01 00:00:00 2024\n\
             Subject: one\n\
             Content-Length: 5\n\
             \n\
             body\n",
        );
        let kind = FormatDetector::new().detect(f.path()).unwrap();
        assert_eq!(kind, FormatKind::Mboxcl);
    }

    #[test]
    fn test_content_length_wins_over_later_from_line() {
        // mboxcl archives also contain later From lines; the header comes first.
        let f = write_temp(
            "From a@example.com Thu Jan 01 00:00:00 2024\n\
             Content-Length: 5\n\
             \n\
             body\n\
             From b@example.com Thu Jan 01 00:00:01 2024\n",
        );
        let kind = FormatDetector::new().detect(f.path()).unwrap();
        assert_eq!(kind, FormatKind::Mboxcl);
    }

    #[test]
    fn test_detect_indeterminate() {
        let f = write_temp("From a@example.com Thu Jan 01 00:00:00 2024\nSubject: only\n");
        let kind = FormatDetector::new().detect(f.path()).unwrap();
        assert_eq!(kind, FormatKind::Indeterminate);
    }

    #[test]
    fn test_detect_empty_file() {
        let f = write_temp("");
        let kind = FormatDetector::new().detect(f.path()).unwrap();
        assert_eq!(kind, FormatKind::Indeterminate);
    }

    #[test]
    fn test_content_length_requires_digits() {
        let f = write_temp(
            "From a@example.com Thu Jan 01 00:00:00 2024\n\
             Content-Length: soon\n",
        );
        let kind = FormatDetector::new().detect(f.path()).unwrap();
        assert_eq!(kind, FormatKind::Indeterminate);
    }

    #[test]
    fn test_missing_file() {
        let err = FormatDetector::new().detect("/no/such/file.mbox").unwrap_err();
        assert!(matches!(err, LightenError::FileNotFound(_)));
    }
}
