//! End-to-end run: detect the dialect, parse, lighten each message, and
//! append survivors to the output archive.
//!
//! Strictly sequential: messages are processed one at a time in source
//! order, and the output archive is appended to in that same order. Only
//! structural failures abort a run; per-message anomalies are counted and
//! skipped.

use std::path::Path;

use tracing::{debug, info};

use crate::config::Config;
use crate::error::{LightenError, Result};
use crate::export::mbox::MboxWriter;
use crate::lighten::message::MessageLightener;
use crate::lighten::quotes::{QuoteStripper, DEFAULT_BLOCKSIZE};
use crate::model::message::{FormatKind, RawMessage};
use crate::parser::detect::FormatDetector;
use crate::parser::mbox::MboxReader;
use crate::parser::mboxcl::MboxclParser;

/// Options for one lightening run.
#[derive(Debug, Clone)]
pub struct LightenOptions {
    /// Dialect override; `None` means auto-detect.
    pub format: Option<FormatKind>,
    /// Minimum quoted-run length that gets deleted.
    pub blocksize: usize,
    /// A `<` within the first three characters disqualifies a line.
    pub exclude_angle: bool,
    /// `On ... wrote:` attribution lines count as quoted.
    pub strip_attribution: bool,
    /// Only delete a quoted run that reaches the end of the body.
    pub trailing_only: bool,
}

impl Default for LightenOptions {
    fn default() -> Self {
        Self {
            format: None,
            blocksize: DEFAULT_BLOCKSIZE,
            exclude_angle: true,
            strip_attribution: true,
            trailing_only: false,
        }
    }
}

impl LightenOptions {
    /// Seed options from the loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            format: None,
            blocksize: config.strip.blocksize,
            exclude_angle: config.strip.exclude_angle,
            strip_attribution: config.strip.strip_attribution,
            trailing_only: config.strip.trailing_only,
        }
    }
}

/// Counters reported at the end of a run.
#[derive(Debug, Default)]
pub struct RunStats {
    /// Dialect the input was processed as.
    pub format: Option<FormatKind>,
    /// Messages found in the input archive.
    pub scanned: u64,
    /// Reduced messages appended to the output.
    pub written: u64,
    /// Messages with no usable text or HTML part.
    pub skipped_no_content: u64,
    /// Messages that lost their Subject header during reduction.
    pub skipped_no_subject: u64,
    /// Input file size in bytes.
    pub bytes_in: u64,
    /// Bytes appended to the output archive.
    pub bytes_out: u64,
}

/// Lighten `input` into `output`.
///
/// The progress callback receives `(bytes_processed, bytes_total)`.
pub fn run(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    options: &LightenOptions,
    progress: Option<&dyn Fn(u64, u64)>,
) -> Result<RunStats> {
    let input = input.as_ref();
    let output = output.as_ref();

    let format = match options.format {
        Some(kind) => kind,
        None => FormatDetector::new().detect(input)?,
    };
    if format == FormatKind::Indeterminate {
        return Err(LightenError::IndeterminateFormat(input.to_path_buf()));
    }
    info!(input = %input.display(), %format, "Lightening mailbox");

    let stripper = QuoteStripper::new(options.blocksize)
        .exclude_angle(options.exclude_angle)
        .strip_attribution(options.strip_attribution);
    let lightener = MessageLightener::new(stripper).trailing_only(options.trailing_only);

    let mut writer = MboxWriter::open(output)?;
    let mut stats = RunStats {
        format: Some(format),
        bytes_in: std::fs::metadata(input)
            .map_err(|e| LightenError::io(input, e))?
            .len(),
        ..RunStats::default()
    };

    match format {
        FormatKind::Mbox => {
            let mut reader = MboxReader::open(input)?;
            let total = reader.file_size();
            while let Some(item) = reader.next() {
                let raw = item?;
                process(&lightener, &mut writer, &raw, &mut stats)?;
                if let Some(cb) = progress {
                    cb(reader.bytes_read(), total);
                }
            }
        }
        FormatKind::Mboxcl => {
            let messages = MboxclParser::new().parse_file(input)?;
            if messages.is_empty() {
                // Detection promised length-prefixed structure but the
                // strict pattern never matched anywhere.
                return Err(LightenError::IndeterminateFormat(input.to_path_buf()));
            }
            let total = stats.bytes_in;
            for raw in &messages {
                process(&lightener, &mut writer, raw, &mut stats)?;
                if let Some(cb) = progress {
                    cb(raw.offset + raw.len() as u64, total);
                }
            }
        }
        FormatKind::Indeterminate => unreachable!("rejected above"),
    }

    stats.written = writer.messages_written();
    stats.bytes_out = writer.bytes_written();
    info!(
        scanned = stats.scanned,
        written = stats.written,
        skipped_no_content = stats.skipped_no_content,
        skipped_no_subject = stats.skipped_no_subject,
        "Run complete"
    );
    Ok(stats)
}

/// Lighten one message and append it if it survives the policy checks.
fn process(
    lightener: &MessageLightener,
    writer: &mut MboxWriter,
    raw: &RawMessage,
    stats: &mut RunStats,
) -> Result<()> {
    stats.scanned += 1;
    match lightener.lighten(raw)? {
        None => {
            stats.skipped_no_content += 1;
        }
        Some(reduced) => {
            // Reduced messages without a Subject are low-value noise.
            if reduced.subject().is_none() {
                debug!(offset = raw.offset, "Skipping message without Subject");
                stats.skipped_no_subject += 1;
            } else {
                writer.append(&reduced)?;
            }
        }
    }
    Ok(())
}
