//! Quote-block removal.
//!
//! Deletes maximal contiguous runs of quoted lines when a run is at least
//! `blocksize` lines long. Shorter runs are kept, since brief quotes are more
//! likely genuine inline citations than reply noise. A blank line breaks run
//! contiguity: quoted lines on either side of one count as two separate runs.

use regex::Regex;

/// Default minimum run length for deletion.
pub const DEFAULT_BLOCKSIZE: usize = 3;

/// Removes runs of quoted lines from decoded body text.
///
/// Line classification: a line is quoted when a `>` occurs within its first
/// three characters. With the angle-bracket policy on (the default), a `<`
/// within those same three characters disqualifies the line, so HTML-ish
/// fragments like `<p>` are not mistaken for quotes. Attribution headers
/// (`On ... wrote:`) optionally count as quoted too, which lets them fall
/// with the block they introduce and keeps the whole pass idempotent.
pub struct QuoteStripper {
    blocksize: usize,
    exclude_angle: bool,
    strip_attribution: bool,
    attribution: Regex,
}

impl QuoteStripper {
    /// Create a stripper with the given minimum block size and default
    /// policies (angle-bracket exclusion on, attribution stripping on).
    pub fn new(blocksize: usize) -> Self {
        Self {
            blocksize: blocksize.max(1),
            exclude_angle: true,
            strip_attribution: true,
            attribution: Regex::new(r"^On .*wrote:").expect("valid pattern"),
        }
    }

    /// Whether a `<` in the first three characters disqualifies a line.
    pub fn exclude_angle(mut self, on: bool) -> Self {
        self.exclude_angle = on;
        self
    }

    /// Whether `On ... wrote:` attribution lines count as quoted.
    pub fn strip_attribution(mut self, on: bool) -> Self {
        self.strip_attribution = on;
        self
    }

    /// Remove every maximal run of at least `blocksize` quoted lines.
    ///
    /// Remaining lines keep their relative order; leading and trailing blank
    /// lines are trimmed and the result carries no trailing newline.
    pub fn strip(&self, text: &str) -> String {
        let lines: Vec<&str> = text.lines().collect();
        let keep = self.keep_flags(&lines, false);
        assemble(&lines, &keep)
    }

    /// Like [`strip`](Self::strip), but only deletes a qualifying run that
    /// extends to the end of input. Quoted blocks embedded earlier in the
    /// body are left alone; useful for dropping a trailing signature quote.
    ///
    /// Blank edge lines are trimmed before classification so a terminating
    /// blank line does not shield the trailing run.
    pub fn strip_trailing(&self, text: &str) -> String {
        let lines: Vec<&str> = text.lines().collect();
        let lines = trim_blank_edges(&lines);
        let keep = self.keep_flags(lines, true);
        assemble(lines, &keep)
    }

    /// Single pass over the lines, accumulating the current run of quoted
    /// line indices and flagging a run for deletion when it closes at
    /// `blocksize` or more. Deletion happens later in one filtering step,
    /// so no index arithmetic is invalidated.
    fn keep_flags(&self, lines: &[&str], trailing_only: bool) -> Vec<bool> {
        let mut keep = vec![true; lines.len()];
        let mut run: Vec<usize> = Vec::new();

        for (i, line) in lines.iter().enumerate() {
            if self.is_quoted_line(line) {
                run.push(i);
            } else {
                if !trailing_only && run.len() >= self.blocksize {
                    for &j in &run {
                        keep[j] = false;
                    }
                }
                run.clear();
            }
        }
        // A run still open at end of input is deleted in both modes.
        if run.len() >= self.blocksize {
            for &j in &run {
                keep[j] = false;
            }
        }
        keep
    }

    fn is_quoted_line(&self, line: &str) -> bool {
        let mut has_gt = false;
        let mut has_lt = false;
        for c in line.chars().take(3) {
            match c {
                '>' => has_gt = true,
                '<' => has_lt = true,
                _ => {}
            }
        }
        if has_gt && !(self.exclude_angle && has_lt) {
            return true;
        }
        self.strip_attribution && self.attribution.is_match(line)
    }
}

impl Default for QuoteStripper {
    fn default() -> Self {
        Self::new(DEFAULT_BLOCKSIZE)
    }
}

/// Drop blank lines from both ends of the slice.
fn trim_blank_edges<'a, 'b>(lines: &'a [&'b str]) -> &'a [&'b str] {
    let Some(start) = lines.iter().position(|l| !l.trim().is_empty()) else {
        return &[];
    };
    let end = lines
        .iter()
        .rposition(|l| !l.trim().is_empty())
        .expect("start exists");
    &lines[start..=end]
}

/// Apply the keep flags and trim blank lines from both ends.
fn assemble(lines: &[&str], keep: &[bool]) -> String {
    let kept: Vec<&str> = lines
        .iter()
        .zip(keep)
        .filter(|(_, &k)| k)
        .map(|(l, _)| *l)
        .collect();

    let Some(start) = kept.iter().position(|l| !l.trim().is_empty()) else {
        return String::new();
    };
    let end = kept
        .iter()
        .rposition(|l| !l.trim().is_empty())
        .expect("start exists");
    kept[start..=end].join("\n")
}
