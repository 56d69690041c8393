//! Line-oriented integer source feeding the pipeline input.

use crate::error::{PipelineError, Result};
use crate::stage::PipelineValue;
use crossbeam::channel::Sender;
use std::io::BufRead;
use tracing::{debug, warn};

/// Line that stops the source
pub const EXIT_COMMAND: &str = "exit";

/// A classified input line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceLine {
    Value(PipelineValue),
    Exit,
    Blank,
}

/// Totals reported when the source stops
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SourceSummary {
    pub accepted: u64,
    pub rejected: u64,
    /// Stopped on the exit command rather than end of input
    pub exited: bool,
}

pub fn parse_line(line: &str) -> Result<SourceLine> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(SourceLine::Blank);
    }
    if trimmed == EXIT_COMMAND {
        return Ok(SourceLine::Exit);
    }

    trimmed
        .parse()
        .map(SourceLine::Value)
        .map_err(|source| PipelineError::Parse {
            input: trimmed.to_string(),
            source,
        })
}

/// Feed integers read from `reader` into `sender` until the exit command,
/// end of input, or the pipeline input closing.
///
/// Malformed lines are handed to `on_reject` and skipped.
pub fn run_source<R, F>(
    mut reader: R,
    sender: &Sender<PipelineValue>,
    mut on_reject: F,
) -> Result<SourceSummary>
where
    R: BufRead,
    F: FnMut(&PipelineError),
{
    let mut summary = SourceSummary::default();
    let mut buf = Vec::new();

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }

        // Invalid UTF-8 decodes to replacement characters and fails to parse.
        match parse_line(&String::from_utf8_lossy(&buf)) {
            Ok(SourceLine::Value(value)) => {
                if sender.send(value).is_err() {
                    debug!("pipeline input closed, stopping source");
                    break;
                }
                summary.accepted += 1;
            }
            Ok(SourceLine::Exit) => {
                summary.exited = true;
                break;
            }
            Ok(SourceLine::Blank) => {}
            Err(err) => {
                warn!(%err, "skipping malformed input");
                summary.rejected += 1;
                on_reject(&err);
            }
        }
    }

    debug!(?summary, "source finished");
    Ok(summary)
}
