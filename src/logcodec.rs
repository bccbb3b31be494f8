// src/logcodec.rs

//! Append-only per-unit execution log.
//!
//! Each execution is framed as:
//!
//! ```text
//! ===EXECUTION_START:<RFC3339-timestamp>|<SUCCESS|ERROR>===
//! <stdout then stderr, newline-terminated>
//! ===EXECUTION_END===
//! ```
//!
//! There is no escaping: a body line that equals a marker corrupts the
//! surrounding blocks. Lines outside a start/end pair (for example raw output
//! that cron redirects into the same file) are ignored when decoding, and an
//! unterminated trailing block is dropped.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::Path;

use tracing::debug;

use crate::errors::Result;
use crate::ledger::{ExecutionRecord, ExecutionStatus};

pub const START_PREFIX: &str = "===EXECUTION_START:";
pub const MARKER_SUFFIX: &str = "===";
pub const END_MARKER: &str = "===EXECUTION_END===";

/// Concatenate captured output, stdout first. Interleaving is not preserved.
pub fn combine_output(stdout: &str, stderr: &str) -> String {
    let mut combined = String::with_capacity(stdout.len() + stderr.len());
    combined.push_str(stdout);
    combined.push_str(stderr);
    combined
}

/// Render one record as a framed block.
pub fn encode(record: &ExecutionRecord) -> String {
    let body = record.text();
    let mut out = String::with_capacity(body.len() + 96);

    out.push_str(START_PREFIX);
    out.push_str(&record.timestamp);
    out.push('|');
    out.push_str(record.status.tag());
    out.push_str(MARKER_SUFFIX);
    out.push('\n');

    if !body.is_empty() {
        out.push_str(body);
        if !body.ends_with('\n') {
            out.push('\n');
        }
    }

    out.push_str(END_MARKER);
    out.push('\n');
    out
}

/// Parse every complete block in `text`, in file order.
pub fn decode(text: &str) -> Vec<ExecutionRecord> {
    let mut records = Vec::new();
    let mut current: Option<OpenBlock> = None;

    for raw in text.split_inclusive('\n') {
        let line = raw.trim_end_matches(['\n', '\r']);

        if let Some((timestamp, status)) = parse_start(line) {
            if let Some(open) = current.take() {
                debug!(timestamp = %open.timestamp, "dropping unterminated log block");
            }
            current = Some(OpenBlock {
                timestamp,
                status,
                body: String::new(),
            });
        } else if line == END_MARKER {
            if let Some(open) = current.take() {
                records.push(ExecutionRecord::new(open.timestamp, open.status, open.body));
            }
        } else if let Some(open) = current.as_mut() {
            open.body.push_str(raw);
        }
    }

    if let Some(open) = current {
        debug!(timestamp = %open.timestamp, "dropping truncated trailing log block");
    }

    records
}

struct OpenBlock {
    timestamp: String,
    status: ExecutionStatus,
    body: String,
}

fn parse_start(line: &str) -> Option<(String, ExecutionStatus)> {
    let inner = line.strip_prefix(START_PREFIX)?.strip_suffix(MARKER_SUFFIX)?;
    let (timestamp, tag) = inner.rsplit_once('|')?;
    Some((timestamp.trim().to_string(), ExecutionStatus::from_tag(tag)))
}

/// Append one block to the log at `path`, creating it and its directory.
pub fn append(path: &Path, record: &ExecutionRecord) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(encode(record).as_bytes())?;
    file.flush()?;
    Ok(())
}

/// All records in the log at `path`; a missing log has no records.
pub fn read_log(path: &Path) -> Result<Vec<ExecutionRecord>> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(decode(&text)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

/// Most recent record in the log at `path`.
pub fn latest(path: &Path) -> Result<Option<ExecutionRecord>> {
    Ok(read_log(path)?.pop())
}
