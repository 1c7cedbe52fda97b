//! Log readers: full rescan and incremental tailing.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use rr_core::LogEntry;

/// Read every line, skipping blanks and discarding malformed lines without
/// aborting, preserving order.
pub fn read_all(path: &Path) -> std::io::Result<Vec<LogEntry>> {
    let content = std::fs::read_to_string(path)?;
    Ok(parse_lines(&content))
}

fn parse_lines(content: &str) -> Vec<LogEntry> {
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match serde_json::from_str::<LogEntry>(line) {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!(error = %e, "discarding malformed log line");
                None
            }
        })
        .collect()
}

/// Opaque resume state for `read_incremental`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResumeState {
    pub offset_bytes: u64,
    pub last_modified: DateTime<Utc>,
    pub trailing_partial_line: String,
    pub boundary_probe: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum IncrementalOutcome {
    /// First read, or a truncation/rewrite was detected: `entries` is the
    /// full content parsed from scratch.
    Reset,
    /// New bytes were appended since `priorState`.
    Incremental,
    /// Size and mtime are unchanged; no new entries.
    Unchanged,
}

const PROBE_WINDOW: usize = 64;

fn boundary_probe(data: &[u8], offset: usize) -> String {
    let window = PROBE_WINDOW.min(offset);
    let slice = &data[offset - window..offset];
    let digest = Sha256::digest(slice);
    hex_encode(&digest)
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Tail `path` given optional prior state, returning the outcome, the new
/// entries (empty unless `Incremental`/`Reset`), and the updated state.
pub fn read_incremental(
    path: &Path,
    prior: Option<&ResumeState>,
) -> std::io::Result<(IncrementalOutcome, Vec<LogEntry>, ResumeState)> {
    let metadata = std::fs::metadata(path)?;
    let len = metadata.len();
    let modified: DateTime<Utc> = metadata.modified()?.into();

    let Some(prior) = prior else {
        return Ok(full_reset(path, len, modified)?);
    };

    if len == prior.offset_bytes && modified == prior.last_modified {
        return Ok((IncrementalOutcome::Unchanged, Vec::new(), prior.clone()));
    }

    if len < prior.offset_bytes {
        return full_reset(path, len, modified);
    }

    let content = std::fs::read(path)?;
    if prior.offset_bytes > 0 {
        let probe_now = boundary_probe(&content, prior.offset_bytes as usize);
        if probe_now != prior.boundary_probe {
            return full_reset(path, len, modified);
        }
    }

    let mut buffer = prior.trailing_partial_line.clone().into_bytes();
    buffer.extend_from_slice(&content[prior.offset_bytes as usize..]);
    let text = String::from_utf8_lossy(&buffer).into_owned();

    let (entries, trailing) = split_complete_lines(&text);

    let new_state = ResumeState {
        offset_bytes: len,
        last_modified: modified,
        trailing_partial_line: trailing,
        boundary_probe: if len > 0 {
            boundary_probe(&content, len as usize)
        } else {
            String::new()
        },
    };

    Ok((IncrementalOutcome::Incremental, entries, new_state))
}

fn full_reset(
    path: &Path,
    len: u64,
    modified: DateTime<Utc>,
) -> std::io::Result<(IncrementalOutcome, Vec<LogEntry>, ResumeState)> {
    let content = std::fs::read_to_string(path)?;
    let (entries, trailing) = split_complete_lines(&content);
    let raw = std::fs::read(path)?;
    let state = ResumeState {
        offset_bytes: len,
        last_modified: modified,
        trailing_partial_line: trailing,
        boundary_probe: if len > 0 {
            boundary_probe(&raw, len as usize)
        } else {
            String::new()
        },
    };
    Ok((IncrementalOutcome::Reset, entries, state))
}

/// Split `text` into parsed complete-line entries plus any trailing partial
/// line (bytes past the last `\n`).
fn split_complete_lines(text: &str) -> (Vec<LogEntry>, String) {
    match text.rfind('\n') {
        Some(idx) => {
            let complete = &text[..=idx];
            let trailing = text[idx + 1..].to_string();
            (parse_lines(complete), trailing)
        }
        None => (Vec::new(), text.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rr_core::types::SessionStatus;

    fn line() -> String {
        serde_json::to_string(&LogEntry::SessionEnd {
            status: SessionStatus::Completed,
            reason: "r".to_string(),
            iterations: 1,
        })
        .unwrap()
    }

    #[test]
    fn read_all_skips_blank_and_malformed_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.jsonl");
        std::fs::write(&path, format!("{}\n\nnot json\n{}\n", line(), line())).unwrap();
        let entries = read_all(&path).unwrap();
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn first_read_is_reset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.jsonl");
        std::fs::write(&path, format!("{}\n", line())).unwrap();
        let (outcome, entries, _state) = read_incremental(&path, None).unwrap();
        assert_eq!(outcome, IncrementalOutcome::Reset);
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn unchanged_file_yields_no_new_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.jsonl");
        std::fs::write(&path, format!("{}\n", line())).unwrap();
        let (_, _, state) = read_incremental(&path, None).unwrap();
        let (outcome, entries, _) = read_incremental(&path, Some(&state)).unwrap();
        assert_eq!(outcome, IncrementalOutcome::Unchanged);
        assert!(entries.is_empty());
    }

    #[test]
    fn appended_bytes_yield_incremental_outcome() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.jsonl");
        std::fs::write(&path, format!("{}\n", line())).unwrap();
        let (_, _, state) = read_incremental(&path, None).unwrap();

        std::thread::sleep(std::time::Duration::from_millis(10));
        let mut f = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        use std::io::Write;
        writeln!(f, "{}", line()).unwrap();

        let (outcome, entries, _) = read_incremental(&path, Some(&state)).unwrap();
        assert_eq!(outcome, IncrementalOutcome::Incremental);
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn truncation_forces_reset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.jsonl");
        std::fs::write(&path, format!("{}\n{}\n", line(), line())).unwrap();
        let (_, _, state) = read_incremental(&path, None).unwrap();

        std::fs::write(&path, format!("{}\n", line())).unwrap();
        let (outcome, entries, _) = read_incremental(&path, Some(&state)).unwrap();
        assert_eq!(outcome, IncrementalOutcome::Reset);
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn buffers_partial_trailing_line_until_complete() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.jsonl");
        let full = line();
        let (first_half, second_half) = full.split_at(full.len() / 2);
        std::fs::write(&path, first_half).unwrap();

        let (outcome, entries, state) = read_incremental(&path, None).unwrap();
        assert_eq!(outcome, IncrementalOutcome::Reset);
        assert!(entries.is_empty());
        assert_eq!(state.trailing_partial_line, first_half);

        std::thread::sleep(std::time::Duration::from_millis(10));
        let mut f = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        use std::io::Write;
        write!(f, "{second_half}\n").unwrap();

        let (outcome, entries, state) = read_incremental(&path, Some(&state)).unwrap();
        assert_eq!(outcome, IncrementalOutcome::Incremental);
        assert_eq!(entries.len(), 1);
        assert!(state.trailing_partial_line.is_empty());
    }
}
