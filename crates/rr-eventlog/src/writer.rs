//! The append-only log writer.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use rr_core::LogEntry;

use crate::summary::rebuild_summary;

/// An open handle to a session's event log. Owns the file for the
/// session's lifetime; callers append one `LogEntry` per log-worthy event.
pub struct EventWriter {
    path: PathBuf,
    file: BufWriter<File>,
}

impl EventWriter {
    /// Open (creating if absent) the log at `path`. If reopening an
    /// existing log whose last write was torn — the final byte is not a
    /// newline — truncate back to the last complete line boundary before
    /// appending further, so a crash mid-write never leaves a corrupt
    /// trailing line for readers to choke on.
    pub fn open(path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(path)?;

        truncate_partial_trailing_line(&mut file)?;

        Ok(Self {
            path: path.to_path_buf(),
            file: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serialize `entry` as one JSON line, append it durably, then rebuild
    /// the summary sidecar so it reflects every entry written so far —
    /// a dashboard tailing the sidecar never waits on the session to end,
    /// and a crash right after this call still leaves a summary on disk.
    pub fn append(&mut self, entry: &LogEntry) -> std::io::Result<()> {
        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');
        self.file.write_all(&line)?;
        self.file.flush()?;
        self.file.get_ref().sync_data()?;
        rebuild_summary(&self.path)?;
        Ok(())
    }
}

/// If the file's final byte is not `\n`, seek back to the previous
/// newline and truncate there. A file with no newline at all truncates
/// to empty.
fn truncate_partial_trailing_line(file: &mut File) -> std::io::Result<()> {
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(());
    }

    let mut last_byte = [0u8; 1];
    file.seek(SeekFrom::Start(len - 1))?;
    file.read_exact(&mut last_byte)?;
    if last_byte[0] == b'\n' {
        file.seek(SeekFrom::End(0))?;
        return Ok(());
    }

    // Scan backward for the previous newline.
    let mut content = Vec::with_capacity(len as usize);
    file.seek(SeekFrom::Start(0))?;
    file.read_to_end(&mut content)?;

    let boundary = content
        .iter()
        .rposition(|&b| b == b'\n')
        .map(|idx| idx + 1)
        .unwrap_or(0);

    file.set_len(boundary as u64)?;
    file.seek(SeekFrom::End(0))?;
    Ok(())
}
