//! The session lockfile: cross-process, per-(project,branch) mutual
//! exclusion with stale-owner reclaim, modeled on
//! `flock(2)`-based `csa-lock` guard plus `csa-config`'s
//! write-temp-then-rename persistence.
//!
//! Unlike `csa-lock` (an advisory flock whose only payload is a PID
//! diagnostic), this lock's content IS the synchronization state: callers
//! compare-and-set on `sessionId` to move it through
//! `pending -> running -> {completed, failed, interrupted}`, then delete
//! it. The flock is layered underneath purely to serialize the read-modify-
//! write of that JSON record across processes racing to acquire or touch it.

mod record;

pub use record::LockRecord;

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use sysinfo::{Pid, ProcessesToUpdate, System};

use rr_core::error::RrError;
use rr_core::ids::SessionId;
use rr_core::sanitize::sanitize_project_path;
use rr_core::types::{CurrentAgent, LockState, SessionMode};

/// Heartbeats land every 5 seconds; a lock is stale once its recorded
/// heartbeat is `HEARTBEAT_STALE_MULTIPLIER` times older than that,
/// per the "short compared to iteration timeout" cadence rule.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);
const HEARTBEAT_STALE_MULTIPLIER: i64 = 3;

/// Compute the lock file path for a (project, branch) pair:
/// `<stateRoot>/<sanitized-project-path>[/<branch>].lock`.
pub fn lock_path(state_root: &Path, project_path: &str, branch: Option<&str>) -> PathBuf {
    let project_dir = state_root.join(sanitize_project_path(project_path));
    match branch {
        Some(b) if !b.is_empty() => project_dir.join(format!("{}.lock", rr_core::sanitize::sanitize(b))),
        _ => project_dir.join("default.lock"),
    }
}

/// A held session lock. The file is advisory-locked via `flock` for the
/// duration of each mutating call and released between calls; the struct
/// itself just remembers where the record lives and which session owns it.
#[derive(Clone)]
pub struct SessionLock {
    path: PathBuf,
    session_id: SessionId,
}

impl SessionLock {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Acquire the lock for `(project_path, branch)`. Writes a `pending`
    /// record if absent. If a record exists and is terminal or stale, it is
    /// deleted and acquisition retried once. Otherwise fails with
    /// `LockContention`.
    pub fn acquire(
        state_root: &Path,
        project_path: &str,
        branch: Option<&str>,
        session_name: &str,
        session_id: SessionId,
    ) -> Result<Self, RrError> {
        let path = lock_path(state_root, project_path, branch);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        {
            let mut file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(&path)?;
            let fd = file.as_raw_fd();
            // SAFETY: `fd` is owned by `file`, opened just above.
            unsafe {
                libc::flock(fd, libc::LOCK_EX);
            }

            let existing = read_record(&mut file)?;
            let reclaim = match &existing {
                None => true,
                Some(record) => record.state.is_terminal() || is_stale(record),
            };

            if existing.is_some() && !reclaim {
                unsafe {
                    libc::flock(fd, libc::LOCK_UN);
                }
                return Err(RrError::LockContention);
            }

            let record = LockRecord {
                session_name: session_name.to_string(),
                session_id: session_id.clone(),
                project_path: project_path.to_string(),
                branch: branch.map(str::to_string),
                pid: std::process::id(),
                started_at: Utc::now(),
                state: LockState::Pending,
                mode: SessionMode::Foreground,
                current_agent: None,
                iteration: 0,
                last_heartbeat: Utc::now(),
                end_time: None,
                reason: None,
            };
            write_record(&mut file, &record)?;
            unsafe {
                libc::flock(fd, libc::LOCK_UN);
            }

            // A stale/terminal record, if any, is overwritten with our own
            // pending record inside the same flock-guarded critical section
            // above, so there is no separate delete-then-retry pass to run.
            Ok(Self { path, session_id })
        }
    }

    /// Compare-and-set `pending -> running`, stamping `pid`/`mode`/
    /// `currentAgent` and refreshing the heartbeat.
    pub fn promote(
        &self,
        expected_session_id: &SessionId,
        mode: SessionMode,
        current_agent: Option<CurrentAgent>,
    ) -> Result<(), RrError> {
        self.mutate(expected_session_id, |record| {
            record.state = LockState::Running;
            record.mode = mode;
            record.current_agent = current_agent;
            record.pid = std::process::id();
            record.last_heartbeat = Utc::now();
            Ok(())
        })
    }

    /// Refresh the heartbeat and, optionally, `currentAgent`/`iteration`.
    /// A guard mismatch (another session now owns the lock) is non-fatal:
    /// the caller has simply been superseded.
    pub fn touch(
        &self,
        expected_session_id: &SessionId,
        current_agent: Option<CurrentAgent>,
        iteration: Option<u32>,
    ) -> Result<(), RrError> {
        let result = self.mutate(expected_session_id, |record| {
            record.last_heartbeat = Utc::now();
            if let Some(agent) = current_agent {
                record.current_agent = Some(agent);
            }
            if let Some(iteration) = iteration {
                record.iteration = iteration;
            }
            Ok(())
        });
        match result {
            Ok(()) | Err(RrError::LockContention) => Ok(()),
            Err(other) => Err(other),
        }
    }

    /// Set a terminal state with `endTime`/`reason`, then delete the file.
    /// A guard mismatch is a no-op: the lock has already changed hands.
    pub fn release(
        &self,
        expected_session_id: &SessionId,
        terminal_state: LockState,
        reason: &str,
    ) -> Result<(), RrError> {
        debug_assert!(terminal_state.is_terminal());
        let mut file = OpenOptions::new().read(true).write(true).open(&self.path)?;
        let fd = file.as_raw_fd();
        unsafe {
            libc::flock(fd, libc::LOCK_EX);
        }

        let current = read_record(&mut file)?;
        let owns = matches!(&current, Some(r) if &r.session_id == expected_session_id);
        if owns {
            let mut record = current.expect("just matched Some above");
            record.state = terminal_state;
            record.end_time = Some(Utc::now());
            record.reason = Some(reason.to_string());
            write_record(&mut file, &record)?;
            drop(file);
            fs::remove_file(&self.path).or_else(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    Ok(())
                } else {
                    Err(e)
                }
            })?;
        } else {
            unsafe {
                libc::flock(fd, libc::LOCK_UN);
            }
        }
        Ok(())
    }

    fn mutate(
        &self,
        expected_session_id: &SessionId,
        f: impl FnOnce(&mut LockRecord) -> Result<(), RrError>,
    ) -> Result<(), RrError> {
        let mut file = OpenOptions::new().read(true).write(true).open(&self.path)?;
        let fd = file.as_raw_fd();
        unsafe {
            libc::flock(fd, libc::LOCK_EX);
        }
        let guard = scopeguard(fd);

        let mut record = match read_record(&mut file)? {
            Some(record) if &record.session_id == expected_session_id => record,
            _ => {
                drop(guard);
                return Err(RrError::LockContention);
            }
        };
        f(&mut record)?;
        write_record(&mut file, &record)?;
        drop(guard);
        Ok(())
    }
}

/// Releases the flock on drop so early returns (including `?`) can't leak
/// a held lock.
struct FlockGuard(i32);

impl Drop for FlockGuard {
    fn drop(&mut self) {
        unsafe {
            libc::flock(self.0, libc::LOCK_UN);
        }
    }
}

fn scopeguard(fd: i32) -> FlockGuard {
    FlockGuard(fd)
}

fn read_record(file: &mut File) -> std::io::Result<Option<LockRecord>> {
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;
    if contents.trim().is_empty() {
        return Ok(None);
    }
    match serde_json::from_str(&contents) {
        Ok(record) => Ok(Some(record)),
        Err(e) => {
            tracing::warn!(error = %e, "lock file contents unreadable, treating as absent");
            Ok(None)
        }
    }
}

fn write_record(file: &mut File, record: &LockRecord) -> std::io::Result<()> {
    use std::io::{Seek, SeekFrom};
    let json = serde_json::to_vec(record)?;
    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    file.write_all(&json)?;
    file.flush()?;
    file.sync_data()?;
    Ok(())
}

/// A lock is stale if its heartbeat predates the staleness threshold AND
/// its recorded pid is not a live process.
fn is_stale(record: &LockRecord) -> bool {
    if record.state.is_terminal() {
        return false;
    }
    let age = Utc::now() - record.last_heartbeat;
    let stale_threshold = HEARTBEAT_INTERVAL * HEARTBEAT_STALE_MULTIPLIER as u32;
    let threshold = chrono::Duration::from_std(stale_threshold).unwrap_or(chrono::Duration::zero());
    age > threshold && !pid_is_alive(record.pid)
}

fn pid_is_alive(pid: u32) -> bool {
    let mut sys = System::new();
    sys.refresh_processes(ProcessesToUpdate::Some(&[Pid::from_u32(pid)]), true);
    sys.process(Pid::from_u32(pid)).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rr_core::ids::SessionId;

    #[test]
    fn acquire_writes_pending_record() {
        let dir = tempfile::tempdir().unwrap();
        let id = SessionId::new();
        let lock = SessionLock::acquire(dir.path(), "/proj", None, "my-session", id.clone()).unwrap();
        assert!(lock.path().exists());
    }

    #[test]
    fn second_acquire_while_running_fails_with_contention() {
        let dir = tempfile::tempdir().unwrap();
        let id1 = SessionId::new();
        let lock1 = SessionLock::acquire(dir.path(), "/proj", None, "s1", id1.clone()).unwrap();
        lock1.promote(&id1, SessionMode::Foreground, None).unwrap();

        let id2 = SessionId::new();
        let result = SessionLock::acquire(dir.path(), "/proj", None, "s2", id2);
        assert!(matches!(result, Err(RrError::LockContention)));
    }

    #[test]
    fn promote_moves_pending_to_running() {
        let dir = tempfile::tempdir().unwrap();
        let id = SessionId::new();
        let lock = SessionLock::acquire(dir.path(), "/proj", None, "s1", id.clone()).unwrap();
        lock.promote(&id, SessionMode::Foreground, Some(CurrentAgent::Reviewer))
            .unwrap();

        let mut file = OpenOptions::new().read(true).open(lock.path()).unwrap();
        let record = read_record(&mut file).unwrap().unwrap();
        assert!(matches!(record.state, LockState::Running));
        assert!(matches!(record.current_agent, Some(CurrentAgent::Reviewer)));
    }

    #[test]
    fn touch_with_mismatched_session_is_non_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let id = SessionId::new();
        let lock = SessionLock::acquire(dir.path(), "/proj", None, "s1", id.clone()).unwrap();
        let other = SessionId::new();
        assert!(lock.touch(&other, None, Some(3)).is_ok());
    }

    #[test]
    fn release_deletes_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let id = SessionId::new();
        let lock = SessionLock::acquire(dir.path(), "/proj", None, "s1", id.clone()).unwrap();
        lock.release(&id, LockState::Completed, "fixer signalled stop").unwrap();
        assert!(!lock.path().exists());
    }

    #[test]
    fn release_with_mismatched_session_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        let id = SessionId::new();
        let lock = SessionLock::acquire(dir.path(), "/proj", None, "s1", id.clone()).unwrap();
        let other = SessionId::new();
        lock.release(&other, LockState::Completed, "wrong owner").unwrap();
        assert!(lock.path().exists());
    }

    #[test]
    fn stale_dead_pid_lock_is_reclaimed() {
        let dir = tempfile::tempdir().unwrap();
        let id1 = SessionId::new();
        let path = lock_path(dir.path(), "/proj", None);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let stale = LockRecord {
            session_name: "dead".into(),
            session_id: id1.clone(),
            project_path: "/proj".into(),
            branch: None,
            pid: 999_999_999,
            started_at: Utc::now() - chrono::Duration::hours(1),
            state: LockState::Running,
            mode: SessionMode::Foreground,
            current_agent: None,
            iteration: 2,
            last_heartbeat: Utc::now() - chrono::Duration::hours(1),
            end_time: None,
            reason: None,
        };
        fs::write(&path, serde_json::to_vec(&stale).unwrap()).unwrap();

        let id2 = SessionId::new();
        let result = SessionLock::acquire(dir.path(), "/proj", None, "s2", id2.clone());
        assert!(result.is_ok());
        assert_eq!(result.unwrap().session_id(), &id2);
    }

    #[test]
    fn distinct_branches_use_distinct_lock_files() {
        let dir = tempfile::tempdir().unwrap();
        let a = lock_path(dir.path(), "/proj", Some("main"));
        let b = lock_path(dir.path(), "/proj", Some("feature/x"));
        assert_ne!(a, b);
    }
}
