//! The on-disk lockfile record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use rr_core::ids::SessionId;
use rr_core::types::{CurrentAgent, LockState, SessionMode};

/// The synchronization payload written to the lock file on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockRecord {
    pub session_name: String,
    pub session_id: SessionId,
    pub project_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    pub pid: u32,
    pub started_at: DateTime<Utc>,
    pub state: LockState,
    pub mode: SessionMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_agent: Option<CurrentAgent>,
    pub iteration: u32,
    pub last_heartbeat: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}
