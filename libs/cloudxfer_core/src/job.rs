//! Job identity and aggregate progress types (spec §3): `JobId`,
//! `Transfers`, `JobSummary`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 128-bit identifier minted per Copy/Sync invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        JobId(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(JobId(Uuid::parse_str(s)?))
    }
}

/// Container for the donor concept with the same name: a list of
/// transfer records plus cumulative per-kind counters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transfers {
    pub list: Vec<TransferRecordShape>,
    pub file_count: u64,
    pub folder_count: u64,
    pub symlink_count: u64,
    pub hardlink_converted_count: u64,
    pub cumulative_size_bytes: u64,
}

/// A single per-object transfer order, as it appears inside a job part's
/// `Transfers` payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRecordShape {
    pub relative_path: String,
    pub source: String,
    pub destination: String,
    pub size: u64,
    pub entity_kind: String,
}

impl Transfers {
    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn push(&mut self, record: TransferRecordShape, kind: crate::stored_object::EntityKind) {
        use crate::stored_object::EntityKind::*;
        match kind {
            File => self.file_count += 1,
            Folder => self.folder_count += 1,
            Symlink => self.symlink_count += 1,
            Hardlink => self.hardlink_converted_count += 1,
            Other => {}
        }
        self.cumulative_size_bytes += record.size;
        self.list.push(record);
    }

    pub fn take(&mut self) -> Transfers {
        std::mem::take(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    InProgress,
    Completed,
    Failed,
    Cancelling,
    Cancelled,
    Paused,
}

impl JobStatus {
    pub fn is_done(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

/// Aggregate progress summary (spec §3), as returned by the STE's
/// `GetJobSummary`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSummary {
    pub total_transfers: u64,
    pub transfers_completed: u64,
    pub transfers_failed: u64,
    pub transfers_skipped: u64,
    pub bytes_over_wire: u64,
    pub deletions_performed: u64,
    pub status: JobStatus,
}

impl JobSummary {
    pub fn is_job_done(&self) -> bool {
        self.status.is_done()
    }

    pub fn percent_complete(&self) -> f64 {
        if self.total_transfers == 0 {
            return 100.0;
        }
        let done = self.transfers_completed + self.transfers_failed + self.transfers_skipped;
        (done as f64 / self.total_transfers as f64) * 100.0
    }
}
