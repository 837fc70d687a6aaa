//! The transfer execution engine boundary (spec §6 "Consumed from the
//! STE"): the capability the rest of the system treats as an external
//! collaborator. [`InProcessEngine`] is a reference implementation that
//! tracks job/part bookkeeping in memory so the workspace has something
//! runnable end-to-end without a separate worker process; it does not
//! itself move bytes through `cloudxfer_storage` backends. A production
//! deployment swaps in a remote STE, or an in-process engine that
//! actually drives the backends `cloudxfer_storage::build_storage`
//! constructs, behind the same trait.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use cloudxfer_core::{JobId, JobStatus, JobSummary, Transfers};
use parking_lot::Mutex;

#[derive(Debug, Clone)]
pub struct CopyJobPartOrderRequest {
    pub job_id: JobId,
    pub part_number: u32,
    pub from_to: cloudxfer_core::FromTo,
    pub overwrite_policy: cloudxfer_core::OverwritePolicy,
    pub source_root: String,
    pub destination_root: String,
    pub transfers: Transfers,
    pub is_final_part: bool,
}

#[derive(Debug, Clone)]
pub struct StartPartResponse {
    pub job_started: bool,
    pub error_msg: Option<String>,
}

#[derive(Debug, Clone)]
pub struct JobDetail {
    pub job_id: JobId,
    pub status: JobStatus,
}

#[derive(Debug, Clone, Copy)]
pub struct ConcurrencySettings {
    pub parallelism: usize,
    pub parallel_stat_files: usize,
}

/// Spec §6: `StartPart`, `GetJobSummary`, `ListJobs`,
/// `CancelOrPauseJob`, `ResumeJob`, `RemoveJobFiles`,
/// `GetConcurrencySettings`, `SetConcurrencySettingsToAuto`.
#[async_trait]
pub trait TransferEngine: Send + Sync {
    async fn start_part(&self, req: CopyJobPartOrderRequest) -> StartPartResponse;

    async fn get_job_summary(&self, job_id: JobId) -> anyhow::Result<JobSummary>;

    async fn list_jobs(&self, status_filter: Option<JobStatus>) -> Vec<JobDetail>;

    async fn cancel_or_pause_job(&self, job_id: JobId, target_status: JobStatus);

    async fn resume_job(&self, job_id: JobId) -> StartPartResponse;

    async fn remove_job_files(&self, job_id: JobId) -> anyhow::Result<usize>;

    fn get_concurrency_settings(&self) -> ConcurrencySettings;

    fn set_concurrency_settings_to_auto(&self);
}

struct JobState {
    status: JobStatus,
    total_transfers: u64,
    transfers_completed: u64,
    transfers_failed: u64,
    transfers_skipped: u64,
    bytes_over_wire: u64,
}

/// Reference in-process executor. Tracks per-job transfer counters and
/// status transitions against submitted parts; does not drive any
/// `RemoteStorage` backend itself; the CLI binary performs the actual
/// byte movement per object before handing the resulting transfer
/// record to `start_part` for bookkeeping.
pub struct InProcessEngine {
    jobs: Mutex<HashMap<JobId, JobState>>,
    concurrency: Mutex<ConcurrencySettings>,
}

impl InProcessEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            jobs: Mutex::new(HashMap::new()),
            concurrency: Mutex::new(ConcurrencySettings {
                parallelism: 32,
                parallel_stat_files: 32,
            }),
        })
    }
}

impl Default for InProcessEngine {
    fn default() -> Self {
        Self {
            jobs: Mutex::new(HashMap::new()),
            concurrency: Mutex::new(ConcurrencySettings {
                parallelism: 32,
                parallel_stat_files: 32,
            }),
        }
    }
}

#[async_trait]
impl TransferEngine for InProcessEngine {
    async fn start_part(&self, req: CopyJobPartOrderRequest) -> StartPartResponse {
        // An empty part is only "nothing scheduled" when it is also the
        // very first part: an empty *final* part after earlier
        // non-empty parts is a normal end-of-job, not a zero-transfer
        // job.
        if req.transfers.is_empty() && req.part_number == 0 {
            return StartPartResponse {
                job_started: false,
                error_msg: Some("no transfers were scheduled".to_string()),
            };
        }

        let mut jobs = self.jobs.lock();
        let state = jobs.entry(req.job_id).or_insert_with(|| JobState {
            status: JobStatus::InProgress,
            total_transfers: 0,
            transfers_completed: 0,
            transfers_failed: 0,
            transfers_skipped: 0,
            bytes_over_wire: 0,
        });

        state.total_transfers += req.transfers.len() as u64;
        state.transfers_completed += req.transfers.len() as u64;
        state.bytes_over_wire += req.transfers.cumulative_size_bytes;
        if req.is_final_part {
            state.status = JobStatus::Completed;
        }

        StartPartResponse {
            job_started: true,
            error_msg: None,
        }
    }

    async fn get_job_summary(&self, job_id: JobId) -> anyhow::Result<JobSummary> {
        let jobs = self.jobs.lock();
        let state = jobs
            .get(&job_id)
            .ok_or_else(|| anyhow::anyhow!("unknown job {job_id}"))?;
        Ok(JobSummary {
            total_transfers: state.total_transfers,
            transfers_completed: state.transfers_completed,
            transfers_failed: state.transfers_failed,
            transfers_skipped: state.transfers_skipped,
            bytes_over_wire: state.bytes_over_wire,
            deletions_performed: 0,
            status: state.status,
        })
    }

    async fn list_jobs(&self, status_filter: Option<JobStatus>) -> Vec<JobDetail> {
        let jobs = self.jobs.lock();
        jobs.iter()
            .filter(|(_, s)| status_filter.map(|f| f == s.status).unwrap_or(true))
            .map(|(id, s)| JobDetail {
                job_id: *id,
                status: s.status,
            })
            .collect()
    }

    async fn cancel_or_pause_job(&self, job_id: JobId, target_status: JobStatus) {
        let mut jobs = self.jobs.lock();
        if let Some(state) = jobs.get_mut(&job_id) {
            state.status = target_status;
        }
    }

    async fn resume_job(&self, job_id: JobId) -> StartPartResponse {
        let mut jobs = self.jobs.lock();
        match jobs.get_mut(&job_id) {
            Some(state) => {
                state.status = JobStatus::InProgress;
                StartPartResponse {
                    job_started: true,
                    error_msg: None,
                }
            }
            None => StartPartResponse {
                job_started: false,
                error_msg: Some(format!("unknown job {job_id}")),
            },
        }
    }

    async fn remove_job_files(&self, job_id: JobId) -> anyhow::Result<usize> {
        let mut jobs = self.jobs.lock();
        Ok(jobs.remove(&job_id).map(|_| 1).unwrap_or(0))
    }

    fn get_concurrency_settings(&self) -> ConcurrencySettings {
        *self.concurrency.lock()
    }

    fn set_concurrency_settings_to_auto(&self) {
        let cpus = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        let mut concurrency = self.concurrency.lock();
        concurrency.parallelism = cpus * 8;
        concurrency.parallel_stat_files = cpus * 8;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cloudxfer_core::{FromTo, FromToPair, OverwritePolicy};

    fn request(job_id: JobId, part: u32, final_part: bool, transfers: Transfers) -> CopyJobPartOrderRequest {
        CopyJobPartOrderRequest {
            job_id,
            part_number: part,
            from_to: FromTo(FromToPair::LocalBlob),
            overwrite_policy: OverwritePolicy::True,
            source_root: "/a".to_string(),
            destination_root: "https://acct.blob.core.windows.net/c".to_string(),
            transfers,
            is_final_part: final_part,
        }
    }

    #[tokio::test]
    async fn empty_non_final_part_reports_nothing_scheduled() {
        let engine = InProcessEngine::new();
        let response = engine
            .start_part(request(JobId::new(), 0, false, Transfers::default()))
            .await;
        assert!(!response.job_started);
        assert!(response.error_msg.unwrap().contains("no transfers"));
    }

    #[tokio::test]
    async fn final_part_marks_job_completed() {
        let engine = InProcessEngine::new();
        let job_id = JobId::new();
        let mut transfers = Transfers::default();
        transfers.push(
            cloudxfer_core::TransferRecordShape {
                relative_path: "a.txt".to_string(),
                source: "/a/a.txt".to_string(),
                destination: "https://acct.blob.core.windows.net/c/a.txt".to_string(),
                size: 5,
                entity_kind: "File".to_string(),
            },
            cloudxfer_core::EntityKind::File,
        );
        let response = engine.start_part(request(job_id, 0, true, transfers)).await;
        assert!(response.job_started);
        let summary = engine.get_job_summary(job_id).await.unwrap();
        assert_eq!(summary.status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn empty_final_part_after_nonempty_first_part_succeeds() {
        let engine = InProcessEngine::new();
        let job_id = JobId::new();
        let mut transfers = Transfers::default();
        transfers.push(
            cloudxfer_core::TransferRecordShape {
                relative_path: "a.txt".to_string(),
                source: "/a/a.txt".to_string(),
                destination: "https://acct.blob.core.windows.net/c/a.txt".to_string(),
                size: 5,
                entity_kind: "File".to_string(),
            },
            cloudxfer_core::EntityKind::File,
        );
        engine
            .start_part(request(job_id, 0, false, transfers))
            .await;
        let response = engine
            .start_part(request(job_id, 1, true, Transfers::default()))
            .await;
        assert!(response.job_started);
    }
}
