//! Progress Tracker (spec component C10, §4.10): atomic scan counters
//! plus STE-backed throughput computation.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use cloudxfer_core::JobId;
use cloudxfer_ste::TransferEngine;
use parking_lot::Mutex;

/// All counters are relaxed, 64-bit atomics (spec §4.10/§5: "no
/// observable reordering of counter increments is required").
#[derive(Default)]
pub struct ProgressCounters {
    pub source_files_scanned: AtomicU64,
    pub destination_files_scanned: AtomicU64,
    pub skipped_symlinks: AtomicU64,
    pub skipped_special_files: AtomicU64,
    pub skipped_hardlinks: AtomicU64,
    /// Objects the comparator decided not to transfer (spec §8 scenario
    /// 1's "TransfersSkipped"), distinct from the entity-kind skip
    /// counters above, which count objects never even reaching the
    /// comparator.
    pub skipped_transfers: AtomicU64,
    pub deletions_performed: AtomicU64,
    first_part_ordered: AtomicBool,
    scanning_complete: AtomicBool,
}

impl ProgressCounters {
    pub fn mark_first_part_ordered(&self) {
        self.first_part_ordered.store(true, Ordering::Relaxed);
    }

    pub fn mark_scanning_complete(&self) {
        self.scanning_complete.store(true, Ordering::Relaxed);
    }

    pub fn is_scanning_complete(&self) -> bool {
        self.scanning_complete.load(Ordering::Relaxed)
    }
}

/// Result of one `check_progress` poll.
pub struct ProgressSnapshot {
    pub total_transfers: u64,
    pub is_job_done: bool,
    pub status: Option<cloudxfer_core::JobStatus>,
    /// Megabits/sec since the previous poll. `0.0` whenever no part has
    /// been ordered yet, per spec §9's open question about the brief
    /// window between STE acceptance and the tracker observing the flag.
    pub throughput_mbps: f64,
}

pub struct ProgressTracker {
    counters: Arc<ProgressCounters>,
    engine: Arc<dyn TransferEngine>,
    job_id: JobId,
    interval_baseline_bytes: AtomicU64,
    last_poll: Mutex<Instant>,
}

impl ProgressTracker {
    pub fn new(counters: Arc<ProgressCounters>, engine: Arc<dyn TransferEngine>, job_id: JobId) -> Self {
        Self {
            counters,
            engine,
            job_id,
            interval_baseline_bytes: AtomicU64::new(0),
            last_poll: Mutex::new(Instant::now()),
        }
    }

    pub fn counters(&self) -> &ProgressCounters {
        &self.counters
    }

    /// The polling entry point (§4.10): returns `(0, false)` until a
    /// first part has been ordered, otherwise fetches a `JobSummary`
    /// and computes throughput against the previous baseline.
    pub async fn check_progress(&self) -> anyhow::Result<ProgressSnapshot> {
        if !self.counters.first_part_ordered.load(Ordering::Relaxed) {
            return Ok(ProgressSnapshot {
                total_transfers: 0,
                is_job_done: false,
                status: None,
                throughput_mbps: 0.0,
            });
        }

        let summary = self.engine.get_job_summary(self.job_id).await?;

        let now = Instant::now();
        let mut last_poll = self.last_poll.lock();
        let elapsed = now.duration_since(*last_poll).as_secs_f64().max(1e-9);
        *last_poll = now;

        let baseline = self.interval_baseline_bytes.swap(summary.bytes_over_wire, Ordering::Relaxed);
        let delta_bytes = summary.bytes_over_wire.saturating_sub(baseline);
        let throughput_mbps = (delta_bytes as f64 / elapsed) * 8.0 / 1_000_000.0;

        Ok(ProgressSnapshot {
            total_transfers: summary.total_transfers,
            is_job_done: summary.is_job_done(),
            status: Some(summary.status),
            throughput_mbps,
        })
    }
}

/// Renders a [`ProgressSnapshot`] stream to a terminal progress bar.
/// Total length is unknown until enumeration finishes, so the bar runs
/// in spinner style until `set_total` is called, then switches to a
/// bounded bar for the remainder of the job.
pub struct TerminalProgressBar {
    bar: indicatif::ProgressBar,
}

impl TerminalProgressBar {
    pub fn new() -> Self {
        let bar = indicatif::ProgressBar::new_spinner();
        bar.set_style(
            indicatif::ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| indicatif::ProgressStyle::default_spinner()),
        );
        Self { bar }
    }

    pub fn set_total(&self, total_transfers: u64) {
        self.bar.set_length(total_transfers);
        if let Ok(style) = indicatif::ProgressStyle::with_template(
            "{bar:40.cyan/blue} {pos}/{len} transfers ({msg})",
        ) {
            self.bar.set_style(style);
        }
    }

    pub fn update(&self, snapshot: &ProgressSnapshot) {
        self.bar.set_position(snapshot.total_transfers);
        self.bar
            .set_message(format!("{:.1} Mbps", snapshot.throughput_mbps));
    }

    pub fn finish(&self, message: impl Into<std::borrow::Cow<'static, str>>) {
        self.bar.finish_with_message(message);
    }
}

impl Default for TerminalProgressBar {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cloudxfer_ste::InProcessEngine;

    #[tokio::test]
    async fn returns_zero_before_first_part_ordered() {
        let counters = Arc::new(ProgressCounters::default());
        let engine = InProcessEngine::new();
        let tracker = ProgressTracker::new(counters, engine, JobId::new());
        let snapshot = tracker.check_progress().await.unwrap();
        assert_eq!(snapshot.total_transfers, 0);
        assert!(!snapshot.is_job_done);
    }
}
