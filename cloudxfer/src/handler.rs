//! Caller-facing callbacks (spec §9's cyclic-reference note): a
//! `Handler` is driven by the `Client`, never the reverse, so the
//! `LifecycleManager`'s close-functions only ever capture an `Arc<dyn
//! Handler>`, not a back-reference into the client itself.

use cloudxfer_core::JobId;
use cloudxfer_engine::ProgressSnapshot;

/// Capability surface a caller can observe a running job through.
/// Every method has a no-op default so callers implement only what they
/// need.
pub trait Handler: Send + Sync {
    fn on_start(&self, _job_id: JobId) {}

    /// Sync only: fired once per object as the comparator resolves it,
    /// ahead of any dispatch. Copy has no destination enumeration phase
    /// and never calls this.
    fn on_scan_progress(&self, _scanned: u64) {}

    fn on_transfer_progress(&self, _snapshot: &ProgressSnapshot) {}

    fn on_finish(&self, _job_id: JobId, _outcome: &cloudxfer_engine::Outcome) {}
}

/// Default handler: a terminal progress bar plus a one-line start/finish
/// banner on stderr.
pub struct TerminalHandler {
    bar: cloudxfer_engine::TerminalProgressBar,
}

impl TerminalHandler {
    pub fn new() -> Self {
        Self {
            bar: cloudxfer_engine::TerminalProgressBar::new(),
        }
    }
}

impl Default for TerminalHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl Handler for TerminalHandler {
    fn on_start(&self, job_id: JobId) {
        tracing::info!(%job_id, "job started");
    }

    fn on_scan_progress(&self, scanned: u64) {
        self.bar.set_total(scanned);
    }

    fn on_transfer_progress(&self, snapshot: &ProgressSnapshot) {
        self.bar.update(snapshot);
    }

    fn on_finish(&self, job_id: JobId, outcome: &cloudxfer_engine::Outcome) {
        match outcome {
            cloudxfer_engine::Outcome::Completed => {
                self.bar.finish(format!("job {job_id} complete"));
            }
            cloudxfer_engine::Outcome::Cancelled => {
                self.bar.finish(format!("job {job_id} cancelled"));
            }
            cloudxfer_engine::Outcome::Errored(msg) => {
                self.bar.finish(format!("job {job_id} failed: {msg}"));
            }
        }
    }
}

/// Silent handler: used by `--quiet` and by any library caller that
/// wants the return value only.
pub struct NoOpHandler;
impl Handler for NoOpHandler {}
