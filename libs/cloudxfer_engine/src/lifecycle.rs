//! Lifecycle Manager (spec component C11, §4.11): supervises a running
//! job via adaptive progress polling, interactive cancellation, and a
//! single-shot completion/error fan-in.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::{info, warn};

use cloudxfer_core::{JobId, JobStatus};
use cloudxfer_ste::TransferEngine;

use crate::progress::ProgressTracker;

const INITIAL_POLL_INTERVAL: Duration = Duration::from_secs(2);
const EXTENDED_POLL_INTERVAL: Duration = Duration::from_secs(120);
/// Cumulative transfer count past which the supervisor backs off to the
/// extended polling interval (spec §4.11).
const EXTENDED_POLL_THRESHOLD: u64 = 1_000_000;

/// Outcome of a finished job, handed to whatever close-functions were
/// registered (spec §4.11: "any registered close-functions run under
/// the mutex in registration order exactly once").
#[derive(Debug, Clone)]
pub enum Outcome {
    Completed,
    Cancelled,
    Errored(String),
}

/// Answer to the cancellation confirmation prompt (spec §4.11's
/// "{Yes, No}" cancellation prompt).
pub trait CancellationPrompt: Send + Sync {
    /// Asks whether to cancel despite incomplete enumeration. Returning
    /// `false` means "No": the supervisor reverts to normal polling and
    /// will prompt again on the next cancellation signal.
    fn confirm_cancel_with_incomplete_enumeration(&self) -> bool;
}

/// Always answers "Yes" — suitable for non-interactive callers.
pub struct AlwaysConfirmCancellation;
impl CancellationPrompt for AlwaysConfirmCancellation {
    fn confirm_cancel_with_incomplete_enumeration(&self) -> bool {
        true
    }
}

/// Terminal prompt shown when Ctrl-C arrives before enumeration has
/// finished: the operator has to confirm cancelling a job whose full
/// extent is still unknown.
pub struct TerminalCancellationPrompt;

impl CancellationPrompt for TerminalCancellationPrompt {
    fn confirm_cancel_with_incomplete_enumeration(&self) -> bool {
        dialoguer::Confirm::new()
            .with_prompt("enumeration is still in progress; cancel anyway?")
            .default(false)
            .interact()
            .unwrap_or(false)
    }
}

struct Inner {
    done: AtomicBool,
    outcome: Mutex<Option<Outcome>>,
    notify: Notify,
    close_fns: Mutex<Vec<Box<dyn FnOnce(&Outcome) + Send>>>,
    enumeration_complete: AtomicBool,
    cancel_requested: AtomicBool,
    cancel_scheduled: AtomicBool,
    extended_interval_logged: AtomicBool,
    poll_count: AtomicU32,
    engine: Arc<dyn TransferEngine>,
    job_id: JobId,
}

/// Spec §9's cyclic-reference note: the lifecycle manager owns only
/// close-functions, never a back-reference to a handler or client.
pub struct LifecycleManager {
    inner: Arc<Inner>,
}

impl LifecycleManager {
    pub fn new(engine: Arc<dyn TransferEngine>, job_id: JobId) -> Self {
        Self {
            inner: Arc::new(Inner {
                done: AtomicBool::new(false),
                outcome: Mutex::new(None),
                notify: Notify::new(),
                close_fns: Mutex::new(Vec::new()),
                enumeration_complete: AtomicBool::new(false),
                cancel_requested: AtomicBool::new(false),
                cancel_scheduled: AtomicBool::new(false),
                extended_interval_logged: AtomicBool::new(false),
                poll_count: AtomicU32::new(0),
                engine,
                job_id,
            }),
        }
    }

    /// Registers a close-function, run once when the job finishes, in
    /// registration order.
    pub fn on_close(&self, f: impl FnOnce(&Outcome) + Send + 'static) {
        self.inner.close_fns.lock().push(Box::new(f));
    }

    pub fn mark_enumeration_complete(&self) {
        self.inner.enumeration_complete.store(true, Ordering::Relaxed);
    }

    /// Signals a cancellation request; consumed by the supervisor loop
    /// on its next iteration.
    pub fn request_cancel(&self) {
        self.inner.cancel_requested.store(true, Ordering::Relaxed);
    }

    pub fn is_done(&self) -> bool {
        self.inner.done.load(Ordering::Relaxed)
    }

    /// `true` once a cancellation has been scheduled with the STE.
    /// Scheduling alone does not finish the job: the supervisor keeps
    /// polling until the STE reports a terminal status.
    pub fn cancel_scheduled(&self) -> bool {
        self.inner.cancel_scheduled.load(Ordering::Relaxed)
    }

    /// Idempotent: the first call wins, later calls (including a
    /// subsequent `on_error`) are no-ops (spec §3 invariant, §8
    /// "Lifecycle").
    pub fn on_complete(&self) {
        self.finish(Outcome::Completed);
    }

    pub fn on_error(&self, msg: impl Into<String>) {
        self.finish(Outcome::Errored(msg.into()));
    }

    pub fn on_cancelled(&self) {
        self.finish(Outcome::Cancelled);
    }

    fn finish(&self, outcome: Outcome) {
        if self.inner.done.swap(true, Ordering::AcqRel) {
            return;
        }
        *self.inner.outcome.lock() = Some(outcome.clone());
        let close_fns = std::mem::take(&mut *self.inner.close_fns.lock());
        for f in close_fns {
            f(&outcome);
        }
        self.inner.notify.notify_waiters();
    }

    /// Blocks until `on_complete`/`on_error` has been called.
    pub async fn wait(&self) -> Outcome {
        loop {
            if let Some(outcome) = self.inner.outcome.lock().clone() {
                return outcome;
            }
            self.inner.notify.notified().await;
        }
    }

    /// Evaluates one pending cancellation signal, if any. Schedules a
    /// cancellation with the STE but never fabricates a local outcome:
    /// the caller keeps polling `ProgressTracker` until the STE itself
    /// reports a terminal status (spec §4.11). Split out from
    /// `run_supervisor` so the prompt/re-prompt semantics (spec §8
    /// "Lifecycle") are directly testable without a real poll loop.
    async fn handle_cancel_signal(&self, cancel_prompt: &dyn CancellationPrompt) {
        if !self.inner.cancel_requested.swap(false, Ordering::AcqRel) {
            return;
        }

        let confirmed = if self.inner.enumeration_complete.load(Ordering::Relaxed) {
            true
        } else {
            cancel_prompt.confirm_cancel_with_incomplete_enumeration()
        };

        if !confirmed {
            info!("cancellation declined, resuming normal polling");
            return;
        }

        info!("cancellation confirmed: scheduling cancel with STE");
        self.inner
            .engine
            .cancel_or_pause_job(self.inner.job_id, JobStatus::Cancelled)
            .await;
        self.inner.cancel_scheduled.store(true, Ordering::Relaxed);
    }

    /// Runs the adaptive polling/cancellation supervisor loop (spec
    /// §4.11) until the job reports done. Intended to be spawned as its
    /// own task, parallel to enumeration/dispatch, per spec §5.
    pub async fn run_supervisor(
        &self,
        tracker: Arc<ProgressTracker>,
        cancel_prompt: Arc<dyn CancellationPrompt>,
    ) {
        let mut interval = INITIAL_POLL_INTERVAL;

        loop {
            if self.is_done() {
                return;
            }

            self.handle_cancel_signal(cancel_prompt.as_ref()).await;

            tokio::time::sleep(interval).await;

            match tracker.check_progress().await {
                Ok(snapshot) => {
                    self.inner.poll_count.fetch_add(1, Ordering::Relaxed);
                    if snapshot.is_job_done {
                        match snapshot.status {
                            Some(JobStatus::Cancelled) => self.on_cancelled(),
                            Some(JobStatus::Failed) => self.on_error("job reported as failed"),
                            _ => self.on_complete(),
                        }
                        return;
                    }
                    if snapshot.total_transfers >= EXTENDED_POLL_THRESHOLD
                        && !self.inner.extended_interval_logged.swap(true, Ordering::AcqRel)
                    {
                        warn!(
                            total_transfers = snapshot.total_transfers,
                            "extending progress poll interval to 2 minutes"
                        );
                        interval = EXTENDED_POLL_INTERVAL;
                    }
                }
                Err(err) => {
                    self.on_error(err.to_string());
                    return;
                }
            }
        }
    }
}

/// Test double that answers the cancellation prompt with a fixed
/// sequence, recording how many times it was asked.
#[cfg(test)]
pub struct ScriptedCancellationPrompt {
    answers: Mutex<Vec<bool>>,
    asked: AtomicU64,
}

#[cfg(test)]
impl ScriptedCancellationPrompt {
    pub fn new(answers: Vec<bool>) -> Self {
        Self {
            answers: Mutex::new(answers.into_iter().rev().collect()),
            asked: AtomicU64::new(0),
        }
    }

    pub fn times_asked(&self) -> u64 {
        self.asked.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
impl CancellationPrompt for ScriptedCancellationPrompt {
    fn confirm_cancel_with_incomplete_enumeration(&self) -> bool {
        self.asked.fetch_add(1, Ordering::Relaxed);
        self.answers.lock().pop().unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cloudxfer_ste::InProcessEngine;

    fn test_manager() -> LifecycleManager {
        LifecycleManager::new(InProcessEngine::new(), JobId::new())
    }

    #[test]
    fn on_complete_is_idempotent_and_ignores_later_error() {
        let manager = test_manager();
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();
        manager.on_close(move |_outcome| {
            calls_clone.fetch_add(1, Ordering::Relaxed);
        });

        manager.on_complete();
        manager.on_complete();
        manager.on_error("too late");

        assert_eq!(calls.load(Ordering::Relaxed), 1);
        assert!(manager.is_done());
    }

    #[tokio::test]
    async fn wait_unblocks_after_on_complete() {
        let manager = Arc::new(test_manager());
        let waiter = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.wait().await })
        };
        manager.on_complete();
        let outcome = waiter.await.unwrap();
        assert!(matches!(outcome, Outcome::Completed));
    }

    #[tokio::test]
    async fn cancellation_with_incomplete_enumeration_reprompts_on_no() {
        let manager = test_manager();
        manager.request_cancel();
        let prompt = ScriptedCancellationPrompt::new(vec![false]);
        manager.handle_cancel_signal(&prompt).await;
        assert!(!manager.cancel_scheduled());
        assert!(!manager.is_done());
        assert_eq!(prompt.times_asked(), 1);

        // "No" reverts to normal polling; a second signal re-prompts.
        manager.request_cancel();
        let prompt = ScriptedCancellationPrompt::new(vec![true]);
        manager.handle_cancel_signal(&prompt).await;
        assert!(manager.cancel_scheduled());
        assert_eq!(prompt.times_asked(), 1);
    }

    #[tokio::test]
    async fn cancellation_after_enumeration_complete_skips_the_prompt() {
        let manager = test_manager();
        manager.mark_enumeration_complete();
        manager.request_cancel();
        let prompt = ScriptedCancellationPrompt::new(vec![]);
        manager.handle_cancel_signal(&prompt).await;
        assert!(manager.cancel_scheduled());
        assert_eq!(prompt.times_asked(), 0);
    }

    #[test]
    fn close_functions_run_in_registration_order() {
        let manager = test_manager();
        let order = Arc::new(Mutex::new(Vec::new()));
        let order_a = order.clone();
        let order_b = order.clone();
        manager.on_close(move |_| order_a.lock().push(1));
        manager.on_close(move |_| order_b.lock().push(2));
        manager.on_complete();
        assert_eq!(*order.lock(), vec![1, 2]);
    }
}
