//! Transfer Dispatcher (spec component C8, §4.8): accumulates
//! `StoredObject`s scheduled for transfer into fixed-size job parts,
//! submits them to the STE, and signals first-part/final-part events.

use std::sync::Arc;

use cloudxfer_core::{
    EntityKind, Error, FromTo, JobId, OverwritePolicy, Result, StoredObject, TransferRecordShape,
    Transfers,
};
use cloudxfer_ste::{CopyJobPartOrderRequest, TransferEngine};
use rand::seq::SliceRandom;

/// Callbacks the dispatcher fires at the part boundaries named in
/// spec §4.8's glossary ("First-part dispatched", "Final part").
pub trait DispatchEvents: Send + Sync {
    fn on_first_part_dispatched(&self) {}
    fn on_last_part_dispatched(&self) {}
}

pub struct NoOpDispatchEvents;
impl DispatchEvents for NoOpDispatchEvents {}

/// Turns a `StoredObject` plus the root strings it was traversed under
/// into the wire-shaped transfer record the STE expects.
fn to_transfer_record(
    object: &StoredObject,
    source_root: &str,
    destination_root: &str,
) -> TransferRecordShape {
    let relative = object.relative_path.trim_start_matches('/');
    TransferRecordShape {
        relative_path: object.relative_path.clone(),
        source: format!("{}/{}", source_root.trim_end_matches('/'), relative),
        destination: format!("{}/{}", destination_root.trim_end_matches('/'), relative),
        size: object.size,
        entity_kind: format!("{:?}", object.entity_kind),
    }
}

pub struct Dispatcher {
    engine: Arc<dyn TransferEngine>,
    events: Arc<dyn DispatchEvents>,
    job_id: JobId,
    from_to: FromTo,
    overwrite_policy: OverwritePolicy,
    source_root: String,
    destination_root: String,
    transfers_per_part: usize,
    /// `true` for Copy (shuffle parts before submission), `false` for
    /// Sync (preserve traversal order) — spec §4.8, §5.
    shuffle_parts: bool,

    pending: Transfers,
    /// Hardlinks queued separately (spec §4.8): for modes that transfer
    /// two distinct entity classes, file-parts flush before
    /// hardlink-parts at finalization so the destination's regular
    /// files all exist before anything tries to link to them.
    pending_hardlinks: Transfers,
    next_part_number: u32,
    first_part_dispatched: bool,
}

impl Dispatcher {
    pub fn new(
        engine: Arc<dyn TransferEngine>,
        events: Arc<dyn DispatchEvents>,
        job_id: JobId,
        from_to: FromTo,
        overwrite_policy: OverwritePolicy,
        source_root: String,
        destination_root: String,
        transfers_per_part: usize,
        shuffle_parts: bool,
    ) -> Self {
        Self {
            engine,
            events,
            job_id,
            from_to,
            overwrite_policy,
            source_root,
            destination_root,
            transfers_per_part,
            shuffle_parts,
            pending: Transfers::default(),
            pending_hardlinks: Transfers::default(),
            next_part_number: 0,
            first_part_dispatched: false,
        }
    }

    /// Transforms `object` into a transfer record and appends it to the
    /// queue its entity kind belongs to; submits a full part once
    /// `transfers_per_part` is reached in that queue.
    pub async fn schedule(&mut self, object: StoredObject) -> Result<()> {
        let record = to_transfer_record(&object, &self.source_root, &self.destination_root);
        let is_hardlink = matches!(object.entity_kind, EntityKind::Hardlink);

        if is_hardlink {
            self.pending_hardlinks.push(record, object.entity_kind);
            if self.pending_hardlinks.len() == self.transfers_per_part {
                self.submit(true, false).await?;
            }
        } else {
            self.pending.push(record, object.entity_kind);
            if self.pending.len() == self.transfers_per_part {
                self.submit(false, false).await?;
            }
        }
        Ok(())
    }

    async fn submit(&mut self, is_hardlink_queue: bool, is_final_part: bool) -> Result<()> {
        let part_number = self.next_part_number;
        self.next_part_number += 1;

        let queue = if is_hardlink_queue {
            &mut self.pending_hardlinks
        } else {
            &mut self.pending
        };
        let mut transfers = queue.take();
        if self.shuffle_parts && !is_final_part {
            transfers.list.shuffle(&mut rand::thread_rng());
        }

        let req = CopyJobPartOrderRequest {
            job_id: self.job_id,
            part_number,
            from_to: self.from_to,
            overwrite_policy: self.overwrite_policy,
            source_root: self.source_root.clone(),
            destination_root: self.destination_root.clone(),
            transfers,
            is_final_part,
        };

        let response = self.engine.start_part(req).await;
        if !response.job_started {
            let msg = response.error_msg.unwrap_or_default();
            if msg.contains("no transfers") {
                return Err(Error::NothingScheduled);
            }
            return Err(Error::Ste(msg));
        }

        if part_number == 0 && !self.first_part_dispatched {
            self.first_part_dispatched = true;
            self.events.on_first_part_dispatched();
        }
        if is_final_part {
            self.events.on_last_part_dispatched();
        }
        Ok(())
    }

    /// Flushes whatever is pending, files before hardlinks (spec
    /// §4.8). `IsFinalPart=true` lands on the last part actually
    /// submitted: the hardlink part when one exists, otherwise the
    /// (possibly empty) file part. A "no transfers scheduled" reply
    /// from the STE becomes [`Error::NothingScheduled`] so callers can
    /// treat an empty Sync as success.
    pub async fn dispatch_final_part(&mut self) -> Result<()> {
        let hardlinks_pending = !self.pending_hardlinks.is_empty();

        if !self.pending.is_empty() || !hardlinks_pending {
            self.submit(false, !hardlinks_pending).await?;
        }
        if hardlinks_pending {
            self.submit(true, true).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cloudxfer_core::FromToPair;
    use cloudxfer_ste::InProcessEngine;
    use parking_lot::Mutex;
    use std::time::SystemTime;

    fn make_dispatcher(transfers_per_part: usize, shuffle: bool) -> Dispatcher {
        Dispatcher::new(
            InProcessEngine::new(),
            Arc::new(NoOpDispatchEvents),
            JobId::new(),
            FromTo(FromToPair::LocalBlob),
            OverwritePolicy::True,
            "/a".to_string(),
            "https://acct.blob.core.windows.net/c".to_string(),
            transfers_per_part,
            shuffle,
        )
    }

    #[tokio::test]
    async fn submits_full_parts_at_the_configured_size() {
        let mut dispatcher = make_dispatcher(2, false);
        for i in 0..5 {
            let object = StoredObject::new(
                format!("f{i}.txt"),
                10,
                SystemTime::now(),
                EntityKind::File,
            );
            dispatcher.schedule(object).await.unwrap();
        }
        assert_eq!(dispatcher.next_part_number, 2);
        dispatcher.dispatch_final_part().await.unwrap();
        assert_eq!(dispatcher.next_part_number, 3);
    }

    #[tokio::test]
    async fn empty_final_part_is_nothing_scheduled() {
        let mut dispatcher = make_dispatcher(10, false);
        let err = dispatcher.dispatch_final_part().await.unwrap_err();
        assert!(err.is_nothing_scheduled());
    }

    struct RecordingEngine {
        parts: Mutex<Vec<(bool, bool)>>, // (had_any_hardlink, is_final_part)
    }

    #[async_trait::async_trait]
    impl cloudxfer_ste::TransferEngine for RecordingEngine {
        async fn start_part(&self, req: CopyJobPartOrderRequest) -> cloudxfer_ste::StartPartResponse {
            let had_hardlink = req
                .transfers
                .list
                .iter()
                .any(|t| t.entity_kind == format!("{:?}", EntityKind::Hardlink));
            self.parts.lock().push((had_hardlink, req.is_final_part));
            cloudxfer_ste::StartPartResponse {
                job_started: true,
                error_msg: None,
            }
        }

        async fn get_job_summary(&self, _job_id: JobId) -> anyhow::Result<cloudxfer_core::JobSummary> {
            unreachable!()
        }

        async fn list_jobs(&self, _status_filter: Option<cloudxfer_core::JobStatus>) -> Vec<cloudxfer_ste::JobDetail> {
            Vec::new()
        }

        async fn cancel_or_pause_job(&self, _job_id: JobId, _target_status: cloudxfer_core::JobStatus) {}

        async fn resume_job(&self, _job_id: JobId) -> cloudxfer_ste::StartPartResponse {
            unreachable!()
        }

        async fn remove_job_files(&self, _job_id: JobId) -> anyhow::Result<usize> {
            Ok(0)
        }

        fn get_concurrency_settings(&self) -> cloudxfer_ste::ConcurrencySettings {
            cloudxfer_ste::ConcurrencySettings {
                parallelism: 1,
                parallel_stat_files: 1,
            }
        }

        fn set_concurrency_settings_to_auto(&self) {}
    }

    #[tokio::test]
    async fn hardlink_part_flushes_after_file_part_at_finalization() {
        let engine = Arc::new(RecordingEngine { parts: Mutex::new(Vec::new()) });
        let mut dispatcher = Dispatcher::new(
            engine.clone(),
            Arc::new(NoOpDispatchEvents),
            JobId::new(),
            FromTo(FromToPair::FileNFSFileNFS),
            OverwritePolicy::True,
            "/a".to_string(),
            "/b".to_string(),
            10,
            false,
        );

        dispatcher
            .schedule(StoredObject::new("f.txt".to_string(), 10, SystemTime::now(), EntityKind::File))
            .await
            .unwrap();
        dispatcher
            .schedule(StoredObject::new("f-link.txt".to_string(), 10, SystemTime::now(), EntityKind::Hardlink))
            .await
            .unwrap();
        dispatcher.dispatch_final_part().await.unwrap();

        let parts = engine.parts.lock();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0], (false, false));
        assert_eq!(parts[1], (true, true));
    }
}
