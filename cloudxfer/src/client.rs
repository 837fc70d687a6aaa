//! `Client` (spec §6): the entry points `main.rs` drives, wiring C1–C12
//! into runnable `copy`/`sync`/`redirect`/job-management/login
//! operations. This is the orchestration layer the rest of the
//! workspace's components are built to be assembled by; per
//! `cloudxfer_ste::engine`'s doc comment, the actual byte movement for
//! each object happens here, with `start_part` used purely for
//! bookkeeping against the transfer execution engine boundary.

use std::str::FromStr;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use futures::StreamExt;

use cloudxfer_core::{
    BucketNameResolver, EntityKind, Error, FromTo, FromToPair, JobId, JobStatus, JobSummary,
    Location, OverwritePolicy, Result, ResourceString, StoredObject,
};
use cloudxfer_engine::{
    cook, destination_first_step, redirection, source_first_step, AlwaysConfirmCancellation,
    AlwaysYesPrompt, CancellationPrompt, CompareOutcome, Deleter, DeletePrompt, DispatchEvents,
    Dispatcher, FilterSet, FilterStats, FolderDeletionManager, InteractiveDeleter, LifecycleManager,
    LocalDeleter, LocalTraverser, NoOpFilterStats, ObjectIndex, Outcome, ProgressCounters,
    ProgressTracker, RawOptions, RedirectionOptions, RemoteDeleter, RemoteTraverser,
    ResourceTraverser, TerminalCancellationPrompt, TerminalDeletePrompt,
};
use cloudxfer_storage::{
    build_storage, select_credential, Credential, CredentialInputs, GenericRemoteStorage,
    RemotePath, RemoteStorage,
};
use cloudxfer_ste::{
    plan, CopyJobPartOrderRequest, InProcessEngine, StartPartResponse, TransferEngine,
};

use crate::config::ProcessConfig;
use crate::handler::Handler;
use crate::login_cache::{CachedToken, LoginCache};

/// Wraps whatever `TransferEngine` the process is using with a side
/// effect: every submitted part is also written to the job-plan folder
/// (spec §6 "Persisted state"), so `jobs list/show/resume/rm` have
/// something to read back in a later invocation that starts with a
/// fresh, empty in-memory engine.
struct PersistingEngine {
    inner: Arc<dyn TransferEngine>,
    plan_folder: Utf8PathBuf,
}

#[async_trait]
impl TransferEngine for PersistingEngine {
    async fn start_part(&self, req: CopyJobPartOrderRequest) -> StartPartResponse {
        let persisted = plan::JobPartPlan {
            job_id: req.job_id,
            part_number: req.part_number,
            from_to: req.from_to.to_string(),
            is_final_part: req.is_final_part,
            source_root: req.source_root.clone(),
            destination_root: req.destination_root.clone(),
            transfers: req.transfers.clone(),
        };
        let response = self.inner.start_part(req).await;
        if response.job_started {
            if let Err(err) = persisted.write(&self.plan_folder).await {
                tracing::warn!(error = %err, "failed to persist job-part plan");
            }
        }
        response
    }

    async fn get_job_summary(&self, job_id: JobId) -> anyhow::Result<JobSummary> {
        self.inner.get_job_summary(job_id).await
    }

    async fn list_jobs(&self, status_filter: Option<JobStatus>) -> Vec<cloudxfer_ste::JobDetail> {
        self.inner.list_jobs(status_filter).await
    }

    async fn cancel_or_pause_job(&self, job_id: JobId, target_status: JobStatus) {
        self.inner.cancel_or_pause_job(job_id, target_status).await
    }

    async fn resume_job(&self, job_id: JobId) -> StartPartResponse {
        self.inner.resume_job(job_id).await
    }

    async fn remove_job_files(&self, job_id: JobId) -> anyhow::Result<usize> {
        self.inner.remove_job_files(job_id).await
    }

    fn get_concurrency_settings(&self) -> cloudxfer_ste::ConcurrencySettings {
        self.inner.get_concurrency_settings()
    }

    fn set_concurrency_settings_to_auto(&self) {
        self.inner.set_concurrency_settings_to_auto()
    }
}

fn url_host(value: &str) -> String {
    url::Url::parse(value)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_default()
}

/// Local endpoints are rooted at wherever the process happens to run,
/// but `LocalFs` requires an absolute `storage_root`; relative CLI
/// arguments are joined onto the current directory here, once, before
/// any backend is built.
fn absolutize_if_local(location: Location, value: &str) -> String {
    if location.is_remote() {
        return value.to_string();
    }
    let path = Utf8Path::new(value);
    if path.is_absolute() {
        return value.to_string();
    }
    match std::env::current_dir().ok().and_then(|cwd| Utf8PathBuf::try_from(cwd).ok()) {
        Some(cwd) => cwd.join(path).into_string(),
        None => value.to_string(),
    }
}

/// One side of a cook transfer: the backend, the root every relative
/// path is joined onto, and (for local endpoints) the plain directory a
/// [`LocalTraverser`] walks.
struct Endpoint {
    storage: GenericRemoteStorage,
    root: RemotePath,
    local_path: Utf8PathBuf,
    location: Location,
}

async fn build_endpoint(
    location: Location,
    resource: &ResourceString,
    base_inputs: &CredentialInputs,
    forwarded_token: Option<&str>,
    trusted_suffixes: &[String],
) -> Result<(Endpoint, Credential)> {
    let value = absolutize_if_local(location, resource.value());
    let host = url_host(&value);
    let mut inputs = base_inputs.clone();
    inputs.sas_token = resource.sas().map(str::to_string);

    let credential =
        select_credential(location, &host, &value, &inputs, forwarded_token, trusted_suffixes).await?;
    let (storage, root) = build_storage(location, &value, &credential)
        .await
        .map_err(Error::Other)?;

    let local_path = if location.is_remote() {
        Utf8PathBuf::new()
    } else {
        Utf8PathBuf::from(value)
    };

    Ok((
        Endpoint {
            storage,
            root,
            local_path,
            location,
        },
        credential,
    ))
}

fn build_traverser(
    endpoint: &Endpoint,
    recursive: bool,
    symlink_policy: cloudxfer_core::SymlinkPolicy,
    include_directory_stubs: bool,
    detect_hardlinks: bool,
) -> Arc<dyn ResourceTraverser> {
    if endpoint.location.is_remote() {
        Arc::new(RemoteTraverser::new(
            endpoint.storage.clone(),
            endpoint.root.clone(),
            include_directory_stubs,
        ))
    } else {
        Arc::new(LocalTraverser::with_hardlink_detection(
            endpoint.local_path.clone(),
            recursive,
            symlink_policy,
            include_directory_stubs,
            detect_hardlinks,
        ))
    }
}

/// When an S3/GCS bucket is copied straight onto an Azure account root
/// (no container named explicitly), the bucket's own name has to be
/// turned into a legal container name first (spec component C2). Named
/// containers are left untouched: the operator already made the call.
fn maybe_resolve_bucket_destination(cooked: &mut cloudxfer_core::CookedOptions) -> Result<()> {
    if !matches!(cooked.from_to.0, FromToPair::S3Blob | FromToPair::GCPBlob) {
        return Ok(());
    }

    let destination_url =
        url::Url::parse(cooked.destination.value()).map_err(|e| Error::invalid_input(e.to_string()))?;
    let names_container = destination_url
        .path_segments()
        .map(|mut segments| segments.next().map(|s| !s.is_empty()).unwrap_or(false))
        .unwrap_or(false);
    if names_container {
        return Ok(());
    }

    let source_url =
        url::Url::parse(cooked.source.value()).map_err(|e| Error::invalid_input(e.to_string()))?;
    let bucket = source_url
        .path_segments()
        .and_then(|mut segments| segments.next())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::invalid_input("source bucket URL names no bucket"))?;

    let mut resolver = BucketNameResolver::default();
    let container = resolver.resolve(bucket)?;
    let rebuilt = format!("{}/{container}", cooked.destination.value().trim_end_matches('/'));
    cooked.destination = ResourceString::new_remote(rebuilt, cooked.destination.sas().map(str::to_string));
    Ok(())
}

struct ProgressDispatchEvents(Arc<ProgressCounters>);
impl DispatchEvents for ProgressDispatchEvents {
    fn on_first_part_dispatched(&self) {
        self.0.mark_first_part_ordered();
    }
}

/// Moves one object's bytes (when it has any) and, in every case,
/// hands the object to the dispatcher for bookkeeping. Folders are
/// never actually written (the destination backend creates parents
/// implicitly); symlinks and special files are counted and skipped
/// rather than transferred, since this workspace only resolves them on
/// the local side. Hardlinks follow `hardlink_policy` (spec §4.5):
/// `Follow` copies the link target's bytes like a regular file; `Preserve`
/// schedules it on the dispatcher's hardlink queue with no byte transfer
/// of its own, so the destination link is recreated after the file it
/// points at has already landed.
async fn transfer_one(
    object: StoredObject,
    source: &GenericRemoteStorage,
    source_root: &RemotePath,
    destination: &GenericRemoteStorage,
    destination_root: &RemotePath,
    dispatcher: &mut Dispatcher,
    counters: &ProgressCounters,
    hardlink_policy: cloudxfer_core::HardlinkPolicy,
) -> Result<()> {
    if object.is_root_sentinel() {
        return Ok(());
    }

    match object.entity_kind {
        EntityKind::Folder => {
            dispatcher.schedule(object).await?;
        }
        EntityKind::Symlink => {
            counters.skipped_symlinks.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(path = %object.relative_path, "symlink preservation is only meaningful between two local endpoints; skipped");
        }
        EntityKind::Hardlink if hardlink_policy == cloudxfer_core::HardlinkPolicy::Follow => {
            let mut object = object;
            object.entity_kind = EntityKind::File;
            transfer_file(object, source, source_root, destination, destination_root, dispatcher, counters).await?;
        }
        EntityKind::Hardlink => {
            counters.skipped_hardlinks.fetch_add(1, Ordering::Relaxed);
            dispatcher.schedule(object).await?;
        }
        EntityKind::Other => {
            counters.skipped_special_files.fetch_add(1, Ordering::Relaxed);
        }
        EntityKind::File => {
            transfer_file(object, source, source_root, destination, destination_root, dispatcher, counters).await?;
        }
    }
    Ok(())
}

async fn transfer_file(
    object: StoredObject,
    source: &GenericRemoteStorage,
    source_root: &RemotePath,
    destination: &GenericRemoteStorage,
    destination_root: &RemotePath,
    dispatcher: &mut Dispatcher,
    counters: &ProgressCounters,
) -> Result<()> {
    let source_path = source_root.join(object.relative_path.as_str());
    let destination_path = destination_root.join(object.relative_path.as_str());
    match transfer_object(source, &source_path, destination, &destination_path).await {
        Ok(()) => {
            dispatcher.schedule(object).await?;
        }
        Err(err) => {
            tracing::warn!(path = %object.relative_path, error = %err, "object transfer failed; skipped");
        }
    }
    Ok(())
}

async fn transfer_object(
    source: &GenericRemoteStorage,
    source_path: &RemotePath,
    destination: &GenericRemoteStorage,
    destination_path: &RemotePath,
) -> anyhow::Result<()> {
    let download = source
        .download(source_path)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    destination
        .upload(
            download.download_stream,
            download.content_length as usize,
            destination_path,
            None,
        )
        .await
}

async fn run_copy(
    cooked: &cloudxfer_core::CookedOptions,
    source: &Endpoint,
    destination: &Endpoint,
    filters: Arc<FilterSet>,
    stats: Arc<dyn FilterStats>,
    counters: &ProgressCounters,
    dispatcher: &mut Dispatcher,
) -> Result<()> {
    let detect_hardlinks = cooked.is_nfs && cooked.hardlink_policy == cloudxfer_core::HardlinkPolicy::Preserve;
    let traverser = build_traverser(source, cooked.recursive, cooked.symlink_policy, cooked.include_directory_stubs, detect_hardlinks);
    let mut stream = traverser.enumerate(filters, stats);
    while let Some(object) = stream.next().await {
        let object = object?;
        counters.source_files_scanned.fetch_add(1, Ordering::Relaxed);
        transfer_one(
            object,
            &source.storage,
            &source.root,
            &destination.storage,
            &destination.root,
            dispatcher,
            counters,
            cooked.hardlink_policy,
        )
        .await?;
    }
    counters.mark_scanning_complete();
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn run_sync(
    cooked: &cloudxfer_core::CookedOptions,
    source: &Endpoint,
    destination: &Endpoint,
    filters: Arc<FilterSet>,
    stats: Arc<dyn FilterStats>,
    counters: &ProgressCounters,
    dispatcher: &mut Dispatcher,
    deleter: &InteractiveDeleter,
) -> Result<()> {
    let upload_like = cooked.from_to.is_upload();
    let (indexed, streamed) = if upload_like { (source, destination) } else { (destination, source) };
    let case_insensitive = cfg!(target_os = "windows") && !indexed.location.is_remote();

    let detect_hardlinks = cooked.is_nfs && cooked.hardlink_policy == cloudxfer_core::HardlinkPolicy::Preserve;

    let mut index = ObjectIndex::new(case_insensitive);
    {
        let indexed_traverser = build_traverser(indexed, cooked.recursive, cooked.symlink_policy, cooked.include_directory_stubs, detect_hardlinks);
        let mut stream = indexed_traverser.enumerate(filters.clone(), stats.clone());
        while let Some(object) = stream.next().await {
            let object = object?;
            if object.is_root_sentinel() {
                continue;
            }
            if upload_like {
                counters.source_files_scanned.fetch_add(1, Ordering::Relaxed);
            } else {
                counters.destination_files_scanned.fetch_add(1, Ordering::Relaxed);
            }
            index.store(object)?;
        }
    }

    let mut pending_deletes = Vec::new();
    {
        let streamed_traverser = build_traverser(streamed, cooked.recursive, cooked.symlink_policy, cooked.include_directory_stubs, detect_hardlinks);
        let mut stream = streamed_traverser.enumerate(filters, stats);
        while let Some(object) = stream.next().await {
            let object = object?;
            if object.is_root_sentinel() {
                continue;
            }
            if upload_like {
                counters.destination_files_scanned.fetch_add(1, Ordering::Relaxed);
            } else {
                counters.source_files_scanned.fetch_add(1, Ordering::Relaxed);
            }

            let outcome = if upload_like {
                destination_first_step(object, &mut index, cooked.compare_hash, cooked.prefer_smb_time, cooked.disable_comparison)
            } else {
                source_first_step(object, &mut index, cooked.compare_hash, cooked.prefer_smb_time, cooked.disable_comparison)
            };

            match outcome {
                CompareOutcome::Transfer(object) => {
                    transfer_one(
                        object,
                        &source.storage,
                        &source.root,
                        &destination.storage,
                        &destination.root,
                        dispatcher,
                        counters,
                        cooked.hardlink_policy,
                    )
                    .await?;
                }
                CompareOutcome::Skip => {
                    counters.skipped_transfers.fetch_add(1, Ordering::Relaxed);
                }
                CompareOutcome::Delete(object) => pending_deletes.push(object),
            }
        }
    }
    counters.mark_scanning_complete();

    let mut residual = Vec::new();
    index.traverse(|o| residual.push(o));
    if upload_like {
        for object in residual {
            transfer_one(
                object,
                &source.storage,
                &source.root,
                &destination.storage,
                &destination.root,
                dispatcher,
                counters,
                cooked.hardlink_policy,
            )
            .await?;
        }
    } else {
        pending_deletes.extend(residual);
    }

    for object in pending_deletes {
        deleter.maybe_delete(object).await;
    }
    counters
        .deletions_performed
        .fetch_add(deleter.deletions_performed(), Ordering::Relaxed);

    Ok(())
}

async fn distinct_job_ids(plan_folder: &Utf8Path) -> anyhow::Result<Vec<JobId>> {
    let mut ids = std::collections::HashSet::new();
    let mut entries = match tokio::fs::read_dir(plan_folder.as_std_path()).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if let Some((prefix, _)) = name.split_once("--") {
            if let Ok(id) = prefix.parse::<JobId>() {
                ids.insert(id);
            }
        }
    }
    Ok(ids.into_iter().collect())
}

async fn summarize_persisted_job(plan_folder: &Utf8Path, job_id: JobId) -> anyhow::Result<JobSummary> {
    let parts = plan::JobPartPlan::list_parts(plan_folder, job_id).await?;
    if parts.is_empty() {
        anyhow::bail!("no persisted plan files for job {job_id}");
    }
    let mut total_transfers = 0u64;
    let mut bytes_over_wire = 0u64;
    let mut saw_final_part = false;
    for part_path in &parts {
        let part = plan::JobPartPlan::read(part_path).await?;
        total_transfers += part.transfers.list.len() as u64;
        bytes_over_wire += part.transfers.cumulative_size_bytes;
        saw_final_part = saw_final_part || part.is_final_part;
    }
    let status = if saw_final_part { JobStatus::Completed } else { JobStatus::Paused };
    Ok(JobSummary {
        total_transfers,
        transfers_completed: if saw_final_part { total_transfers } else { 0 },
        transfers_failed: 0,
        transfers_skipped: 0,
        bytes_over_wire,
        deletions_performed: 0,
        status,
    })
}

/// Entry points of spec §6, wired to `main.rs`'s `clap` commands.
pub struct Client {
    config: ProcessConfig,
    engine: Arc<dyn TransferEngine>,
}

impl Client {
    pub fn new(config: ProcessConfig) -> Self {
        Self {
            config,
            engine: InProcessEngine::new(),
        }
    }

    /// One-shot, one-directional transfer (spec §2's Copy control
    /// flow). `~pipe~` arguments short-circuit to the redirection path
    /// before any option cooking runs, per spec component C12.
    pub async fn copy(&self, raw: RawOptions, handler: Arc<dyn Handler>, quiet: bool) -> Result<JobSummary> {
        if raw.source == cloudxfer_core::location::PIPE_ARG || raw.destination == cloudxfer_core::location::PIPE_ARG {
            let bytes = self.redirect(raw.source, raw.destination).await?;
            return Ok(JobSummary {
                total_transfers: 1,
                transfers_completed: 1,
                transfers_failed: 0,
                transfers_skipped: 0,
                bytes_over_wire: bytes,
                deletions_performed: 0,
                status: JobStatus::Completed,
            });
        }
        self.run_transfer(raw, false, handler, quiet).await
    }

    /// Bidirectional-comparison transfer (spec §2's Sync control flow),
    /// able to remove destination-only extras.
    pub async fn sync(&self, raw: RawOptions, handler: Arc<dyn Handler>, quiet: bool) -> Result<JobSummary> {
        self.run_transfer(raw, true, handler, quiet).await
    }

    /// Streams a single object to/from the process's stdin/stdout,
    /// bypassing enumeration and comparison entirely (spec component
    /// C12).
    pub async fn redirect(&self, source: String, destination: String) -> Result<u64> {
        let from_to = FromTo::infer(&source, &destination, None)?;
        let (value, location) = match from_to.0 {
            FromToPair::PipeBlob => (destination, from_to.destination()),
            FromToPair::BlobPipe => (source, from_to.source()),
            other => {
                return Err(Error::invalid_input(format!(
                    "{other:?} is not a pipe/blob redirection pair"
                )))
            }
        };

        let host = url_host(&value);
        let credential = select_credential(
            location,
            &host,
            &value,
            &self.config.credential_inputs,
            None,
            &self.config.trusted_suffixes,
        )
        .await?;
        let (storage, blob_path) = build_storage(location, &value, &credential)
            .await
            .map_err(Error::Other)?;

        let concurrency_auto_tune = std::env::var("CLOUDXFER_CONCURRENCY_VALUE")
            .map(|v| v.eq_ignore_ascii_case("auto"))
            .unwrap_or(false);
        let options = RedirectionOptions {
            concurrency_auto_tune,
            ..Default::default()
        };
        redirection::run(from_to.0, &storage, &blob_path, options).await
    }

    async fn run_transfer(
        &self,
        mut raw: RawOptions,
        is_sync: bool,
        handler: Arc<dyn Handler>,
        quiet: bool,
    ) -> Result<JobSummary> {
        raw.is_sync = is_sync;
        let mut cooked = cook(raw)?;
        maybe_resolve_bucket_destination(&mut cooked)?;

        let job_id = JobId::new();
        handler.on_start(job_id);

        let source_location = cooked.from_to.source();
        let destination_location = cooked.from_to.destination();

        let (source, source_credential) = build_endpoint(
            source_location,
            &cooked.source,
            &self.config.credential_inputs,
            None,
            &self.config.trusted_suffixes,
        )
        .await?;

        let forwarded_token = if cooked.from_to.is_s2s() {
            match source_credential {
                Credential::OAuthToken { token } => Some(token),
                _ => None,
            }
        } else {
            None
        };

        let (destination, _) = build_endpoint(
            destination_location,
            &cooked.destination,
            &self.config.credential_inputs,
            forwarded_token.as_deref(),
            &self.config.trusted_suffixes,
        )
        .await?;

        let filters = Arc::new(cloudxfer_engine::FilterSet::compile(&cooked.filters).map_err(Error::Other)?);
        let stats: Arc<dyn FilterStats> = Arc::new(NoOpFilterStats);
        let counters = Arc::new(ProgressCounters::default());

        let engine: Arc<dyn TransferEngine> = Arc::new(PersistingEngine {
            inner: self.engine.clone(),
            plan_folder: self.config.job_plan_location.clone(),
        });

        let lifecycle = Arc::new(LifecycleManager::new(engine.clone(), job_id));

        let dispatch_events: Arc<dyn DispatchEvents> = Arc::new(ProgressDispatchEvents(counters.clone()));
        let mut dispatcher = Dispatcher::new(
            engine.clone(),
            dispatch_events,
            job_id,
            cooked.from_to,
            cooked.overwrite_policy,
            cooked.source.value().to_string(),
            cooked.destination.value().to_string(),
            cooked.transfers_per_part,
            !is_sync,
        );

        let progress_tracker = Arc::new(ProgressTracker::new(counters.clone(), engine.clone(), job_id));

        let cancel_prompt: Arc<dyn CancellationPrompt> = if quiet {
            Arc::new(AlwaysConfirmCancellation)
        } else {
            Arc::new(TerminalCancellationPrompt)
        };
        let supervisor = tokio::spawn({
            let lifecycle = lifecycle.clone();
            let tracker = progress_tracker.clone();
            async move { lifecycle.run_supervisor(tracker, cancel_prompt).await }
        });

        let cancel_listener = tokio::spawn({
            let lifecycle = lifecycle.clone();
            async move {
                loop {
                    if tokio::signal::ctrl_c().await.is_err() || lifecycle.is_done() {
                        break;
                    }
                    lifecycle.request_cancel();
                }
            }
        });

        let progress_task = tokio::spawn({
            let lifecycle = lifecycle.clone();
            let tracker = progress_tracker.clone();
            let handler = handler.clone();
            async move {
                loop {
                    if lifecycle.is_done() {
                        break;
                    }
                    tokio::time::sleep(std::time::Duration::from_millis(500)).await;
                    if let Ok(snapshot) = tracker.check_progress().await {
                        handler.on_transfer_progress(&snapshot);
                        if snapshot.is_job_done {
                            break;
                        }
                    }
                }
            }
        });

        let transfer_result = if is_sync {
            let delete_policy = if cooked.delete_destination {
                if matches!(cooked.overwrite_policy, OverwritePolicy::Prompt) {
                    OverwritePolicy::Prompt
                } else {
                    OverwritePolicy::True
                }
            } else {
                OverwritePolicy::False
            };
            let prompt: Arc<dyn DeletePrompt> = if quiet {
                Arc::new(AlwaysYesPrompt)
            } else {
                Arc::new(TerminalDeletePrompt)
            };
            let inner_deleter: Arc<dyn Deleter> = if destination.location.is_remote() {
                Arc::new(RemoteDeleter::new(
                    destination.storage.clone(),
                    destination.root.clone(),
                    cooked.force_if_read_only,
                ))
            } else {
                Arc::new(LocalDeleter::new(
                    destination.local_path.clone(),
                    Arc::new(FolderDeletionManager::new()),
                    cooked.include_directory_stubs,
                ))
            };
            let deleter = InteractiveDeleter::new(inner_deleter, prompt, delete_policy);

            let result = run_sync(
                &cooked,
                &source,
                &destination,
                filters,
                stats,
                &counters,
                &mut dispatcher,
                &deleter,
            )
            .await;
            handler.on_scan_progress(
                counters.source_files_scanned.load(Ordering::Relaxed)
                    + counters.destination_files_scanned.load(Ordering::Relaxed),
            );
            result
        } else {
            run_copy(&cooked, &source, &destination, filters, stats, &counters, &mut dispatcher).await
        };

        lifecycle.mark_enumeration_complete();

        let final_outcome = match transfer_result {
            Ok(()) => match dispatcher.dispatch_final_part().await {
                Ok(()) => lifecycle.wait().await,
                Err(Error::NothingScheduled) => {
                    lifecycle.on_complete();
                    Outcome::Completed
                }
                Err(err) => {
                    lifecycle.on_error(err.to_string());
                    Outcome::Errored(err.to_string())
                }
            },
            Err(err) => {
                lifecycle.on_error(err.to_string());
                Outcome::Errored(err.to_string())
            }
        };

        cancel_listener.abort();
        supervisor.abort();
        progress_task.abort();

        handler.on_finish(job_id, &final_outcome);

        let mut summary = match engine.get_job_summary(job_id).await {
            Ok(summary) => summary,
            Err(_) => JobSummary {
                total_transfers: 0,
                transfers_completed: 0,
                transfers_failed: 0,
                transfers_skipped: 0,
                bytes_over_wire: 0,
                deletions_performed: 0,
                status: match &final_outcome {
                    Outcome::Completed => JobStatus::Completed,
                    Outcome::Cancelled => JobStatus::Cancelled,
                    Outcome::Errored(_) => JobStatus::Failed,
                },
            },
        };
        // The STE only ever sees dispatched transfers, so skip/deletion
        // counts live in the comparator-side counters instead; fold
        // them in here so they reach the caller even when no part was
        // ever submitted (e.g. an all-skip sync with zero transfers).
        summary.transfers_skipped = counters.skipped_transfers.load(Ordering::Relaxed);
        summary.deletions_performed = counters.deletions_performed.load(Ordering::Relaxed);

        match final_outcome {
            Outcome::Completed => Ok(summary),
            Outcome::Cancelled => Err(Error::Cancelled),
            Outcome::Errored(msg) => Err(Error::Ste(msg)),
        }
    }

    pub async fn list_jobs(&self, status_filter: Option<JobStatus>) -> anyhow::Result<Vec<(JobId, JobSummary)>> {
        let mut out = Vec::new();
        for id in distinct_job_ids(&self.config.job_plan_location).await? {
            let summary = summarize_persisted_job(&self.config.job_plan_location, id).await?;
            if status_filter.map(|f| f == summary.status).unwrap_or(true) {
                out.push((id, summary));
            }
        }
        Ok(out)
    }

    pub async fn get_job_summary(&self, job_id: JobId) -> anyhow::Result<JobSummary> {
        summarize_persisted_job(&self.config.job_plan_location, job_id).await
    }

    /// Replays every persisted part of `job_id` into this process's
    /// in-memory engine so `GetJobSummary` reflects it again. Genuine
    /// resumption of only the incomplete transfers belongs to a real
    /// out-of-process STE (spec §1, out of scope); this reference
    /// engine can only rehydrate bookkeeping, not re-attempt bytes.
    pub async fn resume_job(&self, job_id: JobId) -> Result<JobSummary> {
        let parts = plan::JobPartPlan::list_parts(&self.config.job_plan_location, job_id)
            .await
            .map_err(Error::Other)?;
        if parts.is_empty() {
            return Err(Error::invalid_input(format!("no persisted job found for {job_id}")));
        }
        for part_path in &parts {
            let part = plan::JobPartPlan::read(part_path).await.map_err(Error::Other)?;
            let from_to = FromTo::from_str(&part.from_to).map_err(|_| {
                Error::invalid_input(format!(
                    "corrupt plan file for job {job_id}: unknown from-to '{}'",
                    part.from_to
                ))
            })?;
            let req = CopyJobPartOrderRequest {
                job_id: part.job_id,
                part_number: part.part_number,
                from_to,
                overwrite_policy: OverwritePolicy::True,
                source_root: part.source_root,
                destination_root: part.destination_root,
                transfers: part.transfers,
                is_final_part: part.is_final_part,
            };
            self.engine.start_part(req).await;
        }
        self.get_job_summary(job_id).await.map_err(Error::Other)
    }

    pub async fn remove_job(&self, job_id: JobId) -> Result<usize> {
        plan::remove_job_files(&self.config.job_plan_location, job_id)
            .await
            .map_err(Error::Other)
    }

    pub async fn clean_jobs(&self) -> Result<usize> {
        let mut total = 0;
        for id in distinct_job_ids(&self.config.job_plan_location).await.map_err(Error::Other)? {
            total += self.remove_job(id).await?;
        }
        Ok(total)
    }

    pub async fn login(&self, cloud: &str) -> Result<()> {
        let token = self.config.oauth_token_info.clone().ok_or_else(|| {
            Error::AuthMissing(format!(
                "no token available to cache for {cloud}; set CLOUDXFER_OAUTH_TOKEN_INFO \
                 after signing in through the cloud's own CLI"
            ))
        })?;
        let mut cache = LoginCache::load(&self.config.login_cache_path).await.map_err(Error::Other)?;
        let minted_at_unix = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        cache.set(
            cloud,
            CachedToken {
                token,
                minted_at_unix,
                account_hint: None,
            },
        );
        cache.save(&self.config.login_cache_path).await.map_err(Error::Other)
    }

    pub async fn logout(&self, cloud: &str) -> Result<bool> {
        let mut cache = LoginCache::load(&self.config.login_cache_path).await.map_err(Error::Other)?;
        let removed = cache.remove(cloud);
        cache.save(&self.config.login_cache_path).await.map_err(Error::Other)?;
        Ok(removed)
    }

    pub async fn get_login_status(&self) -> Result<Vec<(String, bool)>> {
        let cache = LoginCache::load(&self.config.login_cache_path).await.map_err(Error::Other)?;
        Ok(["azure", "gcs"].iter().map(|c| (c.to_string(), cache.get(c).is_some())).collect())
    }
}
