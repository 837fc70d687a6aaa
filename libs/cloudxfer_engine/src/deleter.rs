//! Deleter (spec component C9, §4.9): applies destination deletions
//! (extras found during sync) through a local or remote variant, both
//! wrapped by an interactive shell that can prompt per-object.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{info, warn};

use cloudxfer_core::{Error, OverwritePolicy, Result, StoredObject};
use cloudxfer_storage::{GenericRemoteStorage, RemotePath, RemoteStorage};

/// One per-object deletion capability. Errors are surfaced to the
/// interactive shell but are never fatal to the sync as a whole (spec
/// §7: "a missed extra is tolerable").
#[async_trait]
pub trait Deleter: Send + Sync {
    async fn delete(&self, object: &StoredObject) -> Result<()>;
}

/// The operator's answer to a per-object deletion prompt (spec §4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptAnswer {
    Yes,
    No,
    YesForAll,
    NoForAll,
}

pub trait DeletePrompt: Send + Sync {
    fn confirm(&self, object: &StoredObject) -> PromptAnswer;
}

pub struct AlwaysYesPrompt;
impl DeletePrompt for AlwaysYesPrompt {
    fn confirm(&self, _object: &StoredObject) -> PromptAnswer {
        PromptAnswer::Yes
    }
}

/// Terminal prompt backing an interactive `--delete-destination=prompt`
/// run: asks once per extra object, offering the "for all" shortcuts.
pub struct TerminalDeletePrompt;

impl DeletePrompt for TerminalDeletePrompt {
    fn confirm(&self, object: &StoredObject) -> PromptAnswer {
        let choices = ["Yes", "No", "Yes for all", "No for all"];
        let selection = dialoguer::Select::new()
            .with_prompt(format!("delete destination extra '{}'?", object.relative_path))
            .items(&choices)
            .default(0)
            .interact_opt();
        match selection {
            Ok(Some(0)) => PromptAnswer::Yes,
            Ok(Some(2)) => PromptAnswer::YesForAll,
            Ok(Some(3)) => PromptAnswer::NoForAll,
            _ => PromptAnswer::No,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InteractiveMode {
    PerObject,
    AllYes,
    AllNo,
}

/// Wraps a concrete [`Deleter`] with the prompt policy driven by
/// [`OverwritePolicy`] (reused here as the delete policy: True = delete
/// without asking, False = never delete, Prompt = ask per object).
/// `YesForAll`/`NoForAll` answers flip the mode so later objects in the
/// same sync skip the prompt.
pub struct InteractiveDeleter {
    inner: Arc<dyn Deleter>,
    prompt: Arc<dyn DeletePrompt>,
    policy: OverwritePolicy,
    mode: Mutex<InteractiveMode>,
    deletions_performed: std::sync::atomic::AtomicU64,
}

impl InteractiveDeleter {
    pub fn new(inner: Arc<dyn Deleter>, prompt: Arc<dyn DeletePrompt>, policy: OverwritePolicy) -> Self {
        Self {
            inner,
            prompt,
            policy,
            mode: Mutex::new(InteractiveMode::PerObject),
            deletions_performed: std::sync::atomic::AtomicU64::new(0),
        }
    }

    pub fn deletions_performed(&self) -> u64 {
        self.deletions_performed.load(std::sync::atomic::Ordering::Relaxed)
    }

    /// Resolves the delete policy/prompt for one object and, if
    /// confirmed, performs the deletion. Failures are logged, not
    /// propagated, per spec §7.
    pub async fn maybe_delete(&self, object: StoredObject) {
        let should_delete = match self.policy {
            OverwritePolicy::False => false,
            OverwritePolicy::True | OverwritePolicy::IfSourceNewer => true,
            OverwritePolicy::Prompt => {
                let mut mode = self.mode.lock();
                match *mode {
                    InteractiveMode::AllYes => true,
                    InteractiveMode::AllNo => false,
                    InteractiveMode::PerObject => match self.prompt.confirm(&object) {
                        PromptAnswer::Yes => true,
                        PromptAnswer::No => false,
                        PromptAnswer::YesForAll => {
                            *mode = InteractiveMode::AllYes;
                            true
                        }
                        PromptAnswer::NoForAll => {
                            *mode = InteractiveMode::AllNo;
                            false
                        }
                    },
                }
            }
        };

        if !should_delete {
            info!(path = %object.relative_path, "destination extra left in place");
            return;
        }

        match self.inner.delete(&object).await {
            Ok(()) => {
                self.deletions_performed
                    .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                info!(path = %object.relative_path, "deleted destination extra");
            }
            Err(err) => {
                warn!(path = %object.relative_path, error = %err, "failed to delete destination extra");
            }
        }
    }
}

/// Reference-counts pending child deletions per folder so a folder's
/// `rmdir` only fires once every recorded child has been removed (spec
/// §4.9's local-variant folder-deletion manager, generalized to the
/// remote variants too since BlobFS/File directories need the same
/// ordering).
#[derive(Default)]
pub struct FolderDeletionManager {
    pending_children: Mutex<HashMap<String, u64>>,
}

impl FolderDeletionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `count` children of `folder_key` that are about to be
    /// deleted. Call before issuing any child deletion.
    pub fn register_children(&self, folder_key: &str, count: u64) {
        if count == 0 {
            return;
        }
        *self
            .pending_children
            .lock()
            .entry(folder_key.to_string())
            .or_insert(0) += count;
    }

    /// Records that one child of `folder_key` has finished deleting.
    /// Returns `true` exactly once, when the count reaches zero, so the
    /// caller can perform the folder's own `rmdir`.
    pub fn child_done(&self, folder_key: &str) -> bool {
        let mut pending = self.pending_children.lock();
        match pending.get_mut(folder_key) {
            Some(count) if *count > 0 => {
                *count -= 1;
                if *count == 0 {
                    pending.remove(folder_key);
                    true
                } else {
                    false
                }
            }
            _ => true,
        }
    }
}

/// Local-filesystem deleter: `unlink` for files, and (when folder
/// metadata preservation is enabled) an `rmdir` gated by the shared
/// [`FolderDeletionManager`].
pub struct LocalDeleter {
    root: camino::Utf8PathBuf,
    folder_manager: Arc<FolderDeletionManager>,
    preserve_folders: bool,
}

impl LocalDeleter {
    pub fn new(root: camino::Utf8PathBuf, folder_manager: Arc<FolderDeletionManager>, preserve_folders: bool) -> Self {
        Self {
            root,
            folder_manager,
            preserve_folders,
        }
    }
}

#[async_trait]
impl Deleter for LocalDeleter {
    async fn delete(&self, object: &StoredObject) -> Result<()> {
        let path = self.root.join(object.relative_path.as_str());
        match object.entity_kind {
            cloudxfer_core::EntityKind::Folder => {
                if !self.preserve_folders {
                    return Ok(());
                }
                if let Some(parent) = path.parent() {
                    let parent_key = parent.as_str().to_string();
                    if self.folder_manager.child_done(&parent_key) {
                        let _ = tokio::fs::remove_dir(parent.as_std_path()).await;
                    }
                }
                tokio::fs::remove_dir(path.as_std_path())
                    .await
                    .or_else(|e| if e.kind() == std::io::ErrorKind::NotFound { Ok(()) } else { Err(e) })
                    .map_err(|e| Error::Other(e.into()))
            }
            _ => tokio::fs::remove_file(path.as_std_path())
                .await
                .or_else(|e| if e.kind() == std::io::ErrorKind::NotFound { Ok(()) } else { Err(e) })
                .map_err(|e| Error::Other(e.into())),
        }
    }
}

/// Remote deleter: dispatches to whichever backend the destination
/// resolves to through the shared [`GenericRemoteStorage`] enum.
/// `force_if_read_only` is threaded through for Azure Files, where a
/// read-only attribute otherwise blocks the delete.
pub struct RemoteDeleter {
    storage: GenericRemoteStorage,
    root: RemotePath,
    force_if_read_only: bool,
}

impl RemoteDeleter {
    pub fn new(storage: GenericRemoteStorage, root: RemotePath, force_if_read_only: bool) -> Self {
        Self {
            storage,
            root,
            force_if_read_only,
        }
    }
}

#[async_trait]
impl Deleter for RemoteDeleter {
    async fn delete(&self, object: &StoredObject) -> Result<()> {
        let path = self.root.join(object.relative_path.as_str());
        self.storage
            .delete(&path, self.force_if_read_only)
            .await
            .map_err(Error::Other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cloudxfer_core::EntityKind;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::SystemTime;

    struct CountingDeleter {
        count: AtomicU64,
        fail_next: std::sync::atomic::AtomicBool,
    }

    #[async_trait]
    impl Deleter for CountingDeleter {
        async fn delete(&self, _object: &StoredObject) -> Result<()> {
            if self.fail_next.swap(false, Ordering::Relaxed) {
                return Err(Error::invalid_input("boom"));
            }
            self.count.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }
    }

    fn object(path: &str) -> StoredObject {
        StoredObject::new(path.to_string(), 0, SystemTime::now(), EntityKind::File)
    }

    #[tokio::test]
    async fn policy_true_deletes_without_prompting() {
        let inner = Arc::new(CountingDeleter {
            count: AtomicU64::new(0),
            fail_next: std::sync::atomic::AtomicBool::new(false),
        });
        let deleter = InteractiveDeleter::new(inner.clone(), Arc::new(AlwaysYesPrompt), OverwritePolicy::True);
        deleter.maybe_delete(object("a")).await;
        assert_eq!(inner.count.load(Ordering::Relaxed), 1);
        assert_eq!(deleter.deletions_performed(), 1);
    }

    #[tokio::test]
    async fn policy_false_never_deletes() {
        let inner = Arc::new(CountingDeleter {
            count: AtomicU64::new(0),
            fail_next: std::sync::atomic::AtomicBool::new(false),
        });
        let deleter = InteractiveDeleter::new(inner.clone(), Arc::new(AlwaysYesPrompt), OverwritePolicy::False);
        deleter.maybe_delete(object("a")).await;
        assert_eq!(inner.count.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn failed_deletion_is_logged_not_fatal() {
        let inner = Arc::new(CountingDeleter {
            count: AtomicU64::new(0),
            fail_next: std::sync::atomic::AtomicBool::new(true),
        });
        let deleter = InteractiveDeleter::new(inner.clone(), Arc::new(AlwaysYesPrompt), OverwritePolicy::True);
        deleter.maybe_delete(object("a")).await;
        assert_eq!(deleter.deletions_performed(), 0);
    }

    struct ScriptedPrompt(Mutex<Vec<PromptAnswer>>);
    impl DeletePrompt for ScriptedPrompt {
        fn confirm(&self, _object: &StoredObject) -> PromptAnswer {
            self.0.lock().pop().unwrap_or(PromptAnswer::No)
        }
    }

    #[tokio::test]
    async fn yes_for_all_suppresses_further_prompts() {
        let inner = Arc::new(CountingDeleter {
            count: AtomicU64::new(0),
            fail_next: std::sync::atomic::AtomicBool::new(false),
        });
        let prompt = Arc::new(ScriptedPrompt(Mutex::new(vec![PromptAnswer::YesForAll])));
        let deleter = InteractiveDeleter::new(inner.clone(), prompt, OverwritePolicy::Prompt);
        deleter.maybe_delete(object("a")).await;
        deleter.maybe_delete(object("b")).await;
        assert_eq!(inner.count.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn folder_deletion_manager_fires_at_zero() {
        let manager = FolderDeletionManager::new();
        manager.register_children("dir", 2);
        assert!(!manager.child_done("dir"));
        assert!(manager.child_done("dir"));
    }
}
