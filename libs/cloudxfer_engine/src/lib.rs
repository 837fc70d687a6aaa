//! The job pipeline proper: option cooking (C3), traversal (C5),
//! indexing (C6), comparison (C7), dispatch (C8), deletion (C9),
//! progress (C10), lifecycle supervision (C11), and the redirection
//! bypass (C12). See spec §2 for how these compose into Copy/Sync.

pub mod compare;
pub mod cook;
pub mod deleter;
pub mod dispatch;
pub mod filters;
pub mod index;
pub mod lifecycle;
pub mod progress;
pub mod redirection;
pub mod traverse;

pub use compare::{decide_pair, destination_first_step, source_first_step, CompareOutcome, Decision, Reason};
pub use cook::{block_size_in_bytes, cook, get_preserve_info_default, RawOptions};
pub use deleter::{
    AlwaysYesPrompt, Deleter, DeletePrompt, FolderDeletionManager, InteractiveDeleter, LocalDeleter,
    PromptAnswer, RemoteDeleter, TerminalDeletePrompt,
};
pub use dispatch::{DispatchEvents, Dispatcher, NoOpDispatchEvents};
pub use filters::{FilterSet, FilterStats, NoOpFilterStats};
pub use index::ObjectIndex;
pub use lifecycle::{
    AlwaysConfirmCancellation, CancellationPrompt, LifecycleManager, Outcome, TerminalCancellationPrompt,
};
pub use progress::{ProgressCounters, ProgressSnapshot, ProgressTracker, TerminalProgressBar};
pub use redirection::{RedirectionOptions, DEFAULT_PIPE_BLOCK_SIZE_BYTES, DEFAULT_PIPE_PARALLELISM};
pub use traverse::{LocalTraverser, ObjectStream, RemoteTraverser, ResourceTraverser};
