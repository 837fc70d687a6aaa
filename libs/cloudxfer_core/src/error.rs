//! The error kinds named in spec §7, as a `thiserror` enum.
//!
//! Validation and inference failures are represented precisely so callers
//! can match on them (in particular [`Error::NothingScheduled`], which
//! `Sync` treats as success rather than failure). Everything else that
//! crosses a crate boundary downstream of cooking is carried as `anyhow`
//! with added context, mirroring how the donor's `remote_storage` crate
//! wraps SDK errors.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Missing source/destination, malformed `FromTo`, unsupported
    /// combination, a block size that does not land on an integer byte
    /// count, wildcard misuse, or `listOfFiles` combined with an include
    /// path.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// No SAS, no cached OAuth token, and the target is not public; or a
    /// S2S transfer that needs a SAS because OAuth forwarding is
    /// unavailable.
    #[error("authentication required: {0}")]
    AuthMissing(String),

    /// Implicit credentials (OAuth, shared key, managed-disk OAuth) were
    /// about to be used against a host outside the trusted-suffix list.
    #[error("refusing to use implicit credentials against untrusted host {host}")]
    AuthUnsafe { host: String },

    /// Directory vs. file mismatch against a destination that is not
    /// blob storage (blob has no such notion; every other service does).
    #[error("resource mismatch: {0}")]
    ResourceMismatch(String),

    /// Azure Files share absent. Shares are never auto-created because
    /// provisioned quota implies cost; the operator must create it.
    #[error("share '{0}' does not exist and will not be created automatically")]
    ShareMissing(String),

    /// No objects matched the operation's filters. `Sync` treats this as
    /// a successful, zero-transfer outcome.
    #[error("no transfers were scheduled")]
    NothingScheduled,

    /// Opaque message relayed from the transfer execution engine.
    #[error("transfer engine error: {0}")]
    Ste(String),

    /// Terminal status after a confirmed cancellation.
    #[error("job was cancelled")]
    Cancelled,

    /// Anything else, propagated with context by the caller.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }

    pub fn is_nothing_scheduled(&self) -> bool {
        matches!(self, Error::NothingScheduled)
    }
}
