//! Storage-backend error types, mirroring the donor's
//! `remote_storage::error` module.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("not found")]
    NotFound,
    #[error("bad input: {0}")]
    BadInput(#[source] anyhow::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[derive(Debug, Error)]
pub enum TimeTravelError {
    #[error("not supported by this backend")]
    Unsupported,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Marker error used to annotate an operation that failed specifically
/// because of a caller-supplied timeout or cancellation, so callers can
/// distinguish "maybe happened anyway" from a clean failure.
#[derive(Debug, Error)]
#[error("operation timed out or was cancelled")]
pub struct TimeoutOrCancel;
