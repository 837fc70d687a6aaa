//! The `RemoteStorage` capability trait (spec §4.5/§6): a CRUD-like
//! abstraction every backend implements, mirroring the donor's
//! `remote_storage::RemoteStorage` trait.

use std::collections::HashMap;
use std::pin::Pin;
use std::time::SystemTime;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::Stream;

use crate::error::{DownloadError, TimeTravelError};
use crate::remote_path::RemotePath;

pub enum ListingMode {
    WithDelimiter,
    NoDelimiter,
}

/// One object returned by a `list` call, carrying the size/mtime the
/// backend's listing RPC already hands back so the traverser (spec
/// §4.5) doesn't need a second round-trip per object just to build a
/// `StoredObject`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingObject {
    pub path: RemotePath,
    pub size: u64,
    pub last_modified: SystemTime,
}

#[derive(Default)]
pub struct Listing {
    pub prefixes: Vec<RemotePath>,
    pub keys: Vec<ListingObject>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageMetadata(pub HashMap<String, String>);

impl<const N: usize> From<[(&str, &str); N]> for StorageMetadata {
    fn from(arr: [(&str, &str); N]) -> Self {
        Self(
            arr.iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }
}

pub type DownloadStream = Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send + Sync>>;

pub struct Download {
    pub download_stream: DownloadStream,
    pub last_modified: SystemTime,
    pub etag: String,
    pub content_length: u64,
    pub metadata: Option<StorageMetadata>,
}

impl std::fmt::Debug for Download {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Download")
            .field("etag", &self.etag)
            .field("content_length", &self.content_length)
            .finish()
    }
}

/// Storage (potentially remote) API to manage its state, unaware of any
/// layered job-pipeline context: basic CRUD operations for storage
/// files. One implementation per backend (Local, Pipe, Blob, File-SMB,
/// File-NFS, BlobFS, S3, GCS).
#[async_trait]
pub trait RemoteStorage: Send + Sync + 'static {
    async fn list(
        &self,
        prefix: Option<&RemotePath>,
        mode: ListingMode,
    ) -> Result<Listing, DownloadError>;

    async fn upload(
        &self,
        from: Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send + Sync>>,
        data_size_bytes: usize,
        to: &RemotePath,
        metadata: Option<StorageMetadata>,
    ) -> anyhow::Result<()>;

    async fn download(&self, from: &RemotePath) -> Result<Download, DownloadError>;

    async fn download_byte_range(
        &self,
        from: &RemotePath,
        start_inclusive: u64,
        end_exclusive: Option<u64>,
    ) -> Result<Download, DownloadError>;

    /// `force_if_read_only`: clear a read-only attribute before
    /// deleting when the backend has such a concept (Azure Files);
    /// every other backend ignores it.
    async fn delete(&self, path: &RemotePath, force_if_read_only: bool) -> anyhow::Result<()>;

    async fn delete_objects(&self, paths: &[RemotePath], force_if_read_only: bool) -> anyhow::Result<()>;

    /// Copy a remote object inside the same account/bucket from one path
    /// to another (used only when an S2S backend can server-side copy
    /// within itself; cross-account S2S goes through download+upload at
    /// the engine level).
    async fn copy(&self, from: &RemotePath, to: &RemotePath) -> anyhow::Result<()>;

    async fn time_travel_recover(
        &self,
        _prefix: Option<&RemotePath>,
        _timestamp: SystemTime,
        _done_if_after: SystemTime,
    ) -> Result<(), TimeTravelError> {
        Err(TimeTravelError::Unsupported)
    }

    /// Directory probe: does `path` denote a directory-shaped resource
    /// on this backend? Flat-namespace services (S3, GCS, Blob without
    /// HNS) answer this by prefix-listing; hierarchical ones (BlobFS,
    /// File) can ask the service directly.
    async fn is_directory(&self, path: &RemotePath) -> anyhow::Result<bool>;

    /// Account-level listing, implemented only by backends whose
    /// `ResourceString` names an account rather than a single
    /// container/bucket.
    async fn list_containers(&self) -> anyhow::Result<Vec<String>> {
        anyhow::bail!("this backend does not support account-level container listing")
    }
}
