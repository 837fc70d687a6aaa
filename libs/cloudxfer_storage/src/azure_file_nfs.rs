//! Azure Files (NFS 4.1) backend. Unlike SMB shares, NFS shares have no
//! REST control-plane surface for data I/O: the only way to read or
//! write file content is through the NFS protocol itself, which means
//! the share has to already be mounted at a local path before cloudxfer
//! can touch it. This backend is therefore a thin, semantically-tagged
//! wrapper over [`crate::local_fs::LocalFs`] rooted at the mount point,
//! so POSIX permission/owner preservation (spec's `--preserve-posix-properties`)
//! can read `std::fs` metadata directly instead of going through a blob
//! property bag.

use std::pin::Pin;
use std::time::SystemTime;

use async_trait::async_trait;
use bytes::Bytes;
use camino::Utf8PathBuf;
use futures::stream::Stream;

use crate::error::{DownloadError, TimeTravelError};
use crate::local_fs::LocalFs;
use crate::remote_path::RemotePath;
use crate::traits::{Download, Listing, ListingMode, RemoteStorage, StorageMetadata};

pub struct AzureFileNfsStorage {
    inner: LocalFs,
}

impl AzureFileNfsStorage {
    pub fn new(mount_point: Utf8PathBuf) -> anyhow::Result<Self> {
        anyhow::ensure!(
            mount_point.exists(),
            "NFS share mount point {mount_point} does not exist; mount the share before running cloudxfer"
        );
        Ok(Self {
            inner: LocalFs::new(mount_point)?,
        })
    }
}

#[async_trait]
impl RemoteStorage for AzureFileNfsStorage {
    async fn list(
        &self,
        prefix: Option<&RemotePath>,
        mode: ListingMode,
    ) -> Result<Listing, DownloadError> {
        self.inner.list(prefix, mode).await
    }

    async fn upload(
        &self,
        from: Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send + Sync>>,
        data_size_bytes: usize,
        to: &RemotePath,
        metadata: Option<StorageMetadata>,
    ) -> anyhow::Result<()> {
        self.inner.upload(from, data_size_bytes, to, metadata).await
    }

    async fn download(&self, from: &RemotePath) -> Result<Download, DownloadError> {
        self.inner.download(from).await
    }

    async fn download_byte_range(
        &self,
        from: &RemotePath,
        start_inclusive: u64,
        end_exclusive: Option<u64>,
    ) -> Result<Download, DownloadError> {
        self.inner
            .download_byte_range(from, start_inclusive, end_exclusive)
            .await
    }

    async fn delete(&self, path: &RemotePath, force_if_read_only: bool) -> anyhow::Result<()> {
        self.inner.delete(path, force_if_read_only).await
    }

    async fn delete_objects(&self, paths: &[RemotePath], force_if_read_only: bool) -> anyhow::Result<()> {
        self.inner.delete_objects(paths, force_if_read_only).await
    }

    async fn copy(&self, from: &RemotePath, to: &RemotePath) -> anyhow::Result<()> {
        self.inner.copy(from, to).await
    }

    async fn time_travel_recover(
        &self,
        prefix: Option<&RemotePath>,
        timestamp: SystemTime,
        done_if_after: SystemTime,
    ) -> Result<(), TimeTravelError> {
        self.inner
            .time_travel_recover(prefix, timestamp, done_if_after)
            .await
    }

    async fn is_directory(&self, path: &RemotePath) -> anyhow::Result<bool> {
        self.inner.is_directory(path).await
    }
}
