//! Every storage backend cloudxfer supports, wrapped in one enum so
//! the engine can hold a `GenericRemoteStorage` without reaching for
//! dynamic dispatch at every call site. Mirrors the donor's
//! `GenericRemoteStorage`.

use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::Stream;
use std::pin::Pin;

use crate::azure_blob::AzureBlobStorage;
use crate::azure_file_nfs::AzureFileNfsStorage;
use crate::azure_file_smb::AzureFileSmbStorage;
use crate::blob_fs::BlobFsStorage;
use crate::error::{DownloadError, TimeTravelError};
use crate::gcs_bucket::GcsBucket;
use crate::local_fs::LocalFs;
use crate::pipe::PipeStorage;
use crate::remote_path::RemotePath;
use crate::s3_bucket::S3Bucket;
use crate::traits::{Download, Listing, ListingMode, RemoteStorage, StorageMetadata};

#[derive(Clone)]
pub enum GenericRemoteStorage {
    LocalFs(Arc<LocalFs>),
    Pipe(Arc<PipeStorage>),
    AzureBlob(Arc<AzureBlobStorage>),
    AzureFileSmb(Arc<AzureFileSmbStorage>),
    AzureFileNfs(Arc<AzureFileNfsStorage>),
    BlobFs(Arc<BlobFsStorage>),
    AwsS3(Arc<S3Bucket>),
    Gcs(Arc<GcsBucket>),
}

macro_rules! dispatch {
    ($self:expr, $method:ident ( $($arg:expr),* )) => {
        match $self {
            Self::LocalFs(s) => s.$method($($arg),*).await,
            Self::Pipe(s) => s.$method($($arg),*).await,
            Self::AzureBlob(s) => s.$method($($arg),*).await,
            Self::AzureFileSmb(s) => s.$method($($arg),*).await,
            Self::AzureFileNfs(s) => s.$method($($arg),*).await,
            Self::BlobFs(s) => s.$method($($arg),*).await,
            Self::AwsS3(s) => s.$method($($arg),*).await,
            Self::Gcs(s) => s.$method($($arg),*).await,
        }
    };
}

#[async_trait]
impl RemoteStorage for GenericRemoteStorage {
    async fn list(
        &self,
        prefix: Option<&RemotePath>,
        mode: ListingMode,
    ) -> Result<Listing, DownloadError> {
        dispatch!(self, list(prefix, mode))
    }

    async fn upload(
        &self,
        from: Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send + Sync>>,
        data_size_bytes: usize,
        to: &RemotePath,
        metadata: Option<StorageMetadata>,
    ) -> anyhow::Result<()> {
        dispatch!(self, upload(from, data_size_bytes, to, metadata))
    }

    async fn download(&self, from: &RemotePath) -> Result<Download, DownloadError> {
        dispatch!(self, download(from))
    }

    async fn download_byte_range(
        &self,
        from: &RemotePath,
        start_inclusive: u64,
        end_exclusive: Option<u64>,
    ) -> Result<Download, DownloadError> {
        dispatch!(self, download_byte_range(from, start_inclusive, end_exclusive))
    }

    async fn delete(&self, path: &RemotePath, force_if_read_only: bool) -> anyhow::Result<()> {
        dispatch!(self, delete(path, force_if_read_only))
    }

    async fn delete_objects(&self, paths: &[RemotePath], force_if_read_only: bool) -> anyhow::Result<()> {
        dispatch!(self, delete_objects(paths, force_if_read_only))
    }

    async fn copy(&self, from: &RemotePath, to: &RemotePath) -> anyhow::Result<()> {
        dispatch!(self, copy(from, to))
    }

    async fn time_travel_recover(
        &self,
        prefix: Option<&RemotePath>,
        timestamp: SystemTime,
        done_if_after: SystemTime,
    ) -> Result<(), TimeTravelError> {
        dispatch!(self, time_travel_recover(prefix, timestamp, done_if_after))
    }

    async fn is_directory(&self, path: &RemotePath) -> anyhow::Result<bool> {
        dispatch!(self, is_directory(path))
    }

    async fn list_containers(&self) -> anyhow::Result<Vec<String>> {
        match self {
            Self::AwsS3(s) => s.list_containers().await,
            _ => anyhow::bail!("this backend does not support account-level container listing"),
        }
    }
}
