//! Pipe backend (spec's `~pipe~` sentinel, Location::Pipe): lets Copy
//! redirect a single object to/from the process's stdin or stdout, the
//! way `cat`-style CLIs stream to a shell pipeline. Only upload (when
//! the destination is the pipe) and download (when the source is the
//! pipe) make sense; list/delete/copy are not meaningful for a stream.

use std::pin::Pin;
use std::time::SystemTime;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{Stream, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::error::{DownloadError, TimeTravelError};
use crate::remote_path::RemotePath;
use crate::traits::{Download, Listing, ListingMode, RemoteStorage, StorageMetadata};

#[derive(Clone, Default)]
pub struct PipeStorage;

#[async_trait]
impl RemoteStorage for PipeStorage {
    async fn list(
        &self,
        _prefix: Option<&RemotePath>,
        _mode: ListingMode,
    ) -> Result<Listing, DownloadError> {
        Ok(Listing::default())
    }

    async fn upload(
        &self,
        mut from: Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send + Sync>>,
        _data_size_bytes: usize,
        _to: &RemotePath,
        _metadata: Option<StorageMetadata>,
    ) -> anyhow::Result<()> {
        let mut stdout = tokio::io::stdout();
        while let Some(chunk) = from.next().await {
            stdout.write_all(&chunk?).await?;
        }
        stdout.flush().await?;
        Ok(())
    }

    async fn download(&self, _from: &RemotePath) -> Result<Download, DownloadError> {
        let mut buf = Vec::new();
        tokio::io::stdin()
            .read_to_end(&mut buf)
            .await
            .map_err(|e| DownloadError::Other(e.into()))?;
        let content_length = buf.len() as u64;
        let stream = futures::stream::once(async move { Ok(Bytes::from(buf)) });
        Ok(Download {
            download_stream: Box::pin(stream),
            last_modified: SystemTime::now(),
            etag: String::new(),
            content_length,
            metadata: None,
        })
    }

    async fn download_byte_range(
        &self,
        _from: &RemotePath,
        _start_inclusive: u64,
        _end_exclusive: Option<u64>,
    ) -> Result<Download, DownloadError> {
        Err(DownloadError::BadInput(anyhow::anyhow!(
            "pipe resources do not support ranged reads"
        )))
    }

    async fn delete(&self, _path: &RemotePath, _force_if_read_only: bool) -> anyhow::Result<()> {
        anyhow::bail!("pipe resources cannot be deleted")
    }

    async fn delete_objects(&self, _paths: &[RemotePath], _force_if_read_only: bool) -> anyhow::Result<()> {
        anyhow::bail!("pipe resources cannot be deleted")
    }

    async fn copy(&self, _from: &RemotePath, _to: &RemotePath) -> anyhow::Result<()> {
        anyhow::bail!("pipe resources cannot be server-side copied")
    }

    async fn time_travel_recover(
        &self,
        _prefix: Option<&RemotePath>,
        _timestamp: SystemTime,
        _done_if_after: SystemTime,
    ) -> Result<(), TimeTravelError> {
        Err(TimeTravelError::Unsupported)
    }

    async fn is_directory(&self, _path: &RemotePath) -> anyhow::Result<bool> {
        Ok(false)
    }
}
