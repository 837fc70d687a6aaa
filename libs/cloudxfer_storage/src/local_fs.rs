//! Local-filesystem backend: the `RemoteStorage` implementation used
//! whenever an endpoint resolves to [`Location::Local`], and also the
//! basis the pipe backend borrows its upload/download plumbing from.

use std::pin::Pin;
use std::time::SystemTime;

use async_trait::async_trait;
use bytes::Bytes;
use camino::Utf8PathBuf;
use futures::stream::{Stream, StreamExt};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

use crate::error::{DownloadError, TimeTravelError};
use crate::remote_path::RemotePath;
use crate::traits::{Download, Listing, ListingMode, ListingObject, RemoteStorage, StorageMetadata};

/// Roots every `RemotePath` at a directory on disk, mirroring the
/// donor's `LocalFs` backend.
#[derive(Clone)]
pub struct LocalFs {
    storage_root: Utf8PathBuf,
}

impl LocalFs {
    pub fn new(storage_root: Utf8PathBuf) -> anyhow::Result<Self> {
        anyhow::ensure!(
            storage_root.is_absolute(),
            "local storage root must be an absolute path, got {storage_root}"
        );
        Ok(Self { storage_root })
    }

    fn resolve(&self, path: &RemotePath) -> Utf8PathBuf {
        path.with_base(&self.storage_root)
    }
}

#[async_trait]
impl RemoteStorage for LocalFs {
    async fn list(
        &self,
        prefix: Option<&RemotePath>,
        mode: ListingMode,
    ) -> Result<Listing, DownloadError> {
        let base = match prefix {
            Some(p) => self.resolve(p),
            None => self.storage_root.clone(),
        };

        let mut listing = Listing::default();
        if !base.exists() {
            return Ok(listing);
        }

        match mode {
            ListingMode::WithDelimiter => {
                let mut entries = tokio::fs::read_dir(&base)
                    .await
                    .map_err(|e| DownloadError::Other(e.into()))?;
                while let Some(entry) = entries
                    .next_entry()
                    .await
                    .map_err(|e| DownloadError::Other(e.into()))?
                {
                    let full = Utf8PathBuf::try_from(entry.path())
                        .map_err(|e| DownloadError::BadInput(e.into()))?;
                    let relative = full
                        .strip_prefix(&self.storage_root)
                        .unwrap_or(&full)
                        .to_path_buf();
                    let remote = RemotePath::new(&relative)
                        .map_err(|e| DownloadError::BadInput(e))?;
                    if entry.path().is_dir() {
                        listing.prefixes.push(remote);
                    } else {
                        let meta = entry
                            .metadata()
                            .await
                            .map_err(|e| DownloadError::Other(e.into()))?;
                        listing.keys.push(ListingObject {
                            path: remote,
                            size: meta.len(),
                            last_modified: meta.modified().unwrap_or_else(|_| SystemTime::now()),
                        });
                    }
                }
            }
            ListingMode::NoDelimiter => {
                for entry in walkdir::WalkDir::new(&base)
                    .into_iter()
                    .filter_map(|e| e.ok())
                    .filter(|e| e.file_type().is_file())
                {
                    let full = Utf8PathBuf::try_from(entry.path().to_path_buf())
                        .map_err(|e| DownloadError::BadInput(e.into()))?;
                    let relative = full
                        .strip_prefix(&self.storage_root)
                        .unwrap_or(&full)
                        .to_path_buf();
                    let remote = RemotePath::new(&relative).map_err(DownloadError::BadInput)?;
                    let meta = entry
                        .metadata()
                        .map_err(|e| DownloadError::Other(e.into()))?;
                    listing.keys.push(ListingObject {
                        path: remote,
                        size: meta.len(),
                        last_modified: meta.modified().unwrap_or_else(|_| SystemTime::now()),
                    });
                }
            }
        }

        Ok(listing)
    }

    async fn upload(
        &self,
        mut from: Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send + Sync>>,
        _data_size_bytes: usize,
        to: &RemotePath,
        _metadata: Option<StorageMetadata>,
    ) -> anyhow::Result<()> {
        let target = self.resolve(to);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::File::create(&target).await?;
        while let Some(chunk) = from.next().await {
            file.write_all(&chunk?).await?;
        }
        file.flush().await?;
        Ok(())
    }

    async fn download(&self, from: &RemotePath) -> Result<Download, DownloadError> {
        self.download_byte_range(from, 0, None).await
    }

    async fn download_byte_range(
        &self,
        from: &RemotePath,
        start_inclusive: u64,
        end_exclusive: Option<u64>,
    ) -> Result<Download, DownloadError> {
        let path = self.resolve(from);
        let mut file = tokio::fs::File::open(&path)
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => DownloadError::NotFound,
                _ => DownloadError::Other(e.into()),
            })?;
        let metadata = file
            .metadata()
            .await
            .map_err(|e| DownloadError::Other(e.into()))?;
        let last_modified = metadata.modified().unwrap_or(SystemTime::now());

        if start_inclusive > 0 {
            file.seek(std::io::SeekFrom::Start(start_inclusive))
                .await
                .map_err(|e| DownloadError::Other(e.into()))?;
        }
        let take = end_exclusive.map(|end| end.saturating_sub(start_inclusive));
        let content_length = take.unwrap_or(metadata.len().saturating_sub(start_inclusive));

        let mut buf = Vec::with_capacity(content_length as usize);
        match take {
            Some(n) => {
                file.take(n)
                    .read_to_end(&mut buf)
                    .await
                    .map_err(|e| DownloadError::Other(e.into()))?;
            }
            None => {
                file.read_to_end(&mut buf)
                    .await
                    .map_err(|e| DownloadError::Other(e.into()))?;
            }
        }

        let stream = futures::stream::once(async move { Ok(Bytes::from(buf)) });
        Ok(Download {
            download_stream: Box::pin(stream),
            last_modified,
            etag: format!("{:x}", metadata.len()),
            content_length,
            metadata: None,
        })
    }

    async fn delete(&self, path: &RemotePath, _force_if_read_only: bool) -> anyhow::Result<()> {
        let target = self.resolve(path);
        match tokio::fs::remove_file(&target).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_objects(&self, paths: &[RemotePath], force_if_read_only: bool) -> anyhow::Result<()> {
        for path in paths {
            self.delete(path, force_if_read_only).await?;
        }
        Ok(())
    }

    async fn copy(&self, from: &RemotePath, to: &RemotePath) -> anyhow::Result<()> {
        let src = self.resolve(from);
        let dst = self.resolve(to);
        if let Some(parent) = dst.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(&src, &dst).await?;
        Ok(())
    }

    async fn time_travel_recover(
        &self,
        _prefix: Option<&RemotePath>,
        _timestamp: SystemTime,
        _done_if_after: SystemTime,
    ) -> Result<(), TimeTravelError> {
        Err(TimeTravelError::Unsupported)
    }

    async fn is_directory(&self, path: &RemotePath) -> anyhow::Result<bool> {
        Ok(self.resolve(path).is_dir())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn path(base: &std::path::Path) -> Utf8PathBuf {
        Utf8PathBuf::try_from(base.to_path_buf()).unwrap()
    }

    #[tokio::test]
    async fn round_trips_a_small_file() {
        let dir = tempfile::tempdir().unwrap();
        let fs = LocalFs::new(path(dir.path())).unwrap();
        let remote = RemotePath::from_string("a/b.txt").unwrap();

        let body = Bytes::from_static(b"hello world");
        let stream = futures::stream::once(async move { Ok(body) });
        fs.upload(Box::pin(stream), 11, &remote, None).await.unwrap();

        let download = fs.download(&remote).await.unwrap();
        assert_eq!(download.content_length, 11);
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let fs = LocalFs::new(path(dir.path())).unwrap();
        let remote = RemotePath::from_string("missing.txt").unwrap();
        let err = fs.download(&remote).await.unwrap_err();
        assert!(matches!(err, DownloadError::NotFound));
    }
}
