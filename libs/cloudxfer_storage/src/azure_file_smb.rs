//! Azure Files (SMB protocol) backend, reached over the share's REST
//! endpoint rather than a mounted drive letter/UNC path, so cloudxfer
//! can run the same way on Linux build agents that have no SMB client.
//! Shape follows [`crate::azure_blob`]'s container-client wrapper,
//! substituted with a file-share client.

use std::pin::Pin;
use std::time::SystemTime;

use async_trait::async_trait;
use azure_storage_files_shares::prelude::{FileAttributes, ShareClient};
use bytes::Bytes;
use futures::stream::{Stream, StreamExt};

use crate::error::{DownloadError, TimeTravelError};
use crate::remote_path::{RemotePath, REMOTE_STORAGE_PREFIX_SEPARATOR};
use crate::traits::{Download, Listing, ListingMode, ListingObject, RemoteStorage, StorageMetadata};

pub struct AzureFileSmbStorage {
    share: ShareClient,
}

impl AzureFileSmbStorage {
    pub fn new(share: ShareClient) -> Self {
        Self { share }
    }

    fn path_str(&self, path: &RemotePath) -> String {
        path.get_path()
            .as_str()
            .trim_end_matches(REMOTE_STORAGE_PREFIX_SEPARATOR)
            .to_string()
    }

    fn split_dir_and_name(&self, path: &RemotePath) -> (String, String) {
        let full = self.path_str(path);
        match full.rsplit_once(REMOTE_STORAGE_PREFIX_SEPARATOR) {
            Some((dir, name)) => (dir.to_string(), name.to_string()),
            None => (String::new(), full),
        }
    }

    fn directory_client(&self, directory: &str) -> azure_storage_files_shares::prelude::DirectoryClient {
        if directory.is_empty() {
            self.share.root_directory_client()
        } else {
            self.share.root_directory_client().get_subdirectory_client(directory)
        }
    }

    /// Best-effort: clears the file's read-only attribute so a
    /// subsequent delete isn't rejected. Failures here (including the
    /// file not existing) are swallowed; the delete call right after
    /// this one is what actually surfaces a real error to the caller.
    async fn clear_read_only(&self, directory: &str, name: &str) {
        let file_client = self.directory_client(directory).get_file_client(name);
        let _ = file_client
            .set_properties()
            .file_attributes(FileAttributes::from("None"))
            .into_future()
            .await;
    }
}

#[async_trait]
impl RemoteStorage for AzureFileSmbStorage {
    async fn list(
        &self,
        prefix: Option<&RemotePath>,
        _mode: ListingMode,
    ) -> Result<Listing, DownloadError> {
        let directory = prefix.map(|p| self.path_str(p)).unwrap_or_default();
        let directory_client = self.directory_client(&directory);

        let mut stream = directory_client.list_files_and_directories().into_stream();
        let mut listing = Listing::default();
        while let Some(page) = stream.next().await {
            let page = page.map_err(|e| DownloadError::Other(e.into()))?;
            for dir in page.directories_and_files.directories {
                let joined = if directory.is_empty() {
                    dir.name
                } else {
                    format!("{directory}/{}", dir.name)
                };
                listing
                    .prefixes
                    .push(RemotePath::from_string(&joined).map_err(DownloadError::BadInput)?);
            }
            for file in page.directories_and_files.files {
                let joined = if directory.is_empty() {
                    file.name.clone()
                } else {
                    format!("{directory}/{}", file.name)
                };
                let path = RemotePath::from_string(&joined).map_err(DownloadError::BadInput)?;
                // `list_files_and_directories` reports Content-Length but
                // not Last-Modified; the share's SMB-time metadata only
                // comes back from a per-file `get_properties` call.
                let file_client = directory_client.get_file_client(&file.name);
                let last_modified = match file_client.get_properties().into_future().await {
                    Ok(props) => props.file.properties.last_modified.into(),
                    Err(_) => SystemTime::now(),
                };
                listing.keys.push(ListingObject {
                    path,
                    size: file.properties.content_length,
                    last_modified,
                });
            }
        }
        Ok(listing)
    }

    async fn upload(
        &self,
        mut from: Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send + Sync>>,
        data_size_bytes: usize,
        to: &RemotePath,
        _metadata: Option<StorageMetadata>,
    ) -> anyhow::Result<()> {
        let mut buf = Vec::with_capacity(data_size_bytes);
        while let Some(chunk) = from.next().await {
            buf.extend_from_slice(&chunk?);
        }

        let (directory, name) = self.split_dir_and_name(to);
        let file_client = self.directory_client(&directory).get_file_client(name);
        file_client.create_file(buf.len() as u64).into_future().await?;
        if !buf.is_empty() {
            file_client
                .put_range(0..(buf.len() as u64), Bytes::from(buf))
                .into_future()
                .await?;
        }
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
        let (directory, name) = self.split_dir_and_name(from);
        let file_client = self.directory_client(&directory).get_file_client(name);

        let mut builder = file_client.get();
        if start_inclusive > 0 || end_exclusive.is_some() {
            builder = builder.range(start_inclusive..end_exclusive.unwrap_or(u64::MAX));
        }
        let response = builder.into_future().await.map_err(|e| {
            if e.to_string().contains("404") {
                DownloadError::NotFound
            } else {
                DownloadError::Other(e.into())
            }
        })?;

        let content_length = response.content_length;
        let buf = response.data.to_vec();
        let stream = futures::stream::once(async move { Ok(Bytes::from(buf)) });
        Ok(Download {
            download_stream: Box::pin(stream),
            last_modified: SystemTime::now(),
            etag: response.etag.to_string(),
            content_length,
            metadata: None,
        })
    }

    async fn delete(&self, path: &RemotePath, force_if_read_only: bool) -> anyhow::Result<()> {
        let (directory, name) = self.split_dir_and_name(path);
        if force_if_read_only {
            self.clear_read_only(&directory, &name).await;
        }
        let file_client = self.directory_client(&directory).get_file_client(name);
        match file_client.delete().into_future().await {
            Ok(_) => Ok(()),
            Err(e) if e.to_string().contains("404") => Ok(()),
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
        let (from_dir, from_name) = self.split_dir_and_name(from);
        let source_url = self
            .directory_client(&from_dir)
            .get_file_client(from_name)
            .url()?;

        let (to_dir, to_name) = self.split_dir_and_name(to);
        self.directory_client(&to_dir)
            .get_file_client(to_name)
            .copy(source_url)
            .into_future()
            .await?;
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
        let directory_client = self.directory_client(&self.path_str(path));
        Ok(directory_client.get_properties().into_future().await.is_ok())
    }
}
