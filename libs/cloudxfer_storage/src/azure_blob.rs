//! Azure Blob Storage backend, grounded on the corpus's
//! `AzureBlobStorage` wrapper (container-scoped client, block-blob
//! upload, prefix listing) and generalized for full read/write use.

use std::pin::Pin;
use std::time::SystemTime;

use async_trait::async_trait;
use azure_core::request_options::Metadata as AzureMetadata;
use azure_storage_blobs::prelude::{BlobClient, ContainerClient};
use bytes::Bytes;
use futures::stream::{Stream, StreamExt};

use crate::error::{DownloadError, TimeTravelError};
use crate::remote_path::{RemotePath, REMOTE_STORAGE_PREFIX_SEPARATOR};
use crate::traits::{Download, Listing, ListingMode, ListingObject, RemoteStorage, StorageMetadata};

pub struct AzureBlobStorage {
    client: ContainerClient,
    prefix_in_container: Option<String>,
}

impl AzureBlobStorage {
    pub fn new(client: ContainerClient, prefix_in_container: Option<String>) -> Self {
        Self {
            client,
            prefix_in_container,
        }
    }

    fn relative_path_to_name(&self, path: &RemotePath) -> String {
        let path_string = path
            .get_path()
            .as_str()
            .trim_end_matches(REMOTE_STORAGE_PREFIX_SEPARATOR);
        match &self.prefix_in_container {
            Some(prefix) => format!("{prefix}/{path_string}"),
            None => path_string.to_string(),
        }
    }

    fn name_to_relative_path(&self, key: &str) -> Result<RemotePath, DownloadError> {
        let stripped = match &self.prefix_in_container {
            Some(prefix) => key.strip_prefix(prefix.as_str()).unwrap_or(key),
            None => key,
        };
        let stripped = stripped.trim_start_matches(REMOTE_STORAGE_PREFIX_SEPARATOR);
        RemotePath::from_string(stripped).map_err(DownloadError::BadInput)
    }

    fn blob_client(&self, to: &RemotePath) -> BlobClient {
        self.client.blob_client(self.relative_path_to_name(to))
    }
}

fn to_azure_metadata(metadata: StorageMetadata) -> AzureMetadata {
    let mut res = AzureMetadata::new();
    for (k, v) in metadata.0.into_iter() {
        res.insert(k, v);
    }
    res
}

#[async_trait]
impl RemoteStorage for AzureBlobStorage {
    async fn list(
        &self,
        prefix: Option<&RemotePath>,
        mode: ListingMode,
    ) -> Result<Listing, DownloadError> {
        let prefix_str = prefix.map(|p| self.relative_path_to_name(p));
        let mut builder = self.client.list_blobs();
        if let Some(prefix_str) = &prefix_str {
            builder = builder.prefix(prefix_str.clone());
        }
        if matches!(mode, ListingMode::WithDelimiter) {
            builder = builder.delimiter(REMOTE_STORAGE_PREFIX_SEPARATOR.to_string());
        }

        let mut stream = builder.into_stream();
        let mut listing = Listing::default();
        while let Some(page) = stream.next().await {
            let page = page.map_err(|e| DownloadError::Other(e.into()))?;
            for blob in page.blobs.blobs() {
                listing.keys.push(ListingObject {
                    path: self.name_to_relative_path(&blob.name)?,
                    size: blob.properties.content_length,
                    last_modified: blob.properties.last_modified.into(),
                });
            }
            for prefix in page.blobs.prefixes() {
                listing
                    .prefixes
                    .push(self.name_to_relative_path(&prefix.name)?);
            }
        }
        Ok(listing)
    }

    async fn upload(
        &self,
        mut from: Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send + Sync>>,
        data_size_bytes: usize,
        to: &RemotePath,
        metadata: Option<StorageMetadata>,
    ) -> anyhow::Result<()> {
        let mut buf = Vec::with_capacity(data_size_bytes);
        while let Some(chunk) = from.next().await {
            buf.extend_from_slice(&chunk?);
        }
        let body = azure_core::Body::Bytes(buf.into());

        let mut builder = self.blob_client(to).put_block_blob(body);
        if let Some(metadata) = metadata {
            builder = builder.metadata(to_azure_metadata(metadata));
        }
        builder.into_future().await?;
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
        let client = self.blob_client(from);
        let mut builder = client.get();
        if start_inclusive > 0 || end_exclusive.is_some() {
            builder = builder.range(azure_core::request_options::Range::new(
                start_inclusive,
                end_exclusive.unwrap_or(u64::MAX),
            ));
        }

        let mut stream = builder.into_stream();
        let mut buf = Vec::new();
        let mut last_modified = SystemTime::now();
        let mut etag = String::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| {
                if e.as_http_error()
                    .map(|h| h.status() == azure_core::StatusCode::NotFound)
                    .unwrap_or(false)
                {
                    DownloadError::NotFound
                } else {
                    DownloadError::Other(e.into())
                }
            })?;
            etag = chunk.blob.properties.etag.to_string();
            last_modified = chunk
                .blob
                .properties
                .last_modified
                .into();
            let data = chunk
                .data
                .collect()
                .await
                .map_err(|e| DownloadError::Other(e.into()))?;
            buf.extend_from_slice(&data);
        }

        let content_length = buf.len() as u64;
        let out_stream = futures::stream::once(async move { Ok(Bytes::from(buf)) });
        Ok(Download {
            download_stream: Box::pin(out_stream),
            last_modified,
            etag,
            content_length,
            metadata: None,
        })
    }

    async fn delete(&self, path: &RemotePath, _force_if_read_only: bool) -> anyhow::Result<()> {
        match self.blob_client(path).delete().into_future().await {
            Ok(_) => Ok(()),
            Err(e)
                if e.as_http_error()
                    .map(|h| h.status() == azure_core::StatusCode::NotFound)
                    .unwrap_or(false) =>
            {
                Ok(())
            }
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
        let source_url = self.blob_client(from).url()?;
        self.blob_client(to)
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
        let listing = self
            .list(Some(path), ListingMode::WithDelimiter)
            .await
            .map_err(|e| anyhow::anyhow!(e))?;
        Ok(!listing.prefixes.is_empty())
    }
}
