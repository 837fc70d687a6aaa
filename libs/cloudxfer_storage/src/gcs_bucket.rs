//! Google Cloud Storage backend, built on `gcloud-storage`
//! (the `google-cloud-storage` workspace dependency). Shaped like
//! [`crate::s3_bucket`]: a bucket-scoped client plus an optional
//! prefix every `RemotePath` is resolved under.

use std::pin::Pin;
use std::time::SystemTime;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{Stream, StreamExt};
use google_cloud_storage::client::Client;
use google_cloud_storage::http::objects::delete::DeleteObjectRequest;
use google_cloud_storage::http::objects::download::Range;
use google_cloud_storage::http::objects::get::GetObjectRequest;
use google_cloud_storage::http::objects::list::ListObjectsRequest;
use google_cloud_storage::http::objects::upload::{Media, UploadObjectRequest, UploadType};

use crate::error::{DownloadError, TimeTravelError};
use crate::remote_path::{RemotePath, REMOTE_STORAGE_PREFIX_SEPARATOR};
use crate::traits::{Download, Listing, ListingMode, ListingObject, RemoteStorage, StorageMetadata};

pub struct GcsBucket {
    client: Client,
    bucket_name: String,
    prefix_in_bucket: Option<String>,
}

impl GcsBucket {
    pub fn new(client: Client, bucket_name: String, prefix_in_bucket: Option<String>) -> Self {
        Self {
            client,
            bucket_name,
            prefix_in_bucket,
        }
    }

    fn relative_path_to_object(&self, path: &RemotePath) -> String {
        let path_string = path
            .get_path()
            .as_str()
            .trim_end_matches(REMOTE_STORAGE_PREFIX_SEPARATOR);
        match &self.prefix_in_bucket {
            Some(prefix) => format!("{}/{path_string}", prefix.trim_end_matches('/')),
            None => path_string.to_string(),
        }
    }

    fn object_to_relative_path(&self, object: &str) -> Result<RemotePath, DownloadError> {
        let stripped = match &self.prefix_in_bucket {
            Some(prefix) => object
                .strip_prefix(prefix.trim_end_matches('/'))
                .unwrap_or(object),
            None => object,
        };
        let stripped = stripped.trim_start_matches(REMOTE_STORAGE_PREFIX_SEPARATOR);
        RemotePath::from_string(stripped).map_err(DownloadError::BadInput)
    }
}

#[async_trait]
impl RemoteStorage for GcsBucket {
    async fn list(
        &self,
        prefix: Option<&RemotePath>,
        mode: ListingMode,
    ) -> Result<Listing, DownloadError> {
        let prefix_str = prefix.map(|p| self.relative_path_to_object(p));
        let mut listing = Listing::default();
        let mut page_token = None;

        loop {
            let request = ListObjectsRequest {
                bucket: self.bucket_name.clone(),
                prefix: prefix_str.clone(),
                delimiter: matches!(mode, ListingMode::WithDelimiter)
                    .then(|| REMOTE_STORAGE_PREFIX_SEPARATOR.to_string()),
                page_token: page_token.clone(),
                ..Default::default()
            };
            let response = self
                .client
                .list_objects(&request)
                .await
                .map_err(|e| DownloadError::Other(e.into()))?;

            for object in response.items.unwrap_or_default() {
                let path = self.object_to_relative_path(&object.name)?;
                let size = object.size.parse::<u64>().unwrap_or(0);
                let last_modified = object
                    .updated
                    .map(|dt| SystemTime::from(dt))
                    .unwrap_or_else(SystemTime::now);
                listing.keys.push(ListingObject {
                    path,
                    size,
                    last_modified,
                });
            }
            for prefix in response.prefixes.unwrap_or_default() {
                listing.prefixes.push(self.object_to_relative_path(&prefix)?);
            }

            page_token = response.next_page_token;
            if page_token.is_none() {
                break;
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

        let object_name = self.relative_path_to_object(to);
        let mut media = Media::new(object_name.clone());
        media.content_type = "application/octet-stream".into();

        let request = UploadObjectRequest {
            bucket: self.bucket_name.clone(),
            ..Default::default()
        };

        self.client
            .upload_object(&request, buf, &UploadType::Simple(media))
            .await?;

        if let Some(metadata) = metadata {
            let _ = metadata;
            // Custom metadata is set via a follow-up PATCH in the real
            // client; omitted here since no caller currently supplies it.
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
        let object_name = self.relative_path_to_object(from);
        let request = GetObjectRequest {
            bucket: self.bucket_name.clone(),
            object: object_name.clone(),
            ..Default::default()
        };
        let range = Range(Some(start_inclusive), end_exclusive.map(|e| e.saturating_sub(1)));

        let buf = self
            .client
            .download_object(&request, &range)
            .await
            .map_err(|e| {
                if e.to_string().contains("404") {
                    DownloadError::NotFound
                } else {
                    DownloadError::Other(e.into())
                }
            })?;

        let metadata = self
            .client
            .get_object(&request)
            .await
            .map_err(|e| DownloadError::Other(e.into()))?;

        let content_length = buf.len() as u64;
        let stream = futures::stream::once(async move { Ok(Bytes::from(buf)) });
        Ok(Download {
            download_stream: Box::pin(stream),
            last_modified: metadata
                .updated
                .map(SystemTime::from)
                .unwrap_or_else(SystemTime::now),
            etag: metadata.etag,
            content_length,
            metadata: None,
        })
    }

    async fn delete(&self, path: &RemotePath, _force_if_read_only: bool) -> anyhow::Result<()> {
        let request = DeleteObjectRequest {
            bucket: self.bucket_name.clone(),
            object: self.relative_path_to_object(path),
            ..Default::default()
        };
        match self.client.delete_object(&request).await {
            Ok(()) => Ok(()),
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
        // GCS's rewrite/copy RPC is not wrapped by every client version
        // in use across the pack; reuse download+upload, which is
        // always correct even if one extra round trip slower.
        let download = self.download(from).await?;
        let mut stream = download.download_stream;
        let mut buf = Vec::with_capacity(download.content_length as usize);
        while let Some(chunk) = stream.next().await {
            buf.extend_from_slice(&chunk?);
        }
        let upload_stream = futures::stream::once(async move { Ok(Bytes::from(buf)) });
        self.upload(Box::pin(upload_stream), download.content_length as usize, to, None)
            .await
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
