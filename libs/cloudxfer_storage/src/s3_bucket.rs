//! Amazon S3 backend, built on `aws-sdk-s3`. Shaped the same way as
//! [`crate::azure_blob`]: a bucket-scoped client plus a prefix that
//! every `RemotePath` is resolved under.

use std::pin::Pin;
use std::time::SystemTime;

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;
use futures::stream::{Stream, StreamExt};

use crate::error::{DownloadError, TimeTravelError};
use crate::remote_path::{RemotePath, REMOTE_STORAGE_PREFIX_SEPARATOR};
use crate::traits::{Download, Listing, ListingMode, ListingObject, RemoteStorage, StorageMetadata};

pub struct S3Bucket {
    client: Client,
    bucket_name: String,
    prefix_in_bucket: Option<String>,
}

impl S3Bucket {
    pub fn new(client: Client, bucket_name: String, prefix_in_bucket: Option<String>) -> Self {
        Self {
            client,
            bucket_name,
            prefix_in_bucket,
        }
    }

    fn relative_path_to_key(&self, path: &RemotePath) -> String {
        let path_string = path
            .get_path()
            .as_str()
            .trim_end_matches(REMOTE_STORAGE_PREFIX_SEPARATOR);
        match &self.prefix_in_bucket {
            Some(prefix) => format!("{}/{path_string}", prefix.trim_end_matches('/')),
            None => path_string.to_string(),
        }
    }

    fn key_to_relative_path(&self, key: &str) -> Result<RemotePath, DownloadError> {
        let stripped = match &self.prefix_in_bucket {
            Some(prefix) => key.strip_prefix(prefix.trim_end_matches('/')).unwrap_or(key),
            None => key,
        };
        let stripped = stripped.trim_start_matches(REMOTE_STORAGE_PREFIX_SEPARATOR);
        RemotePath::from_string(stripped).map_err(DownloadError::BadInput)
    }
}

#[async_trait]
impl RemoteStorage for S3Bucket {
    async fn list(
        &self,
        prefix: Option<&RemotePath>,
        mode: ListingMode,
    ) -> Result<Listing, DownloadError> {
        let prefix_key = prefix.map(|p| self.relative_path_to_key(p));
        let mut listing = Listing::default();
        let mut continuation_token = None;

        loop {
            let mut req = self.client.list_objects_v2().bucket(&self.bucket_name);
            if let Some(prefix_key) = &prefix_key {
                req = req.prefix(prefix_key);
            }
            if matches!(mode, ListingMode::WithDelimiter) {
                req = req.delimiter(REMOTE_STORAGE_PREFIX_SEPARATOR.to_string());
            }
            if let Some(token) = &continuation_token {
                req = req.continuation_token(token);
            }

            let response = req.send().await.map_err(|e| DownloadError::Other(e.into()))?;
            for object in response.contents() {
                if let Some(key) = object.key() {
                    let path = self.key_to_relative_path(key)?;
                    let size = object.size().unwrap_or(0).max(0) as u64;
                    let last_modified = object
                        .last_modified()
                        .and_then(|dt| dt.to_chrono_utc().ok())
                        .map(|dt| SystemTime::from(dt))
                        .unwrap_or_else(SystemTime::now);
                    listing.keys.push(ListingObject {
                        path,
                        size,
                        last_modified,
                    });
                }
            }
            for common_prefix in response.common_prefixes() {
                if let Some(p) = common_prefix.prefix() {
                    listing.prefixes.push(self.key_to_relative_path(p)?);
                }
            }

            if response.is_truncated().unwrap_or(false) {
                continuation_token = response.next_continuation_token().map(str::to_string);
            } else {
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

        let mut req = self
            .client
            .put_object()
            .bucket(&self.bucket_name)
            .key(self.relative_path_to_key(to))
            .body(ByteStream::from(buf));
        if let Some(metadata) = metadata {
            for (k, v) in metadata.0 {
                req = req.metadata(k, v);
            }
        }
        req.send().await?;
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
        let mut req = self
            .client
            .get_object()
            .bucket(&self.bucket_name)
            .key(self.relative_path_to_key(from));

        if start_inclusive > 0 || end_exclusive.is_some() {
            let range = match end_exclusive {
                Some(end) => format!("bytes={start_inclusive}-{}", end.saturating_sub(1)),
                None => format!("bytes={start_inclusive}-"),
            };
            req = req.range(range);
        }

        let response = req.send().await.map_err(|e| {
            let svc_err = e.as_service_error();
            if svc_err
                .map(|e| e.is_no_such_key())
                .unwrap_or(false)
            {
                DownloadError::NotFound
            } else {
                DownloadError::Other(e.into())
            }
        })?;

        let content_length = response.content_length().unwrap_or(0).max(0) as u64;
        let etag = response.e_tag().unwrap_or_default().to_string();
        let last_modified = response
            .last_modified()
            .and_then(|dt| dt.to_owned().try_into().ok())
            .unwrap_or_else(SystemTime::now);

        let bytes = response
            .body
            .collect()
            .await
            .map_err(|e| DownloadError::Other(e.into()))?
            .into_bytes();
        let stream = futures::stream::once(async move { Ok(bytes) });

        Ok(Download {
            download_stream: Box::pin(stream),
            last_modified,
            etag,
            content_length,
            metadata: None,
        })
    }

    async fn delete(&self, path: &RemotePath, _force_if_read_only: bool) -> anyhow::Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket_name)
            .key(self.relative_path_to_key(path))
            .send()
            .await?;
        Ok(())
    }

    async fn delete_objects(&self, paths: &[RemotePath], _force_if_read_only: bool) -> anyhow::Result<()> {
        use aws_sdk_s3::types::{Delete, ObjectIdentifier};

        // S3's batch-delete API caps a single request at 1000 keys;
        // chunk accordingly rather than looping one `delete` at a time.
        const MAX_KEYS_PER_DELETE: usize = 1000;
        for chunk in paths.chunks(MAX_KEYS_PER_DELETE) {
            let objects = chunk
                .iter()
                .map(|p| {
                    ObjectIdentifier::builder()
                        .key(self.relative_path_to_key(p))
                        .build()
                })
                .collect::<Result<Vec<_>, _>>()?;
            let delete = Delete::builder().set_objects(Some(objects)).build()?;
            self.client
                .delete_objects()
                .bucket(&self.bucket_name)
                .delete(delete)
                .send()
                .await?;
        }
        Ok(())
    }

    async fn copy(&self, from: &RemotePath, to: &RemotePath) -> anyhow::Result<()> {
        let source = format!(
            "{}/{}",
            self.bucket_name,
            self.relative_path_to_key(from)
        );
        self.client
            .copy_object()
            .bucket(&self.bucket_name)
            .copy_source(source)
            .key(self.relative_path_to_key(to))
            .send()
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

    async fn list_containers(&self) -> anyhow::Result<Vec<String>> {
        let response = self.client.list_buckets().send().await?;
        Ok(response
            .buckets()
            .iter()
            .filter_map(|b| b.name().map(str::to_string))
            .collect())
    }
}
