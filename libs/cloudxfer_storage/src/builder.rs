//! Endpoint construction: turns a cooked `ResourceString` plus the
//! credential C4 selected into a concrete backend wrapped in
//! `GenericRemoteStorage`, plus the `RemotePath` root the caller should
//! join relative paths onto. Mirrors the donor's
//! `GenericRemoteStorage::from_config`, generalized from one backend
//! (Azure Blob) to the full endpoint set this workspace supports.

use std::sync::Arc;

use anyhow::{bail, Context};
use camino::Utf8PathBuf;
use url::Url;

use azure_storage::StorageCredentials;
use azure_storage_blobs::prelude::{BlobServiceClient, ClientBuilder as BlobClientBuilder};
use azure_storage_datalake::clients::DataLakeClient;
use azure_storage_files_shares::prelude::ShareServiceClient;

use aws_credential_types::Credentials as AwsCredentials;
use aws_sdk_s3::config::{BehaviorVersion, Builder as S3ConfigBuilder, Region};
use aws_sdk_s3::Client as S3Client;

use google_cloud_storage::client::{Client as GcsClient, ClientConfig as GcsClientConfig};

use cloudxfer_core::Location;

use crate::azure_blob::AzureBlobStorage;
use crate::azure_file_nfs::AzureFileNfsStorage;
use crate::azure_file_smb::AzureFileSmbStorage;
use crate::blob_fs::BlobFsStorage;
use crate::credentials::Credential;
use crate::gcs_bucket::GcsBucket;
use crate::generic::GenericRemoteStorage;
use crate::local_fs::LocalFs;
use crate::pipe::PipeStorage;
use crate::remote_path::RemotePath;
use crate::s3_bucket::S3Bucket;

/// Splits an Azure endpoint URL into (account, container-or-share, leftover path).
fn parse_azure_url(value: &str) -> anyhow::Result<(String, String, RemotePath)> {
    let url = Url::parse(value).with_context(|| format!("'{value}' is not a valid URL"))?;
    let host = url.host_str().context("endpoint URL has no host")?;
    let account = host
        .split('.')
        .next()
        .filter(|s| !s.is_empty())
        .context("endpoint URL host has no account segment")?
        .to_string();
    let mut segments = url
        .path_segments()
        .context("endpoint URL has no path")?
        .filter(|s| !s.is_empty());
    let container = segments
        .next()
        .context("endpoint URL names no container/share/filesystem")?
        .to_string();
    let rest: Vec<&str> = segments.collect();
    let root = RemotePath::from_string(&rest.join("/"))?;
    Ok((account, container, root))
}

/// Splits an S3 endpoint URL (path-style or virtual-hosted-style) into
/// (bucket, region, leftover path).
fn parse_s3_url(value: &str) -> anyhow::Result<(String, Option<String>, RemotePath)> {
    let url = Url::parse(value).with_context(|| format!("'{value}' is not a valid URL"))?;
    let host = url.host_str().context("endpoint URL has no host")?;

    if host.starts_with("s3.") || host.starts_with("s3-") || host == "amazonaws.com" {
        let region = host
            .strip_prefix("s3.")
            .or_else(|| host.strip_prefix("s3-"))
            .and_then(|rest| rest.strip_suffix(".amazonaws.com"))
            .filter(|r| !r.is_empty())
            .map(str::to_string);
        let mut segments = url
            .path_segments()
            .context("endpoint URL has no path")?
            .filter(|s| !s.is_empty());
        let bucket = segments
            .next()
            .context("endpoint URL names no bucket")?
            .to_string();
        let rest: Vec<&str> = segments.collect();
        return Ok((bucket, region, RemotePath::from_string(&rest.join("/"))?));
    }

    let Some(bucket_part) = host.strip_suffix(".amazonaws.com") else {
        bail!("'{value}' does not look like an S3 endpoint");
    };
    let mut labels = bucket_part.splitn(2, ".s3");
    let bucket = labels.next().context("S3 host has no bucket segment")?.to_string();
    let region = labels
        .next()
        .and_then(|rest| rest.strip_prefix('.'))
        .filter(|r| !r.is_empty())
        .map(str::to_string);
    let rest: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|p| !p.is_empty()).collect())
        .unwrap_or_default();
    Ok((bucket, region, RemotePath::from_string(&rest.join("/"))?))
}

/// Splits a GCS endpoint URL into (bucket, leftover path).
fn parse_gcs_url(value: &str) -> anyhow::Result<(String, RemotePath)> {
    let url = Url::parse(value).with_context(|| format!("'{value}' is not a valid URL"))?;
    let host = url.host_str().context("endpoint URL has no host")?;

    if host == "storage.googleapis.com" {
        let mut segments = url
            .path_segments()
            .context("endpoint URL has no path")?
            .filter(|s| !s.is_empty());
        let bucket = segments
            .next()
            .context("endpoint URL names no bucket")?
            .to_string();
        let rest: Vec<&str> = segments.collect();
        return Ok((bucket, RemotePath::from_string(&rest.join("/"))?));
    }

    let bucket = host
        .strip_suffix(".storage.googleapis.com")
        .context("endpoint URL is not a recognized GCS host")?
        .to_string();
    let rest: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|p| !p.is_empty()).collect())
        .unwrap_or_default();
    Ok((bucket, RemotePath::from_string(&rest.join("/"))?))
}

fn azure_storage_credentials(credential: &Credential) -> anyhow::Result<StorageCredentials> {
    match credential {
        Credential::SharedKey { account, key } => {
            Ok(StorageCredentials::access_key(account.clone(), key.clone()))
        }
        Credential::SasToken { sas } => Ok(StorageCredentials::sas_token(sas.clone())?),
        Credential::OAuthToken { token }
        | Credential::ForwardedOAuthToken { token }
        | Credential::MDOAuthToken { token } => Ok(StorageCredentials::bearer_token(token.clone())),
        Credential::Anonymous => Ok(StorageCredentials::anonymous()),
        other => bail!("credential {other:?} cannot authenticate an Azure endpoint"),
    }
}

/// Builds the concrete backend for one endpoint, returning it alongside
/// the `RemotePath` root every traversed relative path should be joined
/// onto (empty when the backend already bakes the full path into its
/// own client, as Blob/S3/GCS do via a bucket/container-scoped prefix).
pub async fn build_storage(
    location: Location,
    value: &str,
    credential: &Credential,
) -> anyhow::Result<(GenericRemoteStorage, RemotePath)> {
    match location {
        Location::Local | Location::Benchmark | Location::None => {
            let storage = LocalFs::new(Utf8PathBuf::from(value))?;
            Ok((
                GenericRemoteStorage::LocalFs(Arc::new(storage)),
                RemotePath::from_string("")?,
            ))
        }
        Location::Pipe => Ok((
            GenericRemoteStorage::Pipe(Arc::new(PipeStorage)),
            RemotePath::from_string("")?,
        )),
        Location::FileNFS => {
            let storage = AzureFileNfsStorage::new(Utf8PathBuf::from(value))?;
            Ok((
                GenericRemoteStorage::AzureFileNfs(Arc::new(storage)),
                RemotePath::from_string("")?,
            ))
        }
        Location::Blob => {
            let (account, container, root) = parse_azure_url(value)?;
            let creds = azure_storage_credentials(credential)?;
            let container_client = BlobServiceClient::new(account, creds).container_client(container);
            Ok((
                GenericRemoteStorage::AzureBlob(Arc::new(AzureBlobStorage::new(container_client, None))),
                root,
            ))
        }
        Location::BlobFS => {
            let (account, filesystem, root) = parse_azure_url(value)?;
            let creds = azure_storage_credentials(credential)?;
            let data_lake_client = DataLakeClient::new(account, creds);
            Ok((
                GenericRemoteStorage::BlobFs(Arc::new(BlobFsStorage::new(data_lake_client, filesystem))),
                root,
            ))
        }
        Location::File => {
            let (account, share, root) = parse_azure_url(value)?;
            let creds = azure_storage_credentials(credential)?;
            let share_client = ShareServiceClient::new(account, creds).share_client(share);
            Ok((
                GenericRemoteStorage::AzureFileSmb(Arc::new(AzureFileSmbStorage::new(share_client))),
                root,
            ))
        }
        Location::S3 => {
            let (bucket, region, root) = parse_s3_url(value)?;
            let mut builder = S3ConfigBuilder::new().behavior_version(BehaviorVersion::latest());
            if let Some(region) = region {
                builder = builder.region(Region::new(region));
            }
            builder = match credential {
                Credential::S3AccessKey {
                    access_key_id,
                    secret_access_key,
                    session_token,
                } => builder.credentials_provider(AwsCredentials::new(
                    access_key_id.clone(),
                    secret_access_key.clone(),
                    session_token.clone(),
                    None,
                    "cloudxfer",
                )),
                Credential::S3PublicBucket => builder,
                other => bail!("credential {other:?} cannot authenticate an S3 endpoint"),
            };
            let client = S3Client::from_conf(builder.build());
            Ok((
                GenericRemoteStorage::AwsS3(Arc::new(S3Bucket::new(client, bucket, None))),
                root,
            ))
        }
        Location::GCP => {
            let (bucket, root) = parse_gcs_url(value)?;
            let config = match credential {
                Credential::GoogleApplicationCredentials { path } => {
                    // gcloud-storage's `with_auth` reads
                    // `GOOGLE_APPLICATION_CREDENTIALS` itself; C4 has already
                    // validated the path exists before we get here.
                    std::env::set_var("GOOGLE_APPLICATION_CREDENTIALS", path);
                    GcsClientConfig::default()
                        .with_auth()
                        .await
                        .context("failed to build GCS client config")?
                }
                other => bail!("credential {other:?} cannot authenticate a GCS endpoint"),
            };
            let client = GcsClient::new(config);
            Ok((
                GenericRemoteStorage::Gcs(Arc::new(GcsBucket::new(client, bucket, None))),
                root,
            ))
        }
        Location::Unknown => bail!("cannot build a storage backend for an unrecognized endpoint"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_blob_url() {
        let (account, container, root) =
            parse_azure_url("https://acct.blob.core.windows.net/my-container/sub/dir").unwrap();
        assert_eq!(account, "acct");
        assert_eq!(container, "my-container");
        assert_eq!(root.as_key(), "sub/dir");
    }

    #[test]
    fn parses_virtual_hosted_s3_url() {
        let (bucket, region, root) =
            parse_s3_url("https://my-bucket.s3.us-west-2.amazonaws.com/prefix/key").unwrap();
        assert_eq!(bucket, "my-bucket");
        assert_eq!(region.as_deref(), Some("us-west-2"));
        assert_eq!(root.as_key(), "prefix/key");
    }

    #[test]
    fn parses_path_style_s3_url() {
        let (bucket, region, root) =
            parse_s3_url("https://s3.eu-central-1.amazonaws.com/my-bucket/prefix").unwrap();
        assert_eq!(bucket, "my-bucket");
        assert_eq!(region.as_deref(), Some("eu-central-1"));
        assert_eq!(root.as_key(), "prefix");
    }

    #[test]
    fn parses_gcs_url() {
        let (bucket, root) = parse_gcs_url("https://storage.googleapis.com/my-bucket/a/b").unwrap();
        assert_eq!(bucket, "my-bucket");
        assert_eq!(root.as_key(), "a/b");
    }
}
