//! `RemoteStorage` trait, per-backend implementations, and credential
//! selection (spec §4.4 component C4 and the storage half of §6).

pub mod azure_blob;
pub mod azure_file_nfs;
pub mod azure_file_smb;
pub mod blob_fs;
pub mod builder;
pub mod credentials;
pub mod error;
pub mod gcs_bucket;
pub mod generic;
pub mod local_fs;
pub mod pipe;
pub mod remote_path;
pub mod s3_bucket;
pub mod traits;

pub use builder::build_storage;
pub use credentials::{select_credential, Credential, CredentialInputs};
pub use error::{DownloadError, TimeTravelError, TimeoutOrCancel};
pub use generic::GenericRemoteStorage;
pub use remote_path::{RemotePath, REMOTE_STORAGE_PREFIX_SEPARATOR};
pub use traits::{Download, Listing, ListingMode, ListingObject, RemoteStorage, StorageMetadata};

pub use azure_blob::AzureBlobStorage;
pub use azure_file_nfs::AzureFileNfsStorage;
pub use azure_file_smb::AzureFileSmbStorage;
pub use blob_fs::BlobFsStorage;
pub use gcs_bucket::GcsBucket;
pub use local_fs::LocalFs;
pub use pipe::PipeStorage;
pub use s3_bucket::S3Bucket;
