//! Location classification (spec §3, §4.1 / component C1).

use std::fmt;

use url::Url;

/// The benchmark sentinel host, used by `InferLocation` to recognize
/// synthetic (no-I/O) benchmark endpoints.
const BENCHMARK_HOST: &str = "benchmark.azcopy.local";

/// The pipe argument value recognized by `InferLocation`.
pub const PIPE_ARG: &str = "~pipe~";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Location {
    Local,
    Pipe,
    Blob,
    File,
    FileNFS,
    BlobFS,
    S3,
    GCP,
    Benchmark,
    None,
    Unknown,
}

impl Location {
    /// Any location that requires network I/O to reach.
    pub fn is_remote(self) -> bool {
        !matches!(self, Location::Local | Location::Pipe | Location::None)
    }

    /// Azure-family endpoints: Blob, File (SMB), File (NFS), BlobFS (ADLS
    /// Gen2 over blob).
    pub fn is_azure(self) -> bool {
        matches!(
            self,
            Location::Blob | Location::File | Location::FileNFS | Location::BlobFS
        )
    }

    /// Whether an OAuth token obtained for this endpoint can be forwarded
    /// to another Azure endpoint in a service-to-service copy.
    pub fn can_forward_oauth_tokens(self) -> bool {
        self.is_azure()
    }

    /// Whether this endpoint kind supports hierarchical-namespace ACLs
    /// (ADLS Gen2 semantics over blob storage).
    pub fn supports_hns_acls(self) -> bool {
        matches!(self, Location::BlobFS)
    }

    /// Whether this endpoint kind is SMB-aware (participates in Windows
    /// file-attribute preservation).
    pub fn is_smb_aware(self) -> bool {
        matches!(self, Location::Local | Location::File)
    }

    /// Whether this endpoint kind is NFS-aware.
    pub fn is_nfs_aware(self) -> bool {
        matches!(self, Location::Local | Location::FileNFS)
    }

    /// Trailing-dot semantics (`.`/`..` as literal path components) are
    /// only meaningful, and only bit-compatible, between a pair of
    /// endpoints that both support them.
    pub fn supports_trailing_dot(self) -> bool {
        matches!(self, Location::Local | Location::File | Location::FileNFS)
    }

    pub fn both_support_trailing_dot(a: Location, b: Location) -> bool {
        a.supports_trailing_dot() && b.supports_trailing_dot()
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Location::Local => "Local",
            Location::Pipe => "Pipe",
            Location::Blob => "Blob",
            Location::File => "File",
            Location::FileNFS => "FileNFS",
            Location::BlobFS => "BlobFS",
            Location::S3 => "S3",
            Location::GCP => "GCP",
            Location::Benchmark => "Benchmark",
            Location::None => "None",
            Location::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

/// Classifies a single source/destination argument.
///
/// `arg == "~pipe~"` is special-cased to [`Location::Pipe`]. Anything
/// that parses as an absolute HTTP(S) URL with a non-empty host is
/// classified by host substring; IPv4-literal hosts (common for emulators
/// and MinIO-style local endpoints without a recognizable suffix) are
/// [`Location::Unknown`] rather than guessed at. Everything else is
/// [`Location::Local`].
pub fn infer_location(arg: &str) -> Location {
    if arg == PIPE_ARG {
        return Location::Pipe;
    }

    let Ok(url) = Url::parse(arg) else {
        return Location::Local;
    };
    if url.scheme() != "http" && url.scheme() != "https" {
        return Location::Local;
    }
    let Some(host) = url.host_str() else {
        return Location::Local;
    };
    if host.is_empty() {
        return Location::Local;
    }

    if host == BENCHMARK_HOST {
        return Location::Benchmark;
    }
    if host.parse::<std::net::Ipv4Addr>().is_ok() {
        return Location::Unknown;
    }
    if host.contains(".blob.") || host.ends_with(".blob.core.windows.net") {
        return Location::Blob;
    }
    if host.contains(".file.") || host.ends_with(".file.core.windows.net") {
        return Location::File;
    }
    if host.contains(".dfs.") || host.ends_with(".dfs.core.windows.net") {
        return Location::BlobFS;
    }
    if host.ends_with(".amazonaws.com") || host.contains(".s3.") || host.starts_with("s3.") {
        return Location::S3;
    }
    if host.ends_with(".storage.googleapis.com") || host == "storage.googleapis.com" {
        return Location::GCP;
    }

    Location::Unknown
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipe_sentinel_is_pipe() {
        assert_eq!(infer_location(PIPE_ARG), Location::Pipe);
    }

    #[test]
    fn plain_path_is_local() {
        assert_eq!(infer_location("/home/user/data"), Location::Local);
        assert_eq!(infer_location("C:\\data"), Location::Local);
    }

    #[test]
    fn blob_host_classified() {
        assert_eq!(
            infer_location("https://acct.blob.core.windows.net/container/path"),
            Location::Blob
        );
    }

    #[test]
    fn dfs_host_classified_as_blobfs() {
        assert_eq!(
            infer_location("https://acct.dfs.core.windows.net/container/path"),
            Location::BlobFS
        );
    }

    #[test]
    fn s3_host_classified() {
        assert_eq!(
            infer_location("https://my-bucket.s3.us-west-2.amazonaws.com/key"),
            Location::S3
        );
    }

    #[test]
    fn ipv4_literal_is_unknown() {
        assert_eq!(infer_location("https://10.0.0.1/bucket/key"), Location::Unknown);
    }
}
