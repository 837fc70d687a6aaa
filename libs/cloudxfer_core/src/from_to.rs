//! FromTo pair classification (spec §3, §4.1 / component C1).

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::location::{infer_location, Location};

/// The finite set of (source, destination) location pairs the engine
/// knows how to execute (spec §3, component C1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FromToPair {
    LocalBlob,
    BlobLocal,
    LocalFile,
    FileLocal,
    LocalFileNFS,
    FileNFSLocal,
    LocalS3,
    LocalGCP,
    LocalBlobFS,
    BlobBlob,
    BlobFile,
    FileBlob,
    FileFile,
    FileNFSFileNFS,
    S3Blob,
    GCPBlob,
    BlobFSBlobFS,
    PipeBlob,
    BlobPipe,
}

impl FromToPair {
    pub fn endpoints(self) -> (Location, Location) {
        use FromToPair::*;
        use Location::*;
        match self {
            LocalBlob => (Local, Blob),
            BlobLocal => (Blob, Local),
            LocalFile => (Local, File),
            FileLocal => (File, Local),
            LocalFileNFS => (Local, FileNFS),
            FileNFSLocal => (FileNFS, Local),
            LocalS3 => (Local, S3),
            LocalGCP => (Local, GCP),
            LocalBlobFS => (Local, BlobFS),
            BlobBlob => (Blob, Blob),
            BlobFile => (Blob, File),
            FileBlob => (File, Blob),
            FileFile => (File, File),
            FileNFSFileNFS => (FileNFS, FileNFS),
            S3Blob => (S3, Blob),
            GCPBlob => (GCP, Blob),
            BlobFSBlobFS => (BlobFS, BlobFS),
            PipeBlob => (Pipe, Blob),
            BlobPipe => (Blob, Pipe),
        }
    }

    fn from_endpoints(src: Location, dst: Location) -> Option<Self> {
        use FromToPair::*;
        use Location::*;
        Some(match (src, dst) {
            (Local, Blob) => LocalBlob,
            (Blob, Local) => BlobLocal,
            (Local, File) => LocalFile,
            (File, Local) => FileLocal,
            (Local, FileNFS) => LocalFileNFS,
            (FileNFS, Local) => FileNFSLocal,
            (Local, S3) => LocalS3,
            (Local, GCP) => LocalGCP,
            (Local, BlobFS) => LocalBlobFS,
            (Blob, Blob) => BlobBlob,
            (Blob, File) => BlobFile,
            (File, Blob) => FileBlob,
            (File, File) => FileFile,
            (FileNFS, FileNFS) => FileNFSFileNFS,
            (S3, Blob) => S3Blob,
            (GCP, Blob) => GCPBlob,
            (BlobFS, BlobFS) => BlobFSBlobFS,
            (Pipe, Blob) => PipeBlob,
            (Blob, Pipe) => BlobPipe,
            _ => return None,
        })
    }
}

/// An ordered pair of [`Location`]s, restricted to the finite
/// [`FromToPair`] set and carrying the derived predicates from spec §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FromTo(pub FromToPair);

impl FromTo {
    pub fn source(self) -> Location {
        self.0.endpoints().0
    }

    pub fn destination(self) -> Location {
        self.0.endpoints().1
    }

    pub fn is_upload(self) -> bool {
        !self.source().is_remote() && self.destination().is_remote()
    }

    pub fn is_download(self) -> bool {
        self.source().is_remote() && !self.destination().is_remote()
    }

    pub fn is_s2s(self) -> bool {
        self.source().is_remote() && self.destination().is_remote() && !self.is_redirection()
    }

    pub fn is_redirection(self) -> bool {
        matches!(self.0, FromToPair::PipeBlob | FromToPair::BlobPipe)
    }

    /// Whether this FromTo participates in a delete-destination-capable
    /// operation (Sync with both sides enumerable).
    pub fn is_delete(self) -> bool {
        !self.is_redirection()
    }

    pub fn is_nfs_aware(self) -> bool {
        self.source().is_nfs_aware() && self.destination().is_nfs_aware()
    }

    /// Parse a user-supplied `--from-to` override, including the legacy
    /// SMB-suffixed aliases and the SMB/NFS cross-protocol rejection.
    pub fn parse_override(raw: &str) -> Result<Self> {
        let normalized = match raw {
            "LocalFileSMB" => "LocalFile",
            "FileSMBLocal" => "FileLocal",
            "FileSMBFileSMB" => "FileFile",
            other => other,
        };

        if raw.contains("NFS") && raw.contains("SMB") {
            return Err(Error::invalid_input(format!(
                "cannot combine SMB and NFS endpoints in a single transfer: {raw}"
            )));
        }

        FromTo::from_str(normalized)
            .map_err(|_| Error::invalid_input(format!("unrecognized --from-to value '{raw}'")))
    }

    /// Classify both endpoints and look the resulting pair up in the
    /// finite set; fails for combinations outside it (e.g. `LocalLocal`).
    pub fn infer(src_arg: &str, dst_arg: &str, user_override: Option<&str>) -> Result<Self> {
        if let Some(raw) = user_override {
            return Self::parse_override(raw);
        }

        let src = infer_location(src_arg);
        let dst = infer_location(dst_arg);
        FromToPair::from_endpoints(src, dst)
            .map(FromTo)
            .ok_or_else(|| {
                Error::invalid_input(format!(
                    "unsupported source/destination combination: {src} -> {dst}"
                ))
            })
    }
}

impl FromStr for FromTo {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        use FromToPair::*;
        let pair = match s {
            "LocalBlob" => LocalBlob,
            "BlobLocal" => BlobLocal,
            "LocalFile" => LocalFile,
            "FileLocal" => FileLocal,
            "LocalFileNFS" => LocalFileNFS,
            "FileNFSLocal" => FileNFSLocal,
            "LocalS3" => LocalS3,
            "LocalGCP" => LocalGCP,
            "LocalBlobFS" => LocalBlobFS,
            "BlobBlob" => BlobBlob,
            "BlobFile" => BlobFile,
            "FileBlob" => FileBlob,
            "FileFile" => FileFile,
            "FileNFSFileNFS" => FileNFSFileNFS,
            "S3Blob" => S3Blob,
            "GCPBlob" => GCPBlob,
            "BlobFSBlobFS" => BlobFSBlobFS,
            "PipeBlob" => PipeBlob,
            "BlobPipe" => BlobPipe,
            _ => return Err(()),
        };
        Ok(FromTo(pair))
    }
}

impl fmt::Display for FromTo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (s, d) = self.0.endpoints();
        write!(f, "{s}{d}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_local_is_unsupported() {
        let err = FromTo::infer("/a", "/b", None).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn smb_nfs_cross_protocol_rejected() {
        let err = FromTo::parse_override("LocalFileNFSSMB").unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn smb_alias_normalizes() {
        let ft = FromTo::parse_override("LocalFileSMB").unwrap();
        assert_eq!(ft, FromTo(FromToPair::LocalFile));
    }

    #[test]
    fn upload_download_s2s_predicates() {
        let upload = FromTo::infer("/local", "https://a.blob.core.windows.net/c", None).unwrap();
        assert!(upload.is_upload());
        assert!(!upload.is_download());
        assert!(!upload.is_s2s());

        let s2s = FromTo(FromToPair::S3Blob);
        assert!(s2s.is_s2s());
        assert!(!s2s.is_upload());

        let redirect = FromTo(FromToPair::PipeBlob);
        assert!(redirect.is_redirection());
        assert!(!redirect.is_s2s());
    }
}
