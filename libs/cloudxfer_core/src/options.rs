//! `CookedOptions` (spec §3): the frozen, validated option record
//! produced by the option cooker (component C3, implemented in
//! `cloudxfer_engine::cook`). This module defines the record's shape and
//! the small enums it is built from; the cooking logic itself lives in
//! the engine crate since it depends on [`crate::from_to::FromTo`]
//! inference and validation that belongs next to the traverser/comparator
//! code it configures.

use std::collections::HashSet;

use crate::from_to::FromTo;
use crate::resource::ResourceString;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymlinkPolicy {
    Skip,
    Follow,
    Preserve,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardlinkPolicy {
    Follow,
    Preserve,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverwritePolicy {
    True,
    False,
    Prompt,
    IfSourceNewer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrailingDotOption {
    #[default]
    Disable,
    Enable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompareHashType {
    #[default]
    None,
    Md5,
}

/// Content-property overrides applied to newly uploaded/transferred
/// objects (blob content-type, cache-control, etc.). Left as raw
/// key/value pairs; the storage backend interprets them per service.
#[derive(Debug, Clone, Default)]
pub struct ContentPropertyOverrides {
    pub content_type: Option<String>,
    pub content_encoding: Option<String>,
    pub cache_control: Option<String>,
    pub content_disposition: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CpkOptions {
    pub cpk_scope_info: Option<String>,
    pub cpk_info: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct FilterOptions {
    pub include_patterns: Vec<String>,
    pub exclude_patterns: Vec<String>,
    pub include_regex: Vec<String>,
    pub exclude_regex: Vec<String>,
    pub include_attributes: Vec<String>,
    pub exclude_blob_types: Vec<String>,
    pub include_after: Option<std::time::SystemTime>,
    pub include_before: Option<std::time::SystemTime>,
    pub list_of_files: Vec<String>,
    pub include_path: Option<String>,
}

/// Frozen, validated option record (spec §3). Produced once by the
/// option cooker; every field is set before construction and never
/// mutated afterward.
#[derive(Debug, Clone)]
pub struct CookedOptions {
    pub source: ResourceString,
    pub destination: ResourceString,
    pub from_to: FromTo,
    pub recursive: bool,
    pub strip_top_dir: bool,
    pub symlink_policy: SymlinkPolicy,
    pub hardlink_policy: HardlinkPolicy,
    pub overwrite_policy: OverwritePolicy,
    pub block_size_bytes: i64,
    pub content_properties: ContentPropertyOverrides,
    pub put_md5: bool,
    pub check_md5: bool,
    pub compare_hash: CompareHashType,
    pub preserve_permissions: bool,
    pub preserve_info: bool,
    pub preserve_posix: bool,
    pub cpk: CpkOptions,
    pub trailing_dot: TrailingDotOption,
    pub filters: FilterOptions,
    pub is_nfs: bool,
    pub s2s_preserve_access_tier: bool,
    pub include_directory_stubs: bool,
    pub prefer_smb_time: bool,
    pub disable_comparison: bool,
    pub delete_destination: bool,
    pub force_if_read_only: bool,
    pub cap_mbps: Option<f64>,
    pub transfers_per_part: usize,
}

impl CookedOptions {
    pub fn known_from_to_pairs() -> HashSet<&'static str> {
        [
            "LocalBlob",
            "BlobLocal",
            "LocalFile",
            "FileLocal",
            "LocalFileNFS",
            "FileNFSLocal",
            "LocalS3",
            "LocalGCP",
            "LocalBlobFS",
            "BlobBlob",
            "BlobFile",
            "FileBlob",
            "FileFile",
            "FileNFSFileNFS",
            "S3Blob",
            "GCPBlob",
            "BlobFSBlobFS",
            "PipeBlob",
            "BlobPipe",
        ]
        .into_iter()
        .collect()
    }
}

/// Default number of transfer records per job part (spec §4.8).
pub const DEFAULT_TRANSFERS_PER_PART: usize = 10_000;
