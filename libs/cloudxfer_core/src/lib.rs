//! Shared data model and location/bucket-name inference for the cloudxfer
//! data-movement engine.
//!
//! No other crate in this workspace is supposed to re-derive these types:
//! [`Location`] and [`FromTo`] classify a source/destination pair,
//! [`BucketNameResolver`] rewrites foreign bucket names into Azure-legal
//! container names, and the remaining modules hold the wire-shaped records
//! that flow through the job pipeline (`ResourceString`, `StoredObject`,
//! `CookedOptions`, `Transfers`, `JobSummary`).

pub mod bucket_resolver;
pub mod error;
pub mod from_to;
pub mod job;
pub mod location;
pub mod options;
pub mod resource;
pub mod stored_object;

pub use bucket_resolver::BucketNameResolver;
pub use error::{Error, Result};
pub use from_to::{FromTo, FromToPair};
pub use job::{JobId, JobStatus, JobSummary, TransferRecordShape, Transfers};
pub use location::{infer_location, Location};
pub use options::{
    CompareHashType, ContentPropertyOverrides, CookedOptions, CpkOptions, FilterOptions,
    HardlinkPolicy, OverwritePolicy, SymlinkPolicy, TrailingDotOption,
    DEFAULT_TRANSFERS_PER_PART,
};
pub use resource::ResourceString;
pub use stored_object::{EntityKind, StoredObject};

/// The single-byte relative path that denotes the traversal root itself,
/// emitted when directory persistence (stub objects, folder metadata) is
/// enabled. See `StoredObject::is_root_sentinel`.
pub const ROOT_SENTINEL: &str = "\u{0}";
