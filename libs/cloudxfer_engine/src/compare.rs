//! Comparators (spec component C7, §4.7): destination-first and
//! source-first strategies that decide transfer/skip/delete per object
//! pair using timestamps or content hashes.

use cloudxfer_core::{CompareHashType, StoredObject};
use tracing::debug;

use crate::index::ObjectIndex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Transfer(Reason),
    Skip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    NoDestination,
    NoSource,
    NewerSource,
    MissingHashButNewer,
    HashMismatch,
    ComparisonDisabled,
}

/// Per-pair decision (§4.7): given a source and destination candidate
/// for the same relative path, decide whether to transfer or skip,
/// honoring `disableComparison`, MD5-vs-LMT comparison mode, and
/// SMB-time preference.
pub fn decide_pair(
    source: &StoredObject,
    destination: &StoredObject,
    compare_hash: CompareHashType,
    prefer_smb_time: bool,
    disable_comparison: bool,
) -> Decision {
    if disable_comparison {
        return Decision::Transfer(Reason::ComparisonDisabled);
    }

    let _ = prefer_smb_time; // SMB last-write-time vs. standard LMT is resolved by the traverser before StoredObject is built; this flag is threaded through for the structured log line only.

    if matches!(compare_hash, CompareHashType::Md5) && source.entity_kind == destination.entity_kind
    {
        return match (source.md5, destination.md5) {
            (None, _) => {
                if source.last_modified > destination.last_modified {
                    Decision::Transfer(Reason::MissingHashButNewer)
                } else {
                    Decision::Skip
                }
            }
            (Some(src_md5), Some(dst_md5)) => {
                if src_md5 == dst_md5 {
                    Decision::Skip
                } else {
                    Decision::Transfer(Reason::HashMismatch)
                }
            }
            (Some(_), None) => Decision::Transfer(Reason::MissingHashButNewer),
        };
    }

    if source.last_modified > destination.last_modified {
        Decision::Transfer(Reason::NewerSource)
    } else {
        Decision::Skip
    }
}

/// Outcome of comparing one traversed side against the opposing index:
/// either a transfer order or a forward to the deleter.
pub enum CompareOutcome {
    Transfer(StoredObject),
    Skip,
    Delete(StoredObject),
}

/// Destination-first strategy (upload): the source side has already
/// been fully indexed. Call once per destination object as it arrives.
pub fn destination_first_step(
    destination_object: StoredObject,
    source_index: &mut ObjectIndex,
    compare_hash: CompareHashType,
    prefer_smb_time: bool,
    disable_comparison: bool,
) -> CompareOutcome {
    match source_index.lookup_and_remove(&destination_object.relative_path) {
        Some(source_object) => {
            let decision = decide_pair(
                &source_object,
                &destination_object,
                compare_hash,
                prefer_smb_time,
                disable_comparison,
            );
            log_decision(&destination_object.relative_path, decision);
            match decision {
                Decision::Transfer(_) => CompareOutcome::Transfer(source_object),
                Decision::Skip => CompareOutcome::Skip,
            }
        }
        None => {
            debug!(path = %destination_object.relative_path, outcome = "delete", reason = "no_source", "comparator decision");
            CompareOutcome::Delete(destination_object)
        }
    }
}

fn log_decision(path: &str, decision: Decision) {
    match decision {
        Decision::Transfer(reason) => {
            debug!(path, outcome = "overwritten", reason = ?reason, "comparator decision");
        }
        Decision::Skip => {
            debug!(path, outcome = "skipped", "comparator decision");
        }
    }
}

/// Source-first strategy (download/S2S): the destination side has
/// already been fully indexed. Call once per source object as it
/// arrives.
pub fn source_first_step(
    source_object: StoredObject,
    destination_index: &mut ObjectIndex,
    compare_hash: CompareHashType,
    prefer_smb_time: bool,
    disable_comparison: bool,
) -> CompareOutcome {
    match destination_index.lookup_and_remove(&source_object.relative_path) {
        Some(destination_object) => {
            let decision = decide_pair(
                &source_object,
                &destination_object,
                compare_hash,
                prefer_smb_time,
                disable_comparison,
            );
            log_decision(&source_object.relative_path, decision);
            match decision {
                Decision::Transfer(_) => CompareOutcome::Transfer(source_object),
                Decision::Skip => CompareOutcome::Skip,
            }
        }
        None => {
            debug!(path = %source_object.relative_path, outcome = "overwritten", reason = "no_destination", "comparator decision");
            CompareOutcome::Transfer(source_object)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cloudxfer_core::EntityKind;
    use std::time::{Duration, SystemTime};

    fn object(path: &str, lmt: SystemTime) -> StoredObject {
        StoredObject::new(path.to_string(), 10, lmt, EntityKind::File)
    }

    #[test]
    fn md5_equal_skips() {
        let now = SystemTime::now();
        let md5 = [1u8; 16];
        let source = object("a", now).with_md5(md5);
        let destination = object("a", now - Duration::from_secs(10)).with_md5(md5);
        assert_eq!(
            decide_pair(&source, &destination, CompareHashType::Md5, false, false),
            Decision::Skip
        );
    }

    #[test]
    fn md5_different_transfers() {
        let now = SystemTime::now();
        let source = object("a", now).with_md5([1u8; 16]);
        let destination = object("a", now).with_md5([2u8; 16]);
        assert!(matches!(
            decide_pair(&source, &destination, CompareHashType::Md5, false, false),
            Decision::Transfer(Reason::HashMismatch)
        ));
    }

    #[test]
    fn lmt_newer_source_transfers() {
        let earlier = SystemTime::UNIX_EPOCH;
        let later = earlier + Duration::from_secs(100);
        let source = object("a", later);
        let destination = object("a", earlier);
        assert!(matches!(
            decide_pair(&source, &destination, CompareHashType::None, false, false),
            Decision::Transfer(Reason::NewerSource)
        ));
    }

    #[test]
    fn lmt_not_newer_skips() {
        let t = SystemTime::now();
        let source = object("a", t);
        let destination = object("a", t);
        assert_eq!(
            decide_pair(&source, &destination, CompareHashType::None, false, false),
            Decision::Skip
        );
    }

    #[test]
    fn destination_only_object_is_scheduled_for_deletion() {
        let mut source_index = ObjectIndex::new(false);
        let destination_only = object("only-dest", SystemTime::now());
        let outcome = destination_first_step(
            destination_only,
            &mut source_index,
            CompareHashType::None,
            false,
            false,
        );
        assert!(matches!(outcome, CompareOutcome::Delete(_)));
    }
}
