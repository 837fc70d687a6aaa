//! Option Cooker (spec component C3): turns a (source, destination,
//! raw-flags) tuple into a validated, immutable [`CookedOptions`].
//! Three phases — endpoint inference, defaulting, validation — each
//! able to abort cooking with a precise [`Error`].

use cloudxfer_core::{
    CompareHashType, ContentPropertyOverrides, CookedOptions, CpkOptions, Error, FilterOptions,
    FromTo, HardlinkPolicy, Location, OverwritePolicy, ResourceString, Result, SymlinkPolicy,
    TrailingDotOption, DEFAULT_TRANSFERS_PER_PART,
};

/// Raw, uncooked flags as gathered from the CLI/library caller. Mirrors
/// the union of fields `CookedOptions` eventually carries, but every
/// field here is allowed to be absent/default and unvalidated.
#[derive(Debug, Clone, Default)]
pub struct RawOptions {
    pub source: String,
    pub destination: String,
    pub source_sas: Option<String>,
    pub destination_sas: Option<String>,
    pub from_to_override: Option<String>,
    pub is_sync: bool,
    pub recursive: Option<bool>,
    pub symlink_policy: Option<SymlinkPolicy>,
    pub hardlink_policy: Option<HardlinkPolicy>,
    pub overwrite_policy: Option<OverwritePolicy>,
    pub block_size_mib: Option<f64>,
    pub content_properties: ContentPropertyOverrides,
    pub put_md5: bool,
    pub check_md5: bool,
    pub compare_hash: CompareHashType,
    pub preserve_permissions: bool,
    pub preserve_info: Option<bool>,
    pub preserve_posix: bool,
    pub cpk: CpkOptions,
    pub trailing_dot: TrailingDotOption,
    pub filters: FilterOptions,
    pub include_directory_stubs: Option<bool>,
    pub prefer_smb_time: bool,
    pub disable_comparison: bool,
    pub delete_destination: bool,
    pub force_if_read_only: bool,
    pub cap_mbps: Option<f64>,
    pub transfers_per_part: Option<usize>,
}

/// `round(mib * 2^20)`, rejecting negative sizes, non-integer byte
/// counts (residue > 1e-3), and signed-64-bit overflow.
pub fn block_size_in_bytes(mib: f64) -> Result<i64> {
    if mib < 0.0 {
        return Err(Error::invalid_input(format!(
            "block size must not be negative, got {mib} MiB"
        )));
    }
    let exact_bytes = mib * (1_i64 << 20) as f64;
    let rounded = exact_bytes.round();
    if (exact_bytes - rounded).abs() > 1e-3 {
        return Err(Error::invalid_input(format!(
            "block size {mib} MiB does not land on a whole number of bytes"
        )));
    }
    if rounded > i64::MAX as f64 || rounded < i64::MIN as f64 {
        return Err(Error::invalid_input(format!(
            "block size {mib} MiB overflows a signed 64-bit byte count"
        )));
    }
    Ok(rounded as i64)
}

/// `true` when both endpoints are NFS-aware, or, on Windows or Linux
/// (the two OSes whose filesystems carry SMB-style metadata through
/// mounted shares), when both endpoints are SMB-aware.
pub fn get_preserve_info_default(from_to: FromTo) -> bool {
    if from_to.is_nfs_aware() {
        return true;
    }
    let both_smb_aware = from_to.source().is_smb_aware() && from_to.destination().is_smb_aware();
    both_smb_aware && (cfg!(target_os = "windows") || cfg!(target_os = "linux"))
}

/// Runs all three cooking phases and returns a frozen [`CookedOptions`],
/// or the first validation error encountered.
pub fn cook(raw: RawOptions) -> Result<CookedOptions> {
    if raw.source.is_empty() || raw.destination.is_empty() {
        return Err(Error::invalid_input("source and destination are both required"));
    }
    if !raw.filters.list_of_files.is_empty() && raw.filters.include_path.is_some() {
        return Err(Error::invalid_input(
            "cannot combine list of files and include path",
        ));
    }

    // Phase A: FromTo & endpoints.
    let from_to = FromTo::infer(&raw.source, &raw.destination, raw.from_to_override.as_deref())?;

    let (source, strip_top_dir_src) = if from_to.source().is_remote() {
        let (stripped, had_wildcard) =
            ResourceString::new_remote(&raw.source, raw.source_sas.clone()).strip_trailing_wildcard();
        (stripped, had_wildcard)
    } else {
        let contains_wildcard = raw.source.contains('*');
        (ResourceString::new_local(&raw.source), contains_wildcard)
    };

    let destination = if from_to.destination().is_remote() {
        ResourceString::new_remote(&raw.destination, raw.destination_sas.clone())
    } else {
        ResourceString::new_local(&raw.destination)
    };

    let strip_top_dir = strip_top_dir_src;
    let is_nfs = from_to.is_nfs_aware();

    // Phase B: defaults & inference.
    let recursive = raw.recursive.unwrap_or(raw.is_sync);

    let preserve_info = raw
        .preserve_info
        .unwrap_or_else(|| get_preserve_info_default(from_to));

    let s2s_preserve_access_tier = from_to.is_s2s();

    let compare_hash = raw.compare_hash;
    let put_md5 = raw.put_md5 || matches!(compare_hash, CompareHashType::Md5);

    let trailing_dot = if raw.trailing_dot == TrailingDotOption::Enable
        && !Location::both_support_trailing_dot(from_to.source(), from_to.destination())
    {
        TrailingDotOption::Disable
    } else {
        raw.trailing_dot
    };

    let include_directory_stubs = raw.include_directory_stubs.unwrap_or_else(|| {
        from_to.source().supports_hns_acls()
            && from_to.destination().supports_hns_acls()
            && raw.preserve_permissions
    });

    let block_size_bytes = block_size_in_bytes(raw.block_size_mib.unwrap_or(8.0))?;
    let transfers_per_part = raw.transfers_per_part.unwrap_or(DEFAULT_TRANSFERS_PER_PART);

    Ok(CookedOptions {
        source,
        destination,
        from_to,
        recursive,
        strip_top_dir,
        symlink_policy: raw.symlink_policy.unwrap_or(SymlinkPolicy::Skip),
        hardlink_policy: raw.hardlink_policy.unwrap_or(HardlinkPolicy::Follow),
        overwrite_policy: raw.overwrite_policy.unwrap_or(OverwritePolicy::True),
        block_size_bytes,
        content_properties: raw.content_properties,
        put_md5,
        check_md5: raw.check_md5,
        compare_hash,
        preserve_permissions: raw.preserve_permissions,
        preserve_info,
        preserve_posix: raw.preserve_posix,
        cpk: raw.cpk,
        trailing_dot,
        filters: raw.filters,
        is_nfs,
        s2s_preserve_access_tier,
        include_directory_stubs,
        prefer_smb_time: raw.prefer_smb_time,
        disable_comparison: raw.disable_comparison,
        delete_destination: raw.delete_destination,
        force_if_read_only: raw.force_if_read_only,
        cap_mbps: raw.cap_mbps,
        transfers_per_part,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cloudxfer_core::FromToPair;

    #[test]
    fn block_size_quarter_mib() {
        assert_eq!(block_size_in_bytes(0.25).unwrap(), 262_144);
    }

    #[test]
    fn block_size_negative_errors() {
        assert!(block_size_in_bytes(-1.0).is_err());
    }

    #[test]
    fn block_size_non_integer_errors() {
        assert!(block_size_in_bytes(0.3).is_err());
    }

    #[test]
    fn preserve_info_default_true_for_nfs_pair() {
        let from_to = FromTo(FromToPair::FileNFSFileNFS);
        assert!(get_preserve_info_default(from_to));
    }

    #[test]
    fn cooking_rejects_list_of_files_with_include_path() {
        let mut raw = RawOptions {
            source: "/tmp/a".to_string(),
            destination: "/tmp/b".to_string(),
            ..Default::default()
        };
        raw.filters.list_of_files = vec!["x".to_string(), "y".to_string()];
        raw.filters.include_path = Some("*.log".to_string());
        let err = cook(raw).unwrap_err();
        assert!(err.to_string().contains("cannot combine list of files"));
    }

    #[test]
    fn cooking_rejects_missing_source() {
        let raw = RawOptions {
            source: String::new(),
            destination: "/tmp/b".to_string(),
            ..Default::default()
        };
        assert!(cook(raw).is_err());
    }

    #[test]
    fn sync_defaults_recursive_true_copy_defaults_false() {
        let raw_sync = RawOptions {
            source: "/tmp/a".to_string(),
            destination: "https://acct.blob.core.windows.net/c".to_string(),
            is_sync: true,
            ..Default::default()
        };
        assert!(cook(raw_sync).unwrap().recursive);

        let raw_copy = RawOptions {
            source: "/tmp/a".to_string(),
            destination: "https://acct.blob.core.windows.net/c".to_string(),
            is_sync: false,
            ..Default::default()
        };
        assert!(!cook(raw_copy).unwrap().recursive);
    }
}
