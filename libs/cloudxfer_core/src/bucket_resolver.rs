//! Bucket-name resolver (spec §4.2, component C2): deterministic rewriting
//! of foreign (S3, GCS) bucket names into names legal as Azure container
//! names, with collision resolution.
//!
//! Azure container names allow only lowercase letters, digits and `-`, no
//! consecutive dashes, and a 3-63 character length. The donor's bucket
//! names (dotted S3 names, underscored GCS names) routinely violate all
//! three, so the resolver rewrites deterministically and memoizes the
//! result so repeated lookups for the same name are stable within a run.

use std::collections::{HashMap, HashSet};

use crate::error::{Error, Result};

const MAX_CONTAINER_NAME_LEN: usize = 63;

#[derive(Debug, Default)]
pub struct BucketNameResolver {
    original_to_resolved: HashMap<String, String>,
    resolved: HashSet<String>,
}

impl BucketNameResolver {
    /// Builds a resolver pre-populated from a known bucket list, so that
    /// resolution order (and hence collision-suffix assignment) is
    /// deterministic regardless of the order `resolve` is later called in.
    pub fn new<I, S>(known_buckets: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut resolver = BucketNameResolver::default();
        for name in known_buckets {
            let name = name.into();
            resolver.resolve(&name)?;
        }
        Ok(resolver)
    }

    /// Resolves `original` to an Azure-legal container name. Memoized:
    /// the second and later calls for the same original return the
    /// cached result without re-running the rewrite rules.
    pub fn resolve(&mut self, original: &str) -> Result<String> {
        if let Some(existing) = self.original_to_resolved.get(original) {
            return Ok(existing.clone());
        }

        let candidate = if is_azure_legal(original) {
            original.to_string()
        } else {
            rewrite(original)
        };

        let resolved = self.disambiguate(candidate)?;
        self.original_to_resolved
            .insert(original.to_string(), resolved.clone());
        self.resolved.insert(resolved.clone());
        Ok(resolved)
    }

    fn disambiguate(&self, mut candidate: String) -> Result<String> {
        if self.resolved.contains(&candidate) || self.original_to_resolved.contains_key(&candidate)
        {
            let mut k = 2usize;
            loop {
                let suffixed = format!("{candidate}-{k}");
                if !self.resolved.contains(&suffixed) {
                    candidate = suffixed;
                    break;
                }
                k += 1;
            }
        }

        if candidate.len() > MAX_CONTAINER_NAME_LEN {
            return Err(Error::invalid_input(format!(
                "bucket name '{candidate}' is invalid for destination: exceeds {MAX_CONTAINER_NAME_LEN} characters"
            )));
        }

        Ok(candidate)
    }
}

fn is_azure_legal(name: &str) -> bool {
    name.len() >= 3
        && name.len() <= MAX_CONTAINER_NAME_LEN
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !name.contains("--")
        && !name.starts_with('-')
        && !name.ends_with('-')
}

/// Applies the rewrite rules in order: `.` and `_` become `-`, runs of
/// `-` of length >= 2 collapse to `-<n>-`.
fn rewrite(original: &str) -> String {
    let step1: String = original
        .chars()
        .map(|c| if c == '.' { '-' } else { c })
        .collect();
    let step2: String = step1
        .chars()
        .map(|c| if c == '_' { '-' } else { c })
        .collect();
    collapse_dash_runs(&step2)
}

fn collapse_dash_runs(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let chars: Vec<char> = s.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '-' {
            let mut j = i;
            while j < chars.len() && chars[j] == '-' {
                j += 1;
            }
            let run_len = j - i;
            if run_len >= 2 {
                out.push('-');
                out.push_str(&run_len.to_string());
                out.push('-');
            } else {
                out.push('-');
            }
            i = j;
        } else {
            out.push(chars[i]);
            i += 1;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_dotted_name() {
        let mut r = BucketNameResolver::default();
        assert_eq!(r.resolve("bucket.name.1").unwrap(), "bucket-name-1");
    }

    #[test]
    fn double_dash_collapses_with_count() {
        let mut r = BucketNameResolver::default();
        assert_eq!(r.resolve("bucket--name").unwrap(), "bucket-2-name");
    }

    #[test]
    fn collision_resolution_picks_smallest_k() {
        let mut r = BucketNameResolver::new([
            "bucket.name",
            "bucket-name",
            "bucket-name-2",
            "bucket-name-3",
        ])
        .unwrap();
        assert_eq!(r.resolve("bucket---name").unwrap(), "bucket-3-name");
    }

    #[test]
    fn triple_dash_run_in_middle_of_multi_dash_name() {
        let mut r = BucketNameResolver::default();
        assert_eq!(r.resolve("bucket-s--s---s").unwrap(), "bucket-s-2-s-3-s");
    }

    #[test]
    fn oversize_name_is_rejected() {
        let mut r = BucketNameResolver::default();
        let long_dotted = "a.".repeat(40) + "tail"; // dotless form > 63 chars
        let err = r.resolve(&long_dotted).unwrap_err();
        assert!(err.to_string().contains("invalid for destination"));
    }

    #[test]
    fn distinct_inputs_never_collide() {
        let mut r = BucketNameResolver::default();
        let a = r.resolve("a.b---c").unwrap();
        let b = r.resolve("a-b---c").unwrap();
        assert_ne!(a, b);
        assert_eq!(a, "a-b-3-c");
        assert_eq!(b, "a-b-3-c-2");
    }

    #[test]
    fn resolution_is_memoized() {
        let mut r = BucketNameResolver::default();
        let first = r.resolve("bucket--name").unwrap();
        let second = r.resolve("bucket--name").unwrap();
        assert_eq!(first, second);
    }
}
