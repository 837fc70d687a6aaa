//! `ResourceString` (spec §3): a normalized, immutable endpoint
//! descriptor produced once during option cooking (Phase A, §4.3) and
//! never mutated afterward.

use camino::Utf8PathBuf;

/// A normalized endpoint descriptor: either a local path or a URL, plus
/// an optional SAS and extra query parameters. Consolidates repeated
/// path separators on construction so clones never need to re-normalize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceString {
    value: String,
    sas: Option<String>,
    extra_query: Option<String>,
    is_local: bool,
}

impl ResourceString {
    pub fn new_remote(value: impl Into<String>, sas: Option<String>) -> Self {
        ResourceString {
            value: consolidate_separators(&value.into()),
            sas,
            extra_query: None,
            is_local: false,
        }
    }

    pub fn new_local(path: impl Into<String>) -> Self {
        ResourceString {
            value: consolidate_separators(&path.into()),
            sas: None,
            extra_query: None,
            is_local: true,
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn sas(&self) -> Option<&str> {
        self.sas.as_deref()
    }

    pub fn with_extra_query(mut self, q: impl Into<String>) -> Self {
        self.extra_query = Some(q.into());
        self
    }

    pub fn extra_query(&self) -> Option<&str> {
        self.extra_query.as_deref()
    }

    pub fn is_local(&self) -> bool {
        self.is_local
    }

    pub fn as_local_path(&self) -> Option<Utf8PathBuf> {
        self.is_local.then(|| Utf8PathBuf::from(&self.value))
    }

    /// Strips a trailing `/*` wildcard, returning the stripped value and
    /// whether stripping occurred (used by Phase A of the option cooker
    /// to decide `strip_top_dir`).
    pub fn strip_trailing_wildcard(&self) -> (ResourceString, bool) {
        if let Some(stripped) = self.value.strip_suffix("/*") {
            let mut clone = self.clone();
            clone.value = stripped.to_string();
            (clone, true)
        } else {
            (self.clone(), false)
        }
    }

    pub fn contains_wildcard(&self) -> bool {
        self.value.contains('*')
    }
}

fn consolidate_separators(value: &str) -> String {
    if value.starts_with("http://") || value.starts_with("https://") {
        return value.to_string();
    }
    let mut out = String::with_capacity(value.len());
    let mut prev_sep = false;
    for c in value.chars() {
        let is_sep = c == '/' || c == '\\';
        if is_sep && prev_sep {
            continue;
        }
        out.push(c);
        prev_sep = is_sep;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consolidates_repeated_separators() {
        let r = ResourceString::new_local("/a//b///c");
        assert_eq!(r.value(), "/a/b/c");
    }

    #[test]
    fn strips_trailing_wildcard() {
        let r = ResourceString::new_remote("https://a.blob.core.windows.net/c/*", None);
        let (stripped, did_strip) = r.strip_trailing_wildcard();
        assert!(did_strip);
        assert_eq!(stripped.value(), "https://a.blob.core.windows.net/c");
    }
}
