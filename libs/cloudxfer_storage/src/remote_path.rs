//! A path on remote storage, relative to whatever prefix the endpoint's
//! `ResourceString` carries. Mirrors the donor's `remote_storage::RemotePath`.

use camino::{Utf8Path, Utf8PathBuf};

const SEPARATOR: char = '/';

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RemotePath(Utf8PathBuf);

impl RemotePath {
    pub fn new(relative_path: &Utf8Path) -> anyhow::Result<Self> {
        anyhow::ensure!(
            relative_path.is_relative(),
            "path {relative_path:?} is not relative"
        );
        Ok(Self(relative_path.to_path_buf()))
    }

    pub fn from_string(relative_path: &str) -> anyhow::Result<Self> {
        Self::new(Utf8Path::new(relative_path))
    }

    pub fn with_base(&self, base_path: &Utf8Path) -> Utf8PathBuf {
        base_path.join(&self.0)
    }

    pub fn object_name(&self) -> Option<&str> {
        self.0.file_name()
    }

    pub fn join(&self, path: impl AsRef<Utf8Path>) -> Self {
        Self(self.0.join(path))
    }

    pub fn get_path(&self) -> &Utf8PathBuf {
        &self.0
    }

    pub fn as_key(&self) -> String {
        self.0.as_str().replace('\\', "/")
    }
}

impl std::fmt::Display for RemotePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

pub const REMOTE_STORAGE_PREFIX_SEPARATOR: char = SEPARATOR;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_name() {
        let k = RemotePath::new(Utf8Path::new("a/b/c")).unwrap();
        assert_eq!(k.object_name(), Some("c"));
    }

    #[test]
    fn cannot_be_absolute() {
        let err = RemotePath::new(Utf8Path::new("/")).expect_err("should fail on absolute paths");
        assert!(err.to_string().contains("is not relative"));
    }
}
