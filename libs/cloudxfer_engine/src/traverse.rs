//! Resource Traverser (spec component C5, §4.5): lazily enumerates a
//! source or destination as a stream of [`StoredObject`]s, classifying
//! each entry's entity kind. Two concrete variants exist — [`LocalTraverser`]
//! for the filesystem, [`RemoteTraverser`] for every cloud backend — behind
//! one capability trait so the engine never matches on [`Location`] itself.

use std::pin::Pin;
use std::sync::Arc;
use std::time::SystemTime;

use async_stream::try_stream;
use async_trait::async_trait;
use camino::Utf8PathBuf;
use futures::stream::Stream;

use cloudxfer_core::{EntityKind, Error, Result, StoredObject, SymlinkPolicy};
use cloudxfer_storage::{GenericRemoteStorage, ListingMode, RemotePath, RemoteStorage};

use crate::filters::{FilterSet, FilterStats};

pub type ObjectStream = Pin<Box<dyn Stream<Item = Result<StoredObject>> + Send>>;

/// Capability set a concrete traverser variant implements (spec §4.5).
/// `enumerate` is the cooperating half of "two cooperating traversers
/// producing streams of stored-object descriptors" (§2, C5): callers
/// drive the stream to completion, applying `filters` themselves so a
/// rejected object bumps `stats` without ever reaching the comparator.
#[async_trait]
pub trait ResourceTraverser: Send + Sync {
    fn enumerate(&self, filters: Arc<FilterSet>, stats: Arc<dyn FilterStats>) -> ObjectStream;

    async fn is_directory(&self, probe: &str) -> Result<bool>;

    /// Account-level listing; only the account-scoped variants
    /// (currently the S3 traverser, when pointed at a bucketless
    /// endpoint) implement this.
    async fn list_containers(&self) -> Result<Vec<String>> {
        Err(Error::invalid_input(
            "this traverser does not support account-level enumeration",
        ))
    }
}

fn relative_unix(path: &str, root_display: &str) -> String {
    path.strip_prefix(root_display)
        .unwrap_or(path)
        .trim_start_matches('/')
        .replace('\\', "/")
}

/// Walks a local directory tree depth-first, directories before their
/// contents (spec §4.5), using `walkdir`.
pub struct LocalTraverser {
    root: Utf8PathBuf,
    recursive: bool,
    symlink_policy: SymlinkPolicy,
    emit_directory_stubs: bool,
    /// Classify a file's second and later inode occurrences as
    /// `EntityKind::Hardlink` rather than `EntityKind::File` (spec
    /// §4.5). Only meaningful on Unix and only worth the per-entry
    /// inode bookkeeping when the endpoint actually preserves hardlinks
    /// (NFS file shares); gated by `cooked.is_nfs` at the call site.
    detect_hardlinks: bool,
}

impl LocalTraverser {
    pub fn new(
        root: Utf8PathBuf,
        recursive: bool,
        symlink_policy: SymlinkPolicy,
        emit_directory_stubs: bool,
    ) -> Self {
        Self::with_hardlink_detection(root, recursive, symlink_policy, emit_directory_stubs, false)
    }

    pub fn with_hardlink_detection(
        root: Utf8PathBuf,
        recursive: bool,
        symlink_policy: SymlinkPolicy,
        emit_directory_stubs: bool,
        detect_hardlinks: bool,
    ) -> Self {
        Self {
            root,
            recursive,
            symlink_policy,
            emit_directory_stubs,
            detect_hardlinks,
        }
    }
}

#[cfg(unix)]
fn inode_identity(metadata: &std::fs::Metadata) -> (u64, u64, u64) {
    use std::os::unix::fs::MetadataExt;
    (metadata.dev(), metadata.ino(), metadata.nlink())
}

#[async_trait]
impl ResourceTraverser for LocalTraverser {
    fn enumerate(&self, filters: Arc<FilterSet>, stats: Arc<dyn FilterStats>) -> ObjectStream {
        let root = self.root.clone();
        let recursive = self.recursive;
        let follow_links = matches!(self.symlink_policy, SymlinkPolicy::Follow);
        let skip_symlinks = matches!(self.symlink_policy, SymlinkPolicy::Skip);
        let emit_directory_stubs = self.emit_directory_stubs;
        let detect_hardlinks = self.detect_hardlinks;

        Box::pin(try_stream! {
            if emit_directory_stubs {
                let meta = tokio::fs::metadata(root.as_std_path())
                    .await
                    .map_err(|e| Error::Other(e.into()))?;
                yield StoredObject::root_sentinel(meta.modified().unwrap_or_else(|_| SystemTime::now()));
            }

            let root_display = root.as_str().to_string();
            let mut walker = walkdir::WalkDir::new(&root).follow_links(follow_links);
            if !recursive {
                walker = walker.max_depth(1);
            }

            #[cfg(unix)]
            let mut seen_inodes: std::collections::HashSet<(u64, u64)> = std::collections::HashSet::new();

            for entry in walker.into_iter() {
                let entry = entry.map_err(|e| Error::Other(e.into()))?;
                if entry.depth() == 0 {
                    continue;
                }

                let file_type = entry.file_type();
                let is_symlink = entry.path_is_symlink();
                if is_symlink && skip_symlinks {
                    stats.on_filtered_out();
                    continue;
                }

                let mut entity_kind = if file_type.is_dir() {
                    EntityKind::Folder
                } else if is_symlink {
                    EntityKind::Symlink
                } else if file_type.is_file() {
                    EntityKind::File
                } else {
                    EntityKind::Other
                };

                #[cfg(unix)]
                if detect_hardlinks && entity_kind == EntityKind::File {
                    if let Ok(metadata) = entry.metadata() {
                        let (dev, ino, nlink) = inode_identity(&metadata);
                        if nlink > 1 {
                            if !seen_inodes.insert((dev, ino)) {
                                entity_kind = EntityKind::Hardlink;
                            }
                        }
                    }
                }

                if entity_kind == EntityKind::Folder && !emit_directory_stubs {
                    continue;
                }

                let full = Utf8PathBuf::try_from(entry.path().to_path_buf())
                    .map_err(|e| Error::Other(anyhow::anyhow!(e)))?;
                let relative = relative_unix(full.as_str(), &root_display);
                let metadata = entry.metadata().map_err(|e| Error::Other(e.into()))?;
                let last_modified = metadata.modified().unwrap_or_else(|_| SystemTime::now());
                let size = if entity_kind == EntityKind::Folder { 0 } else { metadata.len() };

                let object = StoredObject::new(relative, size, last_modified, entity_kind);
                if !filters.matches(&object, None) {
                    stats.on_filtered_out();
                    continue;
                }
                yield object;
            }
        })
    }

    async fn is_directory(&self, probe: &str) -> Result<bool> {
        let path = if probe.is_empty() {
            self.root.clone()
        } else {
            self.root.join(probe)
        };
        Ok(tokio::fs::metadata(path.as_std_path())
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false))
    }
}

/// Enumerates any cloud backend through the [`RemoteStorage`] trait's
/// flat `list(NoDelimiter)` call. Flat-namespace services have no
/// durable notion of "directory before contents", so object order
/// within one listing page is whatever the backend returns; the root
/// sentinel (when directory persistence is enabled) is still emitted
/// first so downstream consumers see it ahead of any child.
pub struct RemoteTraverser {
    storage: GenericRemoteStorage,
    root: RemotePath,
    emit_directory_stubs: bool,
}

impl RemoteTraverser {
    pub fn new(storage: GenericRemoteStorage, root: RemotePath, emit_directory_stubs: bool) -> Self {
        Self {
            storage,
            root,
            emit_directory_stubs,
        }
    }
}

#[async_trait]
impl ResourceTraverser for RemoteTraverser {
    fn enumerate(&self, filters: Arc<FilterSet>, stats: Arc<dyn FilterStats>) -> ObjectStream {
        let storage = self.storage.clone();
        let root = self.root.clone();
        let emit_directory_stubs = self.emit_directory_stubs;

        Box::pin(try_stream! {
            if emit_directory_stubs {
                yield StoredObject::root_sentinel(SystemTime::now());
            }

            let listing = storage
                .list(Some(&root), ListingMode::NoDelimiter)
                .await
                .map_err(|e| Error::Other(anyhow::anyhow!(e.to_string())))?;

            let root_key = root.as_key();
            for entry in listing.keys {
                let key = entry.path.as_key();
                let relative = relative_unix(&key, &root_key);
                if relative.is_empty() {
                    continue;
                }
                let object = StoredObject::new(relative, entry.size, entry.last_modified, EntityKind::File);
                if !filters.matches(&object, None) {
                    stats.on_filtered_out();
                    continue;
                }
                yield object;
            }
        })
    }

    async fn is_directory(&self, probe: &str) -> Result<bool> {
        let path = if probe.is_empty() {
            self.root.clone()
        } else {
            self.root.join(probe)
        };
        self.storage
            .is_directory(&path)
            .await
            .map_err(|e| Error::Other(e))
    }

    async fn list_containers(&self) -> Result<Vec<String>> {
        self.storage
            .list_containers()
            .await
            .map_err(|e| Error::Other(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::NoOpFilterStats;
    use cloudxfer_core::FilterOptions;
    use futures::StreamExt;

    #[tokio::test]
    async fn walks_nested_directories_depth_first() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("a.txt"), b"a").unwrap();
        std::fs::write(dir.path().join("sub/b.txt"), b"bb").unwrap();

        let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap();
        let traverser = LocalTraverser::new(root, true, SymlinkPolicy::Skip, false);
        let filters = Arc::new(FilterSet::compile(&FilterOptions::default()).unwrap());
        let stats = Arc::new(NoOpFilterStats);

        let mut stream = traverser.enumerate(filters, stats);
        let mut seen = Vec::new();
        while let Some(object) = stream.next().await {
            seen.push(object.unwrap().relative_path);
        }
        seen.sort();
        assert_eq!(seen, vec!["a.txt".to_string(), "sub/b.txt".to_string()]);
    }

    #[tokio::test]
    async fn non_recursive_stops_at_top_level() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/b.txt"), b"bb").unwrap();
        std::fs::write(dir.path().join("a.txt"), b"a").unwrap();

        let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap();
        let traverser = LocalTraverser::new(root, false, SymlinkPolicy::Skip, false);
        let filters = Arc::new(FilterSet::compile(&FilterOptions::default()).unwrap());
        let stats = Arc::new(NoOpFilterStats);

        let mut stream = traverser.enumerate(filters, stats);
        let mut seen = Vec::new();
        while let Some(object) = stream.next().await {
            seen.push(object.unwrap().relative_path);
        }
        assert_eq!(seen, vec!["a.txt".to_string()]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn second_link_to_an_inode_is_classified_as_a_hardlink() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"a").unwrap();
        std::fs::hard_link(dir.path().join("a.txt"), dir.path().join("b.txt")).unwrap();

        let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap();
        let traverser =
            LocalTraverser::with_hardlink_detection(root, true, SymlinkPolicy::Skip, false, true);
        let filters = Arc::new(FilterSet::compile(&FilterOptions::default()).unwrap());
        let stats = Arc::new(NoOpFilterStats);

        let mut stream = traverser.enumerate(filters, stats);
        let mut by_kind: Vec<(String, EntityKind)> = Vec::new();
        while let Some(object) = stream.next().await {
            let object = object.unwrap();
            by_kind.push((object.relative_path, object.entity_kind));
        }
        by_kind.sort();

        assert_eq!(by_kind, vec![
            ("a.txt".to_string(), EntityKind::File),
            ("b.txt".to_string(), EntityKind::Hardlink),
        ]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn hardlink_detection_disabled_by_default() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"a").unwrap();
        std::fs::hard_link(dir.path().join("a.txt"), dir.path().join("b.txt")).unwrap();

        let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap();
        let traverser = LocalTraverser::new(root, true, SymlinkPolicy::Skip, false);
        let filters = Arc::new(FilterSet::compile(&FilterOptions::default()).unwrap());
        let stats = Arc::new(NoOpFilterStats);

        let mut stream = traverser.enumerate(filters, stats);
        while let Some(object) = stream.next().await {
            assert_eq!(object.unwrap().entity_kind, EntityKind::File);
        }
    }
}
