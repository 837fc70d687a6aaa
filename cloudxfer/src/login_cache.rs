//! OAuth login cache: a small JSON file recording the most recently
//! minted token per cloud, so `cloudxfer copy`/`sync` can reuse it
//! without re-prompting every invocation. Supplements the distilled
//! spec's credential flags with the persistent "logged in" state a
//! real CLI of this shape always carries.

use std::collections::HashMap;

use camino::Utf8Path;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LoginCache {
    /// Keyed by cloud name ("azure", "gcs"); AWS is deliberately absent
    /// since S3 credentials are never cached to disk by this tool.
    entries: HashMap<String, CachedToken>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedToken {
    pub token: String,
    pub minted_at_unix: u64,
    pub account_hint: Option<String>,
}

impl LoginCache {
    pub async fn load(path: &Utf8Path) -> anyhow::Result<Self> {
        match tokio::fs::read(path.as_std_path()).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn save(&self, path: &Utf8Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent.as_std_path()).await?;
        }
        let bytes = serde_json::to_vec_pretty(self)?;
        tokio::fs::write(path.as_std_path(), bytes).await?;
        Ok(())
    }

    pub fn get(&self, cloud: &str) -> Option<&CachedToken> {
        self.entries.get(cloud)
    }

    pub fn set(&mut self, cloud: impl Into<String>, token: CachedToken) {
        self.entries.insert(cloud.into(), token);
    }

    pub fn remove(&mut self, cloud: &str) -> bool {
        self.entries.remove(cloud).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = camino::Utf8PathBuf::try_from(dir.path().join("login.json")).unwrap();

        let mut cache = LoginCache::default();
        cache.set(
            "azure",
            CachedToken {
                token: "tok".to_string(),
                minted_at_unix: 1,
                account_hint: Some("acct".to_string()),
            },
        );
        cache.save(&path).await.unwrap();

        let reloaded = LoginCache::load(&path).await.unwrap();
        assert_eq!(reloaded.get("azure").unwrap().token, "tok");
    }

    #[tokio::test]
    async fn missing_file_loads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = camino::Utf8PathBuf::try_from(dir.path().join("nope.json")).unwrap();
        let cache = LoginCache::load(&path).await.unwrap();
        assert!(cache.is_empty());
    }
}
