//! Directory-backed store that survives process restarts

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

use studio_cache_core::{CacheError, PersistentStore, Result};

const FILE_EXT: &str = "entry";

/// On-disk form of one value, carrying the key the file name only hashes
#[derive(Serialize)]
struct FileRecord<'a> {
    key: &'a str,
    value: &'a str,
}

#[derive(Deserialize)]
struct OwnedRecord {
    key: String,
    value: String,
}

/// `PersistentStore` keeping one file per key inside a directory
///
/// Files are named by the SHA-256 of the key, so names have a fixed length
/// whatever the key. The key itself is stored in the file next to the value.
/// Writes go through a temporary file and a rename.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
    quota_bytes: Option<u64>,
}

impl FileStore {
    /// Open (creating if needed) a store rooted at `dir`
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await.map_err(io_error)?;
        Ok(Self {
            dir,
            quota_bytes: None,
        })
    }

    /// Limit the total size of stored files
    pub fn with_quota(mut self, bytes: u64) -> Self {
        self.quota_bytes = Some(bytes);
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", file_name(key), FILE_EXT))
    }

    async fn used_bytes(&self) -> Result<u64> {
        let mut total = 0;
        let mut entries = fs::read_dir(&self.dir).await.map_err(io_error)?;
        while let Some(entry) = entries.next_entry().await.map_err(io_error)? {
            if entry.path().extension().is_some_and(|ext| ext == FILE_EXT) {
                total += entry.metadata().await.map_err(io_error)?.len();
            }
        }
        Ok(total)
    }

    async fn read_record(path: &Path) -> Result<Option<OwnedRecord>> {
        let text = match fs::read_to_string(path).await {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            // Non-UTF-8 contents: treat like any other unreadable value
            Err(e) if e.kind() == ErrorKind::InvalidData => {
                return Err(CacheError::Deserialization(e.to_string()));
            }
            Err(e) => return Err(io_error(e)),
        };
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| CacheError::Deserialization(e.to_string()))
    }
}

#[async_trait]
impl PersistentStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        match Self::read_record(&self.path_for(key)).await? {
            Some(record) if record.key == key => Ok(Some(record.value)),
            _ => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        let path = self.path_for(key);
        let text = serde_json::to_string(&FileRecord { key, value: &value })
            .map_err(|e| CacheError::Serialization(e.to_string()))?;

        if let Some(quota) = self.quota_bytes {
            let previous = match fs::metadata(&path).await {
                Ok(meta) => meta.len(),
                Err(_) => 0,
            };
            let projected = self.used_bytes().await?.saturating_sub(previous) + text.len() as u64;
            if projected > quota {
                return Err(CacheError::QuotaExceeded);
            }
        }

        let tmp = path.with_extension("tmp");
        fs::write(&tmp, text.as_bytes()).await.map_err(io_error)?;
        fs::rename(&tmp, &path).await.map_err(io_error)
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        match fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_error(e)),
        }
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut entries = fs::read_dir(&self.dir).await.map_err(io_error)?;
        while let Some(entry) = entries.next_entry().await.map_err(io_error)? {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != FILE_EXT) {
                continue;
            }
            // Unreadable files are skipped; `get` reports them per key
            if let Ok(Some(record)) = Self::read_record(&path).await {
                keys.push(record.key);
            }
        }
        Ok(keys)
    }
}

fn io_error(err: std::io::Error) -> CacheError {
    match err.kind() {
        ErrorKind::PermissionDenied | ErrorKind::NotFound => {
            CacheError::Unavailable(err.to_string())
        }
        ErrorKind::InvalidInput => CacheError::Rejected(err.to_string()),
        _ => CacheError::Backend(err.to_string()),
    }
}

fn file_name(key: &str) -> String {
    hex::encode(Sha256::digest(key.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name_is_fixed_length() {
        let short = file_name("a");
        let long = file_name(&"x".repeat(4096));
        assert_eq!(short.len(), 64);
        assert_eq!(long.len(), 64);
        assert!(long.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(short, long);
    }

    #[tokio::test]
    async fn test_roundtrip_and_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();

        store.set("a:b", "hello".to_string()).await.unwrap();
        assert_eq!(store.get("a:b").await.unwrap(), Some("hello".to_string()));
        assert_eq!(store.keys().await.unwrap(), vec!["a:b"]);

        assert!(store.remove("a:b").await.unwrap());
        assert!(!store.remove("a:b").await.unwrap());
        assert_eq!(store.get("a:b").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_long_keys_persist() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        let key = concat!(
            r#"studio_cache:["3f2b8c1e-9a4d-4f6b-8c2e-2d7e8a5b6c40","contacts-list","#,
            r#"{"filter":{"source":"instagram","status":"active","#,
            r#""tags":["vip","new","returning"]},"page":2}]"#
        )
        .to_string();
        assert!(key.len() * 2 > 255);

        store.set(&key, "page two".to_string()).await.unwrap();
        assert_eq!(store.get(&key).await.unwrap(), Some("page two".to_string()));
        assert_eq!(store.keys().await.unwrap(), vec![key]);
    }

    #[tokio::test]
    async fn test_foreign_files_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        store.set("k", "v".to_string()).await.unwrap();
        std::fs::write(dir.path().join("garbage.entry"), "not json").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "hello").unwrap();

        assert_eq!(store.keys().await.unwrap(), vec!["k"]);
    }

    #[tokio::test]
    async fn test_corrupt_file_reports_deserialization() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        std::fs::write(store.path_for("k"), "{broken").unwrap();

        assert!(matches!(
            store.get("k").await,
            Err(CacheError::Deserialization(_))
        ));
    }

    #[tokio::test]
    async fn test_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = FileStore::open(dir.path()).await.unwrap();
            store.set("k", "v".to_string()).await.unwrap();
        }
        let reopened = FileStore::open(dir.path()).await.unwrap();
        assert_eq!(reopened.get("k").await.unwrap(), Some("v".to_string()));
    }

    #[tokio::test]
    async fn test_quota() {
        let dir = tempfile::tempdir().unwrap();
        // One record for "a" holding five bytes is {"key":"a","value":"12345"}
        let store = FileStore::open(dir.path()).await.unwrap().with_quota(40);

        store.set("a", "12345".to_string()).await.unwrap();
        let err = store.set("b", "12345".to_string()).await.unwrap_err();
        assert_eq!(err, CacheError::QuotaExceeded);

        // Replacing an existing value only counts the difference
        store.set("a", "1234567".to_string()).await.unwrap();
    }
}
