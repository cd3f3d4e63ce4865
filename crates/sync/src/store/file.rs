//! File-backed key-value store.
//!
//! One file per key under a data directory. Keys contain characters that
//! are awkward in filenames (`@`, path separators), so each key is encoded
//! to a flat, reversible filename. Used by the CLI and by desktop builds.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use crate::error::{Result, SyncError};

use super::KeyValueStore;

const FILE_EXTENSION: &str = "kv";

/// A directory-of-files [`KeyValueStore`].
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns `StorageUnavailable` if the directory cannot be created.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await.map_err(|e| {
            SyncError::StorageUnavailable(format!(
                "cannot create data dir {}: {e}",
                dir.display()
            ))
        })?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{FILE_EXTENSION}", encode_key(key)))
    }
}

/// Encode a key into a filesystem-safe, reversible filename stem.
///
/// Alphanumerics, `-` and `_` pass through; everything else becomes `%XX`.
fn encode_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for byte in key.bytes() {
        match byte {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'_' => {
                out.push(char::from(byte));
            }
            other => {
                out.push('%');
                out.push_str(&format!("{other:02X}"));
            }
        }
    }
    out
}

/// Decode a filename stem produced by [`encode_key`].
fn decode_key(stem: &str) -> Option<String> {
    let mut bytes = Vec::with_capacity(stem.len());
    let mut chars = stem.chars();
    while let Some(c) = chars.next() {
        if c == '%' {
            let hi = chars.next()?;
            let lo = chars.next()?;
            let hex: String = [hi, lo].iter().collect();
            bytes.push(u8::from_str_radix(&hex, 16).ok()?);
        } else {
            bytes.push(u8::try_from(c as u32).ok()?);
        }
    }
    String::from_utf8(bytes).ok()
}

fn io_err(context: &str, path: &Path, err: &std::io::Error) -> SyncError {
    SyncError::StorageUnavailable(format!("{context} {}: {err}", path.display()))
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        match fs::read_to_string(&path).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_err("cannot read", &path, &e)),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key);
        // Write-then-rename so a crash mid-write never leaves a torn value.
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, value)
            .await
            .map_err(|e| io_err("cannot write", &tmp, &e))?;
        fs::rename(&tmp, &path)
            .await
            .map_err(|e| io_err("cannot rename", &path, &e))
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_err("cannot remove", &path, &e)),
        }
    }

    async fn list_keys(&self) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut entries = fs::read_dir(&self.dir)
            .await
            .map_err(|e| io_err("cannot list", &self.dir, &e))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| io_err("cannot list", &self.dir, &e))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(FILE_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str())
                && let Some(key) = decode_key(stem)
            {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_key_encoding_roundtrip() {
        for key in [
            "@tourist_app_favorites_u-42",
            "@tourist_app_email_history",
            "weird key/with:stuff",
        ] {
            let encoded = encode_key(key);
            assert!(!encoded.contains('@'));
            assert!(!encoded.contains('/'));
            assert_eq!(decode_key(&encoded).unwrap(), key);
        }
    }

    #[tokio::test]
    async fn test_file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();

        assert_eq!(store.get("@tourist_app_language_guest").await.unwrap(), None);
        store
            .set("@tourist_app_language_guest", "\"ceb\"")
            .await
            .unwrap();
        assert_eq!(
            store.get("@tourist_app_language_guest").await.unwrap(),
            Some("\"ceb\"".to_owned())
        );

        store.remove("@tourist_app_language_guest").await.unwrap();
        assert_eq!(store.get("@tourist_app_language_guest").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_list_keys_decodes_names() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        store.set("@tourist_app_settings_u-1", "{}").await.unwrap();
        store.set("@tourist_app_settings_u-2", "{}").await.unwrap();

        assert_eq!(
            store.list_keys().await.unwrap(),
            vec![
                "@tourist_app_settings_u-1".to_owned(),
                "@tourist_app_settings_u-2".to_owned(),
            ]
        );
    }

    #[tokio::test]
    async fn test_values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = FileStore::open(dir.path()).await.unwrap();
            store.set("k", "persisted").await.unwrap();
        }
        let store = FileStore::open(dir.path()).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some("persisted".to_owned()));
    }
}
