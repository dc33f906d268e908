use crate::domain::ports::Storage;
use crate::utils::error::{EtlError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Sidecar written next to each object so the content type survives a restart.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ObjectMeta {
    content_type: String,
    written_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn object_path(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if key.is_empty() || escapes {
            return Err(EtlError::storage(format!("Invalid object key: {:?}", key)));
        }
        Ok(self.base_path.join(relative))
    }

    fn meta_path(path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_owned();
        name.push(".meta.json");
        PathBuf::from(name)
    }

    pub async fn content_type(&self, key: &str) -> Result<Option<String>> {
        let path = Self::meta_path(&self.object_path(key)?);
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let meta: ObjectMeta = serde_json::from_slice(&bytes)?;
                Ok(Some(meta.content_type))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl Storage for LocalStorage {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let full_path = self.object_path(key)?;
        match tokio::fs::read(&full_path).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, key: &str, data: &[u8], content_type: &str) -> Result<()> {
        let full_path = self.object_path(key)?;

        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let meta = ObjectMeta {
            content_type: content_type.to_string(),
            written_at: Utc::now(),
        };
        tokio::fs::write(&full_path, data).await?;
        tokio::fs::write(Self::meta_path(&full_path), serde_json::to_vec(&meta)?).await?;

        tracing::debug!("Wrote {} bytes to {}", data.len(), full_path.display());
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub data: Vec<u8>,
    pub content_type: String,
}

/// Process-local store. Clones share the same objects.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    objects: Arc<RwLock<HashMap<String, StoredObject>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn object(&self, key: &str) -> Option<StoredObject> {
        self.objects.read().await.get(key).cloned()
    }

    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

impl Storage for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.objects.read().await.get(key).map(|o| o.data.clone()))
    }

    async fn put(&self, key: &str, data: &[u8], content_type: &str) -> Result<()> {
        self.objects.write().await.insert(
            key.to_string(),
            StoredObject {
                data: data.to_vec(),
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_local_storage_round_trip_with_content_type() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path());

        storage
            .put("nested/credits.json", b"[]", "application/json")
            .await
            .unwrap();

        assert_eq!(
            storage.get("nested/credits.json").await.unwrap(),
            Some(b"[]".to_vec())
        );
        assert_eq!(
            storage.content_type("nested/credits.json").await.unwrap().as_deref(),
            Some("application/json")
        );
    }

    #[tokio::test]
    async fn test_local_storage_missing_key_is_none() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path());

        assert_eq!(storage.get("credits.json").await.unwrap(), None);
        assert_eq!(storage.content_type("credits.json").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_local_storage_rejects_escaping_keys() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path());

        assert!(storage.put("../outside.json", b"x", "text/plain").await.is_err());
        assert!(storage.get("/etc/passwd").await.is_err());
        assert!(storage.get("").await.is_err());
    }

    #[tokio::test]
    async fn test_memory_storage_overwrites() {
        let storage = MemoryStorage::new();
        storage.put("k", b"one", "text/plain").await.unwrap();
        storage.put("k", b"two", "application/json").await.unwrap();

        let object = storage.object("k").await.unwrap();
        assert_eq!(object.data, b"two");
        assert_eq!(object.content_type, "application/json");
        assert_eq!(storage.len().await, 1);
        assert_eq!(storage.get("missing").await.unwrap(), None);
    }
}
