use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use zatiaras_common::{DEFAULT_STORAGE_QUOTA, StorageError};

/// Armazenamento chave/valor de strings, no formato do localStorage.
pub trait Storage: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;
}

impl<S: Storage + ?Sized> Storage for Arc<S> {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).get_item(key)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).set_item(key, value)
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        (**self).remove_item(key)
    }
}

/// Storage in-memory com quota, equivalente ao localStorage de uma origem.
#[derive(Debug)]
pub struct MemoryStorage {
    items: DashMap<String, String>,
    quota: usize,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::with_quota(DEFAULT_STORAGE_QUOTA)
    }

    pub fn with_quota(quota: usize) -> Self {
        Self {
            items: DashMap::new(),
            quota,
        }
    }

    /// Bytes ocupados (chaves + valores).
    pub fn used_bytes(&self) -> usize {
        self.items
            .iter()
            .map(|e| e.key().len() + e.value().len())
            .sum()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.items.get(key).map(|v| v.clone()))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let previous = self
            .items
            .get(key)
            .map(|v| key.len() + v.len())
            .unwrap_or(0);
        let needed = self.used_bytes() - previous + key.len() + value.len();
        if needed > self.quota {
            return Err(StorageError::QuotaExceeded {
                needed,
                limit: self.quota,
            });
        }
        self.items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.items.remove(key);
        Ok(())
    }
}

/// Storage em disco: um arquivo `<key>.json` por chave dentro de um diretório.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Abre (e cria, se preciso) o diretório de dados.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StorageError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
            && !key.starts_with('.');
        if !valid {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl Storage for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        // Escreve em arquivo temporário e renomeia: leitores nunca veem meio arquivo
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        debug!("storage: {} bytes gravados em {:?}", value.len(), path);
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn memory_get_set_remove() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.get_item("k").unwrap(), None);
        storage.set_item("k", "v").unwrap();
        assert_eq!(storage.get_item("k").unwrap(), Some("v".to_string()));
        storage.remove_item("k").unwrap();
        assert!(storage.is_empty());
    }

    #[test]
    fn memory_quota_exceeded() {
        let storage = MemoryStorage::with_quota(10);
        storage.set_item("k", "12345").unwrap(); // 6 bytes
        let err = storage.set_item("j", "12345").unwrap_err(); // 12 bytes
        assert!(matches!(
            err,
            StorageError::QuotaExceeded {
                needed: 12,
                limit: 10
            }
        ));
        assert_eq!(storage.get_item("j").unwrap(), None);
    }

    #[test]
    fn memory_quota_counts_replacement_once() {
        let storage = MemoryStorage::with_quota(10);
        storage.set_item("k", "123456789").unwrap();
        // Sobrescrever a mesma chave não soma o valor antigo
        storage.set_item("k", "987654321").unwrap();
        assert_eq!(storage.used_bytes(), 10);
    }

    #[test]
    fn file_roundtrip() {
        let dir = tempdir().unwrap();
        let storage = FileStorage::open(dir.path().join("data")).unwrap();

        assert_eq!(storage.get_item("zatiaras_cart").unwrap(), None);
        storage.set_item("zatiaras_cart", "{}").unwrap();
        assert_eq!(
            storage.get_item("zatiaras_cart").unwrap(),
            Some("{}".to_string())
        );

        // Outro handle no mesmo diretório enxerga os dados
        let reopened = FileStorage::open(storage.dir()).unwrap();
        assert_eq!(
            reopened.get_item("zatiaras_cart").unwrap(),
            Some("{}".to_string())
        );

        storage.remove_item("zatiaras_cart").unwrap();
        storage.remove_item("zatiaras_cart").unwrap();
        assert_eq!(storage.get_item("zatiaras_cart").unwrap(), None);
    }

    #[test]
    fn file_rejects_path_traversal() {
        let dir = tempdir().unwrap();
        let storage = FileStorage::open(dir.path()).unwrap();
        assert!(matches!(
            storage.set_item("../evil", "x"),
            Err(StorageError::InvalidKey(_))
        ));
        assert!(matches!(
            storage.get_item(""),
            Err(StorageError::InvalidKey(_))
        ));
    }
}
