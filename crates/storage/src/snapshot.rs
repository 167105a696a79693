use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use zatiaras_common::{CACHE_SCHEMA_VERSION, CACHE_STORAGE_KEY, StorageError};

use crate::Storage;

/// Formato persistido do cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheSnapshot {
    pub version: u32,
    pub entries: Vec<SnapshotEntry>,
}

/// Uma entrada do snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub key: String,
    pub value: Value,
    pub timestamp: u64,
    pub ttl: u64,
}

impl SnapshotEntry {
    fn is_expired(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.timestamp) > self.ttl
    }
}

/// Grava o snapshot sob `CACHE_STORAGE_KEY`. Retorna o número de entradas.
pub fn save_snapshot(storage: &dyn Storage, entries: Vec<SnapshotEntry>) -> Result<usize, StorageError> {
    let count = entries.len();
    let snapshot = CacheSnapshot {
        version: CACHE_SCHEMA_VERSION,
        entries,
    };
    let json = serde_json::to_string(&snapshot)?;
    storage.set_item(CACHE_STORAGE_KEY, &json)?;
    debug!("snapshot do cache gravado: {count} entradas");
    Ok(count)
}

/// Lê o snapshot, descartando entradas já expiradas em `now_ms`.
///
/// Snapshot ausente retorna vazio. Versão desconhecida ou JSON inválido
/// retornam erro; quem chama decide descartar.
pub fn load_snapshot(storage: &dyn Storage, now_ms: u64) -> Result<Vec<SnapshotEntry>, StorageError> {
    let Some(json) = storage.get_item(CACHE_STORAGE_KEY)? else {
        return Ok(vec![]);
    };

    let snapshot: CacheSnapshot = serde_json::from_str(&json)?;
    if snapshot.version != CACHE_SCHEMA_VERSION {
        return Err(StorageError::UnsupportedVersion(snapshot.version));
    }

    let total = snapshot.entries.len();
    let live: Vec<SnapshotEntry> = snapshot
        .entries
        .into_iter()
        .filter(|e| !e.is_expired(now_ms))
        .collect();
    debug!(
        "snapshot do cache lido: {} de {total} entradas válidas",
        live.len()
    );
    Ok(live)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStorage;
    use serde_json::json;

    fn entry(key: &str, timestamp: u64, ttl: u64) -> SnapshotEntry {
        SnapshotEntry {
            key: key.into(),
            value: json!({ "k": key }),
            timestamp,
            ttl,
        }
    }

    #[test]
    fn save_and_load() {
        let storage = MemoryStorage::new();
        let count = save_snapshot(&storage, vec![entry("a", 0, 100), entry("b", 50, 100)]).unwrap();
        assert_eq!(count, 2);

        // Em t=120, "a" já expirou (120 - 0 > 100)
        let live = load_snapshot(&storage, 120).unwrap();
        assert_eq!(live, vec![entry("b", 50, 100)]);
    }

    #[test]
    fn load_missing_is_empty() {
        let storage = MemoryStorage::new();
        assert!(load_snapshot(&storage, 0).unwrap().is_empty());
    }

    #[test]
    fn load_unknown_version() {
        let storage = MemoryStorage::new();
        storage
            .set_item(CACHE_STORAGE_KEY, r#"{"version":99,"entries":[]}"#)
            .unwrap();
        assert!(matches!(
            load_snapshot(&storage, 0),
            Err(StorageError::UnsupportedVersion(99))
        ));
    }

    #[test]
    fn load_corrupted() {
        let storage = MemoryStorage::new();
        storage.set_item(CACHE_STORAGE_KEY, "{not json").unwrap();
        assert!(matches!(
            load_snapshot(&storage, 0),
            Err(StorageError::Serialization(_))
        ));
    }
}
