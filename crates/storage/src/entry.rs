use serde_json::Value;

use zatiaras_common::StorageError;

/// Entrada no cache: valor JSON opaco + TTL.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub value: Value,
    pub timestamp_ms: u64,
    pub ttl_ms: u64,
    /// Tamanho aproximado: bytes do valor serializado em JSON.
    pub size: usize,
}

impl CacheEntry {
    pub fn new(value: Value, timestamp_ms: u64, ttl_ms: u64) -> Result<Self, StorageError> {
        let size = serde_json::to_vec(&value)?.len();
        Ok(Self {
            value,
            timestamp_ms,
            ttl_ms,
            size,
        })
    }

    /// Ausente logicamente quando `now - timestamp > ttl`.
    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.timestamp_ms) > self.ttl_ms
    }
}
