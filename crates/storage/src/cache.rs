use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use dashmap::DashMap;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{Duration, interval};
use tracing::{debug, info, warn};

use zatiaras_common::{
    CACHE_STORAGE_KEY, DEFAULT_CACHE_MAX_BYTES, DEFAULT_CACHE_SWEEP_SECS, DEFAULT_CACHE_TTL_MS,
    StorageError,
};

use crate::entry::CacheEntry;
use crate::snapshot::{SnapshotEntry, load_snapshot, save_snapshot};
use crate::{Clock, Storage, SystemClock};

/// Política de persistência do cache no storage.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum PersistPolicy {
    /// Persiste após cada escrita.
    Always,
    /// Persiste no tick de manutenção, se houve mudança.
    #[default]
    Periodic,
    /// Nunca persiste.
    Never,
}

/// Configuração do cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub max_bytes: usize,
    pub default_ttl: Duration,
    pub sweep_interval: Duration,
    pub persist: PersistPolicy,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_CACHE_MAX_BYTES,
            default_ttl: Duration::from_millis(DEFAULT_CACHE_TTL_MS),
            sweep_interval: Duration::from_secs(DEFAULT_CACHE_SWEEP_SECS),
            persist: PersistPolicy::default(),
        }
    }
}

/// Contadores e ocupação do cache.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub bytes: usize,
    pub max_bytes: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Estado compartilhado entre todos os handles.
struct SharedState {
    data: DashMap<String, CacheEntry>,
    size: AtomicUsize,
    dirty: AtomicBool,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
    /// Serializa remover antigo, abrir espaço e inserir.
    write: Mutex<()>,
    config: CacheConfig,
    clock: Arc<dyn Clock>,
    storage: Option<Arc<dyn Storage>>,
}

/// Handle para o cache in-memory com TTL por chave e limite de bytes.
#[derive(Clone)]
pub struct CacheManager {
    shared: Arc<SharedState>,
}

impl CacheManager {
    pub fn new(config: CacheConfig) -> Self {
        Self::build(config, Arc::new(SystemClock), None)
    }

    pub fn with_clock(config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self::build(config, clock, None)
    }

    /// Cria o cache espelhado em `storage`, restaurando o último snapshot.
    pub fn with_storage(config: CacheConfig, clock: Arc<dyn Clock>, storage: Arc<dyn Storage>) -> Self {
        let cache = Self::build(config, clock, Some(storage));
        cache.restore();
        cache
    }

    fn build(config: CacheConfig, clock: Arc<dyn Clock>, storage: Option<Arc<dyn Storage>>) -> Self {
        CacheManager {
            shared: Arc::new(SharedState {
                data: DashMap::new(),
                size: AtomicUsize::new(0),
                dirty: AtomicBool::new(false),
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
                evictions: AtomicU64::new(0),
                expirations: AtomicU64::new(0),
                write: Mutex::new(()),
                config,
                clock,
                storage,
            }),
        }
    }

    fn restore(&self) {
        let Some(storage) = self.shared.storage.as_ref() else {
            return;
        };
        let now = self.shared.clock.now_ms();

        match load_snapshot(storage.as_ref(), now) {
            Ok(entries) => {
                let mut restored = 0;
                for e in entries {
                    match CacheEntry::new(e.value, e.timestamp, e.ttl) {
                        Ok(entry) => {
                            if self.insert_entry(e.key, entry, now) {
                                restored += 1;
                            }
                        }
                        Err(err) => warn!("cache: entrada do snapshot ignorada: {err}"),
                    }
                }
                self.shared.dirty.store(false, Ordering::Relaxed);
                if restored > 0 {
                    info!("cache: {restored} entradas restauradas do storage");
                }
            }
            Err(e) => {
                warn!("cache: snapshot descartado: {e}");
                if let Err(e) = storage.remove_item(CACHE_STORAGE_KEY) {
                    warn!("cache: falha ao remover snapshot inválido: {e}");
                }
            }
        }
    }

    // --- Leitura ---

    pub fn get(&self, key: &str) -> Option<Value> {
        let now = self.shared.clock.now_ms();
        let entry = match self.shared.data.get(key) {
            Some(e) => e,
            None => {
                self.shared.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        };

        if entry.is_expired(now) {
            drop(entry);
            self.reap(key, now);
            self.shared.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        self.shared.hits.fetch_add(1, Ordering::Relaxed);
        Some(entry.value.clone())
    }

    /// `get` + desserialização. Valor com formato inesperado conta como ausente.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get(key)?;
        match serde_json::from_value(value) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!("cache: valor de '{key}' com formato inesperado: {e}");
                None
            }
        }
    }

    /// Verifica presença sem afetar as estatísticas.
    pub fn has(&self, key: &str) -> bool {
        let now = self.shared.clock.now_ms();
        self.shared
            .data
            .get(key)
            .map(|e| !e.is_expired(now))
            .unwrap_or(false)
    }

    // --- Escrita ---

    /// Grava `value` com `ttl` (ou o TTL padrão). Retorna `false` se a entrada
    /// não couber no cache.
    pub fn set(&self, key: impl Into<String>, value: Value, ttl: Option<Duration>) -> bool {
        let key = key.into();
        let now = self.shared.clock.now_ms();
        let ttl_ms = ttl.unwrap_or(self.shared.config.default_ttl).as_millis() as u64;

        let entry = match CacheEntry::new(value, now, ttl_ms) {
            Ok(e) => e,
            Err(e) => {
                warn!("cache: falha ao serializar '{key}': {e}");
                return false;
            }
        };

        if !self.insert_entry(key, entry, now) {
            return false;
        }

        self.persist_if_always();
        true
    }

    pub fn set_as<T: Serialize>(&self, key: impl Into<String>, value: &T, ttl: Option<Duration>) -> bool {
        let key = key.into();
        match serde_json::to_value(value) {
            Ok(v) => self.set(key, v, ttl),
            Err(e) => {
                warn!("cache: falha ao serializar '{key}': {e}");
                false
            }
        }
    }

    /// Insere respeitando `max_bytes`. Invariante após retornar:
    /// `current_size() <= max_bytes`.
    fn insert_entry(&self, key: String, entry: CacheEntry, now: u64) -> bool {
        let max = self.shared.config.max_bytes;
        if entry.size > max {
            warn!(
                "cache: '{key}' ({} bytes) excede o limite de {max} bytes, ignorado",
                entry.size
            );
            return false;
        }

        let _write = self.write_lock();

        // Libera o espaço do valor antigo antes de medir
        if let Some((_, old)) = self.shared.data.remove(&key) {
            self.shared.size.fetch_sub(old.size, Ordering::Relaxed);
        }

        if self.current_size() + entry.size > max {
            self.make_room(entry.size, now);
        }

        self.shared.size.fetch_add(entry.size, Ordering::Relaxed);
        if let Some(displaced) = self.shared.data.insert(key, entry) {
            self.shared.size.fetch_sub(displaced.size, Ordering::Relaxed);
        }
        self.shared.dirty.store(true, Ordering::Relaxed);
        true
    }

    fn write_lock(&self) -> MutexGuard<'_, ()> {
        self.shared.write.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Remove expiradas e depois as mais antigas até caber `needed` bytes.
    fn make_room(&self, needed: usize, now: u64) {
        let max = self.shared.config.max_bytes;
        self.sweep_at(now);
        if self.current_size() + needed <= max {
            return;
        }

        // Mais antigo primeiro (por timestamp de inserção, não de acesso)
        let mut candidates: Vec<(u64, String)> = self
            .shared
            .data
            .iter()
            .map(|e| (e.timestamp_ms, e.key().clone()))
            .collect();
        candidates.sort();

        for (_, key) in candidates {
            if self.current_size() + needed <= max {
                break;
            }
            if let Some((_, old)) = self.shared.data.remove(&key) {
                self.shared.size.fetch_sub(old.size, Ordering::Relaxed);
                self.shared.evictions.fetch_add(1, Ordering::Relaxed);
                debug!("cache: '{key}' removida por pressão de espaço");
            }
        }
    }

    /// Get com fallback: em miss chama `fetch` e grava o resultado.
    pub async fn get_or_fetch<F, Fut, E>(&self, key: &str, ttl: Option<Duration>, fetch: F) -> Result<Value, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, E>>,
    {
        if let Some(v) = self.get(key) {
            return Ok(v);
        }
        let value = fetch().await?;
        self.set(key, value.clone(), ttl);
        Ok(value)
    }

    // --- Remoção ---

    pub fn delete(&self, key: &str) -> bool {
        match self.shared.data.remove(key) {
            Some((_, old)) => {
                self.shared.size.fetch_sub(old.size, Ordering::Relaxed);
                self.shared.dirty.store(true, Ordering::Relaxed);
                self.persist_if_always();
                true
            }
            None => false,
        }
    }

    pub fn clear(&self) {
        let _write = self.write_lock();
        let size = &self.shared.size;
        self.shared.data.retain(|_, e| {
            size.fetch_sub(e.size, Ordering::Relaxed);
            false
        });
        self.shared.dirty.store(true, Ordering::Relaxed);
        self.persist_if_always();
    }

    /// Remove todas as entradas expiradas. Retorna quantas saíram.
    pub fn sweep_expired(&self) -> usize {
        let now = self.shared.clock.now_ms();
        let removed = self.sweep_at(now);
        if removed > 0 {
            self.persist_if_always();
        }
        removed
    }

    fn sweep_at(&self, now: u64) -> usize {
        let expired: Vec<String> = self
            .shared
            .data
            .iter()
            .filter(|e| e.is_expired(now))
            .map(|e| e.key().clone())
            .collect();

        expired.iter().filter(|key| self.reap(key, now)).count()
    }

    /// Remove `key` só se ainda estiver expirada (pode ter sido re-setada).
    fn reap(&self, key: &str, now: u64) -> bool {
        match self.shared.data.remove_if(key, |_, e| e.is_expired(now)) {
            Some((_, old)) => {
                self.shared.size.fetch_sub(old.size, Ordering::Relaxed);
                self.shared.expirations.fetch_add(1, Ordering::Relaxed);
                self.shared.dirty.store(true, Ordering::Relaxed);
                debug!("cache: '{key}' expirada removida");
                true
            }
            None => false,
        }
    }

    // --- Introspecção ---

    pub fn len(&self) -> usize {
        self.shared.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.data.is_empty()
    }

    pub fn current_size(&self) -> usize {
        self.shared.size.load(Ordering::Relaxed)
    }

    pub fn max_bytes(&self) -> usize {
        self.shared.config.max_bytes
    }

    pub fn persist_policy(&self) -> PersistPolicy {
        self.shared.config.persist
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            bytes: self.current_size(),
            max_bytes: self.shared.config.max_bytes,
            hits: self.shared.hits.load(Ordering::Relaxed),
            misses: self.shared.misses.load(Ordering::Relaxed),
            evictions: self.shared.evictions.load(Ordering::Relaxed),
            expirations: self.shared.expirations.load(Ordering::Relaxed),
        }
    }

    // --- Persistência ---

    /// Grava as entradas válidas no storage. Sem storage configurado, no-op.
    pub fn persist(&self) -> Result<usize, StorageError> {
        let Some(storage) = self.shared.storage.as_ref() else {
            return Ok(0);
        };
        let now = self.shared.clock.now_ms();
        let entries: Vec<SnapshotEntry> = self
            .shared
            .data
            .iter()
            .filter(|e| !e.is_expired(now))
            .map(|e| SnapshotEntry {
                key: e.key().clone(),
                value: e.value.clone(),
                timestamp: e.timestamp_ms,
                ttl: e.ttl_ms,
            })
            .collect();

        let count = save_snapshot(storage.as_ref(), entries)?;
        self.shared.dirty.store(false, Ordering::Relaxed);
        Ok(count)
    }

    fn persist_if_always(&self) {
        if self.shared.config.persist == PersistPolicy::Always {
            self.persist_logged();
        }
    }

    fn persist_logged(&self) {
        if let Err(e) = self.persist() {
            warn!("cache: falha ao persistir snapshot: {e}");
        }
    }

    /// Spawn da task de manutenção: varre expiradas a cada `sweep_interval`
    /// e persiste conforme a política. Ao receber shutdown, faz o flush final.
    pub fn spawn_maintenance(&self, mut shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move {
            let config = cache.shared.config.clone();
            let mut tick = interval(config.sweep_interval);
            tick.tick().await; // primeiro tick é imediato

            loop {
                tokio::select! {
                    _ = tick.tick() => {
                        let removed = cache.sweep_expired();
                        if removed > 0 {
                            debug!("cache: {removed} entradas expiradas varridas");
                        }
                        if config.persist == PersistPolicy::Periodic
                            && cache.shared.dirty.load(Ordering::Relaxed)
                        {
                            cache.persist_logged();
                        }
                    }
                    _ = shutdown.recv() => break,
                }
            }

            if config.persist != PersistPolicy::Never {
                cache.persist_logged();
            }
            info!("manutenção do cache encerrada");
        })
    }
}

impl Default for CacheManager {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ManualClock, MemoryStorage};
    use serde_json::json;

    fn manual_cache(max_bytes: usize) -> (CacheManager, ManualClock) {
        let clock = ManualClock::new(1_000);
        let config = CacheConfig {
            max_bytes,
            ..CacheConfig::default()
        };
        (CacheManager::with_clock(config, Arc::new(clock.clone())), clock)
    }

    /// Valor string cujo JSON ocupa exatamente `n` bytes (aspas incluídas).
    fn sized(n: usize) -> Value {
        json!("x".repeat(n - 2))
    }

    #[test]
    fn get_set_basic() {
        let (cache, _) = manual_cache(1024);
        assert!(cache.set("menu:berau", json!(["alpukat", "mangga"]), None));
        assert_eq!(cache.get("menu:berau"), Some(json!(["alpukat", "mangga"])));
        assert_eq!(cache.get("missing"), None);
    }

    #[test]
    fn ttl_boundary() {
        let (cache, clock) = manual_cache(1024);
        cache.set("k", json!(1), Some(Duration::from_millis(1_000)));

        clock.advance(Duration::from_millis(999));
        assert_eq!(cache.get("k"), Some(json!(1)));

        clock.advance(Duration::from_millis(1));
        assert_eq!(cache.get("k"), Some(json!(1)));

        clock.advance(Duration::from_millis(1));
        assert_eq!(cache.get("k"), None);
        // Leitura lazy removeu a entrada
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.current_size(), 0);
    }

    #[test]
    fn default_ttl_applies() {
        let (cache, clock) = manual_cache(1024);
        cache.set("k", json!(true), None);
        clock.advance(Duration::from_millis(DEFAULT_CACHE_TTL_MS + 1));
        assert!(!cache.has("k"));
    }

    #[test]
    fn eviction_keeps_size_bounded() {
        let (cache, clock) = manual_cache(100);
        for i in 0..5 {
            assert!(cache.set(format!("k{i}"), sized(30), None));
            assert!(cache.current_size() <= cache.max_bytes());
            clock.advance(Duration::from_millis(10));
        }

        // Cabem 3 entradas de 30 bytes; as duas mais antigas saíram
        assert_eq!(cache.len(), 3);
        assert!(!cache.has("k0"));
        assert!(!cache.has("k1"));
        assert!(cache.has("k4"));
        assert_eq!(cache.stats().evictions, 2);
    }

    #[test]
    fn eviction_prefers_expired() {
        let (cache, clock) = manual_cache(100);
        cache.set("old-but-live", sized(40), Some(Duration::from_secs(60)));
        clock.advance(Duration::from_millis(10));
        cache.set("short", sized(40), Some(Duration::from_millis(5)));
        clock.advance(Duration::from_millis(10));

        assert!(cache.set("new", sized(40), None));
        assert!(cache.has("old-but-live"));
        assert!(!cache.has("short"));
        assert_eq!(cache.stats().evictions, 0);
        assert_eq!(cache.stats().expirations, 1);
    }

    #[test]
    fn oversized_entry_refused() {
        let (cache, _) = manual_cache(50);
        cache.set("small", sized(10), None);
        assert!(!cache.set("huge", sized(51), None));
        assert!(cache.has("small"));
        assert_eq!(cache.current_size(), 10);
    }

    #[test]
    fn overwrite_does_not_double_count() {
        let (cache, _) = manual_cache(100);
        cache.set("k", sized(60), None);
        cache.set("k", sized(70), None);
        assert_eq!(cache.current_size(), 70);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats().evictions, 0);
    }

    /// Soma dos tamanhos das entradas vivas no mapa.
    fn live_bytes(cache: &CacheManager) -> usize {
        cache.shared.data.iter().map(|e| e.size).sum()
    }

    #[test]
    fn concurrent_overwrites_keep_size_exact() {
        let (cache, _) = manual_cache(1_000_000);
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    for _ in 0..2_000 {
                        cache.set("menu", sized(102), None);
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.current_size(), 102);
    }

    #[test]
    fn concurrent_sets_respect_max_bytes() {
        let (cache, clock) = manual_cache(300);
        let threads: Vec<_> = (0..8)
            .map(|t| {
                let cache = cache.clone();
                let clock = clock.clone();
                std::thread::spawn(move || {
                    for i in 0..1_000 {
                        cache.set(format!("k{}", (t + i) % 5), sized(102), None);
                        assert!(cache.current_size() <= cache.max_bytes());
                        if i % 3 == 0 {
                            cache.delete(&format!("k{}", i % 5));
                        }
                        clock.advance(Duration::from_millis(1));
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }

        assert_eq!(cache.current_size(), live_bytes(&cache));
        assert!(cache.current_size() <= 300);
        assert!(cache.len() <= 2);

        cache.clear();
        assert_eq!(cache.current_size(), 0);
    }

    #[test]
    fn delete_and_clear() {
        let (cache, _) = manual_cache(1024);
        cache.set("a", json!(1), None);
        cache.set("b", json!(2), None);
        assert!(cache.delete("a"));
        assert!(!cache.delete("a"));
        assert_eq!(cache.current_size(), 1);
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.current_size(), 0);
    }

    #[test]
    fn sweep_expired_counts() {
        let (cache, clock) = manual_cache(1024);
        cache.set("a", json!(1), Some(Duration::from_millis(10)));
        cache.set("b", json!(2), Some(Duration::from_millis(10)));
        cache.set("c", json!(3), Some(Duration::from_secs(10)));
        clock.advance(Duration::from_millis(11));
        assert_eq!(cache.sweep_expired(), 2);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn typed_access() {
        let (cache, _) = manual_cache(1024);
        assert!(cache.set_as("prices", &vec![15_000u64, 25_000], None));
        assert_eq!(cache.get_as::<Vec<u64>>("prices"), Some(vec![15_000, 25_000]));
        // Formato errado conta como ausente
        assert_eq!(cache.get_as::<String>("prices"), None);
    }

    #[test]
    fn stats_hits_misses() {
        let (cache, _) = manual_cache(1024);
        cache.set("a", json!(1), None);
        cache.get("a");
        cache.get("a");
        cache.get("b");
        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate() - 2.0 / 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn persist_and_restore() {
        let storage: Arc<MemoryStorage> = Arc::new(MemoryStorage::new());
        let clock = ManualClock::new(0);

        let cache = CacheManager::with_storage(
            CacheConfig::default(),
            Arc::new(clock.clone()),
            storage.clone(),
        );
        cache.set("live", json!("ok"), Some(Duration::from_secs(60)));
        cache.set("short", json!("bye"), Some(Duration::from_millis(10)));
        assert_eq!(cache.persist().unwrap(), 2);

        clock.advance(Duration::from_millis(100));
        let restored = CacheManager::with_storage(CacheConfig::default(), Arc::new(clock), storage);
        assert_eq!(restored.get("live"), Some(json!("ok")));
        assert_eq!(restored.get("short"), None);
        assert_eq!(restored.len(), 1);
    }

    #[test]
    fn corrupted_snapshot_discarded() {
        let storage: Arc<MemoryStorage> = Arc::new(MemoryStorage::new());
        storage.set_item(CACHE_STORAGE_KEY, "[[[").unwrap();

        let cache = CacheManager::with_storage(
            CacheConfig::default(),
            Arc::new(ManualClock::new(0)),
            storage.clone(),
        );
        assert!(cache.is_empty());
        assert_eq!(storage.get_item(CACHE_STORAGE_KEY).unwrap(), None);
    }

    #[test]
    fn always_policy_persists_on_set() {
        let storage: Arc<MemoryStorage> = Arc::new(MemoryStorage::new());
        let config = CacheConfig {
            persist: PersistPolicy::Always,
            ..CacheConfig::default()
        };
        let cache = CacheManager::with_storage(config, Arc::new(ManualClock::new(0)), storage.clone());
        cache.set("k", json!(1), None);
        assert!(storage.get_item(CACHE_STORAGE_KEY).unwrap().is_some());

        cache.delete("k");
        let reloaded = CacheManager::with_storage(
            CacheConfig::default(),
            Arc::new(ManualClock::new(0)),
            storage.clone(),
        );
        assert!(!reloaded.has("k"));
    }

    #[test]
    fn quota_error_is_swallowed() {
        let storage: Arc<MemoryStorage> = Arc::new(MemoryStorage::with_quota(16));
        let config = CacheConfig {
            persist: PersistPolicy::Always,
            ..CacheConfig::default()
        };
        let cache = CacheManager::with_storage(config, Arc::new(ManualClock::new(0)), storage.clone());
        // O snapshot não cabe na quota, mas o valor continua no cache
        assert!(cache.set("k", sized(64), None));
        assert!(cache.has("k"));
        assert!(matches!(
            cache.persist(),
            Err(StorageError::QuotaExceeded { .. })
        ));
    }

    #[tokio::test]
    async fn get_or_fetch_calls_once() {
        let (cache, _) = manual_cache(1024);
        let mut calls = 0;

        let v = cache
            .get_or_fetch("menu", None, || {
                calls += 1;
                async { Ok::<_, std::io::Error>(json!(["jus"])) }
            })
            .await
            .unwrap();
        assert_eq!(v, json!(["jus"]));

        let v = cache
            .get_or_fetch("menu", None, || async {
                Err::<Value, _>(std::io::Error::other("não deveria buscar"))
            })
            .await
            .unwrap();
        assert_eq!(v, json!(["jus"]));
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn maintenance_sweeps_and_flushes() {
        let storage: Arc<MemoryStorage> = Arc::new(MemoryStorage::new());
        let clock = ManualClock::new(0);
        let config = CacheConfig {
            sweep_interval: Duration::from_millis(20),
            ..CacheConfig::default()
        };
        let cache = CacheManager::with_storage(config, Arc::new(clock.clone()), storage.clone());
        cache.set("short", json!(1), Some(Duration::from_millis(5)));
        cache.set("long", json!(2), Some(Duration::from_secs(60)));
        clock.advance(Duration::from_millis(10));

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = cache.spawn_maintenance(shutdown_rx);

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(cache.len(), 1);

        drop(shutdown_tx);
        handle.await.unwrap();

        let json = storage.get_item(CACHE_STORAGE_KEY).unwrap().unwrap();
        assert!(json.contains("\"long\""));
        assert!(!json.contains("\"short\""));
    }
}
