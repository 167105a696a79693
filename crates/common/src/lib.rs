#![forbid(unsafe_code)]

mod branch;
mod error;

pub use branch::Branch;
pub use error::*;

/// Chave do carrinho serializado no storage.
pub const CART_STORAGE_KEY: &str = "zatiaras_cart";
/// Chave do snapshot do cache no storage.
pub const CACHE_STORAGE_KEY: &str = "zatiaras-cache";

/// Versão atual do envelope do carrinho persistido.
pub const CART_SCHEMA_VERSION: u32 = 1;
/// Versão atual do snapshot do cache persistido.
pub const CACHE_SCHEMA_VERSION: u32 = 1;

pub const DEFAULT_CACHE_MAX_BYTES: usize = 5 * 1024 * 1024; // 5 MB
pub const DEFAULT_CACHE_TTL_MS: u64 = 5 * 60 * 1000; // 5 min
pub const DEFAULT_CACHE_SWEEP_SECS: u64 = 60;
/// Quota típica de localStorage por origem.
pub const DEFAULT_STORAGE_QUOTA: usize = 5 * 1024 * 1024;

pub const DEFAULT_HEALTH_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_DEGRADED_SCORE: u8 = 50;
pub const DEFAULT_MEMORY_THRESHOLD: f64 = 0.8;
pub const DEFAULT_SCROLL_THROTTLE_MS: u64 = 16; // ~1 frame a 60 Hz
