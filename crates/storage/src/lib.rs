#![forbid(unsafe_code)]

pub mod cache;
mod clock;
mod entry;
pub mod snapshot;
mod storage;

pub use cache::{CacheConfig, CacheManager, CacheStats, PersistPolicy};
pub use clock::{Clock, ManualClock, SystemClock};
pub use entry::CacheEntry;
pub use snapshot::{CacheSnapshot, SnapshotEntry, load_snapshot, save_snapshot};
pub use storage::{FileStorage, MemoryStorage, Storage};
