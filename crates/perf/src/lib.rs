#![forbid(unsafe_code)]

use std::sync::{Mutex, MutexGuard, PoisonError};

pub mod animation;
pub mod audit;
pub mod capability;
pub mod config;
pub mod image;
pub mod integration;
pub mod memory;
pub mod monitor;
pub mod network;
pub mod scroll;
pub mod sim;

pub use animation::{AnimationKind, AnimationOptimizer, AnimationPermit, AnimationPreset, PerformanceTier};
pub use audit::{AuditCheck, AuditContext, AuditReport, Grade, PerformanceAuditor, PerformanceBudget, PerformanceTester};
pub use capability::{Capabilities, ConnectionProbe, DeviceProfile, Document, ElementId, HeapUsage, MemoryProbe};
pub use config::PerfConfig;
pub use image::{ImageOptimizer, ImageState, ImageStats, IntersectionEntry};
pub use integration::{HealthEvent, OptimizationReport, PerformanceIntegration, PerformanceReport};
pub use memory::{CleanupReport, MemoryCheck, MemoryManager};
pub use monitor::{MetricName, MetricRecord, PerformanceEntry, PerformanceMonitor, Rating};
pub use network::{ConnectionEvent, ConnectionInfo, EffectiveType, ImageQuality, NetworkOptimizer, NetworkPolicy};
pub use scroll::{ScrollDirection, ScrollOptimizer, ScrollSnapshot};

/// Mutex envenenado não derruba a camada de performance.
pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
