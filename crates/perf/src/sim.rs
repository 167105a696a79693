//! Implementações em memória das capacidades do navegador.
//!
//! Servem para rodar a camada de performance fora do navegador (CLI,
//! testes) com viewport, heap e conexão controlados por quem chama.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use crate::capability::{ConnectionProbe, Document, ElementId, HeapUsage, MemoryProbe};
use crate::lock;
use crate::network::ConnectionInfo;

/// DOM simulado: visibilidade por elemento, fontes de imagem e nós removidos.
#[derive(Debug, Default)]
pub struct SimDocument {
    visible: DashMap<ElementId, bool>,
    sources: DashMap<ElementId, String>,
    removed: DashMap<ElementId, ()>,
}

impl SimDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_in_viewport(&self, element: ElementId, visible: bool) {
        self.visible.insert(element, visible);
    }

    pub fn source(&self, element: ElementId) -> Option<String> {
        self.sources.get(&element).map(|s| s.clone())
    }

    pub fn is_removed(&self, element: ElementId) -> bool {
        self.removed.contains_key(&element)
    }
}

impl Document for SimDocument {
    fn is_in_viewport(&self, element: ElementId) -> bool {
        self.visible.get(&element).map(|v| *v).unwrap_or(false)
    }

    fn set_image_source(&self, element: ElementId, src: Option<&str>) {
        match src {
            Some(s) => {
                self.sources.insert(element, s.to_string());
            }
            None => {
                self.sources.remove(&element);
            }
        }
    }

    fn remove_node(&self, element: ElementId) {
        self.sources.remove(&element);
        self.visible.remove(&element);
        self.removed.insert(element, ());
    }
}

/// Heap simulado.
#[derive(Debug)]
pub struct SimMemory {
    used: AtomicU64,
    limit: AtomicU64,
}

impl SimMemory {
    pub fn new(used_bytes: u64, limit_bytes: u64) -> Self {
        Self {
            used: AtomicU64::new(used_bytes),
            limit: AtomicU64::new(limit_bytes),
        }
    }

    pub fn set_used(&self, used_bytes: u64) {
        self.used.store(used_bytes, Ordering::Relaxed);
    }
}

impl MemoryProbe for SimMemory {
    fn heap(&self) -> Option<HeapUsage> {
        Some(HeapUsage {
            used_bytes: self.used.load(Ordering::Relaxed),
            limit_bytes: self.limit.load(Ordering::Relaxed),
        })
    }
}

/// Conexão simulada.
#[derive(Debug, Default)]
pub struct SimConnection {
    info: Mutex<ConnectionInfo>,
}

impl SimConnection {
    pub fn new(info: ConnectionInfo) -> Self {
        Self {
            info: Mutex::new(info),
        }
    }

    pub fn set(&self, info: ConnectionInfo) {
        *lock(&self.info) = info;
    }
}

impl ConnectionProbe for SimConnection {
    fn current(&self) -> ConnectionInfo {
        *lock(&self.info)
    }
}
