use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use zatiaras_common::CapabilityError;

use crate::network::ConnectionInfo;

/// Identificador opaco de um elemento da página.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ElementId(pub u64);

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Acesso ao DOM que os otimizadores precisam.
pub trait Document: Send + Sync {
    fn is_in_viewport(&self, element: ElementId) -> bool;
    /// `None` limpa a fonte (descarrega a imagem).
    fn set_image_source(&self, element: ElementId, src: Option<&str>);
    fn remove_node(&self, element: ElementId);
}

/// Uso do heap JS.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HeapUsage {
    pub used_bytes: u64,
    pub limit_bytes: u64,
}

impl HeapUsage {
    pub fn ratio(&self) -> f64 {
        if self.limit_bytes == 0 {
            0.0
        } else {
            self.used_bytes as f64 / self.limit_bytes as f64
        }
    }
}

pub trait MemoryProbe: Send + Sync {
    fn heap(&self) -> Option<HeapUsage>;
}

pub trait ConnectionProbe: Send + Sync {
    fn current(&self) -> ConnectionInfo;
}

/// Perfil do dispositivo usado para escolher presets.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DeviceProfile {
    pub cpu_cores: u32,
    pub memory_gb: f32,
    pub reduced_motion: bool,
    pub save_data: bool,
}

impl Default for DeviceProfile {
    fn default() -> Self {
        Self {
            cpu_cores: 4,
            memory_gb: 4.0,
            reduced_motion: false,
            save_data: false,
        }
    }
}

/// APIs do navegador disponíveis, detectadas uma vez no startup.
///
/// Sem janela (`headless`) todos os otimizadores viram no-op.
#[derive(Clone, Default)]
pub struct Capabilities {
    pub document: Option<Arc<dyn Document>>,
    pub memory: Option<Arc<dyn MemoryProbe>>,
    pub connection: Option<Arc<dyn ConnectionProbe>>,
    pub intersection_observer: bool,
    pub performance_observer: bool,
    pub device: DeviceProfile,
}

impl Capabilities {
    pub fn headless() -> Self {
        Self::default()
    }

    pub fn is_headless(&self) -> bool {
        self.document.is_none()
    }

    pub fn with_document(mut self, document: Arc<dyn Document>) -> Self {
        self.document = Some(document);
        self
    }

    pub fn with_memory(mut self, probe: Arc<dyn MemoryProbe>) -> Self {
        self.memory = Some(probe);
        self
    }

    pub fn with_connection(mut self, probe: Arc<dyn ConnectionProbe>) -> Self {
        self.connection = Some(probe);
        self
    }

    pub fn with_observers(mut self, intersection: bool, performance: bool) -> Self {
        self.intersection_observer = intersection;
        self.performance_observer = performance;
        self
    }

    pub fn with_device(mut self, device: DeviceProfile) -> Self {
        self.device = device;
        self
    }

    pub fn require_document(&self) -> Result<&Arc<dyn Document>, CapabilityError> {
        self.document
            .as_ref()
            .ok_or(CapabilityError::Unavailable("document"))
    }
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capabilities")
            .field("document", &self.document.is_some())
            .field("memory", &self.memory.is_some())
            .field("connection", &self.connection.is_some())
            .field("intersection_observer", &self.intersection_observer)
            .field("performance_observer", &self.performance_observer)
            .field("device", &self.device)
            .finish()
    }
}
