use std::sync::Arc;

use dashmap::DashSet;
use serde::Serialize;
use tracing::{debug, info};

use crate::capability::{Capabilities, Document, ElementId, HeapUsage, MemoryProbe};
use crate::image::ImageOptimizer;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub images_unloaded: usize,
    pub nodes_removed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MemoryCheck {
    pub usage: HeapUsage,
    /// Preenchido quando o limite foi ultrapassado e a limpeza rodou.
    pub cleanup: Option<CleanupReport>,
}

impl MemoryCheck {
    pub fn ratio(&self) -> f64 {
        self.usage.ratio()
    }

    pub fn percent(&self) -> f64 {
        self.usage.ratio() * 100.0
    }
}

/// Amostra o heap e libera recursos quando passa do limite.
#[derive(Clone)]
pub struct MemoryManager {
    probe: Option<Arc<dyn MemoryProbe>>,
    document: Option<Arc<dyn Document>>,
    images: ImageOptimizer,
    flagged: Arc<DashSet<ElementId>>,
    threshold: f64,
}

impl MemoryManager {
    pub fn new(caps: &Capabilities, images: ImageOptimizer, threshold: f64) -> Self {
        Self {
            probe: caps.memory.clone(),
            document: caps.document.clone(),
            images,
            flagged: Arc::new(DashSet::new()),
            threshold,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn sample(&self) -> Option<HeapUsage> {
        self.probe.as_ref()?.heap()
    }

    /// Marca um nó para ser removido na próxima limpeza.
    pub fn flag_for_cleanup(&self, element: ElementId) {
        self.flagged.insert(element);
    }

    pub fn flagged(&self) -> usize {
        self.flagged.len()
    }

    /// `None` sem probe de memória.
    pub fn check(&self) -> Option<MemoryCheck> {
        let usage = self.sample()?;
        let ratio = usage.ratio();
        debug!("memória: {:.1}% do heap", ratio * 100.0);

        let cleanup = (ratio > self.threshold).then(|| {
            info!(
                "memória acima do limite ({:.0}% > {:.0}%), limpando",
                ratio * 100.0,
                self.threshold * 100.0
            );
            self.cleanup()
        });
        Some(MemoryCheck { usage, cleanup })
    }

    /// Descarrega imagens fora do viewport e remove os nós marcados.
    pub fn cleanup(&self) -> CleanupReport {
        let images_unloaded = self.images.unload_offscreen().len();

        let flagged: Vec<ElementId> = self.flagged.iter().map(|e| *e).collect();
        let mut nodes_removed = 0;
        if let Some(document) = self.document.as_ref() {
            for element in flagged {
                self.flagged.remove(&element);
                self.images.forget(element);
                document.remove_node(element);
                nodes_removed += 1;
            }
        }

        CleanupReport {
            images_unloaded,
            nodes_removed,
        }
    }
}
