use std::sync::Arc;

use dashmap::{DashMap, DashSet};
use serde::Serialize;
use tracing::debug;
use url::form_urlencoded;

use crate::capability::{Capabilities, Document, ElementId};
use crate::network::NetworkOptimizer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ImageState {
    Pending,
    Loaded,
}

#[derive(Debug, Clone)]
struct TrackedImage {
    src: String,
    width: Option<u32>,
    state: ImageState,
}

/// Resultado do IntersectionObserver para um elemento.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntersectionEntry {
    pub element: ElementId,
    pub is_intersecting: bool,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImageStats {
    pub tracked: usize,
    pub loaded: usize,
    pub pending: usize,
    pub preloaded: usize,
}

struct ImageShared {
    images: DashMap<ElementId, TrackedImage>,
    preloaded: DashSet<String>,
    document: Option<Arc<dyn Document>>,
    lazy: bool,
    network: NetworkOptimizer,
}

/// Lazy-load e preload de imagens com qualidade adaptada à rede.
#[derive(Clone)]
pub struct ImageOptimizer {
    shared: Arc<ImageShared>,
}

impl ImageOptimizer {
    pub fn new(caps: &Capabilities, network: NetworkOptimizer) -> Self {
        let lazy = caps.intersection_observer && caps.document.is_some();
        Self {
            shared: Arc::new(ImageShared {
                images: DashMap::new(),
                preloaded: DashSet::new(),
                document: caps.document.clone(),
                lazy,
                network,
            }),
        }
    }

    /// Lazy-load ativo (há IntersectionObserver e DOM).
    pub fn is_lazy(&self) -> bool {
        self.shared.lazy
    }

    /// Registra uma imagem. Sem IntersectionObserver carrega na hora.
    /// Sem DOM não há o que fazer e retorna `None`.
    pub fn observe(&self, element: ElementId, src: impl Into<String>, width: Option<u32>) -> Option<ImageState> {
        self.shared.document.as_ref()?;

        self.shared.images.insert(
            element,
            TrackedImage {
                src: src.into(),
                width,
                state: ImageState::Pending,
            },
        );
        if !self.shared.lazy {
            self.load(element);
            return Some(ImageState::Loaded);
        }
        Some(ImageState::Pending)
    }

    pub fn forget(&self, element: ElementId) {
        self.shared.images.remove(&element);
    }

    pub fn state(&self, element: ElementId) -> Option<ImageState> {
        self.shared.images.get(&element).map(|i| i.state)
    }

    /// Callback do IntersectionObserver. Retorna os elementos carregados.
    pub fn on_intersection(&self, entries: &[IntersectionEntry]) -> Vec<ElementId> {
        entries
            .iter()
            .filter(|e| e.is_intersecting)
            .filter(|e| self.load(e.element))
            .map(|e| e.element)
            .collect()
    }

    /// Carrega todas as pendentes que já estão no viewport.
    pub fn scan_viewport(&self) -> Vec<ElementId> {
        let Some(document) = self.shared.document.as_ref() else {
            return vec![];
        };
        // Consulta o documento fora do lock do mapa
        let pending = self.keys_in_state(ImageState::Pending);
        pending
            .into_iter()
            .filter(|el| document.is_in_viewport(*el))
            .filter(|el| self.load(*el))
            .collect()
    }

    fn load(&self, element: ElementId) -> bool {
        let Some(document) = self.shared.document.as_ref() else {
            return false;
        };
        let url = {
            let Some(mut image) = self.shared.images.get_mut(&element) else {
                return false;
            };
            if image.state == ImageState::Loaded {
                return false;
            }
            image.state = ImageState::Loaded;
            self.optimized_url(&image.src, image.width)
        };
        document.set_image_source(element, Some(&url));
        debug!("imagem {element} carregada: {url}");
        true
    }

    /// Descarrega imagens carregadas fora do viewport; voltam a pendentes.
    pub fn unload_offscreen(&self) -> Vec<ElementId> {
        let Some(document) = self.shared.document.as_ref() else {
            return vec![];
        };
        let offscreen: Vec<ElementId> = self
            .keys_in_state(ImageState::Loaded)
            .into_iter()
            .filter(|el| !document.is_in_viewport(*el))
            .collect();

        let mut unloaded = Vec::new();
        for element in offscreen {
            if let Some(mut image) = self.shared.images.get_mut(&element) {
                if image.state == ImageState::Loaded {
                    image.state = ImageState::Pending;
                    unloaded.push(element);
                }
            }
        }
        for element in &unloaded {
            document.set_image_source(*element, None);
        }
        if !unloaded.is_empty() {
            debug!("{} imagens fora do viewport descarregadas", unloaded.len());
        }
        unloaded
    }

    fn keys_in_state(&self, state: ImageState) -> Vec<ElementId> {
        self.shared
            .images
            .iter()
            .filter(|i| i.state == state)
            .map(|i| *i.key())
            .collect()
    }

    /// Registra preloads. Retorna as URLs novas (já otimizadas) para o
    /// chamador emitir `<link rel="preload">`.
    pub fn preload<I, S>(&self, srcs: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if self.shared.document.is_none() {
            return vec![];
        }
        let mut urls = Vec::new();
        for src in srcs {
            let src: String = src.into();
            if self.shared.preloaded.insert(src.clone()) {
                urls.push(self.optimized_url(&src, None));
            }
        }
        urls
    }

    /// Anexa `w` e `q` à URL. Data URLs e SVG passam intactos.
    pub fn optimized_url(&self, src: &str, width: Option<u32>) -> String {
        if src.starts_with("data:") || src.to_lowercase().ends_with(".svg") {
            return src.to_string();
        }
        let quality = self.shared.network.policy().image_quality;

        let mut query = form_urlencoded::Serializer::new(String::new());
        if let Some(w) = width {
            query.append_pair("w", &w.to_string());
        }
        query.append_pair("q", &quality.value().to_string());

        let sep = if src.contains('?') { '&' } else { '?' };
        format!("{src}{sep}{}", query.finish())
    }

    pub fn stats(&self) -> ImageStats {
        let loaded = self
            .shared
            .images
            .iter()
            .filter(|i| i.state == ImageState::Loaded)
            .count();
        let tracked = self.shared.images.len();
        ImageStats {
            tracked,
            loaded,
            pending: tracked - loaded,
            preloaded: self.shared.preloaded.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{ConnectionEvent, ConnectionInfo, EffectiveType};
    use crate::sim::SimDocument;

    fn setup(intersection: bool) -> (ImageOptimizer, Arc<SimDocument>, NetworkOptimizer) {
        let doc = Arc::new(SimDocument::new());
        let caps = Capabilities::headless()
            .with_document(doc.clone())
            .with_observers(intersection, true);
        let network = NetworkOptimizer::new(&caps);
        (ImageOptimizer::new(&caps, network.clone()), doc, network)
    }

    /// Documento que consulta o otimizador de dentro do callback.
    struct ReentrantDocument {
        inner: SimDocument,
        images: std::sync::OnceLock<ImageOptimizer>,
    }

    impl Document for ReentrantDocument {
        fn is_in_viewport(&self, element: ElementId) -> bool {
            if let Some(images) = self.images.get() {
                images.state(element);
            }
            self.inner.is_in_viewport(element)
        }

        fn set_image_source(&self, element: ElementId, src: Option<&str>) {
            self.inner.set_image_source(element, src);
        }

        fn remove_node(&self, element: ElementId) {
            self.inner.remove_node(element);
        }
    }

    #[test]
    fn document_callbacks_may_reenter() {
        let doc = Arc::new(ReentrantDocument {
            inner: SimDocument::new(),
            images: std::sync::OnceLock::new(),
        });
        let caps = Capabilities::headless()
            .with_document(doc.clone())
            .with_observers(true, true);
        let images = ImageOptimizer::new(&caps, NetworkOptimizer::new(&caps));
        let _ = doc.images.set(images.clone());

        for i in 0..4 {
            images.observe(ElementId(i), format!("/img/{i}.jpg"), None);
            doc.inner.set_in_viewport(ElementId(i), true);
        }
        assert_eq!(images.scan_viewport().len(), 4);

        doc.inner.set_in_viewport(ElementId(0), false);
        doc.inner.set_in_viewport(ElementId(3), false);
        let mut unloaded = images.unload_offscreen();
        unloaded.sort();
        assert_eq!(unloaded, vec![ElementId(0), ElementId(3)]);
        assert_eq!(images.state(ElementId(0)), Some(ImageState::Pending));
        assert_eq!(images.state(ElementId(1)), Some(ImageState::Loaded));
    }

    #[test]
    fn lazy_until_intersecting() {
        let (images, doc, _) = setup(true);
        let el = ElementId(1);
        assert_eq!(
            images.observe(el, "/img/alpukat.jpg", Some(400)),
            Some(ImageState::Pending)
        );
        assert_eq!(doc.source(el), None);

        let loaded = images.on_intersection(&[
            IntersectionEntry {
                element: el,
                is_intersecting: true,
            },
            IntersectionEntry {
                element: ElementId(99),
                is_intersecting: true,
            },
        ]);
        assert_eq!(loaded, vec![el]);
        assert_eq!(doc.source(el).as_deref(), Some("/img/alpukat.jpg?w=400&q=90"));

        // Segunda interseção não recarrega
        assert!(images.on_intersection(&[IntersectionEntry { element: el, is_intersecting: true }]).is_empty());
    }

    #[test]
    fn eager_without_intersection_observer() {
        let (images, doc, _) = setup(false);
        assert!(!images.is_lazy());
        assert_eq!(
            images.observe(ElementId(1), "/img/a.jpg", None),
            Some(ImageState::Loaded)
        );
        assert!(doc.source(ElementId(1)).is_some());
    }

    #[test]
    fn headless_is_noop() {
        let caps = Capabilities::headless();
        let images = ImageOptimizer::new(&caps, NetworkOptimizer::new(&caps));
        assert_eq!(images.observe(ElementId(1), "/a.jpg", None), None);
        assert!(images.preload(["/a.jpg"]).is_empty());
        assert!(images.unload_offscreen().is_empty());
        assert_eq!(images.stats(), ImageStats::default());
    }

    #[test]
    fn scan_viewport_loads_visible() {
        let (images, doc, _) = setup(true);
        images.observe(ElementId(1), "/a.jpg", None);
        images.observe(ElementId(2), "/b.jpg", None);
        doc.set_in_viewport(ElementId(2), true);

        assert_eq!(images.scan_viewport(), vec![ElementId(2)]);
        assert_eq!(images.stats().loaded, 1);
        assert_eq!(images.stats().pending, 1);
    }

    #[test]
    fn quality_follows_network() {
        let (images, _, network) = setup(true);
        network.handle_event(ConnectionEvent::Changed(ConnectionInfo {
            effective_type: EffectiveType::TwoG,
            ..ConnectionInfo::default()
        }));
        assert_eq!(images.optimized_url("/a.jpg?v=2", Some(200)), "/a.jpg?v=2&w=200&q=50");
        assert_eq!(images.optimized_url("/logo.SVG", Some(200)), "/logo.SVG");
        assert_eq!(images.optimized_url("data:image/png;base64,xx", None), "data:image/png;base64,xx");
    }

    #[test]
    fn unload_offscreen_returns_to_pending() {
        let (images, doc, _) = setup(false);
        images.observe(ElementId(1), "/a.jpg", None);
        images.observe(ElementId(2), "/b.jpg", None);
        doc.set_in_viewport(ElementId(1), true);

        assert_eq!(images.unload_offscreen(), vec![ElementId(2)]);
        assert_eq!(doc.source(ElementId(2)), None);
        assert!(doc.source(ElementId(1)).is_some());
        assert_eq!(images.state(ElementId(2)), Some(ImageState::Pending));
    }

    #[test]
    fn preload_deduplicates() {
        let (images, _, _) = setup(true);
        let first = images.preload(["/hero.jpg", "/menu.jpg"]);
        assert_eq!(first, vec!["/hero.jpg?q=90", "/menu.jpg?q=90"]);
        let second = images.preload(vec!["/hero.jpg".to_string()]);
        assert!(second.is_empty());
        assert_eq!(images.stats().preloaded, 2);
    }
}
