use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tokio_stream::Stream;
use tracing::{debug, info, warn};

use zatiaras_storage::{CacheManager, CacheStats, Clock, PersistPolicy, SystemClock};

use crate::animation::{AnimationKind, AnimationOptimizer, PerformanceTier};
use crate::audit::{AuditContext, AuditReport, Grade, PerformanceAuditor};
use crate::capability::{Capabilities, HeapUsage};
use crate::config::PerfConfig;
use crate::image::{ImageOptimizer, ImageStats};
use crate::lock;
use crate::memory::{MemoryCheck, MemoryManager};
use crate::monitor::{MetricRecord, PerformanceEntry, PerformanceMonitor};
use crate::network::{ConnectionEvent, ConnectionInfo, NetworkOptimizer, NetworkPolicy};
use crate::scroll::ScrollOptimizer;

/// Resultado de um tick do health check.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HealthEvent {
    Healthy { score: u8 },
    /// Score abaixo do limite; `optimize()` já rodou.
    Degraded { score: u8, report: OptimizationReport },
    MemoryPressure { check: MemoryCheck },
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OptimizationReport {
    pub expired_swept: usize,
    pub images_unloaded: usize,
    pub nodes_removed: usize,
}

/// Visão consolidada da camada de performance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceReport {
    pub score: u8,
    pub grade: Grade,
    pub metrics: Vec<MetricRecord>,
    pub cache: CacheStats,
    pub connection: ConnectionInfo,
    pub network: NetworkPolicy,
    pub tier: PerformanceTier,
    pub images: ImageStats,
    pub memory: Option<HeapUsage>,
}

/// Tasks em execução. O cache tem sinal próprio para parar por último.
struct Running {
    loops_shutdown: broadcast::Sender<()>,
    cache_shutdown: broadcast::Sender<()>,
    loops: Vec<JoinHandle<()>>,
    maintenance: JoinHandle<()>,
}

struct Inner {
    config: PerfConfig,
    caps: Capabilities,
    cache: CacheManager,
    images: ImageOptimizer,
    animation: AnimationOptimizer,
    scroll: ScrollOptimizer,
    memory: MemoryManager,
    network: NetworkOptimizer,
    monitor: PerformanceMonitor,
    auditor: PerformanceAuditor,
    events: broadcast::Sender<HealthEvent>,
    running: Mutex<Option<Running>>,
}

/// Dono de todos os otimizadores. Construído uma vez no startup.
#[derive(Clone)]
pub struct PerformanceIntegration {
    inner: Arc<Inner>,
}

impl PerformanceIntegration {
    pub fn new(config: PerfConfig, caps: Capabilities, cache: CacheManager) -> Self {
        Self::with_clock(config, caps, cache, Arc::new(SystemClock))
    }

    pub fn with_clock(config: PerfConfig, caps: Capabilities, cache: CacheManager, clock: Arc<dyn Clock>) -> Self {
        let network = NetworkOptimizer::new(&caps);
        let images = ImageOptimizer::new(&caps, network.clone());
        let memory = MemoryManager::new(&caps, images.clone(), config.memory_threshold);
        let monitor = PerformanceMonitor::new(clock, caps.performance_observer);
        let auditor = PerformanceAuditor::new(monitor.clone(), config.budget);
        let (events, _) = broadcast::channel(64);

        Self {
            inner: Arc::new(Inner {
                animation: AnimationOptimizer::new(&caps),
                scroll: ScrollOptimizer::new(config.scroll_throttle),
                config,
                caps,
                cache,
                images,
                memory,
                network,
                monitor,
                auditor,
                events,
                running: Mutex::new(None),
            }),
        }
    }

    pub fn cache(&self) -> &CacheManager {
        &self.inner.cache
    }

    pub fn images(&self) -> &ImageOptimizer {
        &self.inner.images
    }

    pub fn animation(&self) -> &AnimationOptimizer {
        &self.inner.animation
    }

    pub fn scroll_optimizer(&self) -> &ScrollOptimizer {
        &self.inner.scroll
    }

    pub fn memory(&self) -> &MemoryManager {
        &self.inner.memory
    }

    pub fn network(&self) -> &NetworkOptimizer {
        &self.inner.network
    }

    pub fn monitor(&self) -> &PerformanceMonitor {
        &self.inner.monitor
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HealthEvent> {
        self.inner.events.subscribe()
    }

    pub fn is_running(&self) -> bool {
        lock(&self.inner.running).is_some()
    }

    /// Sobe o health loop e a manutenção do cache (precisa de runtime
    /// tokio). Retorna `false` sem janela ou se já estava rodando.
    pub fn start(&self) -> bool {
        if self.inner.caps.is_headless() {
            info!("performance: sem janela, otimizações desligadas");
            return false;
        }
        let mut running = lock(&self.inner.running);
        if running.is_some() {
            return false;
        }

        let (loops_shutdown, _) = broadcast::channel(1);
        let (cache_shutdown, _) = broadcast::channel(1);
        let maintenance = self.inner.cache.spawn_maintenance(cache_shutdown.subscribe());
        let health = self.spawn_health_loop(loops_shutdown.subscribe());

        *running = Some(Running {
            loops_shutdown,
            cache_shutdown,
            loops: vec![health],
            maintenance,
        });
        info!(
            "performance: iniciada (health a cada {:?}, tier {:?})",
            self.inner.config.health_interval,
            self.inner.animation.tier()
        );
        true
    }

    fn spawn_health_loop(&self, mut shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            let mut tick = interval(this.inner.config.health_interval);
            tick.tick().await; // primeiro tick é imediato

            loop {
                tokio::select! {
                    _ = tick.tick() => {
                        this.health_check();
                    }
                    _ = shutdown.recv() => break,
                }
            }
            debug!("performance: health loop encerrado");
        })
    }

    /// Liga um stream de eventos de conexão ao otimizador de rede. Retorna
    /// `false` se a integração não foi iniciada.
    pub fn spawn_network_events<St>(&self, events: St) -> bool
    where
        St: Stream<Item = ConnectionEvent> + Unpin + Send + 'static,
    {
        let mut running = lock(&self.inner.running);
        let Some(running) = running.as_mut() else {
            return false;
        };
        let network = self.inner.network.clone();
        let shutdown = running.loops_shutdown.subscribe();
        running
            .loops
            .push(tokio::spawn(async move { network.run(events, shutdown).await }));
        true
    }

    /// Um ciclo do health check. Os eventos gerados também vão para os
    /// assinantes.
    pub fn health_check(&self) -> Vec<HealthEvent> {
        let mut events = Vec::new();

        if let Some(check) = self.inner.memory.check() {
            self.inner.monitor.record(PerformanceEntry::Memory {
                used_percent: check.percent(),
            });
            if check.cleanup.is_some() {
                events.push(HealthEvent::MemoryPressure { check });
            }
        }

        let score = self.inner.monitor.score();
        if score < self.inner.config.degraded_score {
            warn!("performance: score {score} abaixo de {}", self.inner.config.degraded_score);
            let report = self.optimize();
            events.push(HealthEvent::Degraded { score, report });
        } else {
            events.push(HealthEvent::Healthy { score });
        }

        for event in &events {
            // Sem assinantes o envio falha; não é erro
            let _ = self.inner.events.send(event.clone());
        }
        events
    }

    /// Varre o cache, descarrega imagens fora de tela e limpa a memória.
    pub fn optimize(&self) -> OptimizationReport {
        let expired_swept = self.inner.cache.sweep_expired();
        let cleanup = self.inner.memory.cleanup();
        let report = OptimizationReport {
            expired_swept,
            images_unloaded: cleanup.images_unloaded,
            nodes_removed: cleanup.nodes_removed,
        };
        debug!("performance: otimização {report:?}");
        report
    }

    pub fn report(&self) -> PerformanceReport {
        let score = self.inner.monitor.score();
        PerformanceReport {
            score,
            grade: Grade::from_score(score),
            metrics: self.inner.monitor.metrics(),
            cache: self.inner.cache.stats(),
            connection: self.inner.network.info(),
            network: self.inner.network.policy(),
            tier: self.inner.animation.tier(),
            images: self.inner.images.stats(),
            memory: self.inner.memory.sample(),
        }
    }

    pub fn audit(&self) -> AuditReport {
        let ctx = AuditContext {
            cache: Some(self.inner.cache.stats()),
            lazy_images: self.inner.images.is_lazy(),
            reduced_motion: self.inner.animation.reduced_motion(),
            motion_duration: self.inner.animation.preset(AnimationKind::FadeIn).duration,
        };
        self.inner.auditor.audit(&ctx)
    }

    /// Desmonta na ordem: loops, manutenção do cache (que faz o flush
    /// final) e, se nada estava rodando, persiste o cache aqui.
    pub async fn cleanup(&self) {
        let running = lock(&self.inner.running).take();

        let Some(running) = running else {
            if self.inner.cache.persist_policy() != PersistPolicy::Never {
                if let Err(e) = self.inner.cache.persist() {
                    warn!("performance: falha ao persistir cache: {e}");
                }
            }
            return;
        };

        let _ = running.loops_shutdown.send(());
        for handle in running.loops {
            if let Err(e) = handle.await {
                warn!("performance: task encerrada com erro: {e}");
            }
        }

        let _ = running.cache_shutdown.send(());
        if let Err(e) = running.maintenance.await {
            warn!("performance: manutenção do cache encerrada com erro: {e}");
        }
        info!("performance: encerrada");
    }
}
