use std::fmt;

use serde::Serialize;
use tokio::time::Duration;

use zatiaras_storage::CacheStats;

use crate::monitor::{MetricName, MetricRecord, PerformanceMonitor};

/// Abaixo disso a taxa de acerto do cache não diz nada.
const MIN_CACHE_LOOKUPS: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

impl Grade {
    pub fn from_score(score: u8) -> Self {
        match score {
            90.. => Grade::A,
            75..=89 => Grade::B,
            50..=74 => Grade::C,
            25..=49 => Grade::D,
            _ => Grade::F,
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Limites aceitos para a página.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PerformanceBudget {
    pub max_lcp_ms: f64,
    pub max_inp_ms: f64,
    pub max_cls: f64,
    pub max_memory_percent: f64,
    pub min_cache_hit_rate: f64,
}

impl Default for PerformanceBudget {
    fn default() -> Self {
        Self {
            max_lcp_ms: 2500.0,
            max_inp_ms: 200.0,
            max_cls: 0.1,
            max_memory_percent: 80.0,
            min_cache_hit_rate: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditCheck {
    pub name: String,
    pub passed: bool,
    pub detail: String,
}

impl AuditCheck {
    fn new(name: &str, passed: bool, detail: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            passed,
            detail: detail.into(),
        }
    }
}

/// O que a auditoria precisa saber além das métricas.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuditContext {
    pub cache: Option<CacheStats>,
    pub lazy_images: bool,
    pub reduced_motion: bool,
    /// Duração efetiva de um fade-in no dispositivo.
    pub motion_duration: Duration,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditReport {
    pub score: u8,
    pub grade: Grade,
    pub metrics: Vec<MetricRecord>,
    pub recommendations: Vec<String>,
    pub checks: Vec<AuditCheck>,
}

impl AuditReport {
    pub fn passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }
}

/// Avalia um orçamento de performance e as capacidades usadas.
#[derive(Debug, Clone, Default)]
pub struct PerformanceTester {
    budget: PerformanceBudget,
}

impl PerformanceTester {
    pub fn new(budget: PerformanceBudget) -> Self {
        Self { budget }
    }

    pub fn budget(&self) -> &PerformanceBudget {
        &self.budget
    }

    pub fn run(&self, monitor: &PerformanceMonitor, ctx: &AuditContext) -> Vec<AuditCheck> {
        let inp = monitor
            .metric(MetricName::Inp)
            .or_else(|| monitor.metric(MetricName::Fid));
        vec![
            budget_check("lcp", monitor.metric(MetricName::Lcp), self.budget.max_lcp_ms),
            budget_check("inp", inp, self.budget.max_inp_ms),
            budget_check("cls", monitor.metric(MetricName::Cls), self.budget.max_cls),
            budget_check(
                "memory",
                monitor.metric(MetricName::Memory),
                self.budget.max_memory_percent,
            ),
            self.cache_check(ctx.cache.as_ref()),
            AuditCheck::new(
                "lazy-images",
                ctx.lazy_images,
                if ctx.lazy_images {
                    "imagens carregadas sob demanda"
                } else {
                    "sem IntersectionObserver, imagens carregadas de imediato"
                },
            ),
            reduced_motion_check(ctx),
        ]
    }

    fn cache_check(&self, stats: Option<&CacheStats>) -> AuditCheck {
        let Some(stats) = stats else {
            return AuditCheck::new("cache-hit-rate", true, "cache não configurado");
        };
        let lookups = stats.hits + stats.misses;
        if lookups < MIN_CACHE_LOOKUPS {
            return AuditCheck::new(
                "cache-hit-rate",
                true,
                format!("apenas {lookups} consultas, amostra insuficiente"),
            );
        }
        let rate = stats.hit_rate();
        AuditCheck::new(
            "cache-hit-rate",
            rate >= self.budget.min_cache_hit_rate,
            format!(
                "{:.0}% de acerto (mínimo {:.0}%)",
                rate * 100.0,
                self.budget.min_cache_hit_rate * 100.0
            ),
        )
    }
}

fn budget_check(name: &str, record: Option<MetricRecord>, limit: f64) -> AuditCheck {
    match record {
        Some(r) => AuditCheck::new(
            name,
            r.value <= limit,
            format!("{} = {:.2} (limite {limit})", r.name, r.value),
        ),
        None => AuditCheck::new(name, true, "não medido"),
    }
}

fn reduced_motion_check(ctx: &AuditContext) -> AuditCheck {
    if !ctx.reduced_motion {
        return AuditCheck::new("reduced-motion", true, "usuário não pediu movimento reduzido");
    }
    let passed = ctx.motion_duration.is_zero();
    AuditCheck::new(
        "reduced-motion",
        passed,
        format!("animações com {} ms", ctx.motion_duration.as_millis()),
    )
}

/// Junta score, nota, métricas e checks num relatório.
#[derive(Clone)]
pub struct PerformanceAuditor {
    monitor: PerformanceMonitor,
    tester: PerformanceTester,
}

impl PerformanceAuditor {
    pub fn new(monitor: PerformanceMonitor, budget: PerformanceBudget) -> Self {
        Self {
            monitor,
            tester: PerformanceTester::new(budget),
        }
    }

    pub fn audit(&self, ctx: &AuditContext) -> AuditReport {
        let score = self.monitor.score();
        AuditReport {
            score,
            grade: Grade::from_score(score),
            metrics: self.monitor.metrics(),
            recommendations: self.monitor.recommendations(),
            checks: self.tester.run(&self.monitor, ctx),
        }
    }
}
