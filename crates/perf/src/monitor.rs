use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use tracing::debug;

use zatiaras_storage::Clock;

/// Entradas vindas do PerformanceObserver (e da amostragem de memória).
/// Tempos em milissegundos relativos ao início da navegação.
#[derive(Debug, Clone, PartialEq)]
pub enum PerformanceEntry {
    LargestContentfulPaint { start_time: f64 },
    FirstInput { start_time: f64, processing_start: f64 },
    /// Event timing de uma interação.
    Event { duration: f64 },
    LayoutShift { value: f64, had_recent_input: bool },
    Paint { name: String, start_time: f64 },
    Navigation { request_start: f64, response_start: f64 },
    /// Percentual do heap em uso.
    Memory { used_percent: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum MetricName {
    #[serde(rename = "LCP")]
    Lcp,
    #[serde(rename = "FID")]
    Fid,
    #[serde(rename = "INP")]
    Inp,
    #[serde(rename = "CLS")]
    Cls,
    #[serde(rename = "FCP")]
    Fcp,
    #[serde(rename = "TTFB")]
    Ttfb,
    #[serde(rename = "memory")]
    Memory,
}

impl MetricName {
    pub const ALL: [MetricName; 7] = [
        MetricName::Lcp,
        MetricName::Fid,
        MetricName::Inp,
        MetricName::Cls,
        MetricName::Fcp,
        MetricName::Ttfb,
        MetricName::Memory,
    ];

    /// (bom até, ruim acima de)
    pub fn thresholds(&self) -> (f64, f64) {
        match self {
            MetricName::Lcp => (2500.0, 4000.0),
            MetricName::Fid => (100.0, 300.0),
            MetricName::Inp => (200.0, 500.0),
            MetricName::Cls => (0.1, 0.25),
            MetricName::Fcp => (1800.0, 3000.0),
            MetricName::Ttfb => (800.0, 1800.0),
            MetricName::Memory => (50.0, 80.0),
        }
    }

    pub fn rate(&self, value: f64) -> Rating {
        let (good, poor) = self.thresholds();
        if value <= good {
            Rating::Good
        } else if value <= poor {
            Rating::NeedsImprovement
        } else {
            Rating::Poor
        }
    }

    fn unit(&self) -> &'static str {
        match self {
            MetricName::Cls => "",
            MetricName::Memory => "%",
            _ => "ms",
        }
    }

    fn advice(&self) -> &'static str {
        match self {
            MetricName::Lcp => "pré-carregue a imagem principal e reduza o tamanho das imagens acima da dobra",
            MetricName::Fid | MetricName::Inp => {
                "quebre tarefas longas de JavaScript e adie scripts que não são críticos"
            }
            MetricName::Cls => "reserve largura e altura para imagens e banners",
            MetricName::Fcp => "reduza CSS bloqueante e faça inline do CSS crítico",
            MetricName::Ttfb => "use cache na borda e reduza o trabalho do servidor por requisição",
            MetricName::Memory => "descarregue imagens fora do viewport e remova nós não usados",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MetricName::Lcp => "LCP",
            MetricName::Fid => "FID",
            MetricName::Inp => "INP",
            MetricName::Cls => "CLS",
            MetricName::Fcp => "FCP",
            MetricName::Ttfb => "TTFB",
            MetricName::Memory => "memory",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Rating {
    Good,
    NeedsImprovement,
    Poor,
}

impl Rating {
    fn weight(&self) -> f64 {
        match self {
            Rating::Good => 1.0,
            Rating::NeedsImprovement => 0.5,
            Rating::Poor => 0.0,
        }
    }
}

/// Última observação de uma métrica.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricRecord {
    pub name: MetricName,
    pub value: f64,
    pub rating: Rating,
    pub timestamp_ms: u64,
}

/// Como uma nova observação se combina com o valor atual.
#[derive(Debug, Clone, Copy)]
enum Fold {
    Replace(f64),
    /// Pior observação (INP).
    Max(f64),
    /// Acumulado (CLS).
    Sum(f64),
}

impl Fold {
    fn initial(self) -> f64 {
        match self {
            Fold::Replace(v) | Fold::Max(v) => v,
            Fold::Sum(_) => 0.0,
        }
    }

    fn apply(self, current: f64) -> f64 {
        match self {
            Fold::Replace(v) => v,
            Fold::Max(v) => current.max(v),
            Fold::Sum(v) => current + v,
        }
    }
}

/// Pesos do score. INP substitui FID quando presente.
const SCORE_WEIGHTS: [(MetricName, f64); 5] = [
    (MetricName::Lcp, 25.0),
    (MetricName::Inp, 25.0),
    (MetricName::Cls, 25.0),
    (MetricName::Fcp, 15.0),
    (MetricName::Ttfb, 10.0),
];

/// Guarda a última leitura de cada métrica e calcula score e recomendações.
#[derive(Clone)]
pub struct PerformanceMonitor {
    metrics: Arc<DashMap<MetricName, MetricRecord>>,
    clock: Arc<dyn Clock>,
    enabled: bool,
}

impl PerformanceMonitor {
    /// `enabled = false` (sem PerformanceObserver) ignora tudo.
    pub fn new(clock: Arc<dyn Clock>, enabled: bool) -> Self {
        Self {
            metrics: Arc::new(DashMap::new()),
            clock,
            enabled,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Converte a entrada em métrica e grava. Retorna o registro atualizado.
    pub fn record(&self, entry: PerformanceEntry) -> Option<MetricRecord> {
        if !self.enabled {
            return None;
        }
        let (name, fold) = match entry {
            PerformanceEntry::LargestContentfulPaint { start_time } => (MetricName::Lcp, Fold::Replace(start_time)),
            PerformanceEntry::FirstInput {
                start_time,
                processing_start,
            } => (MetricName::Fid, Fold::Replace((processing_start - start_time).max(0.0))),
            PerformanceEntry::Event { duration } => (MetricName::Inp, Fold::Max(duration)),
            PerformanceEntry::LayoutShift {
                value,
                had_recent_input,
            } => {
                // Shifts logo após input do usuário não contam
                if had_recent_input {
                    return self.metric(MetricName::Cls);
                }
                (MetricName::Cls, Fold::Sum(value))
            }
            PerformanceEntry::Paint { name, start_time } => {
                if name != "first-contentful-paint" {
                    return None;
                }
                (MetricName::Fcp, Fold::Replace(start_time))
            }
            PerformanceEntry::Navigation {
                request_start,
                response_start,
            } => (MetricName::Ttfb, Fold::Replace((response_start - request_start).max(0.0))),
            PerformanceEntry::Memory { used_percent } => (MetricName::Memory, Fold::Replace(used_percent)),
        };
        Some(self.store(name, fold))
    }

    /// Leitura e escrita sob o mesmo lock de shard.
    fn store(&self, name: MetricName, fold: Fold) -> MetricRecord {
        let timestamp_ms = self.clock.now_ms();
        let mut slot = self.metrics.entry(name).or_insert_with(|| MetricRecord {
            name,
            value: fold.initial(),
            rating: name.rate(fold.initial()),
            timestamp_ms,
        });
        let value = fold.apply(slot.value);
        *slot = MetricRecord {
            name,
            value,
            rating: name.rate(value),
            timestamp_ms,
        };
        let record = *slot;
        drop(slot);

        debug!("métrica {name}: {value:.2}{} ({:?})", name.unit(), record.rating);
        record
    }

    pub fn metric(&self, name: MetricName) -> Option<MetricRecord> {
        self.metrics.get(&name).map(|r| *r)
    }

    /// Todas as métricas observadas, em ordem fixa.
    pub fn metrics(&self) -> Vec<MetricRecord> {
        MetricName::ALL
            .iter()
            .filter_map(|name| self.metric(*name))
            .collect()
    }

    /// Score 0–100. Sem métricas observadas vale 100.
    pub fn score(&self) -> u8 {
        let mut total = 0.0;
        let mut weight_sum = 0.0;
        for (name, weight) in SCORE_WEIGHTS {
            let record = match name {
                MetricName::Inp => self.metric(MetricName::Inp).or_else(|| self.metric(MetricName::Fid)),
                other => self.metric(other),
            };
            if let Some(record) = record {
                total += record.rating.weight() * weight;
                weight_sum += weight;
            }
        }
        if weight_sum == 0.0 {
            return 100;
        }
        (total / weight_sum * 100.0).round() as u8
    }

    /// Um texto por métrica fora da faixa boa.
    pub fn recommendations(&self) -> Vec<String> {
        self.metrics()
            .into_iter()
            .filter(|r| r.rating != Rating::Good)
            .map(|r| {
                format!(
                    "{} em {:.2}{} ({}): {}",
                    r.name,
                    r.value,
                    r.name.unit(),
                    match r.rating {
                        Rating::Poor => "ruim",
                        _ => "precisa melhorar",
                    },
                    r.name.advice()
                )
            })
            .collect()
    }

    pub fn reset(&self) {
        self.metrics.clear();
    }
}
