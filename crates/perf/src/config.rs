use tokio::time::Duration;

use zatiaras_common::{
    DEFAULT_DEGRADED_SCORE, DEFAULT_HEALTH_INTERVAL_SECS, DEFAULT_MEMORY_THRESHOLD, DEFAULT_SCROLL_THROTTLE_MS,
};

use crate::audit::PerformanceBudget;

/// Configuração da camada de performance.
#[derive(Debug, Clone)]
pub struct PerfConfig {
    /// Intervalo do health check.
    pub health_interval: Duration,
    /// Score abaixo do qual o health check dispara `optimize()`.
    pub degraded_score: u8,
    /// Fração do heap que dispara limpeza.
    pub memory_threshold: f64,
    pub scroll_throttle: Duration,
    pub budget: PerformanceBudget,
}

impl Default for PerfConfig {
    fn default() -> Self {
        Self {
            health_interval: Duration::from_secs(DEFAULT_HEALTH_INTERVAL_SECS),
            degraded_score: DEFAULT_DEGRADED_SCORE,
            memory_threshold: DEFAULT_MEMORY_THRESHOLD,
            scroll_throttle: Duration::from_millis(DEFAULT_SCROLL_THROTTLE_MS),
            budget: PerformanceBudget::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = PerfConfig::default();
        assert_eq!(config.health_interval, Duration::from_secs(30));
        assert_eq!(config.degraded_score, 50);
        assert_eq!(config.scroll_throttle, Duration::from_millis(16));
        assert!((config.memory_threshold - 0.8).abs() < f64::EPSILON);
    }
}
